use std::sync::LazyLock;

use scraper::Selector;

use super::DetailView;
use crate::dom;

static CATEGORY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"button[jsaction*="category"]"#).unwrap());

pub fn extract(view: &DetailView) -> Option<String> {
    let names: Vec<String> = view
        .scope
        .select(&CATEGORY)
        .map(dom::text)
        .filter(|t| !t.is_empty())
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn joins_category_buttons() {
        let doc = Html::parse_document(
            r#"<button jsaction="pane.rating.category">Diner</button>
               <button jsaction="pane.wfvdle10.category"> </button>
               <button jsaction="pane.wfvdle11.category">Breakfast restaurant</button>
               <button jsaction="pane.share">Share</button>"#,
        );
        let view = DetailView::new(&doc, None, "", true);
        assert_eq!(extract(&view).as_deref(), Some("Diner, Breakfast restaurant"));
    }
}
