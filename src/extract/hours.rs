use std::sync::LazyLock;

use scraper::Selector;

use super::DetailView;
use crate::config::MIN_HOURS_LABEL_LEN;
use crate::dom;

static HOURS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"button[aria-label*="Hours"], button[data-item-id*="oh"], [aria-label*="hours"][role="button"]"#)
        .unwrap()
});

pub fn extract(view: &DetailView) -> Option<String> {
    view.scope
        .select(&HOURS)
        .filter_map(|el| dom::attr(el, "aria-label"))
        .find(|label| label.chars().count() > MIN_HOURS_LABEL_LEN)
        .map(str::to_string)
}
