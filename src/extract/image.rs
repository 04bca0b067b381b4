use std::sync::LazyLock;

use scraper::Selector;

use super::DetailView;
use crate::dom;

static HOSTED_IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"img[src*="googleusercontent"]"#).unwrap());

pub fn extract(view: &DetailView) -> Option<String> {
    view.scope
        .select(&HOSTED_IMAGE)
        .find_map(|img| dom::attr(img, "src"))
        .map(str::to_string)
}
