use std::sync::LazyLock;

use regex::Regex;
use scraper::Selector;

use super::DetailView;
use crate::dom;

static ADDRESS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        r#"button[data-item-id="address"], button[aria-label*="Address"], button[aria-label*="address"]"#,
    )
    .unwrap()
});
static PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^address:\s*").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub full: String,
    pub street: Option<String>,
    pub locality: Option<String>,
}

pub fn extract(view: &DetailView) -> Option<Address> {
    let label = view
        .scope
        .select(&ADDRESS)
        .find_map(|el| dom::attr(el, "aria-label"))?;
    parse(label)
}

/// "Address: 7 Carmine St, New York, NY 10014" → street + locality, split on
/// the first comma.
pub fn parse(label: &str) -> Option<Address> {
    let full = PREFIX_RE.replace(label.trim(), "").trim().to_string();
    if full.is_empty() {
        return None;
    }
    let (street, locality) = match full.split_once(',') {
        Some((s, rest)) => (
            Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Some(rest.trim().to_string()).filter(|s| !s.is_empty()),
        ),
        None => (None, None),
    };
    Some(Address {
        full,
        street,
        locality,
    })
}
