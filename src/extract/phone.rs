use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

use super::DetailView;
use crate::dom;

static LABELED: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"button[aria-label], button[data-tooltip], [data-item-id^="phone"]"#).unwrap()
});
static INTERACTIVE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"button, a, [role="button"]"#).unwrap());

static LABEL_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[+(]?[\d\s\-()]{10,}").unwrap());
static NATIONAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+1\s?)?\(?[0-9]{3}\)?[\s\-]?[0-9]{3}[\s\-]?[0-9]{4}").unwrap()
});
static TEXT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\+1\s?\d{3}[\s\-]?\d{3}[\s\-]?\d{4}",
        r"\(\d{3}\)\s?\d{3}[\s\-]?\d{4}",
        r"\d{3}[\s\-]\d{3}[\s\-]\d{4}",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

const MIN_DIGITS: usize = 10;

pub fn extract(view: &DetailView) -> Option<String> {
    from_labeled_controls(view.scope)
        .or_else(|| from_interactive(view.scope, view.strict))
        .or_else(|| (!view.strict).then(|| from_page_text(view.root)).flatten())
}

fn digit_count(s: &str) -> usize {
    s.chars().filter(|c| c.is_ascii_digit()).count()
}

/// Controls whose description says "phone", e.g. `aria-label="Phone: (212) 366-1182"`.
fn from_labeled_controls(scope: ElementRef) -> Option<String> {
    scope.select(&LABELED).find_map(|el| {
        let desc = dom::description(el);
        if !desc.to_lowercase().contains("phone") {
            return None;
        }
        let m = LABEL_NUMBER_RE.find(&desc)?;
        let number = m.as_str().trim();
        (digit_count(number) >= MIN_DIGITS).then(|| number.to_string())
    })
}

/// Any clickable element carrying a national-format number. Strict mode also
/// requires a call indicator so stray digit runs (zip codes, prices) are ignored.
fn from_interactive(scope: ElementRef, strict: bool) -> Option<String> {
    scope.select(&INTERACTIVE).find_map(|el| {
        let combined = format!("{} {}", dom::text(el), dom::description(el));
        if strict && !has_call_indicator(el, &combined) {
            return None;
        }
        NATIONAL_RE
            .find(&combined)
            .map(|m| m.as_str().trim().to_string())
    })
}

fn has_call_indicator(el: ElementRef, combined: &str) -> bool {
    let lower = combined.to_lowercase();
    lower.contains("phone")
        || lower.contains("call")
        || dom::attr(el, "href").is_some_and(|h| h.starts_with("tel:"))
        || dom::attr(el, "data-item-id").is_some_and(|id| id.starts_with("phone"))
}

fn from_page_text(root: ElementRef) -> Option<String> {
    let body = dom::text(root);
    TEXT_PATTERNS
        .iter()
        .find_map(|re| re.find(&body).map(|m| m.as_str().trim().to_string()))
}
