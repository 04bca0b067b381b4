use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::dom;

static MAIN: LazyLock<Selector> = LazyLock::new(|| Selector::parse(r#"[role="main"]"#).unwrap());
static HEADING: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static FEED: LazyLock<Selector> = LazyLock::new(|| Selector::parse(r#"[role="feed"]"#).unwrap());

/// Lowercase and keep only letters and digits.
pub fn normalize(name: &str) -> String {
    name.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Fuzzy name comparison: either normalized name contains the other.
/// Names that normalize to nothing never match.
pub fn is_name_match(candidate: &str, observed: &str) -> bool {
    let a = normalize(candidate);
    let b = normalize(observed);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

/// Main panes other than the results pane (the one holding the feed).
fn detail_panes(doc: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    doc.select(&MAIN).filter(|main| main.select(&FEED).next().is_none())
}

fn first_heading(el: ElementRef) -> Option<String> {
    el.select(&HEADING).map(dom::text).find(|t| !t.is_empty())
}

/// Name shown in the detail panel header. Read from the last non-results
/// pane: its heading, else its label. Pages without such a pane fall back
/// to the first heading outside the results pane.
pub fn detail_header(doc: &Html) -> Option<String> {
    if let Some(pane) = detail_panes(doc).last() {
        let found = first_heading(pane).or_else(|| dom::attr(pane, "aria-label").map(str::to_string));
        if found.is_some() {
            return found;
        }
    }
    let results: Vec<_> = doc.select(&MAIN).filter(|m| m.select(&FEED).next().is_some()).collect();
    doc.select(&HEADING)
        .filter(|h| !h.ancestors().any(|a| results.iter().any(|r| r.id() == a.id())))
        .map(dom::text)
        .find(|t| !t.is_empty())
}

/// The detail panel belonging to `name`: a non-results pane labelled with
/// it, or holding a heading that matches it.
pub fn detail_container<'a>(doc: &'a Html, name: &str) -> Option<ElementRef<'a>> {
    detail_panes(doc).find(|main| {
        dom::attr(*main, "aria-label").is_some_and(|label| is_name_match(name, label))
            || main
                .select(&HEADING)
                .any(|h| is_name_match(name, &dom::text(h)))
    })
}

// ── Tests ──
