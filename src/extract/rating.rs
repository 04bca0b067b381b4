use std::sync::LazyLock;

use regex::Regex;
use scraper::Selector;

use super::DetailView;
use crate::dom;

static STARS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"[role="img"][aria-label*="star"]"#).unwrap());
static RATING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*star").unwrap());
static REVIEWS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d[\d,]*)\s*review").unwrap());

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Stars {
    pub rating: Option<String>,
    pub reviews: Option<String>,
}

/// "4.5 stars 1,234 Reviews" → ("4.5", "1234"). Either half may be missing.
pub fn parse_rating_label(label: &str) -> (Option<String>, Option<String>) {
    let rating = RATING_RE.captures(label).map(|c| c[1].to_string());
    let reviews = REVIEWS_RE.captures(label).map(|c| c[1].replace(',', ""));
    (rating, reviews)
}

pub fn extract(view: &DetailView) -> Stars {
    view.scope
        .select(&STARS)
        .filter_map(|el| dom::attr(el, "aria-label"))
        .map(parse_rating_label)
        .find(|(r, n)| r.is_some() || n.is_some())
        .map(|(rating, reviews)| Stars { rating, reviews })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_captures() {
        assert_eq!(
            parse_rating_label("4.5 stars 1,234 Reviews"),
            (Some("4.5".into()), Some("1234".into()))
        );
    }

    #[test]
    fn rating_only() {
        assert_eq!(parse_rating_label("4 stars"), (Some("4".into()), None));
    }

    #[test]
    fn reviews_only() {
        assert_eq!(parse_rating_label("No stars yet, 3 reviews"), (None, Some("3".into())));
    }
}
