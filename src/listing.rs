use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::config::MAPS_BASE_URL;
use crate::dom;
use crate::extract::rating::parse_rating_label;
use crate::host::AnchorHandle;
use crate::store::{Column, Record, RecordStore};

static FEED_ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"[role="feed"] > div > div > a"#).unwrap());
static HEADLINE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"[class*="fontHeadlineSmall"]"#).unwrap());
static STARS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"[role="img"][aria-label*="star"]"#).unwrap());
static BODY_FIRST: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"[class*="fontBodyMedium"] > div:first-child"#).unwrap());
static BODY_SECOND: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"[class*="fontBodyMedium"] > div:nth-child(2)"#).unwrap());

static PLACE_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!1s([^!]+)").unwrap());
static PLACE_HREF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/maps/place/[^/?#]+").unwrap());

/// A listing entry not yet known to the store.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub anchor: AnchorHandle,
    pub record: Record,
}

/// Place id embedded in a listing href (`…!1s<id>!…`).
pub fn parse_place_id(href: &str) -> Option<String> {
    PLACE_ID_RE
        .captures(href)
        .map(|c| c[1].to_string())
        .filter(|id| !id.is_empty())
}

/// Rejects ads and unrelated anchors that share the feed.
pub fn is_place_href(href: &str) -> bool {
    PLACE_HREF_RE.is_match(href)
}

pub fn maps_url(href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else if href.starts_with("/maps") {
        format!("https://www.google.com{}", href)
    } else {
        format!("{}{}", MAPS_BASE_URL, href)
    }
}

/// Every feed anchor on screen whose place id the store has not seen yet.
/// Anchors without both an href and a label are skipped silently.
pub fn scan(doc: &Html, store: &RecordStore, time_zone: &str, now: DateTime<Utc>) -> Vec<Candidate> {
    let mut found = Vec::new();

    for (ordinal, anchor) in doc.select(&FEED_ANCHOR).enumerate() {
        let (Some(href), Some(label)) = (dom::attr(anchor, "href"), dom::attr(anchor, "aria-label")) else {
            debug!("Skipping feed anchor #{} without href/label", ordinal);
            continue;
        };
        if !is_place_href(href) {
            debug!("Skipping non-place anchor: {}", href);
            continue;
        }
        let Some(id) = parse_place_id(href) else {
            continue;
        };
        if store.contains(&id) {
            continue;
        }

        let record = draft_record(anchor, href, label, id, time_zone, now);
        found.push(Candidate {
            anchor: AnchorHandle {
                href: href.to_string(),
            },
            record,
        });
    }

    found
}

fn draft_record(
    anchor: ElementRef,
    href: &str,
    label: &str,
    id: String,
    time_zone: &str,
    now: DateTime<Utc>,
) -> Record {
    // Card contents sit beside the anchor, not inside it.
    let card = dom::parent(anchor).unwrap_or(anchor);

    let name = card
        .select(&HEADLINE)
        .map(dom::text)
        .find(|t| !t.is_empty())
        .unwrap_or_else(|| label.to_string());

    let mut record = Record::new(id, name, now);
    record.fill(Column::MapsUrl, &maps_url(href));
    record.fill(Column::TimeZone, time_zone);

    if let Some(stars) = card.select(&STARS).find_map(|el| dom::attr(el, "aria-label")) {
        let (rating, reviews) = parse_rating_label(stars);
        if let Some(r) = rating {
            record.fill(Column::AverageRating, &r);
        }
        if let Some(n) = reviews {
            record.fill(Column::ReviewCount, &n);
        }
    }

    if let Some(category) = card.select(&BODY_FIRST).map(dom::text).next() {
        record.fill(Column::Categories, &category);
    }
    if let Some(address) = card.select(&BODY_SECOND).map(dom::text).next() {
        record.fill(Column::FullAddress, &address);
    }

    record
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> Html {
        let html = std::fs::read_to_string("tests/fixtures/listing.html").unwrap();
        Html::parse_document(&html)
    }

    #[test]
    fn place_id_from_href() {
        let href = "https://www.google.com/maps/place/Joe's+Pizza/data=!4m7!3m6!1s0x89c259a9b3117469:0x7ab2e4e1f1d5f3c4!8m2!3d40.73!4d-73.99";
        assert_eq!(
            parse_place_id(href).as_deref(),
            Some("0x89c259a9b3117469:0x7ab2e4e1f1d5f3c4")
        );
        assert_eq!(parse_place_id("https://www.google.com/maps/place/Foo/data=!4m2"), None);
    }

    #[test]
    fn ad_links_are_not_places() {
        assert!(!is_place_href("https://www.googleadservices.com/pagead/aclk?sa=L"));
        assert!(is_place_href("/maps/place/Lou's+Diner/data=!1s0x1:0x2"));
    }

    #[test]
    fn relative_hrefs_become_absolute() {
        assert_eq!(
            maps_url("/maps/place/X/data=!1s0x1:0x2"),
            "https://www.google.com/maps/place/X/data=!1s0x1:0x2"
        );
        assert_eq!(maps_url("/place/X"), "https://www.google.com/maps/place/X");
    }

    #[test]
    fn scan_reads_card_fields() {
        let doc = listing();
        let found = scan(&doc, &RecordStore::new(), "America/Chicago", Utc::now());
        let joe = found.iter().find(|c| c.record.name == "Joe's Pizza").unwrap();
        assert_eq!(joe.record.id, "0x89c259a9b3117469:0x7ab2e4e1f1d5f3c4");
        assert_eq!(joe.record.average_rating.as_deref(), Some("4.5"));
        assert_eq!(joe.record.review_count.as_deref(), Some("1234"));
        assert_eq!(joe.record.categories.as_deref(), Some("Pizza restaurant"));
        assert_eq!(joe.record.full_address.as_deref(), Some("7 Carmine St"));
        assert_eq!(joe.record.time_zone.as_deref(), Some("America/Chicago"));
        assert!(joe.record.phone.is_none());
    }

    #[test]
    fn scan_skips_ads_unlabelled_and_known() {
        let doc = listing();
        let found = scan(&doc, &RecordStore::new(), "UTC", Utc::now());
        // Joe's, Lou's and Joe's again; the ad and the unlabelled anchor are dropped.
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|c| is_place_href(&c.anchor.href)));

        let mut store = RecordStore::new();
        store.insert(Record::new("0x89c259a9b3117469:0x7ab2e4e1f1d5f3c4", "Joe's Pizza", Utc::now()));
        let found = scan(&doc, &store, "UTC", Utc::now());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].record.name, "Lou's Diner");
    }

    #[test]
    fn name_falls_back_to_label() {
        let html = r#"<div role="feed"><div><div>
            <a href="/maps/place/Corner+Deli/data=!1s0xaa:0xbb" aria-label="Corner Deli"></a>
        </div></div></div>"#;
        let doc = Html::parse_document(html);
        let found = scan(&doc, &RecordStore::new(), "UTC", Utc::now());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].record.name, "Corner Deli");
    }
}
