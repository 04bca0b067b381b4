use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::extract::website;
use crate::store::{Column, Record};

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+?\d[\d\s\-()]{8,}$").unwrap());

/// Phone and website fished out of a raw batch-detail response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiDetails {
    pub phone: Option<String>,
    pub website: Option<String>,
}

/// Parse a raw details response. The body starts with an anti-JSON prefix
/// and length lines; the first line that parses as JSON is walked. Nested
/// JSON carried inside string values is walked too.
pub fn parse_details_payload(raw: &str) -> Option<ApiDetails> {
    let value = raw
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with('[') || l.starts_with('{'))
        .find_map(|l| serde_json::from_str::<Value>(l).ok())?;

    let mut details = ApiDetails::default();
    walk(&value, &mut details);
    if details.phone.is_none() && details.website.is_none() {
        return None;
    }
    Some(details)
}

fn walk(value: &Value, details: &mut ApiDetails) {
    match value {
        Value::Array(items) => items.iter().for_each(|v| walk(v, details)),
        Value::Object(map) => map.values().for_each(|v| walk(v, details)),
        Value::String(s) => {
            let t = s.trim();
            if (t.starts_with('[') || t.starts_with('{')) && t.len() > 1 {
                if let Ok(inner) = serde_json::from_str::<Value>(t) {
                    walk(&inner, details);
                    return;
                }
            }
            if PHONE_RE.is_match(t) {
                details.phone = Some(t.to_string());
            }
            if details.website.is_none() && t.starts_with("http") && t.contains("://") {
                details.website = website::resolve(t);
            }
        }
        _ => {}
    }
}

/// Fill empty phone/website slots from a payload. Returns the columns written.
pub fn apply(details: &ApiDetails, record: &mut Record) -> Vec<Column> {
    let mut filled = Vec::new();
    if let Some(phone) = &details.phone {
        filled.extend(record.fill_phone(phone));
    }
    if let Some(url) = &details.website {
        if record.fill(Column::Website, url) {
            filled.push(Column::Website);
        }
        if record.fill(Column::Domain, &website::domain_of(url)) {
            filled.push(Column::Domain);
        }
    }
    filled
}
