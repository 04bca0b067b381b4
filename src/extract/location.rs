use std::sync::LazyLock;

use regex::Regex;

use crate::config::REVIEWS_BASE_URL;

static AT_COORDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(-?\d+\.\d+),(-?\d+\.\d+)").unwrap());
static DATA_COORDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!3d(-?\d+\.\d+)!4d(-?\d+\.\d+)").unwrap());
static HEX_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)!1s(0x[0-9a-f]+:0x([0-9a-f]+))").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexIds {
    pub fid: String,
    pub cid: Option<String>,
}

/// Latitude/longitude from the location reference; the `@lat,lng` viewport
/// first, then the `!3d…!4d…` data segment.
pub fn coordinates(location: &str) -> Option<(String, String)> {
    AT_COORDS_RE
        .captures(location)
        .or_else(|| DATA_COORDS_RE.captures(location))
        .map(|c| (c[1].to_string(), c[2].to_string()))
}

/// Feature id pair (`0x…:0x…`) and the decimal customer id from its second half.
pub fn hex_ids(location: &str) -> Option<HexIds> {
    let caps = HEX_PAIR_RE.captures(location)?;
    let cid = u128::from_str_radix(&caps[2], 16).ok().map(|n| n.to_string());
    Some(HexIds {
        fid: caps[1].to_string(),
        cid,
    })
}

pub fn review_url(place_id: &str) -> String {
    format!("{}?placeid={}", REVIEWS_BASE_URL, place_id)
}
