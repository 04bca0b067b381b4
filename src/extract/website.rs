use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};
use url::Url;

use super::DetailView;
use crate::dom;

static EXPLICIT: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        r#"a[data-item-id="authority"], a[aria-label*="Website"], a[aria-label*="website"], button[aria-label*="Website"], button[aria-label*="website"]"#,
    )
    .unwrap()
});
static NESTED_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static OUTBOUND: LazyLock<Selector> = LazyLock::new(|| Selector::parse(r#"a[href^="http"]"#).unwrap());

static DOMAIN_LIKE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://[a-z0-9\-]+\.[a-z]{2,}").unwrap());
static TEXT_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[a-zA-Z0-9\-.]+\.[a-zA-Z]{2,}(?:/[^\s]*)?").unwrap());
static SCHEME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^https?://(www\.)?").unwrap());

/// Links pointing back at the map host, shorteners, and booking widgets.
const EXCLUDED: &[&str] = &[
    "google.com",
    "goo.gl",
    "gstatic.com",
    "flexbook.me",
    "booking",
    "rwg_token",
];

/// Query keys a redirect wrapper uses to carry its target.
const REDIRECT_PARAMS: &[&str] = &["q", "url", "adurl", "u"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Website {
    pub url: String,
    pub domain: String,
}

pub fn extract(view: &DetailView) -> Option<Website> {
    let url = from_explicit(view.scope)
        .or_else(|| from_labelled_outbound(view.scope))
        .or_else(|| (!view.strict).then(|| from_any_outbound(view.root)).flatten())?;
    Some(Website {
        domain: domain_of(&url),
        url,
    })
}

fn from_explicit(scope: ElementRef) -> Option<String> {
    scope.select(&EXPLICIT).find_map(|el| {
        let href = match el.value().name() {
            "a" => dom::attr(el, "href"),
            _ => el
                .select(&NESTED_LINK)
                .find_map(|a| dom::attr(a, "href"))
                .or_else(|| dom::attr(el, "data-href")),
        }?;
        resolve(href)
    })
}

fn from_labelled_outbound(scope: ElementRef) -> Option<String> {
    scope.select(&OUTBOUND).find_map(|a| {
        let text = dom::text(a).to_lowercase();
        let label = dom::attr(a, "aria-label").unwrap_or("").to_lowercase();
        let signals = text.contains("website") || text.contains("site") || label.contains("website");
        if !signals {
            return None;
        }
        resolve(dom::attr(a, "href")?)
    })
}

/// Unscoped: any outbound link that looks like a bare domain, then any URL in
/// the page text.
fn from_any_outbound(root: ElementRef) -> Option<String> {
    root.select(&OUTBOUND)
        .filter_map(|a| dom::attr(a, "href"))
        .filter(|href| DOMAIN_LIKE_RE.is_match(href))
        .find_map(resolve)
        .or_else(|| {
            let body = dom::text(root);
            TEXT_URL_RE
                .find_iter(&body)
                .find_map(|m| resolve(m.as_str()))
        })
}

/// Unwrap redirect wrappers, reject excluded hosts, drop the query string.
pub fn resolve(href: &str) -> Option<String> {
    let target = unwrap_redirect(href).unwrap_or_else(|| href.to_string());
    if !target.starts_with("http") || is_excluded(&target) {
        return None;
    }
    let stripped = target.split('?').next().unwrap_or(&target);
    Some(stripped.to_string())
}

fn unwrap_redirect(href: &str) -> Option<String> {
    let url = Url::parse(href).ok()?;
    url.query_pairs()
        .find(|(k, v)| REDIRECT_PARAMS.contains(&k.as_ref()) && v.starts_with("http"))
        .map(|(_, v)| v.into_owned())
}

fn is_excluded(url: &str) -> bool {
    EXCLUDED.iter().any(|pattern| url.contains(pattern))
}

/// Host without a leading "www."; best-effort string strip for URLs that
/// don't parse.
pub fn domain_of(url: &str) -> String {
    match Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)) {
        Some(host) => host.strip_prefix("www.").unwrap_or(&host).to_string(),
        None => SCHEME_RE
            .replace(url, "")
            .split('/')
            .next()
            .unwrap_or("")
            .to_string(),
    }
}
