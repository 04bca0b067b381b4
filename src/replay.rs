use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::MAPS_BASE_URL;
use crate::host::{AnchorHandle, Host, HostEvent, ScrollOutcome};
use crate::listing;

static FEED: LazyLock<Selector> = LazyLock::new(|| Selector::parse(r#"[role="feed"]"#).unwrap());
static LINKS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static BACK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"button[aria-label*="Back"], button[aria-label*="back"]"#).unwrap()
});

#[derive(Debug, Deserialize)]
struct Manifest {
    listing: Vec<PathBuf>,
    #[serde(default)]
    details: HashMap<String, DetailEntry>,
}

#[derive(Debug, Deserialize)]
struct DetailEntry {
    page: PathBuf,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    payload: Option<PathBuf>,
}

/// A recorded detail panel.
#[derive(Debug, Clone)]
pub struct DetailPage {
    pub html: String,
    pub location: String,
    pub payload: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Activate(String),
    Back,
    Escape,
    Scroll(ScrollOutcome),
}

/// Host that plays back saved page snapshots. Each listing snapshot is one
/// scroll deeper than the previous; details are keyed by place id.
#[derive(Debug, Default)]
pub struct ReplayHost {
    listing: Vec<String>,
    depth: usize,
    details: HashMap<String, DetailPage>,
    open: Option<String>,
    events: Vec<HostEvent>,
    actions: Vec<Action>,
}

impl ReplayHost {
    pub fn new(listing: Vec<String>) -> Self {
        ReplayHost {
            listing,
            ..Default::default()
        }
    }

    pub fn with_detail(mut self, place_id: &str, page: DetailPage) -> Self {
        self.details.insert(place_id.to_string(), page);
        self
    }

    /// Load `manifest.json` and everything it references from `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let manifest_path = dir.join("manifest.json");
        let raw = std::fs::read_to_string(&manifest_path)
            .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
        let manifest: Manifest = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid manifest {}", manifest_path.display()))?;

        let read = |p: &Path| -> Result<String> {
            let path = dir.join(p);
            std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))
        };

        let listing = manifest
            .listing
            .iter()
            .map(|p| read(p.as_path()))
            .collect::<Result<Vec<_>>>()?;
        let mut host = ReplayHost::new(listing);

        for (id, entry) in &manifest.details {
            let page = DetailPage {
                html: read(entry.page.as_path())?,
                location: entry
                    .location
                    .clone()
                    .unwrap_or_else(|| format!("{}/place/data=!1s{}", MAPS_BASE_URL, id)),
                payload: entry.payload.as_deref().map(read).transpose()?,
            };
            host.details.insert(id.clone(), page);
        }

        info!(
            "Loaded replay: {} listing snapshots, {} detail pages",
            host.listing.len(),
            host.details.len()
        );
        Ok(host)
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn detail_open(&self) -> Option<&str> {
        self.open.as_deref()
    }

    /// Swap the current listing snapshot, as a re-render would.
    pub fn replace_listing(&mut self, html: String) {
        if let Some(page) = self.listing.get_mut(self.depth) {
            *page = html;
        } else {
            self.listing.push(html);
        }
    }

    fn current_listing(&self) -> Option<&str> {
        self.listing.get(self.depth).map(String::as_str)
    }
}

impl Host for ReplayHost {
    fn snapshot(&self) -> Result<Html> {
        let html = match &self.open {
            Some(id) => self.details.get(id).map(|d| d.html.as_str()).unwrap_or(""),
            None => self.current_listing().unwrap_or(""),
        };
        Ok(Html::parse_document(html))
    }

    fn location(&self) -> String {
        match self.open.as_ref().and_then(|id| self.details.get(id)) {
            Some(detail) => detail.location.clone(),
            None => format!("{}/search/", MAPS_BASE_URL),
        }
    }

    fn activate(&mut self, anchor: &AnchorHandle) -> Result<()> {
        if let Some(id) = &self.open {
            bail!("detail view for {} is still open", id);
        }
        let Some(page) = self.current_listing() else {
            bail!("no listing loaded");
        };
        let doc = Html::parse_document(page);
        let present = doc
            .select(&LINKS)
            .any(|a| a.value().attr("href") == Some(anchor.href.as_str()));
        if !present {
            bail!("stale anchor: {}", anchor.href);
        }

        let Some(id) = listing::parse_place_id(&anchor.href) else {
            bail!("anchor has no place id: {}", anchor.href);
        };
        let Some(detail) = self.details.get(&id) else {
            bail!("no detail page recorded for {}", id);
        };
        if let Some(payload) = &detail.payload {
            self.events.push(HostEvent::DetailsResponse(payload.clone()));
        }
        debug!("Replay: opened {}", id);
        self.actions.push(Action::Activate(anchor.href.clone()));
        self.open = Some(id);
        Ok(())
    }

    fn press_back(&mut self) -> Result<bool> {
        let has_back = match self.open.as_ref().and_then(|id| self.details.get(id)) {
            Some(detail) => Html::parse_document(&detail.html).select(&BACK).next().is_some(),
            None => false,
        };
        if has_back {
            self.actions.push(Action::Back);
            self.open = None;
        }
        Ok(has_back)
    }

    fn send_escape(&mut self) -> Result<()> {
        self.actions.push(Action::Escape);
        self.open = None;
        Ok(())
    }

    fn scroll_listing_to_end(&mut self) -> Result<ScrollOutcome> {
        let has_feed = self
            .current_listing()
            .is_some_and(|page| Html::parse_document(page).select(&FEED).next().is_some());
        let outcome = if !has_feed {
            ScrollOutcome::NoContainer
        } else if self.depth + 1 < self.listing.len() {
            self.depth += 1;
            self.events.push(HostEvent::SearchResponse);
            ScrollOutcome::Moved
        } else {
            ScrollOutcome::Unchanged
        };
        self.actions.push(Action::Scroll(outcome));
        Ok(outcome)
    }

    fn take_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.events)
    }
}
