use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const MAPS_BASE_URL: &str = "https://www.google.com/maps";
pub const REVIEWS_BASE_URL: &str = "https://search.google.com/local/reviews";
pub const DEFAULT_TIME_ZONE: &str = "America/Chicago";

/// Hours labels this short are placeholders ("Hours", "See hours").
pub const MIN_HOURS_LABEL_LEN: usize = 10;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub auto_scroll: bool,
    pub detail_extraction: bool,
    /// Restrict detail heuristics to the verified detail container.
    pub strict_scoping: bool,
    pub time_zone: String,
    pub timings: Timings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            auto_scroll: true,
            detail_extraction: true,
            strict_scoping: true,
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            timings: Timings::default(),
        }
    }
}

/// Every wait in the pipeline, in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub render_settle_ms: u64,
    pub close_delay_ms: u64,
    pub back_settle_ms: u64,
    pub inter_item_ms: u64,
    pub scroll_interval_ms: u64,
    pub scroll_settle_ms: u64,
    pub end_grace_ms: u64,
    pub search_rescan_ms: u64,
    pub max_idle_rescans: u32,
}

impl Default for Timings {
    fn default() -> Self {
        Timings {
            render_settle_ms: 4500,
            close_delay_ms: 1000,
            back_settle_ms: 500,
            inter_item_ms: 500,
            scroll_interval_ms: 3000,
            scroll_settle_ms: 1500,
            end_grace_ms: 2000,
            search_rescan_ms: 500,
            max_idle_rescans: 3,
        }
    }
}

impl Timings {
    pub fn render_settle(&self) -> Duration {
        Duration::from_millis(self.render_settle_ms)
    }

    pub fn close_delay(&self) -> Duration {
        Duration::from_millis(self.close_delay_ms)
    }

    pub fn back_settle(&self) -> Duration {
        Duration::from_millis(self.back_settle_ms)
    }

    pub fn inter_item(&self) -> Duration {
        Duration::from_millis(self.inter_item_ms)
    }

    pub fn scroll_interval(&self) -> Duration {
        Duration::from_millis(self.scroll_interval_ms)
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn end_grace(&self) -> Duration {
        Duration::from_millis(self.end_grace_ms)
    }

    pub fn search_rescan(&self) -> Duration {
        Duration::from_millis(self.search_rescan_ms)
    }
}

/// Load settings from a JSON file; missing keys keep their defaults.
pub fn load(path: &Path) -> Result<Settings> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let settings = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    Ok(settings)
}
