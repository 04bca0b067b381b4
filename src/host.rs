use anyhow::Result;
use scraper::Html;

/// Opaque reference to a listing entry, resolved by the host when activated.
/// Becomes stale once the listing re-renders without the entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorHandle {
    pub href: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOutcome {
    Moved,
    Unchanged,
    NoContainer,
}

/// Raw payloads republished by the network interception layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    SearchResponse,
    DetailsResponse(String),
}

/// The page the pipeline runs against: a queryable snapshot of the current
/// view plus the navigation actions the sequencer and scroll driver need.
pub trait Host {
    fn snapshot(&self) -> Result<Html>;

    /// Location reference of the current view (coordinates and hex ids live here).
    fn location(&self) -> String;

    fn activate(&mut self, anchor: &AnchorHandle) -> Result<()>;

    /// Click the dedicated back control. `Ok(false)` when the view has none.
    fn press_back(&mut self) -> Result<bool>;

    fn send_escape(&mut self) -> Result<()>;

    fn scroll_listing_to_end(&mut self) -> Result<ScrollOutcome>;

    fn take_events(&mut self) -> Vec<HostEvent> {
        Vec::new()
    }
}
