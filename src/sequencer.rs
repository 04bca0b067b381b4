use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::extract::{self, DetailView};
use crate::host::{AnchorHandle, Host};
use crate::intercept::{self, ApiDetails};
use crate::scheduler::SeqStep;
use crate::store::RecordStore;
use crate::verify;

/// One pending detail visit. Consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub record_id: String,
    pub anchor: AnchorHandle,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Opening,
    WaitingRender,
    Verifying,
    Extracting,
    Closing,
}

/// How a single item ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Enriched { filled: usize },
    IdentityMismatch { observed: String },
    MissingHeader,
    MissingRecord,
    OpenFailed,
}

/// Next step to schedule and how long to wait before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub after: Duration,
    pub step: SeqStep,
}

impl Transition {
    fn now(step: SeqStep) -> Self {
        Transition {
            after: Duration::ZERO,
            step,
        }
    }

    fn after(after: Duration, step: SeqStep) -> Self {
        Transition { after, step }
    }
}

/// Serialized detail-enrichment queue: at most one item is between
/// `Opening` and `Closing` at any time.
#[derive(Debug)]
pub struct Sequencer {
    queue: VecDeque<QueueItem>,
    current: Option<QueueItem>,
    phase: Phase,
    next_pending: bool,
    corroboration: Option<ApiDetails>,
    last_outcome: Option<ItemOutcome>,
    outcomes: Vec<(String, ItemOutcome)>,
}

impl Default for Sequencer {
    fn default() -> Self {
        Sequencer {
            queue: VecDeque::new(),
            current: None,
            phase: Phase::Idle,
            next_pending: false,
            corroboration: None,
            last_outcome: None,
            outcomes: Vec::new(),
        }
    }
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, item: QueueItem) {
        self.queue.push_back(item);
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current(&self) -> Option<&QueueItem> {
        self.current.as_ref()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Queue non-empty or an item in flight.
    pub fn is_draining(&self) -> bool {
        !self.queue.is_empty() || self.current.is_some()
    }

    /// Idle with work waiting and no `Next` already scheduled.
    pub fn can_begin(&self) -> bool {
        self.phase == Phase::Idle && self.current.is_none() && !self.next_pending && !self.queue.is_empty()
    }

    pub fn outcomes(&self) -> &[(String, ItemOutcome)] {
        &self.outcomes
    }

    /// Drop every item not yet started. The in-flight item, if any, finishes.
    pub fn abandon_queue(&mut self) -> usize {
        let n = self.queue.len();
        self.queue.clear();
        n
    }

    /// Raw details payload seen while an item is open; applied only once that
    /// item passes verification.
    pub fn offer_details(&mut self, details: ApiDetails) -> bool {
        if self.current.is_none() {
            return false;
        }
        self.corroboration = Some(details);
        true
    }

    /// Claim the right to schedule `Next`. `None` unless idle with work
    /// queued and no `Next` outstanding.
    pub fn request_next(&mut self) -> Option<Transition> {
        if !self.can_begin() {
            return None;
        }
        self.next_pending = true;
        Some(Transition::now(SeqStep::Next))
    }

    /// Idle → Opening.
    pub fn begin_next(&mut self, running: bool) -> Option<Transition> {
        self.next_pending = false;
        if self.current.is_some() || self.phase != Phase::Idle {
            return None;
        }
        if !running {
            let dropped = self.abandon_queue();
            if dropped > 0 {
                info!("Stopped; {} queued detail visits dropped", dropped);
            }
            return None;
        }
        let item = self.queue.pop_front()?;
        debug!("Opening details for {} ({} left)", item.display_name, self.queue.len());
        self.current = Some(item);
        self.corroboration = None;
        self.last_outcome = None;
        self.phase = Phase::Opening;
        Some(Transition::now(SeqStep::Open))
    }

    /// Opening → WaitingRender. A stale anchor completes the item.
    pub fn open(&mut self, host: &mut dyn Host, settings: &Settings) -> Transition {
        let Some(item) = &self.current else {
            return Transition::now(SeqStep::Finish);
        };
        match host.activate(&item.anchor) {
            Ok(()) => {
                self.phase = Phase::WaitingRender;
                Transition::after(settings.timings.render_settle(), SeqStep::Verify)
            }
            Err(e) => {
                warn!("Could not open {}: {:#}", item.display_name, e);
                self.last_outcome = Some(ItemOutcome::OpenFailed);
                self.phase = Phase::Closing;
                Transition::now(SeqStep::Finish)
            }
        }
    }

    /// WaitingRender → Verifying → Extracting → Closing. On a mismatch or a
    /// missing header the record is not touched.
    pub fn verify_and_extract(
        &mut self,
        host: &mut dyn Host,
        store: &mut RecordStore,
        settings: &Settings,
    ) -> Transition {
        self.phase = Phase::Verifying;
        let close = Transition::after(settings.timings.close_delay(), SeqStep::Close);
        let Some(item) = self.current.clone() else {
            self.phase = Phase::Closing;
            return close;
        };

        let doc = match host.snapshot() {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Detail view for {} unreadable: {:#}", item.display_name, e);
                self.finish_with(ItemOutcome::MissingHeader);
                return close;
            }
        };

        let Some(observed) = verify::detail_header(&doc) else {
            warn!("No detail header for {}; skipping", item.display_name);
            self.finish_with(ItemOutcome::MissingHeader);
            return close;
        };
        if !verify::is_name_match(&item.display_name, &observed) {
            warn!(
                "Detail view shows {:?}, expected {:?}; skipping",
                observed, item.display_name
            );
            self.finish_with(ItemOutcome::IdentityMismatch { observed });
            return close;
        }

        let Some(record) = store.get_mut(&item.record_id) else {
            debug!("{} no longer in store", item.display_name);
            self.finish_with(ItemOutcome::MissingRecord);
            return close;
        };

        self.phase = Phase::Extracting;
        let location = host.location();
        let container = verify::detail_container(&doc, &item.display_name);
        let view = DetailView::new(&doc, container, &location, settings.strict_scoping);
        let report = extract::extract_all(&view, record);
        let mut filled = report.filled.len();
        if let Some(details) = self.corroboration.take() {
            let extra = intercept::apply(&details, record);
            if !extra.is_empty() {
                debug!("API payload filled {} more fields for {}", extra.len(), record.name);
            }
            filled += extra.len();
        }

        let summary = report.summary();
        if summary.is_empty() {
            info!("{}", record.name);
        } else {
            info!("{} ({})", record.name, summary);
        }
        self.finish_with(ItemOutcome::Enriched { filled });
        close
    }

    fn finish_with(&mut self, outcome: ItemOutcome) {
        self.phase = Phase::Closing;
        self.last_outcome = Some(outcome);
    }

    /// Closing: return to the list, then settle.
    pub fn close(&mut self, host: &mut dyn Host, settings: &Settings) -> Transition {
        self.phase = Phase::Closing;
        let back = match host.press_back() {
            Ok(true) => Ok(()),
            Ok(false) => host.send_escape(),
            Err(e) => Err(e),
        };
        if let Err(e) = back {
            warn!("Could not return to list: {:#}", e);
        }
        Transition::after(settings.timings.back_settle(), SeqStep::Finish)
    }

    /// Closing → Idle. Schedules the next item unless stopped or empty.
    pub fn finish(&mut self, running: bool, settings: &Settings) -> Option<Transition> {
        if let Some(item) = self.current.take() {
            let outcome = self.last_outcome.take().unwrap_or(ItemOutcome::MissingHeader);
            self.outcomes.push((item.record_id, outcome));
        }
        self.corroboration = None;
        self.phase = Phase::Idle;

        if !running {
            let dropped = self.abandon_queue();
            if dropped > 0 {
                info!("Stopped; {} queued detail visits dropped", dropped);
            }
            return None;
        }
        if self.queue.is_empty() {
            info!("Detailed extraction complete");
            return None;
        }
        self.next_pending = true;
        Some(Transition::after(settings.timings.inter_item(), SeqStep::Next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> QueueItem {
        QueueItem {
            record_id: id.into(),
            anchor: AnchorHandle {
                href: format!("/maps/place/{}/data=!1s{}", id, id),
            },
            display_name: id.into(),
        }
    }

    #[test]
    fn next_is_claimed_once() {
        let mut seq = Sequencer::new();
        assert!(seq.request_next().is_none());
        seq.enqueue(item("a"));
        seq.enqueue(item("b"));
        assert_eq!(seq.request_next().map(|t| t.step), Some(SeqStep::Next));
        assert!(seq.request_next().is_none());

        assert_eq!(seq.begin_next(true).map(|t| t.step), Some(SeqStep::Open));
        assert_eq!(seq.phase(), Phase::Opening);
        assert_eq!(seq.current().map(|i| i.record_id.as_str()), Some("a"));
        // One item in flight; a second begin is refused.
        assert!(seq.begin_next(true).is_none());
        assert!(seq.request_next().is_none());
        assert!(seq.is_draining());
    }

    #[test]
    fn finish_schedules_next_until_empty() {
        let settings = Settings::default();
        let mut seq = Sequencer::new();
        seq.enqueue(item("a"));
        seq.enqueue(item("b"));
        seq.begin_next(true);

        let t = seq.finish(true, &settings).unwrap();
        assert_eq!(t.step, SeqStep::Next);
        assert_eq!(t.after, settings.timings.inter_item());
        assert_eq!(seq.phase(), Phase::Idle);
        assert_eq!(seq.outcomes().len(), 1);

        seq.begin_next(true);
        assert!(seq.finish(true, &settings).is_none());
        assert!(!seq.is_draining());
    }

    #[test]
    fn stopped_sequencer_drops_queue() {
        let settings = Settings::default();
        let mut seq = Sequencer::new();
        seq.enqueue(item("a"));
        seq.enqueue(item("b"));
        seq.enqueue(item("c"));
        seq.begin_next(true);

        assert!(seq.finish(false, &settings).is_none());
        assert_eq!(seq.pending(), 0);

        seq.enqueue(item("d"));
        assert!(seq.begin_next(false).is_none());
        assert_eq!(seq.pending(), 0);
    }

    #[test]
    fn payload_needs_an_open_item() {
        let mut seq = Sequencer::new();
        let details = ApiDetails {
            phone: Some("+1 646-555-0142".into()),
            website: None,
        };
        assert!(!seq.offer_details(details.clone()));
        seq.enqueue(item("a"));
        seq.begin_next(true);
        assert!(seq.offer_details(details));
    }
}
