use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::host::{Host, HostEvent};
use crate::intercept;
use crate::listing;
use crate::scheduler::{Scheduler, SeqStep, Task};
use crate::scroll::{ScrollDriver, TickDecision};
use crate::sequencer::{QueueItem, Sequencer, Transition};
use crate::store::RecordStore;

/// One scraping run: everything `start`/`stop`/`clear` act on, driven one
/// scheduled task at a time through `advance`.
#[derive(Debug)]
pub struct Session {
    settings: Settings,
    running: bool,
    store: RecordStore,
    sequencer: Sequencer,
    scroll: ScrollDriver,
    scheduler: Scheduler,
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        Session {
            settings,
            running: false,
            store: RecordStore::new(),
            sequencer: Sequencer::new(),
            scroll: ScrollDriver::new(),
            scheduler: Scheduler::new(),
        }
    }

    /// Toggles are read at each decision point, so changes apply to the
    /// next step that consults them.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn start(&mut self, host: &mut dyn Host) -> Result<()> {
        if self.running {
            return Ok(());
        }
        self.running = true;
        info!("Scraping started");

        let added = self.scan_listing(host)?;
        self.scroll.reset(self.store.len());
        if added == 0 {
            info!("No results on screen yet");
        }
        if self.settings.auto_scroll {
            self.scheduler
                .schedule(self.settings.timings.scroll_interval(), Task::ScrollTick);
        }
        Ok(())
    }

    /// Cancels scrolling and re-scans. An item already opened finishes;
    /// everything still queued is dropped when it does.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        let cancelled = self
            .scheduler
            .cancel(|t| matches!(t, Task::ScrollTick | Task::ScrollRescan { .. } | Task::Rescan));
        debug!("Cancelled {} pending scroll/scan tasks", cancelled);
        if self.sequencer.current().is_none() {
            let dropped = self.sequencer.abandon_queue();
            if dropped > 0 {
                info!("Stopped; {} queued detail visits dropped", dropped);
            }
        }
        info!("Scraping stopped ({} results)", self.store.len());
    }

    pub fn clear(&mut self) {
        let dropped = self.sequencer.abandon_queue();
        self.store.clear();
        self.scroll.reset(0);
        info!("Cleared results ({} queued visits dropped)", dropped);
    }

    /// Scan the listing on screen, store unseen entries and queue them for
    /// detail visits. Returns how many records were added.
    pub fn scan_listing(&mut self, host: &mut dyn Host) -> Result<usize> {
        let doc = host.snapshot()?;
        let candidates = listing::scan(&doc, &self.store, &self.settings.time_zone, Utc::now());

        let mut added = 0;
        for candidate in candidates {
            let item = QueueItem {
                record_id: candidate.record.id.clone(),
                anchor: candidate.anchor,
                display_name: candidate.record.name.clone(),
            };
            if !self.store.insert(candidate.record) {
                continue;
            }
            added += 1;
            if self.settings.detail_extraction {
                self.sequencer.enqueue(item);
            }
        }

        if added > 0 {
            info!("Found {} new results (total: {})", added, self.store.len());
        }
        if self.running {
            if let Some(t) = self.sequencer.request_next() {
                self.schedule_step(t);
            }
        }
        Ok(added)
    }

    /// Run the next due task. Pending host events are handled first.
    /// Returns false once nothing is scheduled.
    pub fn advance(&mut self, host: &mut dyn Host) -> bool {
        for event in host.take_events() {
            self.on_event(event);
        }
        let Some(task) = self.scheduler.pop_next() else {
            return false;
        };
        match task {
            Task::ScrollTick => self.on_scroll_tick(host),
            Task::ScrollRescan { at_end } => self.on_scroll_rescan(host, at_end),
            Task::Rescan => {
                if self.running {
                    if let Err(e) = self.scan_listing(host) {
                        warn!("Rescan failed: {:#}", e);
                    }
                }
            }
            Task::Sequencer(step) => self.on_step(host, step),
        }
        true
    }

    fn on_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::SearchResponse => {
                if self.running && !self.scheduler.has(|t| *t == Task::Rescan) {
                    self.scheduler
                        .schedule(self.settings.timings.search_rescan(), Task::Rescan);
                }
            }
            HostEvent::DetailsResponse(raw) => match intercept::parse_details_payload(&raw) {
                Some(details) => {
                    if !self.sequencer.offer_details(details) {
                        debug!("Details payload with no item open; ignored");
                    }
                }
                None => debug!("Details payload carried no phone or website"),
            },
        }
    }

    fn on_step(&mut self, host: &mut dyn Host, step: SeqStep) {
        let next = match step {
            SeqStep::Next => self.sequencer.begin_next(self.running),
            SeqStep::Open => Some(self.sequencer.open(host, &self.settings)),
            SeqStep::Verify => Some(self.sequencer.verify_and_extract(host, &mut self.store, &self.settings)),
            SeqStep::Close => Some(self.sequencer.close(host, &self.settings)),
            SeqStep::Finish => self.sequencer.finish(self.running, &self.settings),
        };
        if let Some(t) = next {
            self.schedule_step(t);
        }
    }

    fn schedule_step(&mut self, t: Transition) {
        self.scheduler.schedule(t.after, Task::Sequencer(t.step));
    }

    fn on_scroll_tick(&mut self, host: &mut dyn Host) {
        if !self.running {
            return;
        }
        if !self.settings.auto_scroll {
            debug!("Auto-scroll disabled; scroll ticks stop");
            return;
        }
        let timings = &self.settings.timings;
        match self.scroll.tick(self.sequencer.is_draining(), host, timings) {
            Ok(TickDecision::Skipped) => {
                self.scheduler.schedule(timings.scroll_interval(), Task::ScrollTick);
            }
            Ok(TickDecision::Rescan { after, at_end }) => {
                self.scheduler.schedule(after, Task::ScrollRescan { at_end });
            }
            Ok(TickDecision::NoContainer) => {
                // Counts as an idle cycle so a page without a feed still ends.
                if self.scroll.after_rescan(true, self.store.len(), timings.max_idle_rescans) {
                    self.finish_listing();
                } else {
                    self.scheduler.schedule(timings.scroll_interval(), Task::ScrollTick);
                }
            }
            Err(e) => {
                warn!("Scroll failed: {:#}", e);
                self.scheduler.schedule(timings.scroll_interval(), Task::ScrollTick);
            }
        }
    }

    fn on_scroll_rescan(&mut self, host: &mut dyn Host, at_end: bool) {
        if !self.running {
            return;
        }
        if let Err(e) = self.scan_listing(host) {
            warn!("Rescan failed: {:#}", e);
        }
        let limit = self.settings.timings.max_idle_rescans;
        if self.scroll.after_rescan(at_end, self.store.len(), limit) {
            self.finish_listing();
            return;
        }
        self.scheduler
            .schedule(self.settings.timings.scroll_interval(), Task::ScrollTick);
    }

    fn finish_listing(&mut self) {
        info!("No more results. Scraping complete.");
        self.stop();
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Timings;
    use crate::replay::{Action, DetailPage, ReplayHost};
    use crate::sequencer::ItemOutcome;

    const JOE: &str = "0x89c259a9b3117469:0x7ab2e4e1f1d5f3c4";
    const LOU: &str = "0x89c2598f2a6b1c35:0x1d3f2b4c5a6e7f80";
    const JOE_LOCATION: &str = "https://www.google.com/maps/place/Joe's+Pizza/@40.7305991,-74.0021752,17z/data=!4m6!3m5!1s0x89c259a9b3117469:0x7ab2e4e1f1d5f3c4!8m2!3d40.7305991!4d-74.0021752";

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
    }

    fn joe_page() -> DetailPage {
        DetailPage {
            html: fixture("detail_joe.html"),
            location: JOE_LOCATION.into(),
            payload: None,
        }
    }

    fn lou_page(payload: Option<String>) -> DetailPage {
        DetailPage {
            html: fixture("detail_lou.html"),
            location: "https://www.google.com/maps/place/Lou's+Diner/@40.7411,-73.9897,17z".into(),
            payload,
        }
    }

    fn host() -> ReplayHost {
        ReplayHost::new(vec![fixture("listing.html")])
            .with_detail(JOE, joe_page())
            .with_detail(LOU, lou_page(None))
    }

    fn settings(auto_scroll: bool) -> Settings {
        Settings {
            auto_scroll,
            ..Settings::default()
        }
    }

    fn run_to_end(session: &mut Session, host: &mut ReplayHost) {
        for _ in 0..10_000 {
            if !session.advance(host) {
                return;
            }
        }
        panic!("session never went idle");
    }

    fn outcome_for<'a>(session: &'a Session, id: &str) -> &'a ItemOutcome {
        &session
            .sequencer()
            .outcomes()
            .iter()
            .find(|(rid, _)| rid == id)
            .unwrap()
            .1
    }

    #[test]
    fn scan_adds_only_unseen_and_queues_them() {
        let only_joe = fixture("replay/listing_1.html");
        let mut host = ReplayHost::new(vec![only_joe]);
        let mut session = Session::new(Settings {
            auto_scroll: false,
            detail_extraction: false,
            ..Settings::default()
        });
        session.start(&mut host).unwrap();
        assert_eq!(session.store().len(), 1);
        assert_eq!(session.sequencer().pending(), 0);

        // Joe's card, Lou's card and Joe's card again; Joe is already stored.
        session.settings_mut().detail_extraction = true;
        host.replace_listing(fixture("listing.html"));
        let added = session.scan_listing(&mut host).unwrap();

        assert_eq!(added, 1);
        assert_eq!(session.store().len(), 2);
        assert_eq!(session.sequencer().pending(), 1);
        assert!(session.store().contains(LOU));
    }

    #[test]
    fn enriches_each_record_one_at_a_time() {
        let mut host = host();
        let mut session = Session::new(settings(false));
        session.start(&mut host).unwrap();
        assert_eq!(session.store().len(), 2);
        run_to_end(&mut session, &mut host);

        let joe = session.store().get(JOE).unwrap();
        assert_eq!(joe.phone.as_deref(), Some("(212) 366-1182"));
        assert_eq!(joe.cid.as_deref(), Some("8841380677557810116"));
        let lou = session.store().get(LOU).unwrap();
        assert_eq!(lou.phone.as_deref(), Some("(646) 555-0142"));
        assert_eq!(lou.website, None);

        // Every activation is closed before the next one.
        let mut open = false;
        for action in host.actions() {
            match action {
                Action::Activate(_) => {
                    assert!(!open, "two detail views open at once");
                    open = true;
                }
                Action::Back | Action::Escape => open = false,
                Action::Scroll(_) => assert!(!open),
            }
        }
        assert!(!open);
        // Joe's panel has a back control; Lou's is dismissed with escape.
        assert!(host.actions().contains(&Action::Back));
        assert!(host.actions().contains(&Action::Escape));
        assert_eq!(*outcome_for(&session, JOE), ItemOutcome::Enriched { filled: 13 });
    }

    #[test]
    fn no_scroll_while_draining() {
        let mut host = host();
        let mut session = Session::new(Settings {
            timings: Timings {
                scroll_interval_ms: 100,
                ..Timings::default()
            },
            ..Settings::default()
        });
        session.start(&mut host).unwrap();

        // Ticks fire every 100ms, far more often than a detail visit takes.
        let mut ticking_while_draining = false;
        while session.advance(&mut host) {
            if session.sequencer().is_draining() {
                ticking_while_draining |= session.scheduler().has(|t| *t == Task::ScrollTick);
                assert!(
                    !host.actions().iter().any(|a| matches!(a, Action::Scroll(_))),
                    "scrolled while detail visits were pending"
                );
            }
        }
        assert!(ticking_while_draining);
        assert_eq!(session.sequencer().outcomes().len(), 2);
        assert!(!session.is_running());
    }

    #[test]
    fn stops_after_idle_limit() {
        let mut host = ReplayHost::new(vec![fixture("listing.html")]);
        let mut session = Session::new(Settings {
            detail_extraction: false,
            ..Settings::default()
        });
        session.start(&mut host).unwrap();
        run_to_end(&mut session, &mut host);

        assert!(!session.is_running());
        assert!(session.scheduler().is_empty());
        let scrolls: Vec<_> = host
            .actions()
            .iter()
            .filter(|a| matches!(a, Action::Scroll(_)))
            .collect();
        assert_eq!(scrolls.len(), 3);
        assert!(scrolls
            .iter()
            .all(|a| **a == Action::Scroll(crate::host::ScrollOutcome::Unchanged)));
    }

    #[test]
    fn scrolling_picks_up_later_snapshots() {
        let mut host = ReplayHost::open(std::path::Path::new("tests/fixtures/replay")).unwrap();
        let mut session = Session::new(Settings::default());
        session.start(&mut host).unwrap();
        assert_eq!(session.store().len(), 1);
        run_to_end(&mut session, &mut host);

        assert_eq!(session.store().len(), 2);
        assert!(!session.is_running());
        let lou = session.store().get(LOU).unwrap();
        assert_eq!(lou.website.as_deref(), Some("https://lousdiner.example/"));
        assert_eq!(lou.domain.as_deref(), Some("lousdiner.example"));
    }

    #[test]
    fn mismatched_detail_leaves_record_untouched() {
        let wrong = DetailPage {
            html: fixture("detail_joe.html"),
            location: JOE_LOCATION.into(),
            payload: Some(fixture("batch_lou.txt")),
        };
        let mut host = ReplayHost::new(vec![fixture("listing.html")])
            .with_detail(JOE, joe_page())
            .with_detail(LOU, wrong);
        let mut session = Session::new(settings(false));
        session.start(&mut host).unwrap();
        let before = session.store().get(LOU).unwrap().clone();
        run_to_end(&mut session, &mut host);

        let after = session.store().get(LOU).unwrap();
        assert_eq!(after.phone, None);
        assert_eq!(after.website, None);
        assert_eq!(after.latitude, None);
        assert_eq!(after.categories, before.categories);
        assert_eq!(
            *outcome_for(&session, LOU),
            ItemOutcome::IdentityMismatch {
                observed: "Joe's Pizza".into()
            }
        );
    }

    #[test]
    fn stale_anchor_does_not_stall_the_queue() {
        let mut host = host();
        let mut session = Session::new(settings(false));
        session.start(&mut host).unwrap();
        // Listing re-renders without Joe before his visit starts.
        host.replace_listing(fixture("listing.html").replace("0x89c259a9b3117469", "0xdeadbeef"));
        run_to_end(&mut session, &mut host);

        assert_eq!(*outcome_for(&session, JOE), ItemOutcome::OpenFailed);
        assert!(matches!(outcome_for(&session, LOU), ItemOutcome::Enriched { .. }));
        assert_eq!(session.sequencer().pending(), 0);
        assert!(session.sequencer().current().is_none());
    }

    #[test]
    fn details_payload_corroborates_open_item() {
        let mut host = ReplayHost::new(vec![fixture("listing.html")])
            .with_detail(JOE, joe_page())
            .with_detail(LOU, lou_page(Some(fixture("batch_lou.txt"))));
        let mut session = Session::new(settings(false));
        session.start(&mut host).unwrap();
        run_to_end(&mut session, &mut host);

        let lou = session.store().get(LOU).unwrap();
        // The panel's number wins; the payload only fills what is empty.
        assert_eq!(lou.phone.as_deref(), Some("(646) 555-0142"));
        assert_eq!(lou.website.as_deref(), Some("https://lousdiner.example/"));
        let joe = session.store().get(JOE).unwrap();
        assert_eq!(joe.website.as_deref(), Some("https://www.joespizzanyc.com/"));
    }

    #[test]
    fn stop_finishes_open_item_then_drops_queue() {
        let mut host = host();
        let mut session = Session::new(settings(true));
        session.start(&mut host).unwrap();
        // Next, then Open.
        session.advance(&mut host);
        session.advance(&mut host);
        assert!(host.detail_open().is_some());

        session.stop();
        assert!(!session.scheduler().has(|t| matches!(t, Task::ScrollTick)));
        run_to_end(&mut session, &mut host);

        assert!(host.detail_open().is_none());
        assert_eq!(session.sequencer().outcomes().len(), 1);
        assert_eq!(session.sequencer().pending(), 0);
        assert!(session.store().get(JOE).unwrap().phone.is_some());
        assert!(session.store().get(LOU).unwrap().phone.is_none());
    }

    #[test]
    fn clear_empties_store_and_queue() {
        let mut host = host();
        let mut session = Session::new(settings(false));
        session.start(&mut host).unwrap();
        assert_eq!(session.sequencer().pending(), 2);

        session.clear();
        assert!(session.store().is_empty());
        assert_eq!(session.sequencer().pending(), 0);

        // Cleared entries are new again.
        assert_eq!(session.scan_listing(&mut host).unwrap(), 2);
        assert_eq!(session.sequencer().pending(), 2);
    }
}
