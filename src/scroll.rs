use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::Timings;
use crate::host::{Host, ScrollOutcome};

/// What a scroll tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// Sequencer is draining; the listing must not move.
    Skipped,
    /// Re-scan after `after`; `at_end` when the position did not change.
    Rescan { after: Duration, at_end: bool },
    /// No listing container on screen.
    NoContainer,
}

/// Auto-scroll bookkeeping: how many records existed at the last re-scan and
/// how many end-of-list re-scans in a row found nothing new.
#[derive(Debug, Default)]
pub struct ScrollDriver {
    last_count: usize,
    idle_rescans: u32,
}

impl ScrollDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self, record_count: usize) {
        self.last_count = record_count;
        self.idle_rescans = 0;
    }

    #[cfg(test)]
    pub fn idle_rescans(&self) -> u32 {
        self.idle_rescans
    }

    pub fn tick(&mut self, draining: bool, host: &mut dyn Host, timings: &Timings) -> Result<TickDecision> {
        if draining {
            debug!("Detail extraction in progress; holding scroll");
            return Ok(TickDecision::Skipped);
        }
        let outcome = host.scroll_listing_to_end()?;
        Ok(match outcome {
            ScrollOutcome::Moved => TickDecision::Rescan {
                after: timings.scroll_settle(),
                at_end: false,
            },
            ScrollOutcome::Unchanged => {
                info!("Reached end of results, checking for new items...");
                TickDecision::Rescan {
                    after: timings.end_grace(),
                    at_end: true,
                }
            }
            ScrollOutcome::NoContainer => {
                warn!("No results feed on screen");
                TickDecision::NoContainer
            }
        })
    }

    /// Book-keep a finished re-scan. Returns true once the end of the list
    /// has produced nothing new `limit` times in a row.
    pub fn after_rescan(&mut self, at_end: bool, record_count: usize, limit: u32) -> bool {
        if !at_end {
            self.last_count = record_count;
            return false;
        }
        if record_count == self.last_count {
            self.idle_rescans += 1;
            debug!("No new results ({}/{})", self.idle_rescans, limit);
            self.idle_rescans >= limit
        } else {
            self.idle_rescans = 0;
            self.last_count = record_count;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_counts_consecutive_idle_rescans() {
        let mut d = ScrollDriver::new();
        d.reset(5);
        assert!(!d.after_rescan(true, 5, 3));
        assert!(!d.after_rescan(true, 5, 3));
        // New records reset the streak.
        assert!(!d.after_rescan(true, 7, 3));
        assert_eq!(d.idle_rescans(), 0);
        assert!(!d.after_rescan(true, 7, 3));
        assert!(!d.after_rescan(true, 7, 3));
        assert!(d.after_rescan(true, 7, 3));
    }

    #[test]
    fn moved_rescans_track_count_only() {
        let mut d = ScrollDriver::new();
        assert!(!d.after_rescan(false, 10, 3));
        assert_eq!(d.idle_rescans(), 0);
        // The count recorded by the moved re-scan is the baseline.
        assert!(d.after_rescan(true, 10, 1));
    }
}
