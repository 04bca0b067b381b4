use std::time::Duration;

use indicatif::ProgressBar;
use tracing::info;

use crate::host::Host;
use crate::sequencer::ItemOutcome;
use crate::session::Session;

/// How scheduled delays are honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// Sleep for every settle delay, as a live page needs.
    Realtime,
    /// Jump straight to the next due task.
    Instant,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub records: usize,
    pub enriched: usize,
    pub mismatched: usize,
    pub failed: usize,
    /// Time the run would have taken against a live page.
    pub elapsed: Duration,
}

/// Drive `session` until nothing is scheduled. Call after `Session::start`.
pub async fn run(session: &mut Session, host: &mut dyn Host, pace: Pace, pb: &ProgressBar) -> RunSummary {
    let mut steps = 0u64;
    while let Some(due) = session.scheduler().next_due() {
        if pace == Pace::Realtime {
            let wait = due.saturating_sub(session.scheduler().now());
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }
        if !session.advance(host) {
            break;
        }
        steps += 1;
        pb.set_message(format!(
            "{} results, {} queued",
            session.store().len(),
            session.sequencer().pending()
        ));
        pb.tick();
    }
    pb.finish_and_clear();

    let summary = summarize(session);
    info!(
        "Run finished after {} steps: {} results, {} enriched, {} mismatched, {} failed",
        steps, summary.records, summary.enriched, summary.mismatched, summary.failed
    );
    summary
}

fn summarize(session: &Session) -> RunSummary {
    let mut summary = RunSummary {
        records: session.store().len(),
        elapsed: session.scheduler().now(),
        ..Default::default()
    };
    for (_, outcome) in session.sequencer().outcomes() {
        match outcome {
            ItemOutcome::Enriched { .. } => summary.enriched += 1,
            ItemOutcome::IdentityMismatch { .. } => summary.mismatched += 1,
            ItemOutcome::MissingHeader | ItemOutcome::MissingRecord | ItemOutcome::OpenFailed => {
                summary.failed += 1
            }
        }
    }
    summary
}

// ── Tests ──
