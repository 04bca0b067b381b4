use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

/// Work the session can defer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Task {
    ScrollTick,
    /// Re-scan after a scroll; `at_end` when the scroll position did not move.
    ScrollRescan { at_end: bool },
    /// Re-scan requested by an intercepted search response.
    Rescan,
    Sequencer(SeqStep),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SeqStep {
    Next,
    Open,
    Verify,
    Close,
    Finish,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Timer {
    due: Duration,
    seq: u64,
    task: Task,
}

/// Virtual-time event loop. Nothing here waits; `pop_next` jumps the clock
/// to the earliest due timer. Timers due at the same instant run in the
/// order they were scheduled.
#[derive(Debug, Default)]
pub struct Scheduler {
    now: Duration,
    seq: u64,
    timers: BinaryHeap<Reverse<Timer>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn schedule(&mut self, delay: Duration, task: Task) {
        self.seq += 1;
        self.timers.push(Reverse(Timer {
            due: self.now + delay,
            seq: self.seq,
            task,
        }));
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.timers.peek().map(|Reverse(t)| t.due)
    }

    pub fn pop_next(&mut self) -> Option<Task> {
        let Reverse(timer) = self.timers.pop()?;
        self.now = self.now.max(timer.due);
        Some(timer.task)
    }

    pub fn cancel(&mut self, mut pred: impl FnMut(&Task) -> bool) -> usize {
        let before = self.timers.len();
        self.timers.retain(|Reverse(t)| !pred(&t.task));
        before - self.timers.len()
    }

    pub fn has(&self, mut pred: impl FnMut(&Task) -> bool) -> bool {
        self.timers.iter().any(|Reverse(t)| pred(&t.task))
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.timers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn pops_in_due_order_and_advances_clock() {
        let mut s = Scheduler::new();
        s.schedule(ms(3000), Task::ScrollTick);
        s.schedule(ms(500), Task::Rescan);
        s.schedule(ms(500), Task::Sequencer(SeqStep::Open));

        assert_eq!(s.pop_next(), Some(Task::Rescan));
        assert_eq!(s.now(), ms(500));
        assert_eq!(s.pop_next(), Some(Task::Sequencer(SeqStep::Open)));
        assert_eq!(s.next_due(), Some(ms(3000)));
        assert_eq!(s.pop_next(), Some(Task::ScrollTick));
        assert_eq!(s.now(), ms(3000));
        assert_eq!(s.pop_next(), None);
    }

    #[test]
    fn delays_are_relative_to_now() {
        let mut s = Scheduler::new();
        s.schedule(ms(1000), Task::Rescan);
        s.pop_next();
        s.schedule(ms(1000), Task::ScrollTick);
        assert_eq!(s.next_due(), Some(ms(2000)));
    }

    #[test]
    fn cancel_by_kind() {
        let mut s = Scheduler::new();
        s.schedule(ms(1), Task::ScrollTick);
        s.schedule(ms(2), Task::ScrollRescan { at_end: true });
        s.schedule(ms(3), Task::Sequencer(SeqStep::Close));
        let removed = s.cancel(|t| matches!(t, Task::ScrollTick | Task::ScrollRescan { .. }));
        assert_eq!(removed, 2);
        assert_eq!(s.len(), 1);
        assert!(!s.has(|t| *t == Task::ScrollTick));
    }
}
