//! # Task Scheduler
//!
//! A virtual-clock scheduler. Tasks are plain values; whoever owns the
//! scheduler pulls due tasks with [`Scheduler::pop_due`] and runs them, so
//! ordering is deterministic and tests never sleep.
//!
//! ```
//! use std::time::Duration;
//! use bindery::schedule::Scheduler;
//!
//! let mut s: Scheduler<&str, &str> = Scheduler::new(Duration::from_millis(50));
//! s.debounce("capture", "first", Duration::from_millis(400));
//! s.debounce("capture", "second", Duration::from_millis(400));
//! s.schedule_after_settle("settled");
//!
//! let target = s.now() + Duration::from_millis(500);
//! let mut ran = Vec::new();
//! while let Some(task) = s.pop_due(target) {
//!     ran.push(task);
//! }
//! s.advance_to(target);
//! assert_eq!(ran, ["settled", "second"]);
//! ```
//!
//! ## Ordering
//!
//! - Tasks run in due-time order; ties run in scheduling order.
//! - A debounce replaces any pending task with the same key.
//! - A task scheduled while draining runs in the same drain when it falls
//!   due before the target.

use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Entry<K, T> {
    key: Option<K>,
    task: T,
}

/// Deterministic delayed-task queue.
#[derive(Debug, Clone)]
pub struct Scheduler<K, T> {
    now: Duration,
    seq: u64,
    settle: Duration,
    queue: BTreeMap<(Duration, u64), Entry<K, T>>,
}

impl<K: PartialEq + std::fmt::Debug, T> Scheduler<K, T> {
    /// Empty scheduler at time zero; `settle` is the delay used by
    /// [`Scheduler::schedule_after_settle`].
    pub fn new(settle: Duration) -> Self {
        Self {
            now: Duration::ZERO,
            seq: 0,
            settle,
            queue: BTreeMap::new(),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Due time of the earliest pending task.
    pub fn next_due(&self) -> Option<Duration> {
        self.queue.keys().next().map(|(due, _)| *due)
    }

    fn insert(&mut self, key: Option<K>, task: T, delay: Duration) {
        let due = self.now + delay;
        self.seq += 1;
        self.queue.insert((due, self.seq), Entry { key, task });
    }

    /// Run `task` after `delay`, replacing any pending task with `key`.
    pub fn debounce(&mut self, key: K, task: T, delay: Duration) {
        let replaced = self.cancel(&key);
        tracing::debug!(?key, replaced, delay_ms = delay.as_millis() as u64, "debounce");
        self.insert(Some(key), task, delay);
    }

    /// Run `task` after `delay`.
    pub fn schedule_after(&mut self, task: T, delay: Duration) {
        self.insert(None, task, delay);
    }

    /// Run `task` once pending document work has had time to settle.
    pub fn schedule_after_settle(&mut self, task: T) {
        self.insert(None, task, self.settle);
    }

    /// Drop the pending task with `key`. Returns whether one existed.
    pub fn cancel(&mut self, key: &K) -> bool {
        self.cancel_entries(|e| e.key.as_ref() == Some(key)) > 0
    }

    /// Drop every pending task matching `pred`. Returns how many were dropped.
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&T) -> bool) -> usize {
        self.cancel_entries(|e| pred(&e.task))
    }

    fn cancel_entries(&mut self, mut pred: impl FnMut(&Entry<K, T>) -> bool) -> usize {
        let before = self.queue.len();
        self.queue.retain(|_, e| !pred(e));
        before - self.queue.len()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.queue.values().any(|e| e.key.as_ref() == Some(key))
    }

    /// Remove and return the earliest task due at or before `until`, moving
    /// the clock to its due time.
    pub fn pop_due(&mut self, until: Duration) -> Option<T> {
        let (&(due, seq), _) = self.queue.iter().next()?;
        if due > until {
            return None;
        }
        let entry = self.queue.remove(&(due, seq))?;
        self.now = self.now.max(due);
        Some(entry.task)
    }

    /// Move the clock forward to `target` (never backwards).
    pub fn advance_to(&mut self, target: Duration) {
        self.now = self.now.max(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn drain(s: &mut Scheduler<&'static str, &'static str>, by: u64) -> Vec<&'static str> {
        let target = s.now() + ms(by);
        let mut out = Vec::new();
        while let Some(t) = s.pop_due(target) {
            out.push(t);
        }
        s.advance_to(target);
        out
    }

    #[test]
    fn test_runs_in_due_then_insertion_order() {
        let mut s = Scheduler::new(ms(50));
        s.schedule_after("late", ms(100));
        s.schedule_after("early-a", ms(10));
        s.schedule_after("early-b", ms(10));
        assert_eq!(drain(&mut s, 100), ["early-a", "early-b", "late"]);
        assert_eq!(s.now(), ms(100));
    }

    #[test]
    fn test_debounce_replaces() {
        let mut s = Scheduler::new(ms(50));
        s.debounce("k", "one", ms(400));
        assert_eq!(drain(&mut s, 300), Vec::<&str>::new());
        s.debounce("k", "two", ms(400));
        assert_eq!(drain(&mut s, 300), Vec::<&str>::new());
        assert!(s.is_pending(&"k"));
        assert_eq!(drain(&mut s, 100), ["two"]);
        assert!(s.is_empty());
    }

    #[test]
    fn test_cancel() {
        let mut s = Scheduler::new(ms(50));
        s.debounce("a", "x", ms(10));
        s.schedule_after("y", ms(10));
        s.schedule_after("z", ms(10));
        assert!(s.cancel(&"a"));
        assert!(!s.cancel(&"a"));
        assert_eq!(s.cancel_where(|t| *t == "y"), 1);
        assert_eq!(drain(&mut s, 10), ["z"]);
    }

    #[test]
    fn test_settle_and_clock() {
        let mut s = Scheduler::new(ms(50));
        s.schedule_after_settle("settled");
        assert_eq!(s.next_due(), Some(ms(50)));
        assert_eq!(drain(&mut s, 49), Vec::<&str>::new());
        assert_eq!(drain(&mut s, 1), ["settled"]);
        s.advance_to(ms(10));
        assert_eq!(s.now(), ms(50));
    }

    #[test]
    fn test_task_scheduled_while_draining_runs_if_due() {
        let mut s: Scheduler<&str, &str> = Scheduler::new(ms(50));
        s.schedule_after("first", ms(10));
        let target = ms(100);
        let mut out = Vec::new();
        while let Some(t) = s.pop_due(target) {
            if t == "first" {
                s.schedule_after("chained", ms(20));
                s.schedule_after("too-late", ms(200));
            }
            out.push(t);
        }
        assert_eq!(out, ["first", "chained"]);
        assert_eq!(s.len(), 1);
    }
}
