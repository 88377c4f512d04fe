//! Per-record undo/redo history.
//!
//! A [`History`] is a linear list of snapshots with a cursor. Pushing after
//! an undo discards the redo tail:
//!
//! ```
//! use bindery::history::History;
//! use bindery::snapshot::Snapshot;
//!
//! # fn snap(width: f64) -> Snapshot {
//! #     let mut s = Snapshot::default();
//! #     s.meta.width = Some(width);
//! #     s
//! # }
//! let mut history = History::default();
//! history.push(snap(1.0));
//! history.push(snap(2.0));
//! history.undo();
//! history.push(snap(3.0));
//! assert_eq!(history.len(), 2);
//! assert!(!history.can_redo());
//! ```
//!
//! Only `undo`, `redo` and `reset` hand back a snapshot to restore; `push`
//! never does, so a capture can never trigger a restore.

pub mod store;

pub use store::HistoryStore;

use serde::{Deserialize, Serialize};

use crate::snapshot::Snapshot;

/// Snapshots kept when no limit is configured.
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// The last operation applied to a history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Push,
    Undo,
    Redo,
    Reset,
}

/// Linear undo/redo history of one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    entries: Vec<Snapshot>,
    /// `None` while empty, otherwise a valid index into `entries`.
    cursor: Option<usize>,
    last_action: Option<HistoryAction>,
    #[serde(skip, default = "default_max_entries")]
    max_entries: usize,
}

fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl History {
    /// Empty history keeping at most `max_entries` snapshots (at least one).
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: None,
            last_action: None,
            max_entries: max_entries.max(1),
        }
    }

    /// Drop the redo tail, append `snapshot` and move the cursor onto it.
    pub fn push(&mut self, snapshot: Snapshot) {
        if let Some(cursor) = self.cursor {
            self.entries.truncate(cursor + 1);
        }
        self.entries.push(snapshot);
        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(..excess);
        }
        self.cursor = Some(self.entries.len() - 1);
        self.last_action = Some(HistoryAction::Push);
    }

    /// Step back; `None` when already at the oldest entry.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        let cursor = self.cursor.filter(|c| *c > 0)?;
        self.cursor = Some(cursor - 1);
        self.last_action = Some(HistoryAction::Undo);
        self.current()
    }

    /// Step forward; `None` when already at the newest entry.
    pub fn redo(&mut self) -> Option<&Snapshot> {
        let cursor = self.cursor.filter(|c| c + 1 < self.entries.len())?;
        self.cursor = Some(cursor + 1);
        self.last_action = Some(HistoryAction::Redo);
        self.current()
    }

    /// Jump to the first snapshot; `None` when the history is empty.
    pub fn reset(&mut self) -> Option<&Snapshot> {
        if self.entries.is_empty() {
            return None;
        }
        self.cursor = Some(0);
        self.last_action = Some(HistoryAction::Reset);
        self.current()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
        self.last_action = None;
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|c| c > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.cursor.is_some_and(|c| c + 1 < self.entries.len())
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.entries.get(self.cursor?)
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn last_action(&self) -> Option<HistoryAction> {
        self.last_action
    }

    pub fn entries(&self) -> &[Snapshot] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}
