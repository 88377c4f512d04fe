//! Histories keyed by record.

use std::collections::BTreeMap;

use super::History;
use crate::record::RecordId;

/// One [`History`] per record, created on first access.
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    histories: BTreeMap<RecordId, History>,
    max_entries: usize,
}

impl HistoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            histories: BTreeMap::new(),
            max_entries,
        }
    }

    /// The history of `id`, created empty if this is its first use.
    pub fn get(&mut self, id: RecordId) -> &mut History {
        let max = self.max_entries;
        self.histories.entry(id).or_insert_with(|| History::new(max))
    }

    /// The history of `id` if it was ever created.
    pub fn peek(&self, id: RecordId) -> Option<&History> {
        self.histories.get(&id)
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.histories.contains_key(&id)
    }

    /// Drop every history (template replaced).
    pub fn clear_all(&mut self) {
        self.histories.clear();
    }

    pub fn len(&self) -> usize {
        self.histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Snapshot;

    #[test]
    fn test_lazy_creation() {
        let mut store = HistoryStore::new(10);
        assert!(store.peek(RecordId(3)).is_none());
        assert!(store.get(RecordId(3)).is_empty());
        assert!(store.contains(RecordId(3)));
        assert_eq!(store.get(RecordId(3)).max_entries(), 10);
    }

    #[test]
    fn test_histories_are_independent() {
        let mut store = HistoryStore::new(10);
        store.get(RecordId(1)).push(Snapshot::default());
        assert_eq!(store.get(RecordId(1)).len(), 1);
        assert!(store.get(RecordId(2)).is_empty());
        store.clear_all();
        assert!(store.is_empty());
    }
}
