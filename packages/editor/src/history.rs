//! # Undo/Redo History
//!
//! Snapshot-based history of committed trees.
//!
//! ## Design
//!
//! - The history is a bounded sequence of full snapshots plus a cursor
//! - The first entry is the tree the session started from
//! - Committing while the cursor is behind the tail discards everything
//!   after the cursor (a new edit invalidates the redo branch)
//! - Exceeding the bound evicts the oldest entry and shifts the cursor down
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut history = History::new(BlockStore::new(), 50);
//! history.commit(next.clone(), "add");
//!
//! let previous = history.undo().cloned();
//! let next_again = history.redo().cloned();
//! ```

use std::collections::VecDeque;

use crate::store::BlockStore;

/// Default number of retained snapshots
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// One committed tree state
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub snapshot: BlockStore,

    /// Name of the edit that produced this snapshot
    pub description: Option<String>,
}

/// Bounded snapshot history with a cursor
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    cursor: usize,
    limit: usize,
}

impl History {
    /// Start a history whose only entry is `initial`. A limit below 1 is raised to 1.
    pub fn new(initial: BlockStore, limit: usize) -> Self {
        let mut entries = VecDeque::with_capacity(limit.clamp(1, DEFAULT_HISTORY_LIMIT));
        entries.push_back(HistoryEntry {
            snapshot: initial,
            description: None,
        });

        Self {
            entries,
            cursor: 0,
            limit: limit.max(1),
        }
    }

    /// Record a new snapshot after the cursor
    pub fn commit(&mut self, snapshot: BlockStore, description: impl Into<String>) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push_back(HistoryEntry {
            snapshot,
            description: Some(description.into()),
        });
        self.cursor = self.entries.len() - 1;

        while self.entries.len() > self.limit {
            self.entries.pop_front();
            self.cursor = self.cursor.saturating_sub(1);
        }
    }

    /// Step back; returns the snapshot that is now current
    pub fn undo(&mut self) -> Option<&BlockStore> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor).map(|e| &e.snapshot)
    }

    /// Step forward; returns the snapshot that is now current
    pub fn redo(&mut self) -> Option<&BlockStore> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor).map(|e| &e.snapshot)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// Snapshot at the cursor
    pub fn current(&self) -> Option<&BlockStore> {
        self.entries.get(self.cursor).map(|e| &e.snapshot)
    }

    /// Description of the edit the next undo would revert
    pub fn undo_description(&self) -> Option<&str> {
        if !self.can_undo() {
            return None;
        }
        self.entries
            .get(self.cursor)
            .and_then(|e| e.description.as_deref())
    }

    /// Description of the edit the next redo would reapply
    pub fn redo_description(&self) -> Option<&str> {
        self.entries
            .get(self.cursor + 1)
            .and_then(|e| e.description.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Drop all history and start over from `snapshot`
    pub fn reset(&mut self, snapshot: BlockStore) {
        *self = Self::new(snapshot, self.limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;

    fn store_of(ids: &[&str]) -> BlockStore {
        BlockStore::from_blocks(
            ids.iter()
                .enumerate()
                .map(|(i, id)| Block::new(*id, "text").with_sort_order(i as u32))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_history_creation() {
        let history = History::new(BlockStore::new(), DEFAULT_HISTORY_LIMIT);
        assert_eq!(history.len(), 1);
        assert_eq!(history.cursor(), 0);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.limit(), DEFAULT_HISTORY_LIMIT);
        assert_eq!(History::new(BlockStore::new(), 0).limit(), 1);
    }

    #[test]
    fn test_commit_undo_redo() {
        let mut history = History::new(store_of(&[]), 10);
        history.commit(store_of(&["a"]), "add");
        history.commit(store_of(&["a", "b"]), "add");

        assert_eq!(history.undo_description(), Some("add"));
        assert_eq!(history.undo(), Some(&store_of(&["a"])));
        assert!(history.can_redo());
        assert_eq!(history.undo(), Some(&store_of(&[])));
        assert_eq!(history.undo(), None);

        assert_eq!(history.redo(), Some(&store_of(&["a"])));
        assert_eq!(history.redo(), Some(&store_of(&["a", "b"])));
        assert_eq!(history.redo(), None);
    }

    #[test]
    fn test_commit_truncates_redo_branch() {
        let mut history = History::new(store_of(&[]), 10);
        history.commit(store_of(&["a"]), "add");
        history.undo();
        history.commit(store_of(&["z"]), "paste");

        assert!(!history.can_redo());
        assert_eq!(history.len(), 2);
        assert_eq!(history.current(), Some(&store_of(&["z"])));
        assert_eq!(history.undo(), Some(&store_of(&[])));
        assert_eq!(history.redo(), Some(&store_of(&["z"])));
    }

    #[test]
    fn test_limit_evicts_oldest() {
        let mut history = History::new(store_of(&[]), 3);
        for name in ["a", "b", "c", "d"] {
            history.commit(store_of(&[name]), "add");
        }

        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor(), 2);
        history.undo();
        history.undo();
        assert_eq!(history.current(), Some(&store_of(&["b"])));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_descriptions() {
        let mut history = History::new(store_of(&[]), 5);
        assert_eq!(history.undo_description(), None);

        history.commit(store_of(&["a"]), "add");
        history.commit(store_of(&[]), "delete");
        history.undo();

        assert_eq!(history.undo_description(), Some("add"));
        assert_eq!(history.redo_description(), Some("delete"));
    }
}
