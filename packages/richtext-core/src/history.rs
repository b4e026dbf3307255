use std::collections::VecDeque;

use crate::batch::{Batch, BatchType};
use crate::error::{Error, Result};
use crate::ids::Version;
use crate::ops::Operation;

/// Every operation applied to a document since `base`, in application order.
#[derive(Clone, Debug, Default)]
pub struct History {
    base: Version,
    operations: Vec<Operation>,
}

impl History {
    pub fn starting_at(base: Version) -> Self {
        Self {
            base,
            operations: Vec::new(),
        }
    }

    pub fn base(&self) -> Version {
        self.base
    }

    /// Version after the last recorded operation.
    pub fn version(&self) -> Version {
        self.base + self.operations.len() as Version
    }

    pub fn record(&mut self, op: Operation) {
        self.operations.push(op);
    }

    /// Forgets the operations applied before `version`.
    pub fn trim_before(&mut self, version: Version) {
        let count = (version.saturating_sub(self.base) as usize).min(self.operations.len());
        self.operations.drain(..count);
        self.base += count as Version;
    }

    /// Operations applied at `version` and later.
    pub fn operations_since(&self, version: Version) -> Result<Vec<Operation>> {
        if version < self.base {
            return Err(Error::InvalidOperation(format!(
                "history starts at version {}, requested {}",
                self.base, version
            )));
        }
        if version > self.version() {
            return Err(Error::VersionConflict {
                expected: self.version(),
                actual: version,
            });
        }
        let start = (version - self.base) as usize;
        Ok(self.operations[start..].to_vec())
    }
}

#[derive(Clone, Debug)]
struct Entry {
    batch: Batch,
    /// Document version right after the batch was applied.
    end_version: Version,
}

/// Undo and redo stacks of one document.
#[derive(Clone, Debug)]
pub struct UndoStack {
    undo: VecDeque<Entry>,
    redo: Vec<Entry>,
    limit: usize,
}

impl UndoStack {
    /// `limit == 0` keeps every batch.
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Routes a sealed batch to the stack its type belongs to.
    pub fn push(&mut self, batch: Batch, end_version: Version) {
        if batch.is_empty() {
            return;
        }
        let entry = Entry { batch, end_version };
        match entry.batch.batch_type {
            BatchType::Default => {
                self.redo.clear();
                self.push_undo(entry);
            }
            BatchType::Redo => self.push_undo(entry),
            BatchType::Undo => self.redo.push(entry),
            BatchType::Remote | BatchType::Transparent => {}
        }
    }

    fn push_undo(&mut self, entry: Entry) {
        self.undo.push_back(entry);
        if self.limit > 0 {
            while self.undo.len() > self.limit {
                self.undo.pop_front();
            }
        }
    }

    /// Drops entries that were applied before `version`; reverting them would need
    /// operations no longer in the log.
    pub fn drop_older_than(&mut self, version: Version) {
        self.undo.retain(|entry| entry.end_version >= version);
        self.redo.retain(|entry| entry.end_version >= version);
    }

    pub(crate) fn pop_undo(&mut self) -> Option<(Batch, Version)> {
        self.undo.pop_back().map(|e| (e.batch, e.end_version))
    }

    pub(crate) fn pop_redo(&mut self) -> Option<(Batch, Version)> {
        self.redo.pop().map(|e| (e.batch, e.end_version))
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ReplicaId;

    fn batch(batch_type: BatchType, base: Version) -> Batch {
        let mut batch = Batch::new(batch_type);
        batch
            .add_operation(Operation::no_op(&ReplicaId::new(b"a"), base))
            .unwrap();
        batch.seal();
        batch
    }

    #[test]
    fn history_slices_by_version() {
        let origin = ReplicaId::new(b"a");
        let mut history = History::starting_at(2);
        history.record(Operation::no_op(&origin, 2));
        history.record(Operation::no_op(&origin, 3));
        assert_eq!(history.version(), 4);
        assert_eq!(history.operations_since(3).unwrap().len(), 1);
        assert_eq!(history.operations_since(4).unwrap().len(), 0);
        assert!(matches!(
            history.operations_since(1),
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            history.operations_since(5),
            Err(Error::VersionConflict { .. })
        ));
    }

    #[test]
    fn trimming_moves_the_base() {
        let origin = ReplicaId::new(b"a");
        let mut history = History::starting_at(0);
        for v in 0..5 {
            history.record(Operation::no_op(&origin, v));
        }
        history.trim_before(3);
        assert_eq!(history.base(), 3);
        assert_eq!(history.version(), 5);
        assert_eq!(history.operations_since(3).unwrap()[0].base_version(), 3);
        assert!(history.operations_since(2).is_err());
        history.trim_before(9);
        assert_eq!(history.base(), 5);
    }

    #[test]
    fn dropping_entries_keeps_recent_ones() {
        let mut stack = UndoStack::new(0);
        for v in 0..4 {
            stack.push(batch(BatchType::Default, v), v + 1);
        }
        stack.push(batch(BatchType::Undo, 4), 5);
        stack.drop_older_than(3);
        assert_eq!(stack.undo_len(), 2);
        assert_eq!(stack.redo_len(), 1);
        stack.drop_older_than(6);
        assert!(!stack.can_undo());
        assert!(!stack.can_redo());
    }

    #[test]
    fn limit_drops_oldest_batches() {
        let mut stack = UndoStack::new(2);
        for v in 0..3 {
            stack.push(batch(BatchType::Default, v), v + 1);
        }
        assert_eq!(stack.undo_len(), 2);
        let (newest, _) = stack.pop_undo().unwrap();
        assert_eq!(newest.base_version(), Some(2));
    }

    #[test]
    fn new_default_batch_clears_redo() {
        let mut stack = UndoStack::new(0);
        stack.push(batch(BatchType::Default, 0), 1);
        stack.push(batch(BatchType::Undo, 1), 2);
        assert!(stack.can_redo());
        stack.push(batch(BatchType::Remote, 2), 3);
        assert!(stack.can_redo());
        stack.push(batch(BatchType::Default, 3), 4);
        assert!(!stack.can_redo());
    }
}
