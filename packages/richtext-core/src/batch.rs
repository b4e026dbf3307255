use crate::error::{Error, Result};
use crate::ids::Version;
use crate::ops::Operation;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a batch takes part in undo history.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum BatchType {
    /// Local user action, undoable.
    #[default]
    Default,
    /// Produced by `Document::undo`; can be redone.
    Undo,
    /// Produced by `Document::redo`; can be undone again.
    Redo,
    /// Operations received from another session.
    Remote,
    /// Local changes kept out of undo history.
    Transparent,
}

/// Ordered group of operations forming one logical action.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Batch {
    pub batch_type: BatchType,
    operations: Vec<Operation>,
    #[cfg_attr(feature = "serde", serde(default))]
    sealed: bool,
}

impl Batch {
    pub fn new(batch_type: BatchType) -> Self {
        Self {
            batch_type,
            operations: Vec::new(),
            sealed: false,
        }
    }

    pub fn add_operation(&mut self, op: Operation) -> Result<()> {
        if self.sealed {
            return Err(Error::SealedBatchMutation);
        }
        self.operations.push(op);
        Ok(())
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_undoable(&self) -> bool {
        self.batch_type == BatchType::Default
    }

    /// Version the first operation was applied at.
    pub fn base_version(&self) -> Option<Version> {
        self.operations.first().map(Operation::base_version)
    }

    /// Reversed operations in reverse order, re-stamped to apply right after this batch.
    pub fn get_reversed(&self) -> Vec<Operation> {
        let Some(last) = self.operations.last() else {
            return Vec::new();
        };
        let start = last.base_version() + 1;
        self.operations
            .iter()
            .rev()
            .enumerate()
            .map(|(i, op)| op.get_reversed().with_base_version(start + i as u64))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ReplicaId;
    use crate::node::Node;
    use crate::ops::OperationKind;
    use crate::position::Position;

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec()).unwrap()
    }

    #[test]
    fn sealed_batch_rejects_operations() {
        let origin = ReplicaId::new(b"a");
        let mut batch = Batch::new(BatchType::Default);
        batch
            .add_operation(Operation::insert(&origin, 0, pos(&[0, 0]), vec![Node::text("a")]))
            .unwrap();
        batch.seal();
        assert_eq!(
            batch.add_operation(Operation::no_op(&origin, 1)),
            Err(Error::SealedBatchMutation)
        );
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn reversed_batch_runs_backwards() {
        let origin = ReplicaId::new(b"a");
        let mut batch = Batch::new(BatchType::Default);
        batch
            .add_operation(Operation::insert(&origin, 4, pos(&[0, 0]), vec![Node::text("ab")]))
            .unwrap();
        batch
            .add_operation(Operation::rename(&origin, 5, pos(&[0]), "paragraph", "heading"))
            .unwrap();
        let reversed = batch.get_reversed();
        assert_eq!(reversed.len(), 2);
        assert!(matches!(reversed[0].kind, OperationKind::Rename { .. }));
        assert!(reversed[1].is_removal());
        assert_eq!(reversed[0].base_version(), 6);
        assert_eq!(reversed[1].base_version(), 7);
        assert!(!Batch::new(BatchType::Remote).is_undoable());
    }
}
