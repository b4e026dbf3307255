use crate::attributes::AttributeValue;
use crate::error::Result;
use crate::ids::{ReplicaId, RootName, Version};
use crate::node::{offset_size_of, Node};
use crate::position::Position;
use crate::range::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Metadata that accompanies every operation.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OperationMetadata {
    /// Session the operation was generated by. Used as the OT tie-break.
    pub origin: ReplicaId,
    /// Document version the operation was created against.
    pub base_version: Version,
}

/// The document mutations.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OperationKind {
    Insert {
        position: Position,
        nodes: Vec<Node>,
    },
    /// Moves `how_many` offsets starting at `source` to `target`.
    ///
    /// `target` is expressed in the coordinates from before the move. A move whose target
    /// lies in the graveyard root is a removal.
    Move {
        source: Position,
        how_many: usize,
        target: Position,
    },
    /// Changes `key` on every item of a flat range. `None` means "not set".
    Attribute {
        range: Range,
        key: String,
        old_value: Option<AttributeValue>,
        new_value: Option<AttributeValue>,
    },
    /// Renames the element right after `position`.
    Rename {
        position: Position,
        old_name: String,
        new_name: String,
    },
    /// Adds (`old_range == None`), removes (`new_range == None`) or updates a marker.
    Marker {
        name: String,
        old_range: Option<Range>,
        new_range: Option<Range>,
        affects_data: bool,
    },
    NoOp,
}

/// Operation type as reported in applied changes and diffs.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum OperationType {
    Insert,
    Move,
    Remove,
    Reinsert,
    Attribute,
    Rename,
    Marker,
    NoOp,
}

/// Full operation envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Operation {
    pub meta: OperationMetadata,
    pub kind: OperationKind,
}

impl Operation {
    pub fn new(origin: &ReplicaId, base_version: Version, kind: OperationKind) -> Self {
        Self {
            meta: OperationMetadata {
                origin: origin.clone(),
                base_version,
            },
            kind,
        }
    }

    pub fn insert(origin: &ReplicaId, base_version: Version, position: Position, nodes: Vec<Node>) -> Self {
        Self::new(origin, base_version, OperationKind::Insert { position, nodes })
    }

    pub fn move_range(
        origin: &ReplicaId,
        base_version: Version,
        source: Position,
        how_many: usize,
        target: Position,
    ) -> Self {
        Self::new(
            origin,
            base_version,
            OperationKind::Move {
                source,
                how_many,
                target,
            },
        )
    }

    /// Move into the graveyard.
    pub fn remove(origin: &ReplicaId, base_version: Version, source: Position, how_many: usize) -> Self {
        let target = Position::from_parts(RootName::graveyard(), vec![0]);
        Self::move_range(origin, base_version, source, how_many, target)
    }

    pub fn attribute(
        origin: &ReplicaId,
        base_version: Version,
        range: Range,
        key: impl Into<String>,
        old_value: Option<AttributeValue>,
        new_value: Option<AttributeValue>,
    ) -> Self {
        Self::new(
            origin,
            base_version,
            OperationKind::Attribute {
                range,
                key: key.into(),
                old_value,
                new_value,
            },
        )
    }

    pub fn rename(
        origin: &ReplicaId,
        base_version: Version,
        position: Position,
        old_name: impl Into<String>,
        new_name: impl Into<String>,
    ) -> Self {
        Self::new(
            origin,
            base_version,
            OperationKind::Rename {
                position,
                old_name: old_name.into(),
                new_name: new_name.into(),
            },
        )
    }

    pub fn marker(
        origin: &ReplicaId,
        base_version: Version,
        name: impl Into<String>,
        old_range: Option<Range>,
        new_range: Option<Range>,
        affects_data: bool,
    ) -> Self {
        Self::new(
            origin,
            base_version,
            OperationKind::Marker {
                name: name.into(),
                old_range,
                new_range,
                affects_data,
            },
        )
    }

    pub fn no_op(origin: &ReplicaId, base_version: Version) -> Self {
        Self::new(origin, base_version, OperationKind::NoOp)
    }

    pub fn base_version(&self) -> Version {
        self.meta.base_version
    }

    pub fn with_base_version(mut self, base_version: Version) -> Self {
        self.meta.base_version = base_version;
        self
    }

    /// Offset size affected by an insert or a move, zero otherwise.
    pub fn how_many(&self) -> usize {
        match &self.kind {
            OperationKind::Insert { nodes, .. } => offset_size_of(nodes),
            OperationKind::Move { how_many, .. } => *how_many,
            _ => 0,
        }
    }

    pub fn is_removal(&self) -> bool {
        match &self.kind {
            OperationKind::Move { source, target, .. } => {
                target.root.is_graveyard() && !source.root.is_graveyard()
            }
            _ => false,
        }
    }

    pub fn is_no_op(&self) -> bool {
        matches!(self.kind, OperationKind::NoOp)
    }

    pub fn operation_type(&self) -> OperationType {
        match &self.kind {
            OperationKind::Insert { .. } => OperationType::Insert,
            OperationKind::Move { source, target, .. } => {
                match (source.root.is_graveyard(), target.root.is_graveyard()) {
                    (false, true) => OperationType::Remove,
                    (true, false) => OperationType::Reinsert,
                    _ => OperationType::Move,
                }
            }
            OperationKind::Attribute { .. } => OperationType::Attribute,
            OperationKind::Rename { .. } => OperationType::Rename,
            OperationKind::Marker { .. } => OperationType::Marker,
            OperationKind::NoOp => OperationType::NoOp,
        }
    }

    /// Where the moved content starts once a move has been applied.
    pub fn moved_range_start(&self) -> Option<Position> {
        match &self.kind {
            OperationKind::Move {
                source,
                how_many,
                target,
            } => Some(
                target
                    .get_transformed_by_deletion(source, *how_many)
                    .unwrap_or_else(|| target.clone()),
            ),
            _ => None,
        }
    }

    /// Roots referenced by the operation.
    pub fn roots(&self) -> Vec<&RootName> {
        match &self.kind {
            OperationKind::Insert { position, .. } => vec![&position.root],
            OperationKind::Move { source, target, .. } => vec![&source.root, &target.root],
            OperationKind::Attribute { range, .. } => vec![range.root()],
            OperationKind::Rename { position, .. } => vec![&position.root],
            OperationKind::Marker {
                old_range,
                new_range,
                ..
            } => old_range
                .iter()
                .chain(new_range.iter())
                .map(Range::root)
                .collect(),
            OperationKind::NoOp => Vec::new(),
        }
    }

    /// Every position the operation carries, range boundaries included.
    pub fn positions(&self) -> Vec<&Position> {
        match &self.kind {
            OperationKind::Insert { position, .. } | OperationKind::Rename { position, .. } => vec![position],
            OperationKind::Move { source, target, .. } => vec![source, target],
            OperationKind::Attribute { range, .. } => vec![&range.start, &range.end],
            OperationKind::Marker {
                old_range,
                new_range,
                ..
            } => old_range
                .iter()
                .chain(new_range.iter())
                .flat_map(|range| [&range.start, &range.end])
                .collect(),
            OperationKind::NoOp => Vec::new(),
        }
    }

    /// Rejects operations carrying positions with empty paths.
    pub fn validate(&self) -> Result<()> {
        self.positions().into_iter().try_for_each(Position::validate)
    }

    /// Operation that undoes this one when applied right after it.
    pub fn get_reversed(&self) -> Operation {
        let origin = &self.meta.origin;
        let base = self.meta.base_version + 1;
        match &self.kind {
            OperationKind::Insert { position, nodes } => {
                Operation::remove(origin, base, position.clone(), offset_size_of(nodes))
            }
            OperationKind::Move {
                source,
                how_many,
                target,
            } => {
                let moved_start = target
                    .get_transformed_by_deletion(source, *how_many)
                    .unwrap_or_else(|| target.clone());
                let back = source.get_transformed_by_insertion(target, *how_many);
                Operation::move_range(origin, base, moved_start, *how_many, back)
            }
            OperationKind::Attribute {
                range,
                key,
                old_value,
                new_value,
            } => Operation::attribute(
                origin,
                base,
                range.clone(),
                key.clone(),
                new_value.clone(),
                old_value.clone(),
            ),
            OperationKind::Rename {
                position,
                old_name,
                new_name,
            } => Operation::rename(origin, base, position.clone(), new_name.clone(), old_name.clone()),
            OperationKind::Marker {
                name,
                old_range,
                new_range,
                affects_data,
            } => Operation::marker(
                origin,
                base,
                name.clone(),
                new_range.clone(),
                old_range.clone(),
                *affects_data,
            ),
            OperationKind::NoOp => Operation::no_op(origin, base),
        }
    }
}
