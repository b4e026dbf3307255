use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::ids::RootName;
use crate::ops::{Operation, OperationKind};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a position reacts to content inserted exactly at it.
///
/// - `ToNone`: the position moves after the inserted content.
/// - `ToNext`: the position sticks to the node after it (follows it when moved).
/// - `ToPrevious`: the position sticks to the node before it and stays before inserted content.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum Stickiness {
    #[default]
    ToNone,
    ToNext,
    ToPrevious,
}

impl Stickiness {
    fn is_default(&self) -> bool {
        *self == Stickiness::ToNone
    }
}

/// Relation between two paths, mirroring how positions relate in the tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PathRelation {
    Same,
    /// The first path is a strict prefix of the second one.
    Prefix,
    /// The second path is a strict prefix of the first one.
    Extension,
    /// Paths diverge at the given index.
    Different(usize),
}

pub fn path_relation(a: &[usize], b: &[usize]) -> PathRelation {
    let common = a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count();
    if common == a.len() && common == b.len() {
        PathRelation::Same
    } else if common == a.len() {
        PathRelation::Prefix
    } else if common == b.len() {
        PathRelation::Extension
    } else {
        PathRelation::Different(common)
    }
}

/// A location between nodes: a root plus a path of offsets.
///
/// Equality ignores stickiness.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "PositionRepr"))]
pub struct Position {
    pub root: RootName,
    pub path: Vec<usize>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Stickiness::is_default")
    )]
    pub stickiness: Stickiness,
}

/// Wire form of a position, validated before it becomes a `Position`.
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct PositionRepr {
    root: RootName,
    path: Vec<usize>,
    #[serde(default)]
    stickiness: Stickiness,
}

#[cfg(feature = "serde")]
impl TryFrom<PositionRepr> for Position {
    type Error = Error;

    fn try_from(repr: PositionRepr) -> Result<Self> {
        Ok(Position::new(repr.root, repr.path)?.with_stickiness(repr.stickiness))
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root && self.path == other.path
    }
}

impl Eq for Position {}

impl Position {
    pub fn new(root: impl Into<RootName>, path: Vec<usize>) -> Result<Self> {
        if path.is_empty() {
            return Err(Error::InvalidPosition("position path must not be empty".into()));
        }
        Ok(Self::from_parts(root.into(), path))
    }

    pub(crate) fn from_parts(root: RootName, path: Vec<usize>) -> Self {
        debug_assert!(!path.is_empty());
        Self {
            root,
            path,
            stickiness: Stickiness::ToNone,
        }
    }

    pub fn with_stickiness(mut self, stickiness: Stickiness) -> Self {
        self.stickiness = stickiness;
        self
    }

    pub fn offset(&self) -> usize {
        self.path.last().copied().unwrap_or(0)
    }

    pub fn set_offset(&mut self, offset: usize) {
        if let Some(last) = self.path.last_mut() {
            *last = offset;
        }
    }

    pub fn parent_path(&self) -> &[usize] {
        self.path.split_last().map_or(&[], |(_, parent)| parent)
    }

    /// Errors when the path is empty. Paths built through `new` never are, but the fields
    /// are public.
    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(Error::InvalidPosition(format!(
                "empty path in root {}",
                self.root
            )));
        }
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn is_equal(&self, other: &Position) -> bool {
        self == other
    }

    /// Document-order comparison. `None` for positions in different roots.
    pub fn compare(&self, other: &Position) -> Option<Ordering> {
        if self.root != other.root {
            return None;
        }
        Some(self.path.as_slice().cmp(other.path.as_slice()))
    }

    pub fn is_before(&self, other: &Position) -> bool {
        self.compare(other) == Some(Ordering::Less)
    }

    pub fn is_after(&self, other: &Position) -> bool {
        self.compare(other) == Some(Ordering::Greater)
    }

    pub fn has_same_parent_as(&self, other: &Position) -> bool {
        self.root == other.root && self.parent_path() == other.parent_path()
    }

    pub fn common_path(&self, other: &Position) -> Vec<usize> {
        if self.root != other.root {
            return Vec::new();
        }
        self.path
            .iter()
            .zip(other.path.iter())
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| *a)
            .collect()
    }

    /// Returns a new position with the offset shifted by `shift`, clamped at zero.
    pub fn get_shifted_by(&self, shift: isize) -> Position {
        let mut shifted = self.clone();
        let offset = self.offset() as isize + shift;
        shifted.set_offset(offset.max(0) as usize);
        shifted
    }

    /// Position right after `how_many` offsets were inserted at `insert`.
    pub fn get_transformed_by_insertion(&self, insert: &Position, how_many: usize) -> Position {
        let mut transformed = self.clone();
        if self.root != insert.root {
            return transformed;
        }
        match path_relation(insert.parent_path(), self.parent_path()) {
            PathRelation::Same => {
                if insert.offset() < self.offset()
                    || (insert.offset() == self.offset()
                        && self.stickiness != Stickiness::ToPrevious)
                {
                    transformed.set_offset(self.offset() + how_many);
                }
            }
            PathRelation::Prefix => {
                let i = insert.path.len().saturating_sub(1);
                if insert.offset() <= self.path[i] {
                    transformed.path[i] += how_many;
                }
            }
            _ => {}
        }
        transformed
    }

    /// Position after `how_many` offsets were removed at `deletion`, or `None` when this
    /// position was inside the removed content.
    pub fn get_transformed_by_deletion(&self, deletion: &Position, how_many: usize) -> Option<Position> {
        let mut transformed = self.clone();
        if self.root != deletion.root {
            return Some(transformed);
        }
        match path_relation(deletion.parent_path(), self.parent_path()) {
            PathRelation::Same => {
                if deletion.offset() < self.offset() {
                    if deletion.offset() + how_many > self.offset() {
                        return None;
                    }
                    transformed.set_offset(self.offset() - how_many);
                }
            }
            PathRelation::Prefix => {
                let i = deletion.path.len().saturating_sub(1);
                if deletion.offset() <= self.path[i] {
                    if deletion.offset() + how_many > self.path[i] {
                        return None;
                    }
                    transformed.path[i] -= how_many;
                }
            }
            _ => {}
        }
        Some(transformed)
    }

    /// Position after `how_many` offsets were moved from `source` to `target`.
    ///
    /// `target` is expressed in the coordinates from before the move.
    pub fn get_transformed_by_move(&self, source: &Position, target: &Position, how_many: usize) -> Position {
        let target_after = target
            .get_transformed_by_deletion(source, how_many)
            .unwrap_or_else(|| target.clone());
        if source.is_equal(&target_after) {
            return self.clone();
        }
        let transformed = self.get_transformed_by_deletion(source, how_many);
        let sticks_to_moved = (source.is_equal(self) && self.stickiness == Stickiness::ToNext)
            || (source.get_shifted_by(how_many as isize).is_equal(self)
                && self.stickiness == Stickiness::ToPrevious);
        match transformed {
            Some(position) if !sticks_to_moved => {
                position.get_transformed_by_insertion(&target_after, how_many)
            }
            _ => self.get_combined(source, &target_after),
        }
    }

    /// Re-bases a position located inside content that starts at `source` onto `target`.
    pub fn get_combined(&self, source: &Position, target: &Position) -> Position {
        let i = source.path.len().saturating_sub(1);
        let mut combined = target.clone();
        combined.stickiness = self.stickiness;
        let delta = self.path.get(i).copied().unwrap_or(0).saturating_sub(source.offset());
        combined.set_offset(target.offset() + delta);
        if self.path.len() > i + 1 {
            combined.path.extend_from_slice(&self.path[i + 1..]);
        }
        combined
    }

    pub fn get_transformed_by_operation(&self, op: &Operation) -> Position {
        match &op.kind {
            OperationKind::Insert { position, nodes } => {
                self.get_transformed_by_insertion(position, crate::node::offset_size_of(nodes))
            }
            OperationKind::Move {
                source,
                how_many,
                target,
            } => self.get_transformed_by_move(source, target, *how_many),
            _ => self.clone(),
        }
    }
}
