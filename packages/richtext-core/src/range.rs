use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::ids::RootName;
use crate::node::offset_size_of;
use crate::ops::{Operation, OperationKind};
use crate::position::{Position, Stickiness};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Span between two positions of the same root, `start <= end`.
///
/// A non-collapsed range does not grow when content is inserted at its boundaries.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "RangeRepr", try_from = "RangeRepr"))]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// Wire form of a range. Boundary stickiness is derived, not transported.
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct RangeRepr {
    root: RootName,
    start: Vec<usize>,
    end: Vec<usize>,
}

#[cfg(feature = "serde")]
impl From<Range> for RangeRepr {
    fn from(range: Range) -> Self {
        Self {
            root: range.start.root,
            start: range.start.path,
            end: range.end.path,
        }
    }
}

#[cfg(feature = "serde")]
impl TryFrom<RangeRepr> for Range {
    type Error = Error;

    fn try_from(repr: RangeRepr) -> Result<Self> {
        let start = Position::new(repr.root.clone(), repr.start)?;
        let end = Position::new(repr.root, repr.end)?;
        Ok(Range::ordered(start, end))
    }
}

impl Range {
    pub fn new(start: Position, end: Position) -> Result<Self> {
        if start.root != end.root {
            return Err(Error::CrossRootOperation(format!(
                "range boundaries in different roots: {} and {}",
                start.root, end.root
            )));
        }
        if start.is_after(&end) {
            return Err(Error::InvalidRange(format!(
                "range start {:?} is after end {:?}",
                start.path, end.path
            )));
        }
        Ok(Self::from_parts(start, end))
    }

    /// Builds a range without validation; boundaries must be ordered and share a root.
    pub(crate) fn from_parts(start: Position, end: Position) -> Self {
        let collapsed = start == end;
        Self {
            start: start.with_stickiness(if collapsed {
                Stickiness::ToNone
            } else {
                Stickiness::ToNext
            }),
            end: end.with_stickiness(if collapsed {
                Stickiness::ToNone
            } else {
                Stickiness::ToPrevious
            }),
        }
    }

    pub fn collapsed(position: Position) -> Self {
        Self::from_parts(position.clone(), position)
    }

    pub fn from_position_and_shift(position: &Position, shift: usize) -> Self {
        let end = position.get_shifted_by(shift as isize);
        Self::from_parts(position.clone(), end)
    }

    pub fn root(&self) -> &RootName {
        &self.start.root
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Both boundaries share the same parent.
    pub fn is_flat(&self) -> bool {
        self.start.has_same_parent_as(&self.end)
    }

    /// Offset length of a flat range.
    pub fn flat_len(&self) -> usize {
        self.end.offset().saturating_sub(self.start.offset())
    }

    pub fn contains_position(&self, position: &Position) -> bool {
        position.is_after(&self.start) && position.is_before(&self.end)
    }

    pub fn contains_range(&self, other: &Range, loose: bool) -> bool {
        let loose = loose && !other.is_collapsed();
        let contains_start =
            self.contains_position(&other.start) || (loose && self.start == other.start);
        let contains_end = self.contains_position(&other.end) || (loose && self.end == other.end);
        contains_start && contains_end
    }

    pub fn is_intersecting(&self, other: &Range) -> bool {
        self.start.is_before(&other.end) && self.end.is_after(&other.start)
    }

    /// Parts of this range not covered by `other`.
    pub fn get_difference(&self, other: &Range) -> Vec<Range> {
        let mut ranges = Vec::new();
        if self.is_intersecting(other) {
            if self.contains_position(&other.start) {
                ranges.push(Range::from_parts(self.start.clone(), other.start.clone()));
            }
            if self.contains_position(&other.end) {
                ranges.push(Range::from_parts(other.end.clone(), self.end.clone()));
            }
        } else {
            ranges.push(self.clone());
        }
        ranges
    }

    pub fn get_intersection(&self, other: &Range) -> Option<Range> {
        if !self.is_intersecting(other) {
            return None;
        }
        let mut start = self.start.clone();
        let mut end = self.end.clone();
        if self.contains_position(&other.start) {
            start = other.start.clone();
        }
        if self.contains_position(&other.end) {
            end = other.end.clone();
        }
        Some(Range::from_parts(start, end))
    }

    /// Range after `how_many` offsets were inserted at `insert`.
    ///
    /// With `spread`, an insertion strictly inside the range splits it so that the inserted
    /// content is not covered.
    pub fn get_transformed_by_insertion(&self, insert: &Position, how_many: usize, spread: bool) -> Vec<Range> {
        if spread && self.contains_position(insert) {
            return vec![
                Range::from_parts(self.start.clone(), insert.clone()),
                Range::from_parts(
                    insert.get_shifted_by(how_many as isize),
                    self.end.get_transformed_by_insertion(insert, how_many),
                ),
            ];
        }
        let start = self.start.get_transformed_by_insertion(insert, how_many);
        let end = self.end.get_transformed_by_insertion(insert, how_many);
        vec![Range::from_parts(start, end)]
    }

    /// Range after `how_many` offsets were removed at `deletion`. Boundaries inside the removed
    /// content snap to the deletion point; `None` when the whole range was removed.
    pub fn get_transformed_by_deletion(&self, deletion: &Position, how_many: usize) -> Option<Range> {
        let start = self.start.get_transformed_by_deletion(deletion, how_many);
        let end = self.end.get_transformed_by_deletion(deletion, how_many);
        match (start, end) {
            (None, None) => None,
            (start, end) => Some(Range::ordered(
                start.unwrap_or_else(|| deletion.clone()),
                end.unwrap_or_else(|| deletion.clone()),
            )),
        }
    }

    /// Range pieces after `how_many` offsets were moved from `source` to `target`.
    ///
    /// The result is ordered and may contain a piece located at the move destination.
    pub fn get_transformed_by_move(
        &self,
        source: &Position,
        target: &Position,
        how_many: usize,
        spread: bool,
    ) -> Vec<Range> {
        if self.is_collapsed() {
            let moved = self.start.get_transformed_by_move(source, target, how_many);
            return vec![Range::collapsed(moved)];
        }

        let move_range = Range::from_position_and_shift(source, how_many);
        let insert_position = target
            .get_transformed_by_deletion(source, how_many)
            .unwrap_or_else(|| target.clone());

        if self.contains_position(target)
            && !spread
            && (move_range.contains_position(&self.start) || move_range.contains_position(&self.end))
        {
            let start = self.start.get_transformed_by_move(source, target, how_many);
            let end = self.end.get_transformed_by_move(source, target, how_many);
            return vec![Range::ordered(start, end)];
        }

        let difference_set = self.get_difference(&move_range);
        let common = self.get_intersection(&move_range);

        let difference = match difference_set.as_slice() {
            [only] => {
                let start = only
                    .start
                    .get_transformed_by_deletion(source, how_many)
                    .unwrap_or_else(|| source.clone());
                let end = only
                    .end
                    .get_transformed_by_deletion(source, how_many)
                    .unwrap_or_else(|| source.clone());
                Some(Range::ordered(start, end))
            }
            [_, _] => {
                let end = self
                    .end
                    .get_transformed_by_deletion(source, how_many)
                    .unwrap_or_else(|| source.clone());
                Some(Range::ordered(self.start.clone(), end))
            }
            _ => None,
        };

        let mut result = match difference {
            Some(range) => {
                range.get_transformed_by_insertion(&insert_position, how_many, common.is_some() || spread)
            }
            None => Vec::new(),
        };

        if let Some(common) = common {
            let moved = Range::from_parts(
                common.start.get_combined(&move_range.start, &insert_position),
                common.end.get_combined(&move_range.start, &insert_position),
            );
            if result.len() == 2 {
                result.insert(1, moved);
            } else {
                result.push(moved);
            }
        }
        result
    }

    pub fn get_transformed_by_operation(&self, op: &Operation) -> Vec<Range> {
        match &op.kind {
            OperationKind::Insert { position, nodes } => {
                self.get_transformed_by_insertion(position, offset_size_of(nodes), false)
            }
            OperationKind::Move {
                source,
                how_many,
                target,
            } => self.get_transformed_by_move(source, target, *how_many, false),
            _ => vec![self.clone()],
        }
    }

    /// Smallest range covering every piece located in the root of the first piece.
    pub fn spanning(ranges: &[Range]) -> Option<Range> {
        let first = ranges.first()?;
        let root = first.root().clone();
        let mut start = first.start.clone();
        let mut end = first.end.clone();
        for range in ranges.iter().skip(1).filter(|r| r.root() == &root) {
            if range.start.is_before(&start) {
                start = range.start.clone();
            }
            if range.end.is_after(&end) {
                end = range.end.clone();
            }
        }
        Some(Range::from_parts(start, end))
    }

    pub(crate) fn ordered(a: Position, b: Position) -> Range {
        match a.compare(&b) {
            Some(Ordering::Greater) => Range::from_parts(b, a),
            _ => Range::from_parts(a, b),
        }
    }
}
