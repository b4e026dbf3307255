//! Markers and live ranges.
//!
//! Both are ranges the document keeps up to date after every applied operation. Markers are
//! named, serialised with the document and changed only through marker operations; live
//! ranges are anonymous handles owned by the caller.

use std::collections::BTreeMap;

use crate::ids::LiveRangeId;
use crate::ops::{Operation, OperationKind};
use crate::range::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Marker {
    pub name: String,
    pub range: Range,
    #[cfg_attr(feature = "serde", serde(default))]
    pub affects_data: bool,
}

/// Range after `op`, following the content it covered.
///
/// Pieces moved to the graveyard are dropped. When nothing remains, the range collapses at
/// the point the content was removed from instead of disappearing.
pub fn transform_live_range(range: &Range, op: &Operation) -> Range {
    let pieces = range.get_transformed_by_operation(op);
    let in_graveyard = range.root().is_graveyard();
    let kept: Vec<Range> = pieces
        .into_iter()
        .filter(|piece| in_graveyard || !piece.root().is_graveyard())
        .collect();
    if let Some(joined) = Range::spanning(&kept) {
        return joined;
    }
    match &op.kind {
        OperationKind::Move { source, .. } => Range::collapsed(source.clone()),
        _ => range.clone(),
    }
}

/// Named markers of a document, ordered by name.
#[derive(Clone, Debug, Default)]
pub struct MarkerCollection {
    markers: BTreeMap<String, Marker>,
}

impl MarkerCollection {
    pub fn get(&self, name: &str) -> Option<&Marker> {
        self.markers.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.markers.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub(crate) fn set(&mut self, marker: Marker) {
        self.markers.insert(marker.name.clone(), marker);
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Marker> {
        self.markers.remove(name)
    }

    /// Re-bases every marker onto the state after `op`. Returns `(name, old, new)` for the
    /// markers whose range changed.
    pub(crate) fn transform(&mut self, op: &Operation) -> Vec<(String, Range, Range)> {
        let mut changed = Vec::new();
        for marker in self.markers.values_mut() {
            let range = transform_live_range(&marker.range, op);
            if range != marker.range {
                let old = std::mem::replace(&mut marker.range, range.clone());
                changed.push((marker.name.clone(), old, range));
            }
        }
        changed
    }
}

/// Anonymous ranges kept in sync with the document.
#[derive(Clone, Debug, Default)]
pub struct LiveRanges {
    next: u64,
    ranges: BTreeMap<LiveRangeId, Range>,
}

impl LiveRanges {
    pub fn create(&mut self, range: Range) -> LiveRangeId {
        self.next += 1;
        let id = LiveRangeId(self.next);
        self.ranges.insert(id, range);
        id
    }

    pub fn get(&self, id: LiveRangeId) -> Option<&Range> {
        self.ranges.get(&id)
    }

    pub fn detach(&mut self, id: LiveRangeId) -> Option<Range> {
        self.ranges.remove(&id)
    }

    pub(crate) fn transform(&mut self, op: &Operation) {
        for range in self.ranges.values_mut() {
            *range = transform_live_range(range, op);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ReplicaId;
    use crate::node::Node;
    use crate::position::Position;

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec()).unwrap()
    }

    fn range(start: &[usize], end: &[usize]) -> Range {
        Range::new(pos(start), pos(end)).unwrap()
    }

    #[test]
    fn removed_content_collapses_range() {
        let origin = ReplicaId::new(b"a");
        let removal = Operation::remove(&origin, 0, pos(&[0, 1]), 5);
        let transformed = transform_live_range(&range(&[0, 2], &[0, 4]), &removal);
        assert_eq!(transformed, Range::collapsed(pos(&[0, 1])));
    }

    #[test]
    fn partially_removed_range_shrinks() {
        let origin = ReplicaId::new(b"a");
        let removal = Operation::remove(&origin, 0, pos(&[0, 3]), 4);
        let transformed = transform_live_range(&range(&[0, 1], &[0, 5]), &removal);
        assert_eq!(transformed, range(&[0, 1], &[0, 3]));
    }

    #[test]
    fn markers_report_changed_ranges() {
        let origin = ReplicaId::new(b"a");
        let mut markers = MarkerCollection::default();
        markers.set(Marker {
            name: "comment:1".into(),
            range: range(&[0, 2], &[0, 4]),
            affects_data: false,
        });
        markers.set(Marker {
            name: "comment:2".into(),
            range: range(&[1, 0], &[1, 1]),
            affects_data: false,
        });
        let insert = Operation::insert(&origin, 0, pos(&[0, 0]), vec![Node::text("xy")]);
        let changed = markers.transform(&insert);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].0, "comment:1");
        assert_eq!(markers.get("comment:1").unwrap().range, range(&[0, 4], &[0, 6]));
    }

    #[test]
    fn live_ranges_follow_moves() {
        let origin = ReplicaId::new(b"a");
        let mut live = LiveRanges::default();
        let id = live.create(range(&[0, 2], &[0, 4]));
        live.transform(&Operation::move_range(&origin, 0, pos(&[0, 0]), 5, pos(&[1, 0])));
        assert_eq!(live.get(id), Some(&range(&[1, 2], &[1, 4])));
        assert!(live.detach(id).is_some());
        assert_eq!(live.get(id), None);
    }
}
