//! Operational transformation.
//!
//! `transform(a, b)` rewrites `a` so it can be applied after `b`, where both were created
//! against the same document version. Applying `b` then `transform(a, b)` leaves the visible
//! roots in the same state as applying `a` then `transform(b, a)` with the flipped context.

use tracing::trace;

use crate::attributes::AttributeValue;
use crate::markers::transform_live_range;
use crate::node::{offset_size_of, Node};
use crate::ops::{Operation, OperationKind};
use crate::position::{path_relation, PathRelation, Position, Stickiness};
use crate::range::Range;

/// Tie-break input for operations with equal origins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransformContext {
    /// Whether `a` wins conflicts when both operations come from the same origin.
    pub a_is_strong: bool,
}

impl TransformContext {
    pub fn new(a_is_strong: bool) -> Self {
        Self { a_is_strong }
    }

    /// Context for transforming `b` against `a`.
    pub fn flipped(&self) -> Self {
        Self {
            a_is_strong: !self.a_is_strong,
        }
    }
}

/// Whether `a` has priority over `b`. Lower origin bytes win; equal origins fall back to
/// the context.
pub fn a_wins(a: &Operation, b: &Operation, context: &TransformContext) -> bool {
    match a.meta.origin.cmp(&b.meta.origin) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Greater => false,
        std::cmp::Ordering::Equal => context.a_is_strong,
    }
}

/// Transforms `a` against the already applied `b`.
pub fn transform(a: &Operation, b: &Operation, context: &TransformContext) -> Vec<Operation> {
    use OperationKind::*;

    let wins = a_wins(a, b, context);
    let kinds = match (&a.kind, &b.kind) {
        (NoOp, _) => vec![NoOp],
        _ if leaves_content_in_place(a) => vec![NoOp],
        (_, NoOp) => vec![a.kind.clone()],
        _ if leaves_content_in_place(b) => vec![a.kind.clone()],

        (Insert { position, nodes }, Insert { position: other, nodes: inserted }) => {
            vec![insert_by_insert(position, nodes, other, offset_size_of(inserted), wins)]
        }
        (
            Insert { position, nodes },
            Move {
                source,
                how_many,
                target,
            },
        ) => vec![Insert {
            position: plain(
                plain(position.clone()).get_transformed_by_move(source, target, *how_many),
            ),
            nodes: nodes.clone(),
        }],

        (
            Move {
                source,
                how_many,
                target,
            },
            Insert {
                position,
                nodes,
            },
        ) => vec![move_by_insert(source, *how_many, target, position, offset_size_of(nodes))],
        (Move { .. }, Move { .. }) => move_by_move(a, b, wins),

        (
            Attribute {
                range,
                key,
                old_value,
                new_value,
            },
            Insert { position, nodes },
        ) => {
            let spread = range.start.has_same_parent_as(position) && range.contains_position(position);
            let pieces = range.get_transformed_by_insertion(position, offset_size_of(nodes), spread);
            attributes_from(pieces, key, old_value, new_value)
        }
        (
            Attribute {
                range,
                key,
                old_value,
                new_value,
            },
            Move {
                source,
                how_many,
                target,
            },
        ) => {
            // Pieces follow removed content into the graveyard so that both sides agree if
            // it is moved back out later.
            let pieces: Vec<Range> = break_range_by_move(range, source, *how_many, target)
                .into_iter()
                .filter(|piece| !piece.is_collapsed())
                .collect();
            attributes_from(pieces, key, old_value, new_value)
        }
        (
            Attribute {
                range,
                key,
                old_value,
                new_value,
            },
            Attribute {
                range: other,
                key: other_key,
                new_value: other_new,
                ..
            },
        ) if key == other_key && range.start.has_same_parent_as(&other.start) => {
            let mut kinds = attributes_from(range.get_difference(other), key, old_value, new_value);
            kinds.retain(|k| !matches!(k, NoOp));
            if let Some(common) = range.get_intersection(other) {
                if wins && other_new != new_value {
                    kinds.push(Attribute {
                        range: common,
                        key: key.clone(),
                        old_value: other_new.clone(),
                        new_value: new_value.clone(),
                    });
                }
            }
            if kinds.is_empty() {
                vec![NoOp]
            } else {
                kinds
            }
        }

        (
            Rename {
                position,
                old_name,
                new_name,
            },
            Insert {
                position: inserted_at,
                nodes,
            },
        ) => vec![Rename {
            position: plain(
                position
                    .clone()
                    .with_stickiness(Stickiness::ToNext)
                    .get_transformed_by_insertion(inserted_at, offset_size_of(nodes)),
            ),
            old_name: old_name.clone(),
            new_name: new_name.clone(),
        }],
        (
            Rename {
                position,
                old_name,
                new_name,
            },
            Move {
                source,
                how_many,
                target,
            },
        ) => vec![Rename {
            position: plain(
                position
                    .clone()
                    .with_stickiness(Stickiness::ToNext)
                    .get_transformed_by_move(source, target, *how_many),
            ),
            old_name: old_name.clone(),
            new_name: new_name.clone(),
        }],
        (
            Rename {
                position,
                new_name,
                ..
            },
            Rename {
                position: other,
                new_name: other_new,
                ..
            },
        ) if position == other => {
            if wins {
                vec![Rename {
                    position: position.clone(),
                    old_name: other_new.clone(),
                    new_name: new_name.clone(),
                }]
            } else {
                vec![NoOp]
            }
        }

        (
            Marker {
                name,
                old_range,
                new_range,
                affects_data,
            },
            Insert { .. } | Move { .. },
        ) => vec![Marker {
            name: name.clone(),
            old_range: old_range.as_ref().map(|r| transform_live_range(r, b)),
            new_range: new_range.as_ref().map(|r| transform_live_range(r, b)),
            affects_data: *affects_data,
        }],
        (
            Marker {
                name,
                new_range,
                affects_data,
                ..
            },
            Marker {
                name: other,
                new_range: other_new,
                ..
            },
        ) if name == other => {
            if wins {
                vec![Marker {
                    name: name.clone(),
                    old_range: other_new.clone(),
                    new_range: new_range.clone(),
                    affects_data: *affects_data,
                }]
            } else {
                vec![NoOp]
            }
        }

        _ => vec![a.kind.clone()],
    };

    trace!(
        a = ?a.operation_type(),
        b = ?b.operation_type(),
        results = kinds.len(),
        "transformed operation"
    );

    kinds
        .into_iter()
        .enumerate()
        .map(|(i, kind)| Operation::new(&a.meta.origin, b.meta.base_version + 1 + i as u64, kind))
        .collect()
}

/// Transforms two operation sequences created against the same version against each other.
///
/// Returns `(a', b')` where `a'` applies after `b` and `b'` applies after `a`.
pub fn transform_sets(
    a_ops: &[Operation],
    b_ops: &[Operation],
    context: &TransformContext,
) -> (Vec<Operation>, Vec<Operation>) {
    let mut b_out = b_ops.to_vec();
    let mut a_out = Vec::with_capacity(a_ops.len());
    for a in a_ops {
        // Pieces of `a` waiting to be transformed, with the index of the first `b` they have
        // not met yet. Every `b` before that index already applies after the piece.
        let mut pending = vec![(a.clone(), 0usize)];
        'pieces: while let Some((mut op, mut next)) = pending.pop() {
            while next < b_out.len() {
                let transformed = transform(&op, &b_out[next], context);
                let b_pieces = transform(&b_out[next], &op, &context.flipped());
                let met = b_pieces.len();
                b_out.splice(next..next + 1, b_pieces);
                next += met;

                let mut transformed = transformed.into_iter();
                let Some(first) = transformed.next() else {
                    continue 'pieces;
                };
                let rest: Vec<Operation> = transformed.collect();
                pending.extend(rest.into_iter().rev().map(|piece| (piece, next)));
                op = first;
            }
            a_out.push(op);
        }
    }
    (a_out, b_out)
}

/// A move whose content lands where it already is.
fn leaves_content_in_place(op: &Operation) -> bool {
    match &op.kind {
        OperationKind::Move { source, .. } => op.moved_range_start().as_ref() == Some(source),
        _ => false,
    }
}

fn plain(position: Position) -> Position {
    position.with_stickiness(Stickiness::ToNone)
}

fn insert_by_insert(
    position: &Position,
    nodes: &[Node],
    other: &Position,
    inserted: usize,
    wins: bool,
) -> OperationKind {
    let stickiness = if position == other && wins {
        Stickiness::ToPrevious
    } else {
        Stickiness::ToNone
    };
    let position = position
        .clone()
        .with_stickiness(stickiness)
        .get_transformed_by_insertion(other, inserted);
    OperationKind::Insert {
        position: plain(position),
        nodes: nodes.to_vec(),
    }
}

fn move_by_insert(
    source: &Position,
    how_many: usize,
    target: &Position,
    inserted_at: &Position,
    inserted: usize,
) -> OperationKind {
    let moved = Range::from_position_and_shift(source, how_many);
    let (source, how_many) = match moved
        .get_transformed_by_insertion(inserted_at, inserted, false)
        .into_iter()
        .next()
    {
        Some(range) => {
            let len = range.flat_len();
            (plain(range.start), len)
        }
        None => (source.clone(), how_many),
    };
    // Moved content lands before content inserted at the same spot.
    let target = if target == inserted_at {
        target.clone()
    } else {
        plain(plain(target.clone()).get_transformed_by_insertion(inserted_at, inserted))
    };
    OperationKind::Move {
        source,
        how_many,
        target,
    }
}

fn move_by_move(a: &Operation, b: &Operation, wins: bool) -> Vec<OperationKind> {
    let (
        OperationKind::Move {
            source: source_a,
            how_many: len_a,
            target: target_a,
        },
        OperationKind::Move {
            source: source_b,
            how_many: len_b,
            target: target_b,
        },
    ) = (&a.kind, &b.kind)
    else {
        return vec![a.kind.clone()];
    };
    let (len_a, len_b) = (*len_a, *len_b);
    let range_a = Range::from_position_and_shift(source_a, len_a);
    let range_b = Range::from_position_and_shift(source_b, len_b);
    let a_removal = a.is_removal();
    let b_removal = b.is_removal();

    // `b` moved content into the range `a` moves, so it travels with the rest. The opposite
    // side needs no rule: `b`'s target follows `a`'s content, into the graveyard for a removal.
    let carries = !b_removal && range_a.contains_position(target_b);
    let absorbs = a_removal && carries;
    // Both moves target the inside of each other's range.
    if target_a.get_transformed_by_deletion(source_b, len_b).is_none()
        && target_b.get_transformed_by_deletion(source_a, len_a).is_none()
    {
        return vec![b.get_reversed().kind];
    }

    let new_target = if target_a == target_b && wins {
        target_a
            .get_transformed_by_deletion(source_b, len_b)
            .unwrap_or_else(|| target_a.clone())
    } else {
        plain(target_a.clone()).get_transformed_by_move(source_b, target_b, len_b)
    };
    let new_target = plain(new_target);

    // `b` moves content inside the range `a` moves.
    // `b`'s target lies strictly inside `a`'s range, so plain boundaries never follow its content.
    if range_a.contains_position(target_b) && range_a.contains_range(&range_b, true) {
        let start = plain(range_a.start.clone()).get_transformed_by_move(source_b, target_b, len_b);
        let end = plain(range_a.end.clone()).get_transformed_by_move(source_b, target_b, len_b);
        return make_moves(vec![Range::ordered(start, end)], new_target);
    }

    let moved_start_b = b.moved_range_start().unwrap_or_else(|| target_b.clone());

    // `a` moves content that `b` carries along.
    if range_b.contains_position(target_a) && range_b.contains_range(&range_a, true) {
        let start = range_a.start.get_combined(source_b, &moved_start_b);
        let end = range_a.end.get_combined(source_b, &moved_start_b);
        return make_moves(vec![Range::ordered(start, end)], new_target);
    }

    // Ranges on different levels of the same branch do not conflict.
    if source_a.root == source_b.root
        && matches!(
            path_relation(source_a.parent_path(), source_b.parent_path()),
            PathRelation::Prefix | PathRelation::Extension
        )
    {
        let start = range_a.start.get_transformed_by_move(source_b, target_b, len_b);
        let end = range_a.end.get_transformed_by_move(source_b, target_b, len_b);
        return make_moves(vec![Range::ordered(start, end)], new_target);
    }

    let a_strong = match (a_removal, b_removal) {
        (true, false) => true,
        (false, true) => false,
        _ => wins,
    };

    let mut ranges = Vec::new();
    for difference in range_a.get_difference(&range_b) {
        let Some(difference) = difference.get_transformed_by_deletion(source_b, len_b) else {
            continue;
        };
        let spread = !carries && difference.start.has_same_parent_as(&moved_start_b);
        ranges.extend(difference.get_transformed_by_insertion(&moved_start_b, len_b, spread));
    }

    // For two removals the stronger one moves the common part inside the graveyard, which
    // keeps the graveyard layout identical on both sides.
    if let Some(common) = range_a.get_intersection(&range_b) {
        if a_strong && !absorbs {
            let common = Range::ordered(
                common.start.get_combined(source_b, &moved_start_b),
                common.end.get_combined(source_b, &moved_start_b),
            );
            match ranges.len() {
                0 => ranges.push(common),
                1 => {
                    if !range_b.start.is_after(&range_a.start) {
                        ranges.insert(0, common);
                    } else {
                        ranges.push(common);
                    }
                }
                _ => ranges.insert(1, common),
            }
        }
    }

    if ranges.is_empty() {
        return vec![OperationKind::NoOp];
    }
    make_moves(ranges, new_target)
}

/// Turns source pieces into consecutive moves gathering the content at `target`.
fn make_moves(mut ranges: Vec<Range>, mut target: Position) -> Vec<OperationKind> {
    let mut kinds = Vec::with_capacity(ranges.len());
    for i in 0..ranges.len() {
        let range = ranges[i].clone();
        let how_many = range.flat_len();
        if how_many == 0 {
            continue;
        }
        let source = plain(range.start);
        let target_now = plain(target.clone());
        let landed = target_now
            .get_transformed_by_deletion(&source, how_many)
            .unwrap_or_else(|| target_now.clone());
        // The next piece goes right after this one, even when this one is already in place.
        target = landed.get_shifted_by(how_many as isize);
        if landed == source {
            continue;
        }
        for later in ranges.iter_mut().skip(i + 1) {
            if let Some(first) = later
                .get_transformed_by_move(&source, &target_now, how_many, false)
                .into_iter()
                .next()
            {
                *later = first;
            }
        }
        kinds.push(OperationKind::Move {
            source,
            how_many,
            target: target_now,
        });
    }
    if kinds.is_empty() {
        kinds.push(OperationKind::NoOp);
    }
    kinds
}

/// Pieces of `range` after a move: the part carried along with the moved content and the
/// parts left behind.
fn break_range_by_move(range: &Range, source: &Position, how_many: usize, target: &Position) -> Vec<Range> {
    let moved = Range::from_position_and_shift(source, how_many);
    let moved_start = target
        .get_transformed_by_deletion(source, how_many)
        .unwrap_or_else(|| target.clone());

    let (common, difference) = if moved.contains_range(range, true) {
        (Some(range.clone()), Vec::new())
    } else if range.start.has_same_parent_as(&moved.start) {
        (range.get_intersection(&moved), range.get_difference(&moved))
    } else {
        (None, vec![range.clone()])
    };

    let mut pieces = Vec::new();
    for difference in difference {
        let Some(difference) = difference.get_transformed_by_deletion(source, how_many) else {
            continue;
        };
        let spread = difference.start.has_same_parent_as(&moved_start);
        pieces.extend(difference.get_transformed_by_insertion(&moved_start, how_many, spread));
    }
    if let Some(common) = common {
        pieces.extend(
            common
                .get_transformed_by_move(source, target, how_many, false)
                .into_iter()
                .next(),
        );
    }
    pieces
}

fn attributes_from(
    pieces: Vec<Range>,
    key: &str,
    old_value: &Option<AttributeValue>,
    new_value: &Option<AttributeValue>,
) -> Vec<OperationKind> {
    if pieces.is_empty() {
        return vec![OperationKind::NoOp];
    }
    pieces
        .into_iter()
        .map(|range| OperationKind::Attribute {
            range,
            key: key.to_string(),
            old_value: old_value.clone(),
            new_value: new_value.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ReplicaId, RootName};

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec()).unwrap()
    }

    fn range(start: &[usize], end: &[usize]) -> Range {
        Range::new(pos(start), pos(end)).unwrap()
    }

    fn a() -> ReplicaId {
        ReplicaId::new(b"A")
    }

    fn b() -> ReplicaId {
        ReplicaId::new(b"B")
    }

    fn ctx() -> TransformContext {
        TransformContext::default()
    }

    fn only(ops: Vec<Operation>) -> OperationKind {
        assert_eq!(ops.len(), 1, "expected a single operation, got {ops:?}");
        ops.into_iter().next().unwrap().kind
    }

    #[test]
    fn concurrent_inserts_order_by_origin() {
        let from_a = Operation::insert(&a(), 0, pos(&[0, 3]), vec![Node::text("aa")]);
        let from_b = Operation::insert(&b(), 0, pos(&[0, 3]), vec![Node::text("bbb")]);
        match only(transform(&from_a, &from_b, &ctx())) {
            OperationKind::Insert { position, .. } => assert_eq!(position, pos(&[0, 3])),
            other => panic!("unexpected {other:?}"),
        }
        match only(transform(&from_b, &from_a, &ctx())) {
            OperationKind::Insert { position, .. } => assert_eq!(position, pos(&[0, 5])),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn equal_origins_use_context() {
        let first = Operation::insert(&a(), 0, pos(&[0, 1]), vec![Node::text("x")]);
        let second = Operation::insert(&a(), 0, pos(&[0, 1]), vec![Node::text("y")]);
        let strong = TransformContext::new(true);
        match only(transform(&first, &second, &strong)) {
            OperationKind::Insert { position, .. } => assert_eq!(position, pos(&[0, 1])),
            other => panic!("unexpected {other:?}"),
        }
        match only(transform(&second, &first, &strong.flipped())) {
            OperationKind::Insert { position, .. } => assert_eq!(position, pos(&[0, 2])),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn attribute_follows_moved_content() {
        let moved = Operation::move_range(&a(), 0, pos(&[0, 0]), 5, pos(&[1, 0]));
        let bold = Operation::attribute(&b(), 0, range(&[0, 2], &[0, 4]), "bold", None, Some(true.into()));
        match only(transform(&bold, &moved, &ctx())) {
            OperationKind::Attribute { range: r, .. } => assert_eq!(r, range(&[1, 2], &[1, 4])),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn attribute_on_removed_content_follows_it() {
        let graveyard = |start: usize, end: usize| {
            Range::new(
                Position::new(RootName::GRAVEYARD, vec![start]).unwrap(),
                Position::new(RootName::GRAVEYARD, vec![end]).unwrap(),
            )
            .unwrap()
        };
        let removal = Operation::remove(&a(), 0, pos(&[0, 0]), 6);
        let bold = Operation::attribute(&b(), 0, range(&[0, 1], &[0, 3]), "bold", None, Some(true.into()));
        match only(transform(&bold, &removal, &ctx())) {
            OperationKind::Attribute { range: r, .. } => assert_eq!(r, graveyard(1, 3)),
            other => panic!("unexpected {other:?}"),
        }

        let partial = Operation::remove(&a(), 0, pos(&[0, 2]), 4);
        let ranges: Vec<Range> = transform(&bold, &partial, &ctx())
            .into_iter()
            .map(|op| match op.kind {
                OperationKind::Attribute { range, .. } => range,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(ranges, vec![range(&[0, 1], &[0, 2]), graveyard(0, 1)]);
    }

    #[test]
    fn attribute_spreads_around_insertion() {
        let insert = Operation::insert(&a(), 0, pos(&[0, 2]), vec![Node::text("xy")]);
        let bold = Operation::attribute(&b(), 0, range(&[0, 1], &[0, 4]), "bold", None, Some(true.into()));
        let ranges: Vec<Range> = transform(&bold, &insert, &ctx())
            .into_iter()
            .map(|op| match op.kind {
                OperationKind::Attribute { range, .. } => range,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(ranges, vec![range(&[0, 1], &[0, 2]), range(&[0, 4], &[0, 6])]);
    }

    #[test]
    fn conflicting_attributes_keep_winner() {
        let winner = Operation::attribute(&a(), 0, range(&[0, 0], &[0, 4]), "color", None, Some("red".into()));
        let loser = Operation::attribute(&b(), 0, range(&[0, 2], &[0, 6]), "color", None, Some("blue".into()));
        let rebased = transform(&winner, &loser, &ctx());
        assert_eq!(rebased.len(), 2);
        assert_eq!(
            rebased[1].kind,
            OperationKind::Attribute {
                range: range(&[0, 2], &[0, 4]),
                key: "color".into(),
                old_value: Some("blue".into()),
                new_value: Some("red".into()),
            }
        );
        match only(transform(&loser, &winner, &ctx())) {
            OperationKind::Attribute { range: r, .. } => assert_eq!(r, range(&[0, 4], &[0, 6])),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn move_into_removed_content_follows_it_to_the_graveyard() {
        let removal = Operation::remove(&a(), 0, pos(&[1, 0]), 1);
        let into_removed = Operation::move_range(&b(), 0, pos(&[0, 0]), 2, pos(&[1, 0, 1]));
        match only(transform(&into_removed, &removal, &ctx())) {
            OperationKind::Move {
                source,
                how_many,
                target,
            } => {
                assert_eq!(source, pos(&[0, 0]));
                assert_eq!(how_many, 2);
                assert_eq!(target, Position::new(RootName::GRAVEYARD, vec![0, 1]).unwrap());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(only(transform(&removal, &into_removed, &ctx())), removal.kind);
    }

    #[test]
    fn removal_covers_content_moved_into_it() {
        let removal = Operation::remove(&a(), 0, pos(&[0, 2]), 4);
        let into_removed = Operation::move_range(&b(), 0, pos(&[0, 8]), 1, pos(&[0, 4]));
        match only(transform(&removal, &into_removed, &ctx())) {
            OperationKind::Move { source, how_many, .. } => {
                assert_eq!(source, pos(&[0, 2]));
                assert_eq!(how_many, 5);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn pieces_already_in_place_keep_their_order() {
        // Merge of paragraph 1 into paragraph 0 against a move of "g" to the end of paragraph 0.
        let merge = Operation::move_range(&a(), 0, pos(&[1, 0]), 4, pos(&[0, 4]));
        let moved = Operation::move_range(&b(), 0, pos(&[1, 2]), 1, pos(&[0, 4]));
        let kinds: Vec<OperationKind> = transform(&merge, &moved, &ctx()).into_iter().map(|op| op.kind).collect();
        assert_eq!(
            kinds,
            vec![
                OperationKind::Move {
                    source: pos(&[1, 0]),
                    how_many: 2,
                    target: pos(&[0, 4]),
                },
                OperationKind::Move {
                    source: pos(&[1, 0]),
                    how_many: 1,
                    target: pos(&[0, 7]),
                },
            ]
        );
    }

    #[test]
    fn moves_that_leave_content_in_place_are_ignored() {
        let insert = Operation::insert(&a(), 0, pos(&[0, 2]), vec![Node::text("xy")]);
        let in_place = Operation::move_range(&b(), 0, pos(&[0, 2]), 2, pos(&[0, 2]));
        assert_eq!(only(transform(&insert, &in_place, &ctx())), insert.kind);
        assert_eq!(only(transform(&in_place, &insert, &ctx())), OperationKind::NoOp);
    }

    #[test]
    fn content_moved_into_a_moved_range_travels_with_it() {
        // Split of "efgh" after "f" against "bc" moved between "g" and "h".
        let tail = Operation::move_range(&a(), 0, pos(&[1, 2]), 2, pos(&[2, 0]));
        let into_tail = Operation::move_range(&b(), 0, pos(&[0, 1]), 2, pos(&[1, 3]));
        assert_eq!(
            only(transform(&tail, &into_tail, &ctx())),
            OperationKind::Move {
                source: pos(&[1, 2]),
                how_many: 4,
                target: pos(&[2, 0]),
            }
        );
        assert_eq!(
            only(transform(&into_tail, &tail, &ctx())),
            OperationKind::Move {
                source: pos(&[0, 1]),
                how_many: 2,
                target: pos(&[2, 1]),
            }
        );
    }

    #[test]
    fn stronger_removal_reorders_the_graveyard() {
        let graveyard = |offset: usize| Position::new(RootName::GRAVEYARD, vec![offset]).unwrap();
        let first = Operation::remove(&a(), 0, pos(&[0, 2]), 3);
        let second = Operation::remove(&b(), 0, pos(&[0, 1]), 3);
        let kinds: Vec<OperationKind> = transform(&first, &second, &ctx()).into_iter().map(|op| op.kind).collect();
        assert_eq!(
            kinds,
            vec![
                OperationKind::Move {
                    source: graveyard(1),
                    how_many: 2,
                    target: graveyard(0),
                },
                OperationKind::Move {
                    source: pos(&[0, 1]),
                    how_many: 1,
                    target: graveyard(2),
                },
            ]
        );
        assert_eq!(
            only(transform(&second, &first, &ctx())),
            OperationKind::Move {
                source: pos(&[0, 1]),
                how_many: 1,
                target: graveyard(3),
            }
        );
    }

    #[test]
    fn overlapping_removals_remove_the_rest() {
        let first = Operation::remove(&a(), 0, pos(&[0, 2]), 3);
        let second = Operation::remove(&b(), 0, pos(&[0, 3]), 3);
        match only(transform(&first, &second, &ctx())) {
            OperationKind::Move { source, how_many, .. } => {
                assert_eq!(source, pos(&[0, 2]));
                assert_eq!(how_many, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        let same = Operation::remove(&b(), 0, pos(&[0, 2]), 3);
        assert_eq!(only(transform(&first, &same, &ctx())), OperationKind::NoOp);
    }

    #[test]
    fn rename_follows_moved_element() {
        let moved = Operation::move_range(&a(), 0, pos(&[0]), 1, pos(&[3]));
        let rename = Operation::rename(&b(), 0, pos(&[0]), "paragraph", "heading");
        match only(transform(&rename, &moved, &ctx())) {
            OperationKind::Rename { position, .. } => assert_eq!(position, pos(&[2])),
            other => panic!("unexpected {other:?}"),
        }
        let other = Operation::rename(&a(), 0, pos(&[0]), "paragraph", "quote");
        match only(transform(&other, &rename, &ctx())) {
            OperationKind::Rename { old_name, .. } => assert_eq!(old_name, "heading"),
            kind => panic!("unexpected {kind:?}"),
        }
        assert_eq!(only(transform(&rename, &other, &ctx())), OperationKind::NoOp);
    }

    #[test]
    fn transform_sets_restamps_against_every_operation() {
        let local = vec![
            Operation::insert(&a(), 0, pos(&[0, 0]), vec![Node::text("ab")]),
            Operation::insert(&a(), 1, pos(&[0, 2]), vec![Node::text("cd")]),
        ];
        let remote = vec![Operation::insert(&b(), 0, pos(&[0, 0]), vec![Node::text("x")])];
        let (remote_after, local_after) = transform_sets(&remote, &local, &TransformContext::default());
        match only(remote_after) {
            OperationKind::Insert { position, .. } => assert_eq!(position, pos(&[0, 4])),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(local_after.len(), 2);
    }

    #[test]
    fn transform_sets_handles_long_histories() {
        let local: Vec<Operation> = (0..5000)
            .map(|i| Operation::insert(&a(), i, pos(&[0, i as usize]), vec![Node::text("x")]))
            .collect();
        let remote = vec![Operation::insert(&b(), 0, pos(&[0, 0]), vec![Node::text("y")])];
        let (remote_after, local_after) = transform_sets(&remote, &local, &ctx());
        match only(remote_after) {
            OperationKind::Insert { position, .. } => assert_eq!(position, pos(&[0, 5000])),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(local_after.len(), 5000);
    }
}
