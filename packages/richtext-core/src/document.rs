use tracing::{debug, trace, warn};

use crate::attributes::{AttributeValue, Attributes};
use crate::batch::{Batch, BatchType};
use crate::config::DocumentConfig;
use crate::differ::{Diff, Differ};
use crate::error::{Error, Result};
use crate::history::{History, UndoStack};
use crate::ids::{LiveRangeId, NodeIndex, ReplicaId, RootName, SubscriptionId, Version};
use crate::markers::{LiveRanges, Marker, MarkerCollection};
use crate::node::{offset_size_of, Node};
use crate::ops::{Operation, OperationKind, OperationType};
use crate::position::Position;
use crate::range::Range;
use crate::transform::{transform_sets, TransformContext};
use crate::tree::{Tree, ROOT_ELEMENT};
use crate::writer::Writer;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What a single applied operation did.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AppliedChange {
    pub operation_type: OperationType,
    /// Range covering the affected content after the operation, when there is one.
    pub range: Option<Range>,
}

/// Result of a closed writer scope.
#[derive(Clone, Debug)]
pub struct Committed<R> {
    pub value: R,
    pub batch: Batch,
    pub diff: Diff,
}

type Listener = Box<dyn FnMut(&Batch, &Diff)>;

/// A rich-text document: named roots, markers, history and change notification.
///
/// All mutations go through operations. Local code emits them with a [`Writer`] inside
/// [`Document::change`]; operations from other sessions enter through
/// [`Document::apply_remote`].
pub struct Document {
    config: DocumentConfig,
    origin: ReplicaId,
    tree: Tree,
    version: Version,
    history: History,
    undo: UndoStack,
    markers: MarkerCollection,
    live_ranges: LiveRanges,
    differ: Differ,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("origin", &self.origin)
            .field("version", &self.version)
            .field("roots", &self.tree.root_names().collect::<Vec<_>>())
            .field("markers", &self.markers.len())
            .finish_non_exhaustive()
    }
}

impl Document {
    /// Document with the default configuration and its default root.
    pub fn new(origin: ReplicaId) -> Self {
        Self::with_default_root(origin, DocumentConfig::default())
    }

    /// Fails when the configured default root is the graveyard.
    pub fn with_config(origin: ReplicaId, config: DocumentConfig) -> Result<Self> {
        Self::check_config(&config)?;
        Ok(Self::with_default_root(origin, config))
    }

    pub(crate) fn check_config(config: &DocumentConfig) -> Result<()> {
        if config.default_root.is_graveyard() {
            return Err(Error::InvalidOperation(
                "the graveyard root cannot be the default root".into(),
            ));
        }
        Ok(())
    }

    fn with_default_root(origin: ReplicaId, config: DocumentConfig) -> Self {
        let mut doc = Self::empty(origin, config);
        doc.tree = Tree::with_root(doc.config.default_root.clone(), ROOT_ELEMENT);
        doc
    }

    /// Document holding nothing but the graveyard root.
    pub(crate) fn empty(origin: ReplicaId, config: DocumentConfig) -> Self {
        let undo = UndoStack::new(config.history_limit);
        Self {
            config,
            origin,
            tree: Tree::new(),
            version: 0,
            history: History::starting_at(0),
            undo,
            markers: MarkerCollection::default(),
            live_ranges: LiveRanges::default(),
            differ: Differ::default(),
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Copy of the document state for another session. Undo history and subscribers are
    /// not carried over.
    pub fn fork(&self, origin: ReplicaId) -> Self {
        Self {
            config: self.config.clone(),
            origin,
            tree: self.tree.clone(),
            version: self.version,
            history: self.history.clone(),
            undo: UndoStack::new(self.config.history_limit),
            markers: self.markers.clone(),
            live_ranges: LiveRanges::default(),
            differ: Differ::default(),
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn add_root(&mut self, name: impl Into<RootName>, element_name: &str) -> Result<()> {
        let name = name.into();
        if name.is_graveyard() {
            return Err(Error::InvalidOperation("the graveyard root is reserved".into()));
        }
        self.tree.add_root(name, element_name).map(|_| ())
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    pub fn origin(&self) -> &ReplicaId {
        &self.origin
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    pub(crate) fn reset_history(&mut self, version: Version) {
        self.version = version;
        self.history = History::starting_at(version);
        self.undo = UndoStack::new(self.config.history_limit);
        self.differ.reset();
    }

    pub(crate) fn set_marker(&mut self, marker: Marker) {
        self.markers.set(marker);
    }

    pub fn has_root(&self, name: &RootName) -> bool {
        self.tree.has_root(name)
    }

    /// Names of every root except the graveyard.
    pub fn root_names(&self) -> Vec<RootName> {
        self.tree.visible_roots().map(|(name, _)| name.clone()).collect()
    }

    pub fn root_children(&self, root: &RootName) -> Result<Vec<Node>> {
        let index = self.tree.root(root)?;
        Ok(self.tree.children_nodes(index))
    }

    /// Detached copy of the element right after `position`.
    pub fn node_at(&self, position: &Position) -> Result<Node> {
        let index = self.tree.node_at(position)?;
        self.tree
            .to_node(index)
            .ok_or_else(|| Error::InvalidPosition(format!("no node at {:?}", position.path)))
    }

    pub fn markers(&self) -> &MarkerCollection {
        &self.markers
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    /// Whether the visible roots of both documents hold the same content.
    pub fn content_eq(&self, other: &Document) -> bool {
        let mine: Vec<_> = self.tree.visible_roots().collect();
        let theirs: Vec<_> = other.tree.visible_roots().collect();
        mine.len() == theirs.len()
            && mine.iter().zip(theirs.iter()).all(|((a_name, a), (b_name, b))| {
                a_name == b_name && self.tree.to_node(*a) == other.tree.to_node(*b)
            })
    }

    pub fn validate_invariants(&self) -> Result<()> {
        self.tree.validate_invariants()?;
        if self.history.version() != self.version {
            return Err(Error::InvalidOperation(format!(
                "history ends at {} but the document is at {}",
                self.history.version(),
                self.version
            )));
        }
        Ok(())
    }

    /// Local history starting at `version`, for peers catching up.
    pub fn operations_since(&self, version: Version) -> Result<Vec<Operation>> {
        self.history.operations_since(version)
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&Batch, &Diff) + 'static) -> SubscriptionId {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn create_live_range(&mut self, range: Range) -> LiveRangeId {
        self.live_ranges.create(range)
    }

    pub fn live_range(&self, id: LiveRangeId) -> Option<&Range> {
        self.live_ranges.get(id)
    }

    pub fn detach_live_range(&mut self, id: LiveRangeId) -> Option<Range> {
        self.live_ranges.detach(id)
    }

    /// Opens an undoable writer scope.
    pub fn change<R>(&mut self, f: impl FnOnce(&mut Writer<'_>) -> Result<R>) -> Result<Committed<R>> {
        self.change_with(BatchType::Default, f)
    }

    /// Opens a writer scope whose batch has the given type.
    ///
    /// The batch is sealed and published even when `f` fails; operations applied before
    /// the failure stay applied.
    pub fn change_with<R>(
        &mut self,
        batch_type: BatchType,
        f: impl FnOnce(&mut Writer<'_>) -> Result<R>,
    ) -> Result<Committed<R>> {
        let mut writer = Writer::new(self, Batch::new(batch_type));
        let value = f(&mut writer);
        let batch = writer.into_batch();
        let (batch, diff) = self.commit(batch);
        value.map(|value| Committed { value, batch, diff })
    }

    fn commit(&mut self, mut batch: Batch) -> (Batch, Diff) {
        batch.seal();
        let diff = self.differ.take_diff(&self.tree, self.config.coalesce_text_changes);
        self.undo.push(batch.clone(), self.version);
        self.trim_history();
        if !batch.is_empty() || !diff.is_empty() {
            for (_, listener) in self.listeners.iter_mut() {
                listener(&batch, &diff);
            }
        }
        (batch, diff)
    }

    fn trim_history(&mut self) {
        let limit = self.config.operation_log_limit;
        if limit == 0 {
            return;
        }
        let floor = self.version.saturating_sub(limit as Version);
        if floor > self.history.base() {
            trace!(floor, "trimming operation log");
            self.history.trim_before(floor);
            self.undo.drop_older_than(floor);
        }
    }

    /// Transforms operations from another session against everything applied locally since
    /// their base version and applies them in a `Remote` batch.
    ///
    /// `ops` must be consecutive: the first one created at some version `v`, the next at
    /// `v + 1` and so on.
    pub fn apply_remote(&mut self, ops: &[Operation]) -> Result<Committed<Vec<Operation>>> {
        let Some(first) = ops.first() else {
            return self.change_with(BatchType::Remote, |_| Ok(Vec::new()));
        };
        let base = first.base_version();
        if base > self.version {
            warn!(base, version = self.version, "remote operations are ahead of the document");
            return Err(Error::VersionConflict {
                expected: self.version,
                actual: base,
            });
        }
        for (i, op) in ops.iter().enumerate() {
            op.validate()?;
            if op.base_version() != base + i as Version {
                return Err(Error::InvalidOperation(format!(
                    "remote operation {} has base version {}, expected {}",
                    i,
                    op.base_version(),
                    base + i as Version
                )));
            }
            if let Some(root) = op.roots().into_iter().find(|root| !self.tree.has_root(root)) {
                warn!(%root, "remote operation references an unknown root");
                return Err(Error::CrossRootOperation(format!(
                    "remote operation references unknown root {root}"
                )));
            }
        }

        let local = self.history.operations_since(base)?;
        let (transformed, _) = transform_sets(ops, &local, &TransformContext::new(false));
        debug!(
            received = ops.len(),
            concurrent = local.len(),
            applying = transformed.len(),
            "ingesting remote operations"
        );
        self.change_with(BatchType::Remote, |writer| {
            let mut applied = Vec::with_capacity(transformed.len());
            for op in transformed {
                let op = op.with_base_version(writer.version());
                writer.apply_operation(op.clone())?;
                applied.push(op);
            }
            Ok(applied)
        })
    }

    /// Reverts the most recent undoable batch. Returns `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Result<Option<Committed<()>>> {
        let Some((batch, end_version)) = self.undo.pop_undo() else {
            return Ok(None);
        };
        self.revert(&batch, end_version, BatchType::Undo).map(Some)
    }

    /// Reverts the most recent undo. Returns `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Result<Option<Committed<()>>> {
        let Some((batch, end_version)) = self.undo.pop_redo() else {
            return Ok(None);
        };
        self.revert(&batch, end_version, BatchType::Redo).map(Some)
    }

    fn revert(&mut self, batch: &Batch, end_version: Version, batch_type: BatchType) -> Result<Committed<()>> {
        let reversed = batch.get_reversed();
        let since = self.history.operations_since(end_version)?;
        let (transformed, _) = transform_sets(&reversed, &since, &TransformContext::new(true));
        debug!(
            ?batch_type,
            reverting = reversed.len(),
            applied_since = since.len(),
            "reverting batch"
        );
        self.change_with(batch_type, |writer| {
            for op in transformed {
                let op = op.with_base_version(writer.version());
                writer.apply_operation(op)?;
            }
            Ok(())
        })
    }

    /// Validates and applies one operation created against the current version.
    ///
    /// Nothing is mutated when validation fails.
    pub fn apply_operation(&mut self, op: Operation) -> Result<AppliedChange> {
        if op.base_version() != self.version {
            trace!(expected = self.version, actual = op.base_version(), "version conflict");
            return Err(Error::VersionConflict {
                expected: self.version,
                actual: op.base_version(),
            });
        }

        op.validate()?;
        let range = match &op.kind {
            OperationKind::Insert { position, nodes } => self.apply_insert(position, nodes)?,
            OperationKind::Move {
                source,
                how_many,
                target,
            } => self.apply_move(source, *how_many, target)?,
            OperationKind::Attribute {
                range,
                key,
                old_value,
                new_value,
            } => self.apply_attribute(range, key, old_value, new_value)?,
            OperationKind::Rename {
                position,
                old_name,
                new_name,
            } => self.apply_rename(position, old_name, new_name)?,
            OperationKind::Marker {
                name,
                old_range,
                new_range,
                affects_data,
            } => self.apply_marker(name, old_range, new_range, *affects_data)?,
            OperationKind::NoOp => None,
        };

        if matches!(op.kind, OperationKind::Insert { .. } | OperationKind::Move { .. }) {
            for (name, old, new) in self.markers.transform(&op) {
                self.differ.buffer_marker_change(&name, Some(old), Some(new));
            }
            self.live_ranges.transform(&op);
        }

        self.version += 1;
        let operation_type = op.operation_type();
        debug!(version = self.version, ?operation_type, "applied operation");
        self.history.record(op);
        Ok(AppliedChange { operation_type, range })
    }

    fn apply_insert(&mut self, position: &Position, nodes: &[Node]) -> Result<Option<Range>> {
        if nodes.is_empty() {
            return Err(Error::InvalidOperation("insert without nodes".into()));
        }
        let parent = self.tree.resolve_parent(position)?;
        self.differ.buffer_children(&self.tree, parent);
        let created = self.tree.insert_children(parent, position.offset(), nodes)?;
        self.differ.mark_inserted(&created);
        self.tree.normalize(parent);
        Ok(Some(Range::from_position_and_shift(position, offset_size_of(nodes))))
    }

    fn apply_move(&mut self, source: &Position, how_many: usize, target: &Position) -> Result<Option<Range>> {
        let source_parent = self.tree.resolve_parent(source)?;
        let max = self.tree.max_offset(source_parent);
        if source.offset() + how_many > max {
            return Err(Error::InvalidRange(format!(
                "moved range {}..{} exceeds parent size {}",
                source.offset(),
                source.offset() + how_many,
                max
            )));
        }
        let target_parent = self.tree.resolve_parent(target)?;
        check_move_target(source, how_many, target)?;
        let landing = target
            .get_transformed_by_deletion(source, how_many)
            .ok_or_else(|| Error::InvalidOperation("cannot move a range into itself".into()))?;
        if how_many == 0 {
            return Ok(Some(Range::collapsed(landing)));
        }

        self.differ.buffer_children(&self.tree, source_parent);
        self.differ.buffer_children(&self.tree, target_parent);
        let nodes = self.tree.remove_children(source_parent, source.offset(), how_many)?;
        self.tree.normalize(source_parent);
        self.tree.attach_children(target_parent, landing.offset(), nodes)?;
        self.tree.normalize(target_parent);
        Ok(Some(Range::from_position_and_shift(&landing, how_many)))
    }

    fn apply_attribute(
        &mut self,
        range: &Range,
        key: &str,
        old_value: &Option<AttributeValue>,
        new_value: &Option<AttributeValue>,
    ) -> Result<Option<Range>> {
        for (run, value) in self.attribute_runs(range, key)? {
            if value != *old_value {
                return Err(Error::InvalidOperation(format!(
                    "attribute {key} on {:?}..{:?} is {:?}, expected {:?}",
                    run.start.path, run.end.path, value, old_value
                )));
            }
        }
        let parent = self.tree.resolve_parent(&range.start)?;
        self.differ.buffer_children(&self.tree, parent);
        for node in self.tree.isolate(parent, range.start.offset(), range.flat_len())? {
            self.tree.set_attribute(node, key, new_value.clone())?;
        }
        self.tree.normalize(parent);
        Ok(Some(range.clone()))
    }

    fn apply_rename(&mut self, position: &Position, old_name: &str, new_name: &str) -> Result<Option<Range>> {
        let parent = self.tree.resolve_parent(position)?;
        let node = self.child_starting_at(parent, position)?;
        match self.tree.name(node) {
            None => return Err(Error::InvalidOperation("only elements can be renamed".into())),
            Some(name) if name != old_name => {
                return Err(Error::InvalidOperation(format!(
                    "element is named {name}, expected {old_name}"
                )))
            }
            Some(_) => {}
        }
        self.differ.buffer_children(&self.tree, parent);
        self.tree.rename(node, new_name)?;
        Ok(Some(Range::from_position_and_shift(position, 1)))
    }

    fn apply_marker(
        &mut self,
        name: &str,
        old_range: &Option<Range>,
        new_range: &Option<Range>,
        affects_data: bool,
    ) -> Result<Option<Range>> {
        let current = self.markers.get(name).map(|m| m.range.clone());
        if current != *old_range {
            return Err(Error::InvalidOperation(format!(
                "marker {name} does not match the expected old range"
            )));
        }
        if let Some(range) = new_range {
            self.tree.resolve_parent(&range.start)?;
            self.tree.resolve_parent(&range.end)?;
        }
        match new_range {
            Some(range) => self.markers.set(Marker {
                name: name.to_string(),
                range: range.clone(),
                affects_data,
            }),
            None => {
                self.markers.remove(name);
            }
        }
        self.differ
            .buffer_marker_change(name, old_range.clone(), new_range.clone());
        Ok(new_range.clone())
    }

    fn child_starting_at(&self, parent: NodeIndex, position: &Position) -> Result<NodeIndex> {
        match self.tree.child_at_offset(parent, position.offset()) {
            Some((i, start)) if start == position.offset() => Ok(self.tree.children(parent)[i]),
            _ => Err(Error::InvalidPosition(format!(
                "no node starts at {:?} in root {}",
                position.path, position.root
            ))),
        }
    }

    /// Values of `key` over a flat range, as maximal runs of equal values.
    pub fn attribute_runs(&self, range: &Range, key: &str) -> Result<Vec<(Range, Option<AttributeValue>)>> {
        if !range.is_flat() {
            return Err(Error::InvalidRange("attribute ranges must be flat".into()));
        }
        let parent = self.tree.resolve_parent(&range.start)?;
        self.tree.resolve_parent(&range.end)?;
        let (start, end) = (range.start.offset(), range.end.offset());
        let mut runs: Vec<(Range, Option<AttributeValue>)> = Vec::new();
        let mut offset = 0;
        for child in self.tree.children(parent) {
            let size = self.tree.offset_size(*child);
            let (from, to) = (offset.max(start), (offset + size).min(end));
            offset += size;
            if from >= to {
                continue;
            }
            let value = self.tree.attributes(*child).and_then(|a| a.get(key)).cloned();
            match runs.last_mut() {
                Some((run, previous)) if *previous == value && run.end.offset() == from => {
                    run.end.set_offset(to);
                }
                _ => {
                    let mut run_start = range.start.clone();
                    run_start.set_offset(from);
                    let mut run_end = range.start.clone();
                    run_end.set_offset(to);
                    runs.push((Range::from_parts(run_start, run_end), value));
                }
            }
        }
        Ok(runs)
    }

    /// Every attribute key set on some item of a flat range.
    pub fn attribute_keys(&self, range: &Range) -> Result<Vec<String>> {
        if !range.is_flat() {
            return Err(Error::InvalidRange("attribute ranges must be flat".into()));
        }
        let parent = self.tree.resolve_parent(&range.start)?;
        let (start, end) = (range.start.offset(), range.end.offset());
        let mut keys = std::collections::BTreeSet::new();
        let mut offset = 0;
        for child in self.tree.children(parent) {
            let size = self.tree.offset_size(*child);
            if offset < end && offset + size > start {
                keys.extend(self.tree.attributes(*child).into_iter().flat_map(Attributes::keys).cloned());
            }
            offset += size;
        }
        Ok(keys.into_iter().collect())
    }

    /// Splits a range into the smallest set of flat ranges covering the same content.
    pub fn minimal_flat_ranges(&self, range: &Range) -> Result<Vec<Range>> {
        if range.is_flat() {
            return Ok(vec![range.clone()]);
        }
        let diff_at = range.start.common_path(&range.end).len();
        let mut ranges = Vec::new();
        let mut pos = range.start.clone();

        while pos.path.len() > diff_at + 1 {
            let parent = self.tree.resolve_parent(&pos)?;
            let how_many = self.tree.max_offset(parent) - pos.offset();
            if how_many > 0 {
                ranges.push(Range::from_position_and_shift(&pos, how_many));
            }
            pos.path.pop();
            let offset = pos.offset() + 1;
            pos.set_offset(offset);
        }

        while pos.path.len() <= range.end.path.len() {
            let Some(&offset) = range.end.path.get(pos.path.len().saturating_sub(1)) else {
                return Err(Error::InvalidPosition("empty position path".into()));
            };
            if offset < pos.offset() {
                return Err(Error::InvalidRange("range end lies before its start".into()));
            }
            if offset > pos.offset() {
                ranges.push(Range::from_position_and_shift(&pos, offset - pos.offset()));
            }
            pos.set_offset(offset);
            pos.path.push(0);
        }
        Ok(ranges)
    }
}

/// Rejects targets inside the moved content, including positions nested in moved elements.
fn check_move_target(source: &Position, how_many: usize, target: &Position) -> Result<()> {
    if source.root != target.root || how_many == 0 {
        return Ok(());
    }
    let depth = source.path.len().saturating_sub(1);
    if target.path.len() <= depth || target.path[..depth] != source.path[..depth] {
        return Ok(());
    }
    let (start, end) = (source.offset(), source.offset() + how_many);
    let at = target.path[depth];
    let inside = if target.path.len() == depth + 1 {
        start < at && at < end
    } else {
        start <= at && at < end
    };
    if inside {
        return Err(Error::InvalidOperation("cannot move a range into itself".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::attrs;
    use crate::differ::Change;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec()).unwrap()
    }

    fn range(start: &[usize], end: &[usize]) -> Range {
        Range::new(pos(start), pos(end)).unwrap()
    }

    fn doc_with_paragraphs(texts: &[&str]) -> Document {
        let mut doc = Document::new(ReplicaId::new(b"a"));
        let nodes: Vec<Node> = texts
            .iter()
            .map(|t| {
                let children = if t.is_empty() { vec![] } else { vec![Node::text(*t)] };
                Node::element_with("paragraph", Attributes::new(), children)
            })
            .collect();
        doc.apply_operation(Operation::insert(&ReplicaId::new(b"a"), 0, pos(&[0]), nodes))
            .unwrap();
        doc
    }

    fn paragraph(text: &str) -> Node {
        Node::element_with("paragraph", Attributes::new(), vec![Node::text(text)])
    }

    #[test]
    fn rejects_stale_operations() {
        let mut doc = doc_with_paragraphs(&["abc"]);
        let op = Operation::insert(&ReplicaId::new(b"b"), 0, pos(&[0, 0]), vec![Node::text("x")]);
        assert_eq!(
            doc.apply_operation(op),
            Err(Error::VersionConflict { expected: 1, actual: 0 })
        );
        assert_eq!(doc.version(), 1);
    }

    #[test]
    fn move_between_paragraphs() {
        let mut doc = doc_with_paragraphs(&["abcd", "xy"]);
        let origin = ReplicaId::new(b"a");
        let change = doc
            .apply_operation(Operation::move_range(&origin, 1, pos(&[0, 1]), 2, pos(&[1, 1])))
            .unwrap();
        assert_eq!(change.operation_type, OperationType::Move);
        assert_eq!(change.range, Some(range(&[1, 1], &[1, 3])));
        assert_eq!(
            doc.root_children(&RootName::main()).unwrap(),
            vec![paragraph("ad"), paragraph("xbcy")]
        );
        doc.validate_invariants().unwrap();
    }

    #[test]
    fn rejects_moves_into_themselves() {
        let mut doc = doc_with_paragraphs(&["ab", "cd"]);
        let origin = ReplicaId::new(b"a");
        let nested = Operation::move_range(&origin, 1, pos(&[0]), 2, pos(&[1, 1]));
        assert!(matches!(doc.apply_operation(nested), Err(Error::InvalidOperation(_))));
        let inside = Operation::move_range(&origin, 1, pos(&[0, 0]), 2, pos(&[0, 1]));
        assert!(matches!(doc.apply_operation(inside), Err(Error::InvalidOperation(_))));
        assert_eq!(doc.version(), 1);
    }

    #[test]
    fn attribute_requires_matching_old_value() {
        let mut doc = doc_with_paragraphs(&["abc"]);
        let origin = ReplicaId::new(b"a");
        let wrong = Operation::attribute(&origin, 1, range(&[0, 0], &[0, 2]), "bold", Some(true.into()), None);
        assert!(matches!(doc.apply_operation(wrong), Err(Error::InvalidOperation(_))));
        let right = Operation::attribute(&origin, 1, range(&[0, 0], &[0, 2]), "bold", None, Some(true.into()));
        doc.apply_operation(right).unwrap();
        assert_eq!(
            doc.node_at(&pos(&[0])).unwrap(),
            Node::element_with(
                "paragraph",
                Attributes::new(),
                vec![Node::text_with("ab", attrs([("bold", true)])), Node::text("c")]
            )
        );
        let nested = Operation::attribute(&origin, 2, range(&[0, 0], &[1]), "bold", None, None);
        assert!(matches!(doc.apply_operation(nested), Err(Error::InvalidRange(_))));
    }

    #[test]
    fn rename_checks_old_name() {
        let mut doc = doc_with_paragraphs(&["abc"]);
        let origin = ReplicaId::new(b"a");
        let wrong = Operation::rename(&origin, 1, pos(&[0]), "heading", "quote");
        assert!(matches!(doc.apply_operation(wrong), Err(Error::InvalidOperation(_))));
        let text = Operation::rename(&origin, 1, pos(&[0, 0]), "paragraph", "quote");
        assert!(matches!(doc.apply_operation(text), Err(Error::InvalidOperation(_))));
        doc.apply_operation(Operation::rename(&origin, 1, pos(&[0]), "paragraph", "heading"))
            .unwrap();
        assert_eq!(doc.node_at(&pos(&[0])).unwrap().name(), Some("heading"));
    }

    #[test]
    fn marker_operations_check_old_range() {
        let mut doc = doc_with_paragraphs(&["abcdef"]);
        let origin = ReplicaId::new(b"a");
        doc.apply_operation(Operation::marker(&origin, 1, "m", None, Some(range(&[0, 1], &[0, 3])), false))
            .unwrap();
        let stale = Operation::marker(&origin, 2, "m", None, Some(range(&[0, 0], &[0, 1])), false);
        assert!(matches!(doc.apply_operation(stale), Err(Error::InvalidOperation(_))));
        doc.apply_operation(Operation::insert(&origin, 2, pos(&[0, 0]), vec![Node::text("xx")]))
            .unwrap();
        assert_eq!(doc.markers().get("m").unwrap().range, range(&[0, 3], &[0, 5]));
    }

    #[test]
    fn failing_scope_keeps_applied_operations() {
        let mut doc = doc_with_paragraphs(&["abc"]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        doc.subscribe(move |batch, diff| sink.borrow_mut().push((batch.len(), diff.changes.len())));
        let result = doc.change(|writer| {
            writer.insert_text("x", Attributes::new(), &pos(&[0, 0]))?;
            writer.insert_text("y", Attributes::new(), &pos(&[0, 99]))?;
            Ok(())
        });
        assert!(matches!(result, Err(Error::InvalidPosition(_))));
        assert_eq!(doc.version(), 2);
        assert_eq!(doc.root_children(&RootName::main()).unwrap(), vec![paragraph("xabc")]);
        assert_eq!(*seen.borrow(), vec![(1, 1)]);
        assert!(doc.can_undo());
    }

    #[test]
    fn diff_reports_inserted_text() {
        let mut doc = doc_with_paragraphs(&["abc"]);
        let committed = doc
            .change(|writer| writer.insert_text("xy", Attributes::new(), &pos(&[0, 1])))
            .unwrap();
        assert!(committed.batch.is_sealed());
        assert_eq!(
            committed.diff.changes,
            vec![Change::Insert {
                position: pos(&[0, 1]),
                name: "$text".into(),
                length: 2,
                attributes: Attributes::new(),
            }]
        );
    }

    #[test]
    fn unsubscribed_listeners_stop_receiving() {
        let mut doc = doc_with_paragraphs(&["abc"]);
        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        let id = doc.subscribe(move |_, _| *sink.borrow_mut() += 1);
        doc.change(|w| w.insert_text("x", Attributes::new(), &pos(&[0, 0]))).unwrap();
        assert!(doc.unsubscribe(id));
        doc.change(|w| w.insert_text("y", Attributes::new(), &pos(&[0, 0]))).unwrap();
        assert_eq!(*count.borrow(), 1);
        assert!(!doc.unsubscribe(id));
    }

    #[test]
    fn minimal_flat_ranges_of_nested_range() {
        let doc = doc_with_paragraphs(&["abc", "de", "fgh"]);
        let ranges = doc.minimal_flat_ranges(&range(&[0, 1], &[2, 2])).unwrap();
        assert_eq!(
            ranges,
            vec![range(&[0, 1], &[0, 3]), range(&[1], &[2]), range(&[2, 0], &[2, 2])]
        );
    }

    #[test]
    fn graveyard_cannot_be_the_default_root() {
        let config = DocumentConfig::default().with_default_root(RootName::graveyard());
        assert!(matches!(
            Document::with_config(ReplicaId::new(b"a"), config),
            Err(Error::InvalidOperation(_))
        ));
        let doc = Document::with_config(
            ReplicaId::new(b"a"),
            DocumentConfig::default().with_default_root("body"),
        )
        .unwrap();
        assert_eq!(doc.root_names(), vec![RootName::from("body")]);
    }

    #[test]
    fn operation_log_is_trimmed_to_its_limit() {
        let mut doc = Document::with_config(
            ReplicaId::new(b"a"),
            DocumentConfig::default()
                .with_operation_log_limit(100)
                .with_history_limit(0),
        )
        .unwrap();
        doc.change(|w| w.insert(Node::element("paragraph"), &pos(&[0]))).unwrap();
        for _ in 0..500 {
            doc.change(|w| w.insert_text("x", Attributes::new(), &pos(&[0, 0]))).unwrap();
        }
        assert_eq!(doc.version(), 501);
        assert!(doc.operations_since(0).is_err());
        assert_eq!(doc.operations_since(doc.version() - 100).unwrap().len(), 100);
        doc.validate_invariants().unwrap();

        let mut undone = 0;
        while doc.undo().unwrap().is_some() {
            undone += 1;
        }
        // Only batches still covered by the log can be undone.
        assert!(undone > 0 && undone <= 101);
        assert!(doc.operations_since(0).is_err());
    }

    #[test]
    fn live_ranges_follow_edits() {
        let mut doc = doc_with_paragraphs(&["abcdef"]);
        let id = doc.create_live_range(range(&[0, 2], &[0, 4]));
        doc.change(|w| w.insert_text("xy", Attributes::new(), &pos(&[0, 0]))).unwrap();
        assert_eq!(doc.live_range(id), Some(&range(&[0, 4], &[0, 6])));
        doc.change(|w| w.remove(&crate::writer::Target::Range(range(&[0, 0], &[0, 8]))))
            .unwrap();
        assert_eq!(doc.live_range(id), Some(&Range::collapsed(pos(&[0, 0]))));
    }
}
