//! Mutation API used inside `Document::change`.
//!
//! Every command turns into one or more operations created against the current document
//! version. Each operation is applied right away and appended to the scope's batch.

use crate::attributes::{AttributeValue, Attributes};
use crate::batch::Batch;
use crate::document::{AppliedChange, Document};
use crate::error::{Error, Result};
use crate::ids::{RootName, Version};
use crate::node::{offset_size_of, Node};
use crate::ops::{Operation, OperationKind};
use crate::position::Position;
use crate::range::Range;

/// Content addressed by commands that accept either a range or a single element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Range(Range),
    /// The item starting at the position.
    Node(Position),
}

impl Target {
    fn to_range(&self) -> Range {
        match self {
            Target::Range(range) => range.clone(),
            Target::Node(position) => Range::from_position_and_shift(position, 1),
        }
    }
}

/// Container addressed by the append commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Parent {
    Root(RootName),
    /// The element starting at the position.
    Element(Position),
}

pub struct Writer<'a> {
    doc: &'a mut Document,
    batch: Batch,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(doc: &'a mut Document, batch: Batch) -> Self {
        Self { doc, batch }
    }

    pub(crate) fn into_batch(self) -> Batch {
        self.batch
    }

    /// Read access to the document in its current state.
    pub fn document(&self) -> &Document {
        self.doc
    }

    pub fn version(&self) -> Version {
        self.doc.version()
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    /// Applies a prepared operation and records it in the batch.
    pub fn apply_operation(&mut self, op: Operation) -> Result<AppliedChange> {
        if self.batch.is_sealed() {
            return Err(Error::SealedBatchMutation);
        }
        let change = self.doc.apply_operation(op.clone())?;
        self.batch.add_operation(op)?;
        Ok(change)
    }

    fn emit(&mut self, kind: OperationKind) -> Result<AppliedChange> {
        let op = Operation::new(self.doc.origin(), self.doc.version(), kind);
        self.apply_operation(op)
    }

    pub fn insert(&mut self, node: Node, position: &Position) -> Result<Range> {
        self.insert_nodes(vec![node], position)
    }

    pub fn insert_nodes(&mut self, nodes: Vec<Node>, position: &Position) -> Result<Range> {
        if nodes.iter().all(|n| n.offset_size() == 0) {
            return Ok(Range::collapsed(position.clone()));
        }
        let nodes = nodes.into_iter().filter(|n| n.offset_size() > 0).collect();
        let change = self.emit(OperationKind::Insert {
            position: position.clone(),
            nodes,
        })?;
        Ok(change.range.unwrap_or_else(|| Range::collapsed(position.clone())))
    }

    pub fn insert_text(&mut self, text: &str, attributes: Attributes, position: &Position) -> Result<Range> {
        self.insert(Node::text_with(text, attributes), position)
    }

    pub fn insert_element(&mut self, name: &str, attributes: Attributes, position: &Position) -> Result<Range> {
        self.insert(Node::element_with(name, attributes, Vec::new()), position)
    }

    /// Position at the end of a root or element.
    pub fn end_of(&self, parent: &Parent) -> Result<Position> {
        let tree = self.doc.tree();
        match parent {
            Parent::Root(root) => {
                let index = tree.root(root)?;
                Ok(Position::from_parts(root.clone(), vec![tree.max_offset(index)]))
            }
            Parent::Element(position) => {
                let index = tree.node_at(position)?;
                let mut path = position.path.clone();
                path.push(tree.max_offset(index));
                Ok(Position::from_parts(position.root.clone(), path))
            }
        }
    }

    pub fn append_text(&mut self, text: &str, attributes: Attributes, parent: &Parent) -> Result<Range> {
        let position = self.end_of(parent)?;
        self.insert_text(text, attributes, &position)
    }

    pub fn append_element(&mut self, name: &str, attributes: Attributes, parent: &Parent) -> Result<Range> {
        let position = self.end_of(parent)?;
        self.insert_element(name, attributes, &position)
    }

    /// Moves a flat range to `target` (given in coordinates from before the move). Returns
    /// the moved content's new range.
    pub fn move_range(&mut self, range: &Range, target: &Position) -> Result<Range> {
        if !range.is_flat() {
            return Err(Error::InvalidRange("only flat ranges can be moved".into()));
        }
        let change = self.emit(OperationKind::Move {
            source: range.start.clone(),
            how_many: range.flat_len(),
            target: target.clone(),
        })?;
        Ok(change.range.unwrap_or_else(|| Range::collapsed(target.clone())))
    }

    /// Moves content to the graveyard. Non-flat ranges are removed piece by piece.
    pub fn remove(&mut self, target: &Target) -> Result<()> {
        let range = target.to_range();
        let pieces = self.doc.minimal_flat_ranges(&range)?;
        for piece in pieces.iter().rev().filter(|piece| !piece.is_collapsed()) {
            self.emit(OperationKind::Move {
                source: piece.start.clone(),
                how_many: piece.flat_len(),
                target: Position::from_parts(RootName::graveyard(), vec![0]),
            })?;
        }
        Ok(())
    }

    /// Sets (`Some`) or clears (`None`) `key` on every item of the target. Items that
    /// already hold the value are left alone.
    pub fn change_attribute(&mut self, key: &str, value: Option<AttributeValue>, target: &Target) -> Result<()> {
        let range = target.to_range();
        for piece in self.doc.minimal_flat_ranges(&range)? {
            for (run, current) in self.doc.attribute_runs(&piece, key)? {
                if current == value {
                    continue;
                }
                self.emit(OperationKind::Attribute {
                    range: run,
                    key: key.to_string(),
                    old_value: current,
                    new_value: value.clone(),
                })?;
            }
        }
        Ok(())
    }

    pub fn set_attribute(&mut self, key: &str, value: impl Into<AttributeValue>, target: &Target) -> Result<()> {
        self.change_attribute(key, Some(value.into()), target)
    }

    pub fn remove_attribute(&mut self, key: &str, target: &Target) -> Result<()> {
        self.change_attribute(key, None, target)
    }

    pub fn set_attributes(&mut self, attributes: &Attributes, target: &Target) -> Result<()> {
        for (key, value) in attributes {
            self.change_attribute(key, Some(value.clone()), target)?;
        }
        Ok(())
    }

    pub fn clear_attributes(&mut self, target: &Target) -> Result<()> {
        let range = target.to_range();
        for piece in self.doc.minimal_flat_ranges(&range)? {
            for key in self.doc.attribute_keys(&piece)? {
                self.change_attribute(&key, None, &Target::Range(piece.clone()))?;
            }
        }
        Ok(())
    }

    /// Renames the element right after `position`.
    pub fn rename(&mut self, position: &Position, new_name: &str) -> Result<()> {
        let node = self.doc.node_at(position)?;
        let old_name = node
            .name()
            .ok_or_else(|| Error::InvalidOperation("only elements can be renamed".into()))?
            .to_string();
        if old_name == new_name {
            return Ok(());
        }
        self.emit(OperationKind::Rename {
            position: position.clone(),
            old_name,
            new_name: new_name.to_string(),
        })?;
        Ok(())
    }

    /// Splits the element containing `position` in two. Returns the position between the
    /// halves.
    pub fn split(&mut self, position: &Position) -> Result<Position> {
        if position.path.len() < 2 {
            return Err(Error::InvalidPosition("a root cannot be split".into()));
        }
        let element_position = Position::from_parts(position.root.clone(), position.parent_path().to_vec());
        let element = self.doc.node_at(&element_position)?;
        let tail = offset_size_of(element.children()).saturating_sub(position.offset());
        let name = element.name().unwrap_or_default().to_string();
        let clone = Node::element_with(name, element.attributes().clone(), Vec::new());

        let after = element_position.get_shifted_by(1);
        self.insert(clone, &after)?;
        if tail > 0 {
            let mut inside = after.path.clone();
            inside.push(0);
            self.emit(OperationKind::Move {
                source: position.clone(),
                how_many: tail,
                target: Position::from_parts(after.root.clone(), inside),
            })?;
        }
        Ok(after)
    }

    /// Merges the elements on both sides of `position`: the content of the later one moves to
    /// the end of the earlier one, then the later one is removed.
    pub fn merge(&mut self, position: &Position) -> Result<()> {
        if position.offset() == 0 {
            return Err(Error::InvalidPosition("nothing to merge with before the position".into()));
        }
        let before_position = position.get_shifted_by(-1);
        let before = self.doc.node_at(&before_position)?;
        let after = self.doc.node_at(position)?;
        let moved = offset_size_of(after.children());
        if moved > 0 {
            let mut source = position.path.clone();
            source.push(0);
            let mut target = before_position.path.clone();
            target.push(offset_size_of(before.children()));
            self.emit(OperationKind::Move {
                source: Position::from_parts(position.root.clone(), source),
                how_many: moved,
                target: Position::from_parts(position.root.clone(), target),
            })?;
        }
        self.remove(&Target::Node(position.clone()))
    }

    /// Wraps a flat range in a new element. Returns the range of the new element.
    pub fn wrap(&mut self, range: &Range, name: &str, attributes: Attributes) -> Result<Range> {
        if !range.is_flat() {
            return Err(Error::InvalidRange("only flat ranges can be wrapped".into()));
        }
        let how_many = range.flat_len();
        let element = self.insert_element(name, attributes, &range.start)?;
        if how_many > 0 {
            let mut inside = range.start.path.clone();
            inside.push(0);
            self.emit(OperationKind::Move {
                source: range.start.get_shifted_by(1),
                how_many,
                target: Position::from_parts(range.start.root.clone(), inside),
            })?;
        }
        Ok(element)
    }

    /// Replaces the element right after `position` with its children.
    pub fn unwrap(&mut self, position: &Position) -> Result<()> {
        let element = self.doc.node_at(position)?;
        let how_many = offset_size_of(element.children());
        if how_many > 0 {
            let mut inside = position.path.clone();
            inside.push(0);
            self.emit(OperationKind::Move {
                source: Position::from_parts(position.root.clone(), inside),
                how_many,
                target: position.clone(),
            })?;
        }
        self.remove(&Target::Node(position.get_shifted_by(how_many as isize)))
    }

    pub fn add_marker(&mut self, name: &str, range: &Range, affects_data: bool) -> Result<()> {
        if self.doc.markers().has(name) {
            return Err(Error::InvalidOperation(format!("marker {name} already exists")));
        }
        self.emit(OperationKind::Marker {
            name: name.to_string(),
            old_range: None,
            new_range: Some(range.clone()),
            affects_data,
        })?;
        Ok(())
    }

    pub fn update_marker(&mut self, name: &str, range: &Range) -> Result<()> {
        let marker = self
            .doc
            .markers()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::InvalidOperation(format!("marker {name} does not exist")))?;
        self.emit(OperationKind::Marker {
            name: name.to_string(),
            old_range: Some(marker.range),
            new_range: Some(range.clone()),
            affects_data: marker.affects_data,
        })?;
        Ok(())
    }

    pub fn remove_marker(&mut self, name: &str) -> Result<()> {
        let marker = self
            .doc
            .markers()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::InvalidOperation(format!("marker {name} does not exist")))?;
        self.emit(OperationKind::Marker {
            name: name.to_string(),
            old_range: Some(marker.range),
            new_range: None,
            affects_data: marker.affects_data,
        })?;
        Ok(())
    }
}
