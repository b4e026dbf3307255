//! Arena storage for document nodes.
//!
//! Nodes live in a flat slot vector and refer to each other by `NodeIndex`. Parents are
//! stored as indices so the tree never holds owning back references. Text nodes are split
//! on demand when an operation boundary falls inside them and merged back by `normalize`.

use std::collections::{BTreeMap, HashSet};

use crate::attributes::{AttributeValue, Attributes};
use crate::error::{Error, Result};
use crate::ids::{NodeIndex, RootName};
use crate::node::Node;
use crate::position::Position;

/// Element name used for roots created without an explicit one.
pub const ROOT_ELEMENT: &str = "$root";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeData {
    Element { name: String, children: Vec<NodeIndex> },
    Text { data: String },
}

#[derive(Clone, Debug)]
struct Slot {
    parent: Option<NodeIndex>,
    attributes: Attributes,
    data: NodeData,
}

impl Slot {
    fn offset_size(&self) -> usize {
        match &self.data {
            NodeData::Element { .. } => 1,
            NodeData::Text { data } => data.chars().count(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Tree {
    slots: Vec<Option<Slot>>,
    roots: BTreeMap<RootName, NodeIndex>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            roots: BTreeMap::new(),
        };
        let graveyard = tree.alloc(None, Attributes::new(), NodeData::Element {
            name: ROOT_ELEMENT.to_string(),
            children: Vec::new(),
        });
        tree.roots.insert(RootName::graveyard(), graveyard);
        tree
    }

    /// Tree with the graveyard and one empty root. `name` must not be the graveyard.
    pub fn with_root(name: RootName, element_name: &str) -> Self {
        debug_assert!(!name.is_graveyard());
        let mut tree = Self::new();
        let index = tree.alloc(None, Attributes::new(), NodeData::Element {
            name: element_name.to_string(),
            children: Vec::new(),
        });
        tree.roots.insert(name, index);
        tree
    }

    fn alloc(&mut self, parent: Option<NodeIndex>, attributes: Attributes, data: NodeData) -> NodeIndex {
        let index = NodeIndex(self.slots.len() as u32);
        self.slots.push(Some(Slot {
            parent,
            attributes,
            data,
        }));
        index
    }

    fn slot(&self, index: NodeIndex) -> Option<&Slot> {
        self.slots.get(index.index()).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, index: NodeIndex) -> Option<&mut Slot> {
        self.slots.get_mut(index.index()).and_then(Option::as_mut)
    }

    fn missing(index: NodeIndex) -> Error {
        Error::InvalidOperation(format!("node {} is not part of the tree", index.0))
    }

    pub fn add_root(&mut self, name: RootName, element_name: &str) -> Result<NodeIndex> {
        if self.roots.contains_key(&name) {
            return Err(Error::InvalidOperation(format!("root {name} already exists")));
        }
        let index = self.alloc(None, Attributes::new(), NodeData::Element {
            name: element_name.to_string(),
            children: Vec::new(),
        });
        self.roots.insert(name, index);
        Ok(index)
    }

    pub fn has_root(&self, name: &RootName) -> bool {
        self.roots.contains_key(name)
    }

    pub fn root(&self, name: &RootName) -> Result<NodeIndex> {
        self.roots
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownRoot(name.to_string()))
    }

    pub fn root_names(&self) -> impl Iterator<Item = &RootName> {
        self.roots.keys()
    }

    /// Roots except the graveyard, in name order.
    pub fn visible_roots(&self) -> impl Iterator<Item = (&RootName, NodeIndex)> {
        self.roots
            .iter()
            .filter(|(name, _)| !name.is_graveyard())
            .map(|(name, index)| (name, *index))
    }

    pub fn contains(&self, index: NodeIndex) -> bool {
        self.slot(index).is_some()
    }

    pub fn parent(&self, index: NodeIndex) -> Option<NodeIndex> {
        self.slot(index).and_then(|s| s.parent)
    }

    pub fn data(&self, index: NodeIndex) -> Option<&NodeData> {
        self.slot(index).map(|s| &s.data)
    }

    pub fn name(&self, index: NodeIndex) -> Option<&str> {
        match self.data(index) {
            Some(NodeData::Element { name, .. }) => Some(name),
            _ => None,
        }
    }

    pub fn is_text(&self, index: NodeIndex) -> bool {
        matches!(self.data(index), Some(NodeData::Text { .. }))
    }

    pub fn attributes(&self, index: NodeIndex) -> Option<&Attributes> {
        self.slot(index).map(|s| &s.attributes)
    }

    pub fn children(&self, index: NodeIndex) -> &[NodeIndex] {
        match self.data(index) {
            Some(NodeData::Element { children, .. }) => children,
            _ => &[],
        }
    }

    pub fn offset_size(&self, index: NodeIndex) -> usize {
        self.slot(index).map(Slot::offset_size).unwrap_or(0)
    }

    pub fn max_offset(&self, element: NodeIndex) -> usize {
        self.children(element)
            .iter()
            .map(|c| self.offset_size(*c))
            .sum()
    }

    /// Root the node is attached to, if any.
    pub fn root_of(&self, index: NodeIndex) -> Option<&RootName> {
        let mut current = index;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        self.roots
            .iter()
            .find(|(_, root)| **root == current)
            .map(|(name, _)| name)
    }

    /// Offset at which the node starts in its parent.
    pub fn start_offset(&self, index: NodeIndex) -> Option<usize> {
        let parent = self.parent(index)?;
        let mut offset = 0;
        for child in self.children(parent) {
            if *child == index {
                return Some(offset);
            }
            offset += self.offset_size(*child);
        }
        None
    }

    /// Path from the root to the element, empty for a root. `None` when detached.
    pub fn element_path(&self, index: NodeIndex) -> Option<(RootName, Vec<usize>)> {
        let mut path = Vec::new();
        let mut current = index;
        while self.parent(current).is_some() {
            path.push(self.start_offset(current)?);
            current = self.parent(current)?;
        }
        let root = self
            .roots
            .iter()
            .find(|(_, root)| **root == current)
            .map(|(name, _)| name.clone())?;
        path.reverse();
        Some((root, path))
    }

    /// Position right before the node.
    pub fn path_of(&self, index: NodeIndex) -> Option<Position> {
        let (root, path) = self.element_path(index)?;
        if path.is_empty() {
            return None;
        }
        Some(Position::from_parts(root, path))
    }

    /// Child covering `offset` as `(child index, child start offset)`.
    pub fn child_at_offset(&self, parent: NodeIndex, offset: usize) -> Option<(usize, usize)> {
        let mut start = 0;
        for (i, child) in self.children(parent).iter().enumerate() {
            let size = self.offset_size(*child);
            if offset < start + size {
                return Some((i, start));
            }
            start += size;
        }
        None
    }

    /// Element containing the position. Every ancestor offset must point exactly at an
    /// element and the final offset must lie within bounds.
    pub fn resolve_parent(&self, position: &Position) -> Result<NodeIndex> {
        let mut current = self.root(&position.root)?;
        for offset in position.parent_path() {
            let child = match self.child_at_offset(current, *offset) {
                Some((i, start)) if start == *offset => self.children(current)[i],
                _ => {
                    return Err(Error::InvalidPosition(format!(
                        "path {:?} does not resolve in root {}",
                        position.path, position.root
                    )))
                }
            };
            if self.is_text(child) {
                return Err(Error::InvalidPosition(format!(
                    "path {:?} descends into a text node",
                    position.path
                )));
            }
            current = child;
        }
        if position.offset() > self.max_offset(current) {
            return Err(Error::InvalidPosition(format!(
                "offset {} is out of bounds (max {}) in root {}",
                position.offset(),
                self.max_offset(current),
                position.root
            )));
        }
        Ok(current)
    }

    /// Element starting right after the position.
    pub fn node_at(&self, position: &Position) -> Result<NodeIndex> {
        let parent = self.resolve_parent(position)?;
        match self.child_at_offset(parent, position.offset()) {
            Some((i, start)) if start == position.offset() && !self.is_text(self.children(parent)[i]) => {
                Ok(self.children(parent)[i])
            }
            _ => Err(Error::InvalidPosition(format!(
                "no element at {:?} in root {}",
                position.path, position.root
            ))),
        }
    }

    /// Splits the text node covering `offset` so that a child boundary exists there and
    /// returns the child index at which the boundary sits.
    fn split_at(&mut self, parent: NodeIndex, offset: usize) -> usize {
        let Some((i, start)) = self.child_at_offset(parent, offset) else {
            return self.children(parent).len();
        };
        if start == offset {
            return i;
        }
        let child = self.children(parent)[i];
        let Some(slot) = self.slot_mut(child) else {
            return i;
        };
        let NodeData::Text { data } = &mut slot.data else {
            return i;
        };
        let at = data
            .char_indices()
            .nth(offset - start)
            .map(|(byte, _)| byte)
            .unwrap_or(data.len());
        let tail = data.split_off(at);
        let attributes = slot.attributes.clone();
        let new_child = self.alloc(Some(parent), attributes, NodeData::Text { data: tail });
        if let Some(NodeData::Element { children, .. }) = self.slot_mut(parent).map(|s| &mut s.data) {
            children.insert(i + 1, new_child);
        }
        i + 1
    }

    fn build(&mut self, parent: NodeIndex, node: &Node) -> NodeIndex {
        match node {
            Node::Text(text) => self.alloc(
                Some(parent),
                text.attributes.clone(),
                NodeData::Text {
                    data: text.data.clone(),
                },
            ),
            Node::Element(element) => {
                let index = self.alloc(
                    Some(parent),
                    element.attributes.clone(),
                    NodeData::Element {
                        name: element.name.clone(),
                        children: Vec::new(),
                    },
                );
                let children: Vec<NodeIndex> = element
                    .children
                    .iter()
                    .map(|child| self.build(index, child))
                    .collect();
                if let Some(NodeData::Element { children: slot_children, .. }) =
                    self.slot_mut(index).map(|s| &mut s.data)
                {
                    *slot_children = children;
                }
                self.normalize(index);
                index
            }
        }
    }

    /// Inserts detached nodes at `offset` and returns the indices of the new top-level nodes.
    pub fn insert_children(&mut self, parent: NodeIndex, offset: usize, nodes: &[Node]) -> Result<Vec<NodeIndex>> {
        if offset > self.max_offset(parent) {
            return Err(Error::InvalidPosition(format!(
                "insertion offset {offset} is out of bounds"
            )));
        }
        let created: Vec<NodeIndex> = nodes.iter().map(|n| self.build(parent, n)).collect();
        self.attach_children(parent, offset, created.clone())?;
        Ok(created)
    }

    /// Attaches already allocated, detached nodes at `offset`.
    pub fn attach_children(&mut self, parent: NodeIndex, offset: usize, nodes: Vec<NodeIndex>) -> Result<()> {
        let at = self.split_at(parent, offset);
        for node in &nodes {
            let slot = self.slot_mut(*node).ok_or_else(|| Self::missing(*node))?;
            slot.parent = Some(parent);
        }
        match self.slot_mut(parent).map(|s| &mut s.data) {
            Some(NodeData::Element { children, .. }) => {
                let tail = children.split_off(at);
                children.extend(nodes);
                children.extend(tail);
                Ok(())
            }
            _ => Err(Error::InvalidPosition("cannot insert into a text node".into())),
        }
    }

    /// Detaches `how_many` offsets starting at `offset`, splitting text at the boundaries.
    pub fn remove_children(&mut self, parent: NodeIndex, offset: usize, how_many: usize) -> Result<Vec<NodeIndex>> {
        if offset + how_many > self.max_offset(parent) {
            return Err(Error::InvalidRange(format!(
                "range {}..{} exceeds parent size {}",
                offset,
                offset + how_many,
                self.max_offset(parent)
            )));
        }
        if how_many == 0 {
            return Ok(Vec::new());
        }
        let first = self.split_at(parent, offset);
        let last = self.split_at(parent, offset + how_many);
        let removed: Vec<NodeIndex> = match self.slot_mut(parent).map(|s| &mut s.data) {
            Some(NodeData::Element { children, .. }) => children.drain(first..last).collect(),
            _ => return Err(Error::InvalidPosition("cannot remove from a text node".into())),
        };
        for node in &removed {
            if let Some(slot) = self.slot_mut(*node) {
                slot.parent = None;
            }
        }
        Ok(removed)
    }

    /// Children exactly covering `offset..offset + how_many`, splitting text as needed.
    pub fn isolate(&mut self, parent: NodeIndex, offset: usize, how_many: usize) -> Result<Vec<NodeIndex>> {
        if offset + how_many > self.max_offset(parent) {
            return Err(Error::InvalidRange(format!(
                "range {}..{} exceeds parent size {}",
                offset,
                offset + how_many,
                self.max_offset(parent)
            )));
        }
        let first = self.split_at(parent, offset);
        let last = self.split_at(parent, offset + how_many);
        Ok(self.children(parent)[first..last].to_vec())
    }

    /// Sets or clears (`None`) an attribute on a single node.
    pub fn set_attribute(&mut self, index: NodeIndex, key: &str, value: Option<AttributeValue>) -> Result<()> {
        let slot = self.slot_mut(index).ok_or_else(|| Self::missing(index))?;
        match value {
            Some(value) => {
                slot.attributes.insert(key.to_string(), value);
            }
            None => {
                slot.attributes.remove(key);
            }
        }
        Ok(())
    }

    pub fn rename(&mut self, index: NodeIndex, new_name: &str) -> Result<()> {
        match self.slot_mut(index).map(|s| &mut s.data) {
            Some(NodeData::Element { name, .. }) => {
                *name = new_name.to_string();
                Ok(())
            }
            _ => Err(Error::InvalidOperation("only elements can be renamed".into())),
        }
    }

    /// Merges adjacent text children with equal attributes and drops empty ones.
    pub fn normalize(&mut self, parent: NodeIndex) {
        let children = self.children(parent).to_vec();
        let mut kept: Vec<NodeIndex> = Vec::with_capacity(children.len());
        let mut dropped = Vec::new();
        for child in children {
            let Some(slot) = self.slot(child) else {
                continue;
            };
            if let NodeData::Text { data } = &slot.data {
                if data.is_empty() {
                    dropped.push(child);
                    continue;
                }
                let mergeable = kept.last().and_then(|prev| self.slot(*prev)).is_some_and(|prev| {
                    matches!(prev.data, NodeData::Text { .. }) && prev.attributes == slot.attributes
                });
                if let (true, Some(prev)) = (mergeable, kept.last().copied()) {
                    let data = data.clone();
                    if let Some(NodeData::Text { data: prev }) = self.slot_mut(prev).map(|s| &mut s.data) {
                        prev.push_str(&data);
                    }
                    dropped.push(child);
                    continue;
                }
            }
            kept.push(child);
        }
        for child in dropped {
            if let Some(slot) = self.slots.get_mut(child.index()) {
                *slot = None;
            }
        }
        if let Some(NodeData::Element { children, .. }) = self.slot_mut(parent).map(|s| &mut s.data) {
            *children = kept;
        }
    }

    /// Detached copy of a subtree.
    pub fn to_node(&self, index: NodeIndex) -> Option<Node> {
        let slot = self.slot(index)?;
        Some(match &slot.data {
            NodeData::Text { data } => Node::text_with(data.clone(), slot.attributes.clone()),
            NodeData::Element { name, children } => Node::element_with(
                name.clone(),
                slot.attributes.clone(),
                children.iter().filter_map(|c| self.to_node(*c)).collect(),
            ),
        })
    }

    /// Detached copies of every child of an element.
    pub fn children_nodes(&self, element: NodeIndex) -> Vec<Node> {
        self.children(element)
            .iter()
            .filter_map(|c| self.to_node(*c))
            .collect()
    }

    /// Whether `ancestor` is `index` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeIndex, index: NodeIndex) -> bool {
        let mut current = Some(index);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Check structural invariants: consistent parent links, unique children, no cycles,
    /// normalised text. Intended for tests and debugging.
    pub fn validate_invariants(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (i, slot) in self.slots.iter().enumerate() {
            let Some(slot) = slot else { continue };
            let index = NodeIndex(i as u32);
            if let NodeData::Element { children, .. } = &slot.data {
                let mut previous_text: Option<&Attributes> = None;
                for child in children {
                    if !seen.insert(*child) {
                        return Err(Error::InvalidOperation("duplicate child entry".into()));
                    }
                    let child_slot = self
                        .slot(*child)
                        .ok_or_else(|| Error::InvalidOperation("child not present in arena".into()))?;
                    if child_slot.parent != Some(index) {
                        return Err(Error::InvalidOperation("child parent mismatch".into()));
                    }
                    match &child_slot.data {
                        NodeData::Text { data } => {
                            if data.is_empty() {
                                return Err(Error::InvalidOperation("empty text node".into()));
                            }
                            if previous_text == Some(&child_slot.attributes) {
                                return Err(Error::InvalidOperation("text not normalised".into()));
                            }
                            previous_text = Some(&child_slot.attributes);
                        }
                        NodeData::Element { .. } => previous_text = None,
                    }
                }
            }
            let mut visited = HashSet::new();
            let mut current = Some(index);
            while let Some(node) = current {
                if !visited.insert(node) {
                    return Err(Error::InvalidOperation("cycle detected".into()));
                }
                current = self.parent(node);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::attrs;

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec()).unwrap()
    }

    fn tree_with_paragraph(text: &str) -> (Tree, NodeIndex) {
        let mut tree = Tree::new();
        let root = tree.add_root(RootName::main(), ROOT_ELEMENT).unwrap();
        tree.insert_children(
            root,
            0,
            &[Node::element_with("paragraph", Attributes::new(), vec![Node::text(text)])],
        )
        .unwrap();
        (tree, root)
    }

    #[test]
    fn resolves_positions() {
        let (tree, root) = tree_with_paragraph("hello");
        let paragraph = tree.children(root)[0];
        assert_eq!(tree.resolve_parent(&pos(&[0, 3])).unwrap(), paragraph);
        assert_eq!(tree.resolve_parent(&pos(&[1])).unwrap(), root);
        assert!(matches!(
            tree.resolve_parent(&pos(&[0, 6])),
            Err(Error::InvalidPosition(_))
        ));
        assert!(matches!(
            tree.resolve_parent(&pos(&[0, 2, 0])),
            Err(Error::InvalidPosition(_))
        ));
        assert!(matches!(
            tree.resolve_parent(&Position::new("other", vec![0]).unwrap()),
            Err(Error::UnknownRoot(_))
        ));
        assert_eq!(tree.node_at(&pos(&[0])).unwrap(), paragraph);
        assert_eq!(tree.path_of(paragraph), Some(pos(&[0])));
    }

    #[test]
    fn remove_splits_and_normalize_merges() {
        let (mut tree, root) = tree_with_paragraph("hello");
        let paragraph = tree.children(root)[0];
        let removed = tree.remove_children(paragraph, 1, 3).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(tree.to_node(removed[0]), Some(Node::text("ell")));
        assert_eq!(tree.children(paragraph).len(), 2);
        tree.normalize(paragraph);
        assert_eq!(tree.children_nodes(paragraph), vec![Node::text("ho")]);
        tree.validate_invariants().unwrap();
    }

    #[test]
    fn attributes_split_text() {
        let (mut tree, root) = tree_with_paragraph("hello");
        let paragraph = tree.children(root)[0];
        for node in tree.isolate(paragraph, 1, 2).unwrap() {
            tree.set_attribute(node, "bold", Some(true.into())).unwrap();
        }
        tree.normalize(paragraph);
        assert_eq!(
            tree.children_nodes(paragraph),
            vec![
                Node::text("h"),
                Node::text_with("el", attrs([("bold", true)])),
                Node::text("lo"),
            ]
        );
        tree.validate_invariants().unwrap();
    }

    #[test]
    fn attach_moves_nodes_between_parents() {
        let (mut tree, root) = tree_with_paragraph("hello");
        tree.insert_children(root, 1, &[Node::element("paragraph")]).unwrap();
        let first = tree.children(root)[0];
        let second = tree.children(root)[1];
        let nodes = tree.remove_children(first, 2, 3).unwrap();
        tree.attach_children(second, 0, nodes).unwrap();
        tree.normalize(first);
        tree.normalize(second);
        assert_eq!(tree.children_nodes(first), vec![Node::text("he")]);
        assert_eq!(tree.children_nodes(second), vec![Node::text("llo")]);
        assert_eq!(tree.root_of(second), Some(&RootName::main()));
        tree.validate_invariants().unwrap();
    }

    #[test]
    fn rejects_duplicate_roots_and_renaming_text() {
        let (mut tree, root) = tree_with_paragraph("x");
        assert!(tree.add_root(RootName::main(), ROOT_ELEMENT).is_err());
        let paragraph = tree.children(root)[0];
        let text = tree.children(paragraph)[0];
        assert!(matches!(
            tree.rename(text, "heading"),
            Err(Error::InvalidOperation(_))
        ));
    }
}
