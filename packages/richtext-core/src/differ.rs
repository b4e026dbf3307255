//! Change lists for view collaborators.
//!
//! The differ remembers the children of every element right before the first mutation
//! touching them. When a batch is committed, each remembered element is compared with its
//! current children and the difference is reported as insert, remove and attribute
//! records. Positions are "apply left to right": every record is expressed in the state
//! produced by the records before it.

use std::collections::{BTreeMap, HashSet};

use similar::{capture_diff_slices, Algorithm, DiffOp};

use crate::attributes::{AttributeValue, Attributes};
use crate::ids::{NodeIndex, RootName};
use crate::position::Position;
use crate::range::Range;
use crate::tree::{NodeData, Tree};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Name reported for text content.
pub const TEXT_NAME: &str = "$text";

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Change {
    Insert {
        position: Position,
        name: String,
        length: usize,
        attributes: Attributes,
    },
    Remove {
        position: Position,
        name: String,
        length: usize,
    },
    Attribute {
        range: Range,
        key: String,
        old_value: Option<AttributeValue>,
        new_value: Option<AttributeValue>,
    },
}

impl Change {
    pub fn root(&self) -> &RootName {
        match self {
            Change::Insert { position, .. } | Change::Remove { position, .. } => &position.root,
            Change::Attribute { range, .. } => range.root(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MarkerChange {
    pub name: String,
    pub old_range: Option<Range>,
    pub new_range: Option<Range>,
}

/// Net effect of one batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Diff {
    pub changes: Vec<Change>,
    pub markers: Vec<MarkerChange>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.markers.is_empty()
    }

    pub fn for_root<'a>(&'a self, root: &'a RootName) -> impl Iterator<Item = &'a Change> + 'a {
        self.changes.iter().filter(move |c| c.root() == root)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum ItemKey {
    Char(char),
    Element(NodeIndex),
}

/// One offset of an element's content. Equality ignores attributes so that attribute
/// changes show up as such instead of as replacements.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Item {
    key: ItemKey,
    name: String,
}

#[derive(Clone, Debug, Default)]
struct Snapshot {
    items: Vec<Item>,
    attributes: Vec<Attributes>,
}

fn snapshot(tree: &Tree, element: NodeIndex) -> Snapshot {
    let mut snapshot = Snapshot::default();
    for child in tree.children(element) {
        let attributes = tree.attributes(*child).cloned().unwrap_or_default();
        match tree.data(*child) {
            Some(NodeData::Text { data }) => {
                for ch in data.chars() {
                    snapshot.items.push(Item {
                        key: ItemKey::Char(ch),
                        name: TEXT_NAME.to_string(),
                    });
                    snapshot.attributes.push(attributes.clone());
                }
            }
            Some(NodeData::Element { name, .. }) => {
                snapshot.items.push(Item {
                    key: ItemKey::Element(*child),
                    name: name.clone(),
                });
                snapshot.attributes.push(attributes);
            }
            None => {}
        }
    }
    snapshot
}

#[derive(Clone, Debug, Default)]
pub struct Differ {
    snapshots: BTreeMap<NodeIndex, Snapshot>,
    inserted: HashSet<NodeIndex>,
    markers: BTreeMap<String, (Option<Range>, Option<Range>)>,
}

impl Differ {
    /// Remembers the children of `element` unless they were already remembered.
    pub fn buffer_children(&mut self, tree: &Tree, element: NodeIndex) {
        if !self.snapshots.contains_key(&element) {
            self.snapshots.insert(element, snapshot(tree, element));
        }
    }

    /// Nodes created in the current batch. Their content is reported by their parent.
    pub fn mark_inserted(&mut self, nodes: &[NodeIndex]) {
        self.inserted.extend(nodes.iter().copied());
    }

    /// Keeps the first old range and the last new range of a marker.
    pub fn buffer_marker_change(&mut self, name: &str, old_range: Option<Range>, new_range: Option<Range>) {
        self.markers
            .entry(name.to_string())
            .and_modify(|entry| entry.1 = new_range.clone())
            .or_insert((old_range, new_range));
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty() && self.markers.is_empty()
    }

    pub fn reset(&mut self) {
        self.snapshots.clear();
        self.inserted.clear();
        self.markers.clear();
    }

    /// Computes the diff of everything buffered since the last call and resets the differ.
    pub fn take_diff(&mut self, tree: &Tree, coalesce: bool) -> Diff {
        let mut groups: Vec<(RootName, Vec<usize>, Vec<Change>)> = Vec::new();
        for (element, before) in &self.snapshots {
            let Some((root, path)) = tree.element_path(*element) else {
                continue;
            };
            if root.is_graveyard() || self.is_inserted(tree, *element) {
                continue;
            }
            let after = snapshot(tree, *element);
            let changes = diff_children(&root, &path, before, &after, coalesce);
            if !changes.is_empty() {
                groups.push((root, path, changes));
            }
        }
        groups.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));

        let markers = std::mem::take(&mut self.markers)
            .into_iter()
            .filter(|(_, (old, new))| old != new)
            .map(|(name, (old_range, new_range))| MarkerChange {
                name,
                old_range,
                new_range,
            })
            .collect();
        self.reset();

        Diff {
            changes: groups.into_iter().flat_map(|(_, _, changes)| changes).collect(),
            markers,
        }
    }

    fn is_inserted(&self, tree: &Tree, element: NodeIndex) -> bool {
        let mut current = Some(element);
        while let Some(node) = current {
            if self.inserted.contains(&node) {
                return true;
            }
            current = tree.parent(node);
        }
        false
    }
}

fn diff_children(root: &RootName, path: &[usize], before: &Snapshot, after: &Snapshot, coalesce: bool) -> Vec<Change> {
    let at = |offset: usize| {
        let mut full = path.to_vec();
        full.push(offset);
        Position::from_parts(root.clone(), full)
    };

    let mut structural: Vec<Change> = Vec::new();
    let mut attribute_changes: Vec<Change> = Vec::new();
    let mut offset = 0;

    let remove = |structural: &mut Vec<Change>, item: &Item, offset: usize| {
        if coalesce && item.name == TEXT_NAME {
            if let Some(Change::Remove { position, name, length }) = structural.last_mut() {
                if name == TEXT_NAME && position.offset() == offset {
                    *length += 1;
                    return;
                }
            }
        }
        structural.push(Change::Remove {
            position: at(offset),
            name: item.name.clone(),
            length: 1,
        });
    };
    let insert = |structural: &mut Vec<Change>, item: &Item, attributes: &Attributes, offset: usize| {
        if coalesce && item.name == TEXT_NAME {
            if let Some(Change::Insert {
                position,
                name,
                length,
                attributes: previous,
            }) = structural.last_mut()
            {
                if name == TEXT_NAME && previous == attributes && position.offset() + *length == offset {
                    *length += 1;
                    return;
                }
            }
        }
        structural.push(Change::Insert {
            position: at(offset),
            name: item.name.clone(),
            length: 1,
            attributes: attributes.clone(),
        });
    };

    for op in capture_diff_slices(Algorithm::Myers, &before.items, &after.items) {
        match op {
            DiffOp::Equal {
                old_index,
                new_index,
                len,
            } => {
                for i in 0..len {
                    let old = &before.attributes[old_index + i];
                    let new = &after.attributes[new_index + i];
                    if old != new {
                        push_attribute_changes(&mut attribute_changes, &at, old, new, offset + i, coalesce);
                    }
                }
                offset += len;
            }
            DiffOp::Delete {
                old_index, old_len, ..
            } => {
                for item in &before.items[old_index..old_index + old_len] {
                    remove(&mut structural, item, offset);
                }
            }
            DiffOp::Insert {
                new_index, new_len, ..
            } => {
                for i in new_index..new_index + new_len {
                    insert(&mut structural, &after.items[i], &after.attributes[i], offset);
                    offset += 1;
                }
            }
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                for item in &before.items[old_index..old_index + old_len] {
                    remove(&mut structural, item, offset);
                }
                for i in new_index..new_index + new_len {
                    insert(&mut structural, &after.items[i], &after.attributes[i], offset);
                    offset += 1;
                }
            }
        }
    }

    structural.extend(attribute_changes);
    structural
}

fn push_attribute_changes(
    changes: &mut Vec<Change>,
    at: &impl Fn(usize) -> Position,
    old: &Attributes,
    new: &Attributes,
    offset: usize,
    coalesce: bool,
) {
    let keys: std::collections::BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    for key in keys {
        let old_value = old.get(key).cloned();
        let new_value = new.get(key).cloned();
        if old_value == new_value {
            continue;
        }
        let extended = coalesce
            && changes.iter_mut().rev().any(|change| match change {
                Change::Attribute {
                    range,
                    key: k,
                    old_value: o,
                    new_value: n,
                } if k == key && *o == old_value && *n == new_value && range.end.offset() == offset => {
                    *range = Range::from_parts(range.start.clone(), at(offset + 1));
                    true
                }
                _ => false,
            });
        if !extended {
            changes.push(Change::Attribute {
                range: Range::from_parts(at(offset), at(offset + 1)),
                key: key.clone(),
                old_value,
                new_value,
            });
        }
    }
}
