//! Document snapshots and their JSON form.

use std::collections::BTreeMap;

use crate::attributes::Attributes;
use crate::config::DocumentConfig;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::ids::{ReplicaId, RootName, Version};
use crate::markers::Marker;
use crate::node::{normalize_nodes, Node};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RootSnapshot {
    /// Element name of the root.
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "BTreeMap::is_empty"))]
    pub attributes: Attributes,
    #[cfg_attr(feature = "serde", serde(default))]
    pub children: Vec<Node>,
}

/// Visible state of a document: every root except the graveyard plus markers.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DocumentSnapshot {
    pub version: Version,
    pub roots: BTreeMap<RootName, RootSnapshot>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
    pub markers: Vec<Marker>,
}

impl Document {
    pub fn to_snapshot(&self) -> DocumentSnapshot {
        let tree = self.tree();
        let roots = tree
            .visible_roots()
            .map(|(name, index)| {
                let snapshot = RootSnapshot {
                    name: tree.name(index).unwrap_or_default().to_string(),
                    attributes: tree.attributes(index).cloned().unwrap_or_default(),
                    children: tree.children_nodes(index),
                };
                (name.clone(), snapshot)
            })
            .collect();
        DocumentSnapshot {
            version: self.version(),
            roots,
            markers: self.markers().iter().cloned().collect(),
        }
    }

    /// Rebuilds a document from a snapshot. Its history starts at the snapshot version.
    pub fn from_snapshot(origin: ReplicaId, snapshot: DocumentSnapshot, config: DocumentConfig) -> Result<Self> {
        Document::check_config(&config)?;
        let mut doc = Document::empty(origin, config);
        for (name, root) in snapshot.roots {
            if name.is_graveyard() {
                return Err(Error::Serialization("snapshots cannot contain the graveyard root".into()));
            }
            let tree = doc.tree_mut();
            let index = tree.add_root(name, &root.name)?;
            for (key, value) in root.attributes {
                tree.set_attribute(index, &key, Some(value))?;
            }
            tree.insert_children(index, 0, &normalize_nodes(root.children))?;
            tree.normalize(index);
        }
        for marker in snapshot.markers {
            doc.tree().resolve_parent(&marker.range.start)?;
            doc.tree().resolve_parent(&marker.range.end)?;
            doc.set_marker(marker);
        }
        doc.reset_history(snapshot.version);
        Ok(doc)
    }
}

#[cfg(feature = "serde")]
impl Document {
    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self.to_snapshot()).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(&self.to_snapshot()).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_json(origin: ReplicaId, json: &str) -> Result<Self> {
        Self::from_json_with_config(origin, json, DocumentConfig::default())
    }

    pub fn from_json_with_config(origin: ReplicaId, json: &str, config: DocumentConfig) -> Result<Self> {
        let snapshot: DocumentSnapshot =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        Self::from_snapshot(origin, snapshot, config)
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;
    use crate::attributes::attrs;
    use crate::position::Position;
    use crate::range::Range;

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec()).unwrap()
    }

    #[test]
    fn json_keeps_visible_content_and_markers() {
        let mut doc = Document::new(ReplicaId::new(b"a"));
        doc.change(|w| {
            w.insert(
                Node::element_with(
                    "paragraph",
                    Attributes::new(),
                    vec![Node::text("foo"), Node::text_with("bar", attrs([("bold", true)]))],
                ),
                &pos(&[0]),
            )?;
            w.insert_text("gone", Attributes::new(), &pos(&[1]))?;
            w.remove(&crate::writer::Target::Range(Range::new(pos(&[1]), pos(&[5]))?))?;
            w.add_marker("comment:1", &Range::new(pos(&[0, 1]), pos(&[0, 4]))?, true)
        })
        .unwrap();

        let json = doc.to_json_string().unwrap();
        assert!(!json.contains("gone"));
        let restored = Document::from_json(ReplicaId::new(b"b"), &json).unwrap();
        assert!(restored.content_eq(&doc));
        assert_eq!(restored.version(), doc.version());
        assert_eq!(restored.markers().get("comment:1"), doc.markers().get("comment:1"));
        assert_eq!(restored.to_json_string().unwrap(), json);
        restored.validate_invariants().unwrap();
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            Document::from_json(ReplicaId::new(b"a"), "{\"roots\": 3}"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn rejects_the_graveyard_as_default_root() {
        let json = Document::new(ReplicaId::new(b"a")).to_json_string().unwrap();
        let config = DocumentConfig::default().with_default_root(RootName::graveyard());
        assert!(matches!(
            Document::from_json_with_config(ReplicaId::new(b"b"), &json, config),
            Err(Error::InvalidOperation(_))
        ));
    }
}
