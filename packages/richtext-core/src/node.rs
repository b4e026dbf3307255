//! Detached node values.
//!
//! `Node` is the owned representation used for operation payloads, serialization, and
//! for reading subtrees out of a document. Inside a `Document` nodes live in an arena
//! (see `tree`).

use crate::attributes::{AttributeValue, Attributes};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Element {
    pub name: String,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Attributes::is_empty")
    )]
    pub attributes: Attributes,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
    pub children: Vec<Node>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Text {
    pub data: String,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Attributes::is_empty")
    )]
    pub attributes: Attributes,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Node {
    Element(Element),
    Text(Text),
}

impl Node {
    pub fn element(name: impl Into<String>) -> Self {
        Self::element_with(name, Attributes::new(), Vec::new())
    }

    pub fn element_with(name: impl Into<String>, attributes: Attributes, children: Vec<Node>) -> Self {
        Node::Element(Element {
            name: name.into(),
            attributes,
            children,
        })
    }

    pub fn text(data: impl Into<String>) -> Self {
        Self::text_with(data, Attributes::new())
    }

    pub fn text_with(data: impl Into<String>, attributes: Attributes) -> Self {
        Node::Text(Text {
            data: data.into(),
            attributes,
        })
    }

    /// Number of offsets the node occupies in its parent.
    pub fn offset_size(&self) -> usize {
        match self {
            Node::Element(_) => 1,
            Node::Text(t) => t.data.chars().count(),
        }
    }

    pub fn attributes(&self) -> &Attributes {
        match self {
            Node::Element(e) => &e.attributes,
            Node::Text(t) => &t.attributes,
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes().get(key)
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Node::Text(_))
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Node::Element(e) => Some(&e.name),
            Node::Text(_) => None,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Element(e) => &e.children,
            Node::Text(_) => &[],
        }
    }
}

/// Total offset size of a node list.
pub fn offset_size_of(nodes: &[Node]) -> usize {
    nodes.iter().map(Node::offset_size).sum()
}

/// Merge adjacent text nodes with equal attributes and drop empty text nodes.
pub fn normalize_nodes(nodes: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Text(t) if t.data.is_empty() => {}
            Node::Text(t) => {
                if let Some(Node::Text(prev)) = out.last_mut() {
                    if prev.attributes == t.attributes {
                        prev.data.push_str(&t.data);
                        continue;
                    }
                }
                out.push(Node::Text(t));
            }
            Node::Element(mut e) => {
                e.children = normalize_nodes(e.children);
                out.push(Node::Element(e));
            }
        }
    }
    out
}
