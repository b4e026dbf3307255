//! Model string notation for tests and debugging.
//!
//! `<paragraph>foo<$text bold="true">bar</$text></paragraph>` describes a paragraph with
//! plain text "foo" followed by bold text "bar". Attribute values `true`/`false` read as
//! booleans and integers read as numbers; everything else is a string.

use crate::attributes::{AttributeValue, Attributes};
use crate::batch::BatchType;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::ids::RootName;
use crate::node::{normalize_nodes, Node};
use crate::position::Position;
use crate::range::Range;
use crate::writer::Target;

const TEXT_TAG: &str = "$text";

/// Content of a root in model notation.
pub fn stringify(doc: &Document, root: &RootName) -> Result<String> {
    Ok(stringify_nodes(&doc.root_children(root)?))
}

/// Content of the default root in model notation.
pub fn get_data(doc: &Document) -> Result<String> {
    stringify(doc, &doc.config().default_root)
}

pub fn stringify_nodes(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(&mut out, node);
    }
    out
}

fn write_node(out: &mut String, node: &Node) {
    match node {
        Node::Text(text) if text.attributes.is_empty() => out.push_str(&escape(&text.data)),
        Node::Text(text) => {
            write_open(out, TEXT_TAG, &text.attributes);
            out.push_str(&escape(&text.data));
            write_close(out, TEXT_TAG);
        }
        Node::Element(element) => {
            write_open(out, &element.name, &element.attributes);
            for child in &element.children {
                write_node(out, child);
            }
            write_close(out, &element.name);
        }
    }
}

fn write_open(out: &mut String, name: &str, attributes: &Attributes) {
    out.push('<');
    out.push_str(name);
    for (key, value) in attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(&value.to_string()));
        out.push('"');
    }
    out.push('>');
}

fn write_close(out: &mut String, name: &str) {
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn escape(data: &str) -> String {
    let mut out = String::with_capacity(data.len());
    for ch in data.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

fn unescape(data: &str) -> String {
    data.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

fn parse_value(raw: &str) -> AttributeValue {
    match raw {
        "true" => AttributeValue::Bool(true),
        "false" => AttributeValue::Bool(false),
        _ => raw
            .parse::<i64>()
            .map(AttributeValue::Number)
            .unwrap_or_else(|_| AttributeValue::String(raw.to_string())),
    }
}

/// Parses model notation into normalised nodes.
pub fn parse(input: &str) -> Result<Vec<Node>> {
    let mut parser = Parser { input, pos: 0 };
    let nodes = parser.nodes(None)?;
    Ok(normalize_nodes(nodes))
}

/// Replaces the content of a root with parsed model notation, outside undo history.
pub fn set_data(doc: &mut Document, root: &RootName, data: &str) -> Result<()> {
    let nodes = parse(data)?;
    let current = doc.root_children(root)?;
    let size: usize = current.iter().map(Node::offset_size).sum();
    let start = Position::from_parts(root.clone(), vec![0]);
    doc.change_with(BatchType::Transparent, |writer| {
        if size > 0 {
            writer.remove(&Target::Range(Range::from_position_and_shift(&start, size)))?;
        }
        writer.insert_nodes(nodes, &start)?;
        Ok(())
    })?;
    Ok(())
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn error(&self, message: impl std::fmt::Display) -> Error {
        Error::Serialization(format!("model notation at byte {}: {}", self.pos, message))
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        if !self.rest().starts_with(token) {
            return Err(self.error(format!("expected {token:?}")));
        }
        self.pos += token.len();
        Ok(())
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn take_until(&mut self, stop: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let end = rest.find(stop).unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }

    fn nodes(&mut self, closing: Option<&str>) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        loop {
            if self.rest().is_empty() {
                return match closing {
                    Some(name) => Err(self.error(format!("missing </{name}>"))),
                    None => Ok(nodes),
                };
            }
            if self.rest().starts_with("</") {
                let name = self.closing_tag()?;
                return match closing {
                    Some(expected) if expected == name => Ok(nodes),
                    _ => Err(self.error(format!("unexpected </{name}>"))),
                };
            }
            if self.rest().starts_with('<') {
                let (name, attributes, self_closing) = self.opening_tag()?;
                if name == TEXT_TAG {
                    let data = unescape(self.take_until(|c| c == '<'));
                    let end = self.closing_tag()?;
                    if end != TEXT_TAG {
                        return Err(self.error(format!("unexpected </{end}> inside text")));
                    }
                    nodes.push(Node::text_with(data, attributes));
                } else {
                    let children = if self_closing {
                        Vec::new()
                    } else {
                        self.nodes(Some(&name))?
                    };
                    nodes.push(Node::element_with(name, attributes, children));
                }
            } else {
                let data = unescape(self.take_until(|c| c == '<'));
                nodes.push(Node::text(data));
            }
        }
    }

    fn closing_tag(&mut self) -> Result<String> {
        self.expect("</")?;
        let name = self.take_until(|c| c == '>').trim().to_string();
        self.expect(">")?;
        Ok(name)
    }

    fn opening_tag(&mut self) -> Result<(String, Attributes, bool)> {
        self.expect("<")?;
        let name = self
            .take_until(|c| c.is_whitespace() || c == '>' || c == '/')
            .to_string();
        if name.is_empty() {
            return Err(self.error("missing element name"));
        }
        let mut attributes = Attributes::new();
        loop {
            self.skip_whitespace();
            if self.rest().starts_with("/>") {
                self.pos += 2;
                return Ok((name, attributes, true));
            }
            if self.rest().starts_with('>') {
                self.pos += 1;
                return Ok((name, attributes, false));
            }
            let key = self.take_until(|c| c == '=' || c == '>' || c.is_whitespace()).to_string();
            if key.is_empty() {
                return Err(self.error("malformed attribute"));
            }
            self.expect("=\"")?;
            let raw = unescape(self.take_until(|c| c == '"'));
            self.expect("\"")?;
            attributes.insert(key, parse_value(&raw));
        }
    }
}
