//! Field mask parsing.
//!
//! A mask selects a (possibly nested) subset of fields:
//!
//! ```text
//! name,address{street,city},*
//! ```
//!
//! Outer braces are optional and whitespace is ignored, so `{a, b{c}}` and
//! `a,b{c}` parse to the same tree. `*` selects every field not otherwise named.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::MaskParseError;

/// Wildcard token.
pub const WILDCARD: &str = "*";

/// Brackets, commas and name tokens. Everything else is skipped.
static LEXER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{|\}|,|[\w:\-*]+").expect("mask lexer regex"));

/// One selector in a mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaskNode {
    /// `*`: copy every key not otherwise selected.
    Wildcard,
    /// A bare field name.
    Leaf(String),
    /// A field name with a nested selection.
    Nested(String, Vec<MaskNode>),
}

impl MaskNode {
    /// The field name this node selects (`*` for the wildcard).
    pub fn name(&self) -> &str {
        match self {
            MaskNode::Wildcard => WILDCARD,
            MaskNode::Leaf(name) | MaskNode::Nested(name, _) => name,
        }
    }

    fn leaf(token: &str) -> Self {
        if token == WILDCARD {
            MaskNode::Wildcard
        } else {
            MaskNode::Leaf(token.to_string())
        }
    }
}

/// A parsed field mask: the root sibling list, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mask {
    nodes: Vec<MaskNode>,
}

impl Mask {
    /// Build a mask from already parsed nodes.
    pub fn new(nodes: Vec<MaskNode>) -> Self {
        Self { nodes }
    }

    /// Parse mask text.
    pub fn parse(text: &str) -> Result<Self, MaskParseError> {
        parse(text)
    }

    pub fn nodes(&self) -> &[MaskNode] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<MaskNode> {
        self.nodes
    }

    /// True for the `{}` mask, which selects nothing.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the root level contains `*`.
    pub fn has_wildcard(&self) -> bool {
        self.nodes.iter().any(|n| matches!(n, MaskNode::Wildcard))
    }

    /// Look up a root-level selector by field name.
    pub fn get(&self, name: &str) -> Option<&MaskNode> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    /// JSON tree form: `true` for leaves, objects for nested selections.
    pub fn to_value(&self) -> Value {
        nodes_to_value(&self.nodes)
    }
}

/// Parse mask text into its root sibling list.
///
/// # Errors
///
/// Returns `MaskParseError` on a bracket or comma in an invalid position, or
/// when a bracket is left open.
pub fn parse(text: &str) -> Result<Mask, MaskParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Mask::default());
    }
    let mut base = text.len() - text.trim_start().len();

    // External brackets are optional
    let body = match trimmed.strip_prefix('{') {
        Some(inner) => {
            let inner = inner
                .strip_suffix('}')
                .ok_or(MaskParseError::MissingClosingBracket)?;
            base += 1;
            inner
        }
        None => trimmed,
    };

    let mut current: Vec<MaskNode> = Vec::new();
    // Parent frames with the index of the node being nested in each.
    let mut stack: Vec<(Vec<MaskNode>, usize)> = Vec::new();
    let mut previous = Previous::Start;

    for token in LEXER.find_iter(body) {
        let offset = base + token.start();
        match token.as_str() {
            "{" => {
                let Previous::Name(index) = previous else {
                    return Err(MaskParseError::UnexpectedOpeningBracket { offset });
                };
                if matches!(current[index], MaskNode::Wildcard) {
                    return Err(MaskParseError::UnexpectedOpeningBracket { offset });
                }
                let parent = std::mem::take(&mut current);
                stack.push((parent, index));
                previous = Previous::Open;
            }
            "}" => {
                let (mut parent, index) = stack
                    .pop()
                    .ok_or(MaskParseError::UnexpectedClosingBracket { offset })?;
                let name = parent[index].name().to_string();
                parent[index] = MaskNode::Nested(name, std::mem::take(&mut current));
                current = parent;
                previous = Previous::Close;
            }
            "," => {
                if matches!(previous, Previous::Start | Previous::Open | Previous::Comma) {
                    return Err(MaskParseError::UnexpectedComma { offset });
                }
                previous = Previous::Comma;
            }
            name => {
                let index = insert(&mut current, MaskNode::leaf(name));
                previous = Previous::Name(index);
            }
        }
    }

    if !stack.is_empty() {
        return Err(MaskParseError::MissingClosingBracket);
    }

    Ok(Mask::new(current))
}

#[derive(Debug, Clone, Copy)]
enum Previous {
    Start,
    Open,
    Close,
    Comma,
    Name(usize),
}

/// Insert keyed by name: a repeated name replaces the earlier node in place.
fn insert(frame: &mut Vec<MaskNode>, node: MaskNode) -> usize {
    match frame.iter().position(|n| n.name() == node.name()) {
        Some(index) => {
            frame[index] = node;
            index
        }
        None => {
            frame.push(node);
            frame.len() - 1
        }
    }
}

fn nodes_to_value(nodes: &[MaskNode]) -> Value {
    let mut map = Map::new();
    for node in nodes {
        let value = match node {
            MaskNode::Wildcard | MaskNode::Leaf(_) => Value::Bool(true),
            MaskNode::Nested(_, children) => nodes_to_value(children),
        };
        map.insert(node.name().to_string(), value);
    }
    Value::Object(map)
}

fn write_nodes(f: &mut fmt::Formatter<'_>, nodes: &[MaskNode]) -> fmt::Result {
    f.write_str("{")?;
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        f.write_str(node.name())?;
        if let MaskNode::Nested(_, children) = node {
            write_nodes(f, children)?;
        }
    }
    f.write_str("}")
}

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_nodes(f, &self.nodes)
    }
}

impl FromStr for Mask {
    type Err = MaskParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

impl Serialize for Mask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Mask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Anything usable as a mask: raw text or an already parsed tree.
pub trait AsMask {
    fn as_mask(&self) -> Result<Cow<'_, Mask>, MaskParseError>;
}

impl AsMask for str {
    fn as_mask(&self) -> Result<Cow<'_, Mask>, MaskParseError> {
        parse(self).map(Cow::Owned)
    }
}

impl AsMask for String {
    fn as_mask(&self) -> Result<Cow<'_, Mask>, MaskParseError> {
        self.as_str().as_mask()
    }
}

impl AsMask for Mask {
    fn as_mask(&self) -> Result<Cow<'_, Mask>, MaskParseError> {
        Ok(Cow::Borrowed(self))
    }
}

impl AsMask for [MaskNode] {
    fn as_mask(&self) -> Result<Cow<'_, Mask>, MaskParseError> {
        Ok(Cow::Owned(Mask::new(self.to_vec())))
    }
}
