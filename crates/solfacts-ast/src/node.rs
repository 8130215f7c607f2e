//! Tree nodes and field values.
//!
//! Nodes follow the shape of the solc compact JSON AST: every node carries an
//! `id`, a `src` span and a `nodeType`, plus named fields. Owned children are
//! embedded node objects; cross references are bare numeric identifiers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::AstError;

/// Identifier of a node within one tree instance.
pub type NodeId = i64;

/// Sentinel identifier standing in for an absent reference.
pub const ABSENT_ID: NodeId = -1;

/// A single tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique, non-negative identifier.
    pub id: NodeId,
    /// Source span as `start:length:fileIndex`.
    #[serde(default)]
    pub src: String,
    /// Name of the node kind, e.g. `FunctionCall`.
    #[serde(rename = "nodeType")]
    pub node_type: String,
    /// Named fields in key order.
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

/// The runtime value of a node field.
///
/// Whether a string is free text or an enumeration symbol, and whether a
/// number is a count or a node reference, is decided by the grammar, not by
/// the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Node(Box<Node>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Node {
    /// Create a node with no fields.
    pub fn new(id: NodeId, node_type: impl Into<String>, src: impl Into<String>) -> Self {
        Self {
            id,
            src: src.into(),
            node_type: node_type.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Load a tree from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, AstError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The node's `name` field, if it has a textual one.
    pub fn name(&self) -> Option<&str> {
        self.field("name").and_then(Value::as_str)
    }

    /// Direct children: every node embedded in any field, in field order.
    pub fn children(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        for value in self.fields.values() {
            value.collect_nodes(&mut out);
        }
        out
    }

    /// Pre-order traversal of this node and all of its descendants.
    pub fn walk(&self) -> PreOrder<'_> {
        PreOrder {
            stack: vec![(None, self)],
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    /// The identifier this value refers to: an embedded node's id or a bare
    /// numeric reference.
    pub fn as_node_id(&self) -> Option<NodeId> {
        match self {
            Value::Node(n) => Some(n.id),
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    fn collect_nodes<'a>(&'a self, out: &mut Vec<&'a Node>) {
        match self {
            Value::Node(n) => out.push(n),
            Value::List(items) => items.iter().for_each(|v| v.collect_nodes(out)),
            Value::Map(entries) => entries.values().for_each(|v| v.collect_nodes(out)),
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Str(_) => {}
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Node> for Value {
    fn from(n: Node) -> Self {
        Value::Node(Box::new(n))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Pre-order iterator yielding `(parent, node)` pairs.
pub struct PreOrder<'a> {
    stack: Vec<(Option<&'a Node>, &'a Node)>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = (Option<&'a Node>, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        let (parent, node) = self.stack.pop()?;
        // Reverse so the first child is popped next.
        for child in node.children().into_iter().rev() {
            self.stack.push((Some(node), child));
        }
        Some((parent, node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Node {
        Node::new(1, "Block", "0:20:0").with(
            "statements",
            vec![
                Node::new(2, "ExpressionStatement", "1:5:0")
                    .with("expression", Node::new(3, "Identifier", "1:4:0").with("name", "x")),
                Node::new(4, "Break", "7:6:0"),
            ],
        )
    }

    #[test]
    fn test_walk_is_pre_order() {
        let tree = sample();
        let ids: Vec<_> = tree.walk().map(|(_, n)| n.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_walk_reports_parents() {
        let tree = sample();
        let edges: Vec<_> = tree
            .walk()
            .filter_map(|(p, n)| p.map(|p| (p.id, n.id)))
            .collect();
        assert_eq!(edges, vec![(1, 2), (2, 3), (1, 4)]);
    }

    #[test]
    fn test_from_json_distinguishes_nodes_and_refs() {
        let json = r#"{
            "id": 7,
            "src": "10:3:0",
            "nodeType": "Identifier",
            "name": "owner",
            "referencedDeclaration": 4,
            "typeString": "address"
        }"#;
        let node = Node::from_json(json).unwrap();
        assert_eq!(node.node_type, "Identifier");
        assert_eq!(node.name(), Some("owner"));
        assert_eq!(node.field("referencedDeclaration"), Some(&Value::Int(4)));
        assert!(node.children().is_empty());
    }

    #[test]
    fn test_from_json_embedded_child_and_plain_map() {
        let json = r#"{
            "id": 1,
            "src": "0:1:0",
            "nodeType": "ExpressionStatement",
            "expression": {"id": 2, "src": "0:1:0", "nodeType": "Literal", "value": null},
            "meta": {"a": 1}
        }"#;
        let node = Node::from_json(json).unwrap();
        let child = node.field("expression").and_then(Value::as_node).unwrap();
        assert_eq!(child.id, 2);
        assert_eq!(child.field("value"), Some(&Value::Null));
        assert!(matches!(node.field("meta"), Some(Value::Map(_))));
    }
}
