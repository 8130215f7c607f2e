//! Identifier-to-node lookup over one or more trees.

use std::collections::HashMap;

use crate::{AstError, Node, NodeId};

/// Maps every node identifier in a set of trees to the node itself.
#[derive(Debug, Default)]
pub struct NodeIndex<'a> {
    nodes: HashMap<NodeId, &'a Node>,
}

impl<'a> NodeIndex<'a> {
    /// Index every node reachable from `roots`.
    ///
    /// Fails if two nodes share an identifier.
    pub fn from_roots(roots: impl IntoIterator<Item = &'a Node>) -> Result<Self, AstError> {
        let mut nodes = HashMap::new();
        for root in roots {
            for (_, node) in root.walk() {
                if nodes.insert(node.id, node).is_some() {
                    return Err(AstError::DuplicateId(node.id));
                }
            }
        }
        Ok(Self { nodes })
    }

    pub fn get(&self, id: NodeId) -> Option<&'a Node> {
        self.nodes.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
