//! Typed syntax trees for solfacts.
//!
//! This crate provides the tree model consumed by the fact codec:
//! - [`Node`] and [`Value`]: nodes in solc compact JSON shape
//! - [`NodeIndex`]: identifier lookup over a set of trees
//! - [`SourceLocation`]: parsed `start:length:file` spans
//! - [`grammar`]: node-kind descriptors, and [`solidity`] for the Solidity grammar

mod error;
pub mod grammar;
mod index;
mod node;
pub mod solidity;
mod source;

pub use error::AstError;
pub use grammar::{FieldDescriptor, FieldShape, Grammar, NodeKindDescriptor, SemanticType};
pub use index::NodeIndex;
pub use node::{ABSENT_ID, Node, NodeId, PreOrder, Value};
pub use source::SourceLocation;
