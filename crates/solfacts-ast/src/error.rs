//! Error types for the tree model.

use thiserror::Error;

/// Errors that can occur while loading or indexing a tree.
#[derive(Debug, Error)]
pub enum AstError {
    /// A node's `nodeType` is not one of the known node kinds.
    #[error("unknown node kind: {0}")]
    UnknownNodeKind(String),

    /// Two nodes in one tree share an identifier.
    #[error("duplicate node id {0}")]
    DuplicateId(i64),

    /// A `src` attribute is not of the form `start:length:file`.
    #[error("invalid source location: {0}")]
    InvalidSource(String),

    /// JSON deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
