//! Error types for the fact codec.

use solfacts_ast::AstError;
use thiserror::Error;

/// Errors that can occur while deriving schemas, encoding, running or lifting.
#[derive(Debug, Error)]
pub enum DatalogError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A semantic or column type has no registered mapping.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// The node-kind grammar is malformed (cyclic or dangling bases, clashing names).
    #[error("invalid grammar: {0}")]
    InvalidGrammar(String),

    /// A node's kind has no concrete descriptor.
    #[error("unknown node kind: {0}")]
    UnknownNodeKind(String),

    /// Two nodes share an identifier, or an identifier is negative.
    #[error("identifier conflict on node {0}")]
    IdentifierConflict(i64),

    /// A field's runtime value does not fit its declared shape or type.
    #[error("field {kind}.{field}: {reason}")]
    FieldType {
        kind: String,
        field: String,
        reason: String,
    },

    /// A tuple was added to, or requested from, an undeclared relation.
    #[error("unknown relation: {0}")]
    UnknownRelation(String),

    /// A tuple's width does not match its relation.
    #[error("arity mismatch for {relation}: expected {expected} columns, got {actual}")]
    ArityMismatch {
        relation: String,
        expected: usize,
        actual: usize,
    },

    /// A fact file or program text could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The engine exited unsuccessfully; `stderr` is its verbatim output.
    #[error("engine failed ({status}): {stderr}")]
    EngineFailure { status: String, stderr: String },

    /// A requested output relation produced no file.
    #[error("engine produced no output for relation {0}")]
    MissingOutput(String),

    /// Soufflé not found.
    #[error("Soufflé not found: {0}")]
    SouffleNotFound(String),

    /// The rule program failed to compile.
    #[error("rule program failed to compile: {0}")]
    Compile(String),

    /// An engine tuple names a node that is not in the tree.
    #[error("dangling reference to node {0}")]
    DanglingReference(i64),

    /// A template placeholder's accessor path does not resolve.
    #[error("cannot resolve {{{placeholder}}}{path} in template")]
    FormatPathError { placeholder: usize, path: String },

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<AstError> for DatalogError {
    fn from(err: AstError) -> Self {
        match err {
            AstError::UnknownNodeKind(kind) => DatalogError::UnknownNodeKind(kind),
            AstError::DuplicateId(id) => DatalogError::IdentifierConflict(id),
            AstError::InvalidSource(src) => DatalogError::Parse(format!("source location {src}")),
            AstError::Json(e) => DatalogError::Json(e),
        }
    }
}

impl DatalogError {
    pub(crate) fn field_type(kind: &str, field: &str, reason: impl Into<String>) -> Self {
        DatalogError::FieldType {
            kind: kind.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
