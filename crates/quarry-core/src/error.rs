//! Error types for the Quarry console.

use std::time::Duration;
use thiserror::Error;

/// A result that violates the tabular shape invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// A row does not have one cell per column.
    #[error("row {row} has {found} cells, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// Two columns share a name.
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),
}

/// Engine errors - displayed in-band as a synthetic "Error" result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine rejected the statement.
    #[error("{0}")]
    Query(String),

    /// The request was aborted by the user.
    #[error("Query cancelled")]
    Cancelled,

    /// The engine did not answer in time.
    #[error("Query timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// The engine worker is gone.
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    /// A file table function could not load its file.
    #[error("Failed to read '{path}': {message}")]
    File { path: String, message: String },

    /// The engine cannot serve this request.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The engine produced a malformed result.
    #[error("Malformed result: {0}")]
    Shape(#[from] ShapeError),
}

impl EngineError {
    /// Whether this error represents a user cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }
}

/// A failed "load more" request. Already loaded rows are kept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to load rows from offset {offset}: {source}")]
pub struct PaginationError {
    /// Offset the failed page was requested at.
    pub offset: usize,

    /// Underlying engine failure.
    #[source]
    pub source: EngineError,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No config directory found.
    #[error("Config directory not found")]
    NoConfigDir,

    /// IO error.
    #[error("IO error: {0}")]
    Io(String),

    /// Parse error.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid key binding.
    #[error("Invalid key binding: {0}")]
    InvalidKeyBinding(String),
}
