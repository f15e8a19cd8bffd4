//! Persistence layer error types

use thiserror::Error;

use crate::domain::error::SchemaError;

/// Errors that can occur in the persistence layer
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Document not found
    #[error("Form document not found: '{0}'")]
    NotFound(String),

    /// Document ids double as file names
    #[error("Invalid form document id '{0}': only letters, digits, '_' and '-' are allowed")]
    InvalidId(String),

    /// The stored field tree does not normalize
    #[error("Stored field tree is invalid: {0}")]
    Schema(#[from] SchemaError),

    /// Filesystem error
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
