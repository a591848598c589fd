//! Store error types.

use thiserror::Error;

/// Errors produced by the history store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure while reading or writing a history file.
    #[error("history i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// A result could not be serialized or a stored line parsed.
    #[error("history record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A deletion index does not exist for the given test.
    #[error("history index {index} out of range for '{qualified_name}'")]
    IndexOutOfRange { qualified_name: String, index: usize },
}
