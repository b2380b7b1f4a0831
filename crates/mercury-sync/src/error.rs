//! Error types for notebook handling.

use std::path::PathBuf;

/// Result type for notebook operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while building, writing or reading notebooks.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Failed to read a notebook file.
    #[error("Failed to read file {path}: {message}")]
    ReadError { path: PathBuf, message: String },

    /// Failed to write a notebook file.
    #[error("Failed to write file {path}: {message}")]
    WriteError { path: PathBuf, message: String },

    /// The notebook file does not exist.
    #[error("Notebook not found: {0}")]
    NotFound(String),

    /// Failed to serialize/deserialize JSON.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Cell specifications could not be interpreted.
    #[error("Invalid cells format: {0}")]
    InvalidCells(String),

    /// Invalid notebook structure.
    #[error("Invalid notebook: {0}")]
    InvalidNotebook(String),
}
