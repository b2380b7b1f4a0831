//! Error types for mercury-core.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for mercury-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mercury-core.
///
/// Failures of executed code (interpreter errors, timeouts, a dead kernel)
/// are not errors: they are reported inside
/// [`ExecutionResult`](crate::execute::ExecutionResult).
#[derive(Debug, Error)]
pub enum Error {
    /// The interpreter could not be launched or did not become ready.
    #[error("kernel failed to start: {0}")]
    StartupFailure(String),

    /// Restarting the interpreter failed; the kernel is left dead.
    #[error("kernel restart failed: {0}")]
    RestartFailure(String),

    /// The supervisor was never started. This is a caller bug.
    #[error("kernel was never started")]
    KernelNotStarted,

    /// Communication with the interpreter process failed.
    #[error("kernel transport error: {0}")]
    Transport(String),

    /// A record from the interpreter could not be decoded.
    #[error("kernel protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for the interpreter.
    #[error("timed out after {0:?} waiting for kernel")]
    Timeout(Duration),

    /// File to upload does not exist.
    #[error("File not found: {}", .0.display())]
    ArtifactNotFound(PathBuf),

    /// Object does not exist in the object store.
    #[error("object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    /// Object key is empty, absolute or escapes the bucket.
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    /// Access URL is past its expiry.
    #[error("access URL expired")]
    ExpiredUrl,

    /// Access URL was not issued by this store or has been tampered with.
    #[error("access URL has an invalid signature")]
    InvalidSignature,

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Invalid argument for a session operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Notebook error.
    #[error(transparent)]
    Notebook(#[from] mercury_sync::SyncError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
