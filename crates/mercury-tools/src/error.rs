//! Error types for tool dispatch.

/// Tool dispatch error type.
///
/// Every error is turned into an `isError` response by the router.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The call parameters could not be decoded.
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// No tool with this name exists.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// A required argument is absent.
    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),

    /// An argument has the wrong type or value.
    #[error("Invalid argument '{name}': {message}")]
    InvalidArgument { name: &'static str, message: String },

    /// Mercury core error.
    #[error(transparent)]
    Core(#[from] mercury_core::Error),

    /// Notebook error.
    #[error(transparent)]
    Notebook(#[from] mercury_sync::SyncError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The blocking task running the call panicked or was cancelled.
    #[error("Tool task failed: {0}")]
    TaskFailed(String),
}

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;
