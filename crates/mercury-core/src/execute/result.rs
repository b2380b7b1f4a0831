//! Execution requests and results.

use std::time::Duration;

use serde::Serialize;

use crate::config::DEFAULT_EXECUTION_TIMEOUT;
use crate::workspace::UploadOutcome;

/// Output text reported when successful code printed nothing.
pub const NO_OUTPUT_PLACEHOLDER: &str = "Code executed successfully (no output)";

/// Code to run plus its deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub code: String,
    pub timeout: Duration,
}

impl ExecutionRequest {
    /// Request with the default 60 second timeout.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            timeout: DEFAULT_EXECUTION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Why an execution did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The kernel was dead before or died during the execution.
    KernelNotRunning,
    /// No idle event arrived before the deadline.
    ExecutionTimeout,
    /// The code raised at least one error.
    InterpreterError,
}

/// Failure details attached to an unsuccessful result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// A base64-encoded image produced by executed code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageOutput {
    pub data: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// Outcome of one execution.
///
/// Successful iff `failure` is `None`. Text collected before a failure is
/// kept in `output`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    /// Joined text output. On success this falls back to
    /// [`NO_OUTPUT_PLACEHOLDER`]; on failure it is the partial output, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ExecutionFailure>,
    /// Workspace files uploaded after a successful execution.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<UploadOutcome>,
    /// Persistence failed; the execution itself still succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence_warning: Option<String>,
}

impl ExecutionResult {
    /// Successful result.
    pub fn succeeded(output: Option<String>, images: Vec<ImageOutput>) -> Self {
        Self {
            output: Some(output.unwrap_or_else(|| NO_OUTPUT_PLACEHOLDER.to_string())),
            images,
            failure: None,
            artifacts: Vec::new(),
            persistence_warning: None,
        }
    }

    /// Failed result carrying whatever output was collected.
    pub fn failed(kind: FailureKind, message: impl Into<String>, partial_output: Option<String>) -> Self {
        Self {
            output: partial_output,
            images: Vec::new(),
            failure: Some(ExecutionFailure {
                kind,
                message: message.into(),
            }),
            artifacts: Vec::new(),
            persistence_warning: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure.as_ref().map(|f| f.kind)
    }

    /// Failure message, if the execution failed.
    pub fn error(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.message.as_str())
    }
}
