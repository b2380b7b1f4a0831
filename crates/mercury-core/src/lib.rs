//! Core engine for Mercury interactive code execution.
//!
//! This crate provides:
//! - Kernel supervision over a long-lived interpreter subprocess
//! - Deadline-bounded execution with event aggregation
//! - Per-session workspaces persisted to an object store
//! - Session-level introspection, package install and notebook helpers

pub mod config;
pub mod error;
pub mod event;
pub mod execute;
pub mod introspect;
pub mod kernel;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod workspace;

pub use config::{KernelConfig, SessionConfig};
pub use error::{Error, Result};
pub use event::{ExecutionEvent, KernelActivity, MimeBundle};
pub use execute::{
    EventAggregator, ExecutionEngine, ExecutionFailure, ExecutionRequest, ExecutionResult,
    FailureKind, ImageOutput, NO_OUTPUT_PLACEHOLDER,
};
pub use introspect::{Inspection, validate_variable_path};
pub use kernel::{KernelLauncher, KernelProcess, KernelState, KernelSupervisor, StdioLauncher};
pub use session::{CreatedNotebook, KernelHealth, KernelStatus, Session};
pub use workspace::{
    ArtifactDescriptor, LocalObjectStore, ObjectStore, PresignedUrl, SessionInfo, UploadOutcome,
    WorkspaceStore,
};
