//! Tool dispatch for Mercury sessions.
//!
//! Decodes tool calls, runs them against a shared [`Session`] and renders
//! the results as content blocks. Transport framing is left to the
//! embedding server.
//!
//! [`Session`]: mercury_core::Session

pub mod error;
pub mod protocol;
pub mod render;
pub mod router;

pub use error::{ToolError, ToolResult};
pub use protocol::{ContentBlock, ToolCall, ToolDefinition, ToolResponse, tool_definitions};
pub use router::{ToolRouter, dispatch};
