//! Interpreter processes and their supervision.
//!
//! This module provides the request/event wire records, the launcher
//! seam, and the supervisor that owns one interpreter for a session.

mod process;
pub mod protocol;
mod supervisor;

pub use process::{KernelLauncher, KernelProcess, StdioLauncher};
pub use protocol::{ExecuteRequest, read_line, write_message};
pub use supervisor::{KernelState, KernelSupervisor};
