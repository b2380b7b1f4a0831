//! Dispatch of tool calls onto a shared session.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;

use mercury_core::{Session, SessionConfig};

use crate::error::{ToolError, ToolResult};
use crate::protocol::{ToolCall, ToolDefinition, ToolResponse, tool_definitions};
use crate::render;

/// Routes tool calls to one session.
///
/// The session sits behind an async mutex so calls are serialised; each
/// call runs on the blocking pool because kernel I/O is synchronous.
#[derive(Clone)]
pub struct ToolRouter {
    session: Arc<Mutex<Session>>,
}

impl ToolRouter {
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }

    /// Open a session from `config` and start its kernel.
    ///
    /// A kernel that fails to start is logged and reported as dead; the
    /// `restart_kernel` tool can bring it back.
    pub fn from_config(config: SessionConfig) -> ToolResult<Self> {
        let mut session = Session::open(config)?;
        if let Err(e) = session.start_kernel() {
            tracing::error!("Kernel unavailable until restarted: {}", e);
        }
        Ok(Self::new(session))
    }

    pub fn session(&self) -> Arc<Mutex<Session>> {
        self.session.clone()
    }

    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        tool_definitions()
    }

    /// Handle raw `tools/call` parameters.
    pub async fn call(&self, params: &Value) -> ToolResponse {
        match ToolCall::from_params(params) {
            Ok(call) => self.call_tool(call).await,
            Err(e) => e.into(),
        }
    }

    /// Handle a decoded tool call. Never fails; errors become `isError`
    /// responses.
    pub async fn call_tool(&self, call: ToolCall) -> ToolResponse {
        let session = self.session.clone();
        let name = call.name.clone();
        tracing::debug!("Tool call: {}", name);

        // Kernel I/O blocks, keep it off the async workers
        let outcome = tokio::task::spawn_blocking(move || {
            let mut session = session.blocking_lock();
            dispatch(&mut session, &call)
        })
        .await;

        match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!("Tool {} failed: {}", name, e);
                e.into()
            }
            Err(e) => ToolError::TaskFailed(e.to_string()).into(),
        }
    }

    /// Shut the session down. Further calls report a dead kernel.
    pub async fn shutdown(&self) {
        self.session.lock().await.shutdown();
    }
}

/// Run one tool against the session.
pub fn dispatch(session: &mut Session, call: &ToolCall) -> ToolResult<ToolResponse> {
    match call.name.as_str() {
        "execute_code" => {
            let code = call.str_arg("code")?;
            let timeout = timeout_arg(call)?;
            Ok(render::execution(&session.execute(code, timeout)?))
        }
        "get_kernel_status" => render::json(&session.status()),
        "restart_kernel" => {
            session.restart()?;
            Ok(ToolResponse::text("Kernel restarted successfully"))
        }
        "get_variables" => render::inspection(session.get_variables()?),
        "inspect_variable" => render::inspection(session.inspect_variable(call.str_arg("name")?)?),
        "install_package" => {
            let package = call.str_arg("package")?;
            Ok(render::execution(&session.install_package(package)?))
        }
        "create_notebook" => {
            let filename = call.str_arg("filename")?;
            let cells = mercury_sync::parse_cell_specs(call.value_arg("cells")?)?;
            Ok(render::created_notebook(&session.create_notebook(filename, &cells)?))
        }
        "read_notebook" => render::json(&session.read_notebook(call.str_arg("filename")?)?),
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

fn timeout_arg(call: &ToolCall) -> ToolResult<Option<Duration>> {
    let Some(seconds) = call.f64_arg("timeout")? else {
        return Ok(None);
    };
    let invalid = || ToolError::InvalidArgument {
        name: "timeout",
        message: format!("must be a positive number of seconds, got {}", seconds),
    };
    if seconds <= 0.0 {
        return Err(invalid());
    }
    Duration::try_from_secs_f64(seconds).map(Some).map_err(|_| invalid())
}
