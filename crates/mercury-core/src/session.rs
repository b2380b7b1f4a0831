//! One interactive session: a supervised kernel plus its workspace.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use mercury_sync::{CellSpec, NotebookSummary, SyncError};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::execute::{ExecutionEngine, ExecutionRequest, ExecutionResult};
use crate::introspect::{self, Inspection};
use crate::kernel::{KernelLauncher, KernelSupervisor, StdioLauncher};
use crate::workspace::{ArtifactDescriptor, LocalObjectStore, ObjectStore, SessionInfo, WorkspaceStore};

const INTROSPECTION_TIMEOUT: Duration = Duration::from_secs(10);
const INSTALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Kernel liveness as reported by [`Session::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelHealth {
    Running,
    Dead,
}

/// Snapshot of the session's kernel and workspace.
///
/// A dead kernel reports only `status` and `alive`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KernelStatus {
    pub status: KernelHealth,
    pub alive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_info: Option<SessionInfo>,
}

/// A notebook written by [`Session::create_notebook`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedNotebook {
    pub path: PathBuf,
    pub cells: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<ArtifactDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_warning: Option<String>,
}

/// Owns one kernel, the execution engine and, with persistence enabled,
/// the session workspace.
///
/// All operations take `&mut self`; callers serialise access.
pub struct Session {
    id: String,
    config: SessionConfig,
    working_dir: PathBuf,
    supervisor: KernelSupervisor,
    engine: ExecutionEngine,
    workspace: Option<WorkspaceStore>,
    closed: bool,
}

impl Session {
    /// [`open`](Self::open) a session and start its kernel.
    pub fn start(config: SessionConfig) -> Result<Self> {
        let mut session = Self::open(config)?;
        session.start_kernel()?;
        Ok(session)
    }

    /// Create a session with the default stdio launcher and a filesystem
    /// object store. The kernel is not started.
    pub fn open(config: SessionConfig) -> Result<Self> {
        let launcher = StdioLauncher::new(config.kernel.interpreter.clone());
        let store: Option<Arc<dyn ObjectStore>> = match config.bucket {
            Some(_) => Some(Arc::new(LocalObjectStore::new(&config.object_store_root)?)),
            None => None,
        };
        Self::new(config, Box::new(launcher), store)
    }

    /// Create a session without starting its kernel.
    ///
    /// `store` is required when the config names a bucket and ignored
    /// otherwise.
    pub fn new(
        config: SessionConfig,
        launcher: Box<dyn KernelLauncher>,
        store: Option<Arc<dyn ObjectStore>>,
    ) -> Result<Self> {
        config.validate()?;

        let (id, working_dir, workspace) = match (&config.bucket, store) {
            (Some(bucket), Some(store)) => {
                let mut workspace = WorkspaceStore::new(store, bucket.clone(), &config.working_dir)
                    .with_key_prefix(config.key_prefix.clone())
                    .with_url_expiry_hours(config.url_expiry_hours);
                let dir = workspace.create_workspace()?;
                (workspace.session_id().to_string(), dir, Some(workspace))
            }
            (Some(_), None) => {
                return Err(Error::Config(
                    "a bucket is configured but no object store was provided".to_string(),
                ));
            }
            (None, _) => {
                std::fs::create_dir_all(&config.working_dir)?;
                let dir = std::path::absolute(&config.working_dir)?;
                (uuid::Uuid::new_v4().to_string(), dir, None)
            }
        };

        let supervisor = KernelSupervisor::new(launcher, config.kernel.clone(), working_dir.clone());
        let engine = ExecutionEngine::new(config.poll_slice);

        tracing::info!(
            "Session {} created in {} (persistence {})",
            id,
            working_dir.display(),
            if workspace.is_some() { "enabled" } else { "disabled" }
        );

        Ok(Self {
            id,
            config,
            working_dir,
            supervisor,
            engine,
            workspace,
            closed: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn persistence_enabled(&self) -> bool {
        self.workspace.is_some()
    }

    pub fn workspace(&self) -> Option<&WorkspaceStore> {
        self.workspace.as_ref()
    }

    pub fn supervisor(&self) -> &KernelSupervisor {
        &self.supervisor
    }

    /// Start the kernel. After a failure only [`restart`](Self::restart)
    /// brings it back.
    pub fn start_kernel(&mut self) -> Result<()> {
        self.supervisor.start()
    }

    pub fn is_alive(&mut self) -> bool {
        self.supervisor.is_alive()
    }

    /// Execute code with `timeout`, or the configured default.
    pub fn execute(&mut self, code: &str, timeout: Option<Duration>) -> Result<ExecutionResult> {
        let request = ExecutionRequest::new(code).with_timeout(timeout.unwrap_or(self.config.default_timeout));
        self.run(&request)
    }

    fn run(&mut self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        self.engine
            .execute(&mut self.supervisor, self.workspace.as_ref(), request)
    }

    /// Replace the kernel, discarding all interpreter state. Workspace
    /// files are kept.
    pub fn restart(&mut self) -> Result<()> {
        self.supervisor.restart()
    }

    pub fn status(&mut self) -> KernelStatus {
        if !self.supervisor.is_alive() {
            return KernelStatus {
                status: KernelHealth::Dead,
                alive: false,
                kernel_name: None,
                working_dir: None,
                persistence_enabled: None,
                session_info: None,
            };
        }

        KernelStatus {
            status: KernelHealth::Running,
            alive: true,
            kernel_name: Some(self.supervisor.kernel_name().to_string()),
            working_dir: Some(self.working_dir.clone()),
            persistence_enabled: Some(self.persistence_enabled()),
            session_info: self.workspace.as_ref().map(WorkspaceStore::session_info),
        }
    }

    /// Describe the public names in the kernel namespace.
    pub fn get_variables(&mut self) -> Result<Inspection> {
        let request = ExecutionRequest::new(introspect::VARIABLES_SNIPPET).with_timeout(INTROSPECTION_TIMEOUT);
        let result = self.run(&request)?;

        Ok(match result.error() {
            Some(message) => Inspection::Failed(message.to_string()),
            None => Inspection::Value(serde_json::Value::Object(introspect::parse_variables(
                result.output.as_deref().unwrap_or_default(),
            ))),
        })
    }

    /// Describe one variable or attribute path, e.g. `df` or `model.coef_`.
    pub fn inspect_variable(&mut self, name: &str) -> Result<Inspection> {
        let code = introspect::inspect_snippet(name)?;
        let result = self.run(&ExecutionRequest::new(code).with_timeout(INTROSPECTION_TIMEOUT))?;

        Ok(match result.error() {
            Some(message) => Inspection::Failed(message.to_string()),
            None => introspect::parse_inspection(result.output.as_deref().unwrap_or_default()),
        })
    }

    /// Install packages with pip inside the kernel.
    ///
    /// `spec` is split like a shell word list and each word is quoted, so
    /// `"pandas numpy>=2"` installs two packages.
    pub fn install_package(&mut self, spec: &str) -> Result<ExecutionResult> {
        let words = shlex::split(spec)
            .filter(|words| !words.is_empty())
            .ok_or_else(|| Error::InvalidArgument(format!("Invalid package specification: {}", spec)))?;
        let quoted = shlex::try_join(words.iter().map(String::as_str))
            .map_err(|e| Error::InvalidArgument(format!("Invalid package specification: {}", e)))?;

        tracing::info!("Installing {}", quoted);
        let request = ExecutionRequest::new(format!("!pip install {}", quoted)).with_timeout(INSTALL_TIMEOUT);
        self.run(&request)
    }

    /// Write a notebook into the working directory and persist it when
    /// persistence is enabled.
    pub fn create_notebook(&mut self, filename: &str, cells: &[CellSpec]) -> Result<CreatedNotebook> {
        let relative = Path::new(filename);
        if filename.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(Error::InvalidArgument(format!("Invalid notebook filename: {}", filename)));
        }

        let path = mercury_sync::create_notebook(&self.working_dir, filename, cells)?;

        let (upload, upload_warning) = match &self.workspace {
            Some(workspace) => match workspace.upload_file(&path, None) {
                Ok(artifact) => (Some(artifact), None),
                Err(e) => {
                    tracing::warn!("Failed to upload notebook {}: {}", path.display(), e);
                    (None, Some(e.to_string()))
                }
            },
            None => (None, None),
        };

        Ok(CreatedNotebook {
            path,
            cells: cells.len(),
            upload,
            upload_warning,
        })
    }

    /// Summarise a notebook. Relative paths resolve against the working
    /// directory.
    pub fn read_notebook(&self, filename: &str) -> Result<NotebookSummary> {
        let path = self.working_dir.join(filename);
        NotebookSummary::read(&path).map_err(|e| match e {
            SyncError::NotFound(_) => Error::Notebook(SyncError::NotFound(filename.to_string())),
            other => Error::Notebook(other),
        })
    }

    /// Kill the kernel and remove the workspace. Idempotent.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.supervisor.shutdown();
        if let Some(workspace) = self.workspace.as_mut() {
            workspace.cleanup();
        }
        tracing::info!("Session {} closed", self.id);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
