//! Per-session workspace directories and their persistence.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use walkdir::WalkDir;

use crate::config::{DEFAULT_KEY_PREFIX, DEFAULT_URL_EXPIRY_HOURS};
use crate::error::{Error, Result};

use super::object_store::ObjectStore;

/// A workspace file persisted to the object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDescriptor {
    /// Path relative to the workspace, `/`-separated.
    pub relative_path: String,
    pub local_path: PathBuf,
    pub object_key: String,
    pub object_uri: String,
    pub access_url: String,
    pub expires_in_hours: u64,
    /// Expiry of `access_url` as seconds since the Unix epoch.
    pub expires_at: u64,
    pub size_bytes: u64,
}

/// Result of uploading one file during a bulk upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    Uploaded(ArtifactDescriptor),
    Failed { relative_path: String, error: String },
}

impl UploadOutcome {
    pub fn relative_path(&self) -> &str {
        match self {
            UploadOutcome::Uploaded(artifact) => &artifact.relative_path,
            UploadOutcome::Failed { relative_path, .. } => relative_path,
        }
    }
}

/// Workspace details reported in kernel status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub workspace_path: Option<PathBuf>,
    pub base_path: PathBuf,
    pub bucket: String,
    pub key_prefix: String,
    pub url_expiry_hours: u64,
}

/// Owns one session directory and persists its files.
///
/// Objects are stored under `<key_prefix>/<session_id>/<relative path>`.
pub struct WorkspaceStore {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    base_path: PathBuf,
    key_prefix: String,
    url_expiry_hours: u64,
    session_id: String,
    workspace_path: Option<PathBuf>,
}

impl WorkspaceStore {
    /// Create a store with a fresh session id. No directory is created
    /// until [`create_workspace`](Self::create_workspace).
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            base_path: base_path.into(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            url_expiry_hours: DEFAULT_URL_EXPIRY_HOURS,
            session_id: uuid::Uuid::new_v4().to_string(),
            workspace_path: None,
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_url_expiry_hours(mut self, hours: u64) -> Self {
        self.url_expiry_hours = hours;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn workspace_path(&self) -> Option<&Path> {
        self.workspace_path.as_deref()
    }

    /// Create `<base>/session_<id>` and return its path.
    pub fn create_workspace(&mut self) -> Result<PathBuf> {
        let path = std::path::absolute(self.base_path.join(format!("session_{}", self.session_id)))?;
        fs::create_dir_all(&path)?;
        tracing::info!("Created workspace {}", path.display());
        self.workspace_path = Some(path.clone());
        Ok(path)
    }

    /// Every regular file under the workspace, in path order.
    ///
    /// A missing workspace yields no files.
    pub fn scan_files(&self) -> Result<Vec<PathBuf>> {
        let Some(root) = self.workspace_path.as_deref().filter(|p| p.exists()) else {
            return Ok(Vec::new());
        };

        let mut files = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            match entry {
                Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping unreadable workspace entry: {}", e),
            }
        }
        Ok(files)
    }

    /// Upload one file.
    ///
    /// Relative paths resolve against the workspace. Without an explicit
    /// key the object is stored as `<prefix>/<session>/<file name>`.
    pub fn upload_file(&self, local_path: &Path, key: Option<&str>) -> Result<ArtifactDescriptor> {
        let resolved;
        let local_path = match &self.workspace_path {
            Some(root) if local_path.is_relative() => {
                resolved = root.join(local_path);
                resolved.as_path()
            }
            _ => local_path,
        };
        if !local_path.is_file() {
            return Err(Error::ArtifactNotFound(local_path.to_path_buf()));
        }

        let relative_path = self.relative_path(local_path);
        let key = match key {
            Some(key) => key.to_string(),
            None => {
                let file_name = local_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| relative_path.clone());
                self.object_key(&file_name)
            }
        };
        self.upload_as(local_path, relative_path, key)
    }

    /// Upload every workspace file, preserving relative paths.
    ///
    /// A failure on one file is recorded and does not stop the others.
    pub fn upload_all(&self) -> Result<Vec<UploadOutcome>> {
        let files = self.scan_files()?;
        let mut outcomes = Vec::with_capacity(files.len());

        for file in files {
            let relative_path = self.relative_path(&file);
            let key = self.object_key(&relative_path);
            match self.upload_as(&file, relative_path.clone(), key) {
                Ok(artifact) => outcomes.push(UploadOutcome::Uploaded(artifact)),
                Err(e) => {
                    tracing::warn!("Failed to upload {}: {}", relative_path, e);
                    outcomes.push(UploadOutcome::Failed {
                        relative_path,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(outcomes)
    }

    /// Remove the workspace directory. Idempotent; errors are logged.
    pub fn cleanup(&mut self) {
        let Some(path) = self.workspace_path.as_deref() else {
            return;
        };
        if !path.exists() {
            return;
        }
        match fs::remove_dir_all(path) {
            Ok(()) => tracing::info!("Removed workspace {}", path.display()),
            Err(e) => tracing::warn!("Failed to remove workspace {}: {}", path.display(), e),
        }
    }

    pub fn session_info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            workspace_path: self.workspace_path.clone(),
            base_path: self.base_path.clone(),
            bucket: self.bucket.clone(),
            key_prefix: self.key_prefix.clone(),
            url_expiry_hours: self.url_expiry_hours,
        }
    }

    fn upload_as(&self, local_path: &Path, relative_path: String, key: String) -> Result<ArtifactDescriptor> {
        let size_bytes = self.store.upload(local_path, &self.bucket, &key)?;
        let ttl = Duration::from_secs(self.url_expiry_hours.saturating_mul(3600));
        let presigned = self.store.presigned_read_url(&self.bucket, &key, ttl)?;

        tracing::debug!("Uploaded {} as {}", relative_path, key);
        Ok(ArtifactDescriptor {
            relative_path,
            local_path: local_path.to_path_buf(),
            object_uri: self.store.object_uri(&self.bucket, &key),
            object_key: key,
            access_url: presigned.url.to_string(),
            expires_in_hours: self.url_expiry_hours,
            expires_at: presigned.expires_at,
            size_bytes,
        })
    }

    fn object_key(&self, relative_path: &str) -> String {
        if self.key_prefix.is_empty() {
            format!("{}/{}", self.session_id, relative_path)
        } else {
            format!("{}/{}/{}", self.key_prefix, self.session_id, relative_path)
        }
    }

    /// `/`-separated path relative to the workspace, or the file name for
    /// files outside it.
    fn relative_path(&self, path: &Path) -> String {
        let relative = self
            .workspace_path
            .as_deref()
            .and_then(|root| path.strip_prefix(root).ok());

        match relative {
            Some(rel) => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }
}
