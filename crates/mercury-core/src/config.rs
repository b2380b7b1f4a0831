//! Session configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default execution timeout for submitted code.
pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(60);

/// How long the kernel may take to report readiness.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking slice used while waiting on the event channel.
pub const DEFAULT_POLL_SLICE: Duration = Duration::from_secs(1);

/// Default validity of issued access URLs.
pub const DEFAULT_URL_EXPIRY_HOURS: u64 = 24;

/// Object key prefix under which session artifacts are stored.
pub const DEFAULT_KEY_PREFIX: &str = "jupyter-workspaces";

/// Run silently after every kernel (re)start so plots come back as PNG
/// display data instead of opening windows.
pub const DEFAULT_INIT_CODE: &str = r#"
import warnings
warnings.filterwarnings('ignore')
try:
    import matplotlib
    matplotlib.use('Agg')
    import matplotlib.pyplot as plt
    from IPython import get_ipython
    ipython = get_ipython()
    if ipython:
        ipython.run_line_magic('matplotlib', 'inline')
    import matplotlib as mpl
    mpl.rcParams['figure.dpi'] = 100
    mpl.rcParams['savefig.dpi'] = 100
    mpl.rcParams['figure.figsize'] = [8.0, 6.0]
except ImportError:
    pass
"#;

/// Interpreter process settings.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Interpreter executable. Resolved through `PATH` when not absolute.
    pub interpreter: PathBuf,
    /// Time allowed for the kernel to report readiness after launch.
    pub ready_timeout: Duration,
    /// Code run silently after each start; `None` disables it.
    pub init_code: Option<String>,
    /// Per-event wait while draining the init code's events.
    pub init_event_timeout: Duration,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("python3"),
            ready_timeout: DEFAULT_READY_TIMEOUT,
            init_code: Some(DEFAULT_INIT_CODE.to_string()),
            init_event_timeout: Duration::from_secs(5),
        }
    }
}

/// Configuration for one [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Working directory, or the base path for session workspaces when
    /// persistence is enabled.
    pub working_dir: PathBuf,
    /// Object-store bucket. Persistence is enabled iff this is set.
    pub bucket: Option<String>,
    /// Root directory of the filesystem object store.
    pub object_store_root: PathBuf,
    /// Validity of issued access URLs, in hours.
    pub url_expiry_hours: u64,
    /// Object key prefix for session artifacts.
    pub key_prefix: String,
    /// Interpreter settings.
    pub kernel: KernelConfig,
    /// Blocking slice for the execution polling loop.
    pub poll_slice: Duration,
    /// Timeout used when a caller does not supply one.
    pub default_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            bucket: None,
            object_store_root: std::env::temp_dir().join("mercury-objects"),
            url_expiry_hours: DEFAULT_URL_EXPIRY_HOURS,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            kernel: KernelConfig::default(),
            poll_slice: DEFAULT_POLL_SLICE,
            default_timeout: DEFAULT_EXECUTION_TIMEOUT,
        }
    }
}

impl SessionConfig {
    /// Defaults overlaid with `MERCURY_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = lookup("MERCURY_WORKING_DIR") {
            config.working_dir = PathBuf::from(dir);
        }
        if let Some(bucket) = lookup("MERCURY_BUCKET").filter(|b| !b.is_empty()) {
            config.bucket = Some(bucket);
        }
        if let Some(root) = lookup("MERCURY_OBJECT_STORE_ROOT") {
            config.object_store_root = PathBuf::from(root);
        }
        if let Some(hours) = lookup("MERCURY_URL_EXPIRY_HOURS") {
            config.url_expiry_hours = hours.parse().map_err(|_| {
                Error::Config(format!("MERCURY_URL_EXPIRY_HOURS must be an integer, got '{}'", hours))
            })?;
        }
        if let Some(python) = lookup("MERCURY_PYTHON") {
            config.kernel.interpreter = PathBuf::from(python);
        }

        config.validate()?;
        Ok(config)
    }

    /// Whether workspace artifacts are persisted to the object store.
    pub fn persistence_enabled(&self) -> bool {
        self.bucket.is_some()
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.url_expiry_hours == 0 {
            return Err(Error::Config("url_expiry_hours must be at least 1".to_string()));
        }
        if self.poll_slice.is_zero() {
            return Err(Error::Config("poll_slice must be non-zero".to_string()));
        }
        if self.key_prefix.starts_with('/') {
            return Err(Error::Config("key_prefix must be relative".to_string()));
        }
        Ok(())
    }
}
