//! Kernel lifecycle supervision.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::KernelConfig;
use crate::error::{Error, Result};
use crate::event::ExecutionEvent;

use super::process::{KernelLauncher, KernelProcess};
use super::protocol::ExecuteRequest;

/// Lifecycle state of the supervised kernel.
///
/// ```text
/// NotStarted → Starting → Running → (Restarting → Running)* → ShutDown
///                            │
///                            └──► Dead (process exited on its own)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelState {
    NotStarted,
    Starting,
    Running,
    Restarting,
    Dead,
    ShutDown,
}

/// Owns one interpreter process and its two channels.
pub struct KernelSupervisor {
    launcher: Box<dyn KernelLauncher>,
    config: KernelConfig,
    working_dir: PathBuf,
    process: Option<Box<dyn KernelProcess>>,
    state: KernelState,
}

impl KernelSupervisor {
    /// Create a supervisor. Nothing is launched until [`start`](Self::start).
    pub fn new(
        launcher: Box<dyn KernelLauncher>,
        config: KernelConfig,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            launcher,
            config,
            working_dir: working_dir.into(),
            process: None,
            state: KernelState::NotStarted,
        }
    }

    pub fn state(&self) -> KernelState {
        self.state
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn kernel_name(&self) -> &str {
        self.launcher.kernel_name()
    }

    /// Whether [`start`](Self::start) was ever called.
    pub fn was_started(&self) -> bool {
        self.state != KernelState::NotStarted
    }

    /// Launch the interpreter and wait for it to become ready.
    ///
    /// Runs the configured initialization code afterwards and discards
    /// its events.
    pub fn start(&mut self) -> Result<()> {
        self.state = KernelState::Starting;

        match self.launch_ready() {
            Ok(process) => {
                self.process = Some(process);
                self.state = KernelState::Running;
                self.run_init_code();
                tracing::info!("Kernel started in {}", self.working_dir.display());
                Ok(())
            }
            Err(e) => {
                self.state = KernelState::Dead;
                tracing::error!("Failed to start kernel: {}", e);
                Err(Error::StartupFailure(e.to_string()))
            }
        }
    }

    /// Non-blocking liveness probe.
    ///
    /// A running kernel whose process has exited is marked dead.
    pub fn is_alive(&mut self) -> bool {
        if self.state != KernelState::Running {
            return false;
        }

        let alive = self
            .process
            .as_mut()
            .is_some_and(|process| process.is_alive());

        if !alive {
            tracing::warn!("Kernel process is no longer running");
            self.state = KernelState::Dead;
        }
        alive
    }

    /// Replace the interpreter with a fresh one, discarding all state.
    ///
    /// Starts the kernel if it was never started. On failure the kernel is
    /// left dead.
    pub fn restart(&mut self) -> Result<()> {
        if self.state == KernelState::NotStarted {
            return self.start();
        }

        self.state = KernelState::Restarting;
        if let Some(mut process) = self.process.take() {
            process.kill();
        }

        match self.launch_ready() {
            Ok(process) => {
                self.process = Some(process);
                self.state = KernelState::Running;
                self.run_init_code();
                tracing::info!("Kernel restarted");
                Ok(())
            }
            Err(e) => {
                self.state = KernelState::Dead;
                tracing::error!("Failed to restart kernel: {}", e);
                Err(Error::RestartFailure(e.to_string()))
            }
        }
    }

    /// Terminate the interpreter immediately. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(mut process) = self.process.take() {
            process.kill();
            tracing::info!("Kernel shutdown complete");
        }
        self.state = KernelState::ShutDown;
    }

    /// Submit code on the request channel.
    pub(crate) fn submit(&mut self, request: &ExecuteRequest) -> Result<()> {
        self.process_mut()?.submit(request)
    }

    /// Wait up to `wait` for the next event on the event channel.
    pub(crate) fn next_event(&mut self, wait: Duration) -> Result<Option<ExecutionEvent>> {
        self.process_mut()?.next_event(wait)
    }

    fn process_mut(&mut self) -> Result<&mut Box<dyn KernelProcess>> {
        self.process
            .as_mut()
            .ok_or_else(|| Error::Transport("No kernel process".to_string()))
    }

    /// Launch a process and block until it reports idle.
    fn launch_ready(&mut self) -> Result<Box<dyn KernelProcess>> {
        std::fs::create_dir_all(&self.working_dir)?;
        let mut process = self.launcher.launch(&self.working_dir)?;

        let timeout = self.config.ready_timeout;
        let started = Instant::now();
        loop {
            let remaining = timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                process.kill();
                return Err(Error::Timeout(timeout));
            }

            match process.next_event(remaining.min(Duration::from_secs(1))) {
                Ok(Some(event)) if event.is_idle() => return Ok(process),
                Ok(_) => {}
                Err(e) => {
                    process.kill();
                    return Err(e);
                }
            }
        }
    }

    /// Run the initialization code silently, dropping its events.
    ///
    /// Failures are logged; a kernel without plotting support is still
    /// usable.
    fn run_init_code(&mut self) {
        let Some(code) = self.config.init_code.clone() else {
            return;
        };
        let wait = self.config.init_event_timeout;

        let Some(process) = self.process.as_mut() else {
            return;
        };
        if let Err(e) = process.submit(&ExecuteRequest::silent(code)) {
            tracing::warn!("Failed to submit kernel init code: {}", e);
            return;
        }

        loop {
            match process.next_event(wait) {
                Ok(Some(event)) if event.is_idle() => break,
                Ok(Some(event)) => tracing::debug!("Discarding init event: {:?}", event),
                Ok(None) => {
                    tracing::warn!("Kernel init code did not finish within {:?}", wait);
                    break;
                }
                Err(e) => {
                    tracing::warn!("Kernel init code failed: {}", e);
                    break;
                }
            }
        }
    }
}

impl Drop for KernelSupervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Script, ScriptedLauncher};

    fn supervisor(launcher: ScriptedLauncher) -> KernelSupervisor {
        let config = KernelConfig {
            ready_timeout: Duration::from_millis(300),
            init_event_timeout: Duration::from_millis(200),
            ..KernelConfig::default()
        };
        let temp = std::env::temp_dir();
        KernelSupervisor::new(Box::new(launcher), config, temp)
    }

    #[test]
    fn test_start_runs_init_code_silently() {
        let launcher = ScriptedLauncher::new();
        let probe = launcher.probe();
        let mut supervisor = supervisor(launcher);

        assert_eq!(supervisor.state(), KernelState::NotStarted);
        supervisor.start().unwrap();

        assert_eq!(supervisor.state(), KernelState::Running);
        assert!(supervisor.is_alive());
        assert_eq!(probe.launches(), 1);
        let submissions = probe.submissions();
        assert_eq!(submissions.len(), 1);
        assert!(submissions[0].silent);
    }

    #[test]
    fn test_start_times_out_when_never_ready() {
        let launcher = ScriptedLauncher::new().never_ready();
        let probe = launcher.probe();
        let mut supervisor = supervisor(launcher);

        let started = Instant::now();
        let err = supervisor.start().unwrap_err();
        assert!(matches!(err, Error::StartupFailure(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!supervisor.is_alive());
        assert!(!probe.current_alive());
    }

    #[test]
    fn test_launch_error_is_startup_failure() {
        let mut supervisor = supervisor(ScriptedLauncher::new().fail_launch());
        assert!(matches!(supervisor.start(), Err(Error::StartupFailure(_))));
        assert_eq!(supervisor.state(), KernelState::Dead);
    }

    #[test]
    fn test_crash_is_detected() {
        let launcher = ScriptedLauncher::new();
        let probe = launcher.probe();
        let mut supervisor = supervisor(launcher);
        supervisor.start().unwrap();

        probe.crash();
        assert!(!supervisor.is_alive());
        assert_eq!(supervisor.state(), KernelState::Dead);
    }

    #[test]
    fn test_restart_replaces_process() {
        let launcher = ScriptedLauncher::new();
        let probe = launcher.probe();
        let mut supervisor = supervisor(launcher);
        supervisor.start().unwrap();
        probe.crash();
        assert!(!supervisor.is_alive());

        supervisor.restart().unwrap();
        assert!(supervisor.is_alive());
        assert_eq!(probe.launches(), 2);
    }

    #[test]
    fn test_restart_without_start_starts() {
        let launcher = ScriptedLauncher::new();
        let probe = launcher.probe();
        let mut supervisor = supervisor(launcher);

        supervisor.restart().unwrap();
        assert_eq!(supervisor.state(), KernelState::Running);
        assert_eq!(probe.launches(), 1);
    }

    #[test]
    fn test_failed_restart_leaves_kernel_dead() {
        let launcher = ScriptedLauncher::new();
        let probe = launcher.probe();
        let mut supervisor = supervisor(launcher);
        supervisor.start().unwrap();

        probe.set_fail_launch(true);
        assert!(matches!(supervisor.restart(), Err(Error::RestartFailure(_))));
        assert_eq!(supervisor.state(), KernelState::Dead);
        assert!(!supervisor.is_alive());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let launcher = ScriptedLauncher::new();
        let probe = launcher.probe();
        let mut supervisor = supervisor(launcher);
        supervisor.start().unwrap();

        supervisor.shutdown();
        supervisor.shutdown();
        assert_eq!(supervisor.state(), KernelState::ShutDown);
        assert!(!probe.current_alive());
        assert!(!supervisor.is_alive());
    }

    #[test]
    fn test_init_events_are_not_surfaced() {
        let launcher = ScriptedLauncher::new().with_init_script(
            Script::new().stdout("init noise").idle(),
        );
        let mut supervisor = supervisor(launcher);
        supervisor.start().unwrap();

        // Nothing left over for the first real request
        assert_eq!(supervisor.next_event(Duration::from_millis(50)).unwrap(), None);
    }
}
