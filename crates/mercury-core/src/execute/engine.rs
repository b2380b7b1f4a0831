//! Deadline-bounded execution of code on a supervised kernel.

use std::time::{Duration, Instant};

use crate::config::DEFAULT_POLL_SLICE;
use crate::error::{Error, Result};
use crate::kernel::{ExecuteRequest, KernelSupervisor};
use crate::workspace::WorkspaceStore;

use super::aggregator::{EventAggregator, Fold};
use super::result::{ExecutionRequest, ExecutionResult, FailureKind};

/// Runs one request at a time and folds its events into a result.
///
/// The engine polls the event channel in bounded slices so the deadline is
/// checked even while the kernel is silent. A timed out request is not
/// interrupted; the kernel keeps running it.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    poll_slice: Duration,
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_SLICE)
    }
}

impl ExecutionEngine {
    pub fn new(poll_slice: Duration) -> Self {
        Self { poll_slice }
    }

    pub fn poll_slice(&self) -> Duration {
        self.poll_slice
    }

    /// Execute `request` and wait for it to finish or time out.
    ///
    /// Returns `Err(KernelNotStarted)` if the kernel was never started.
    /// Every other failure is reported inside the returned result. When a
    /// workspace is given, its files are uploaded after a successful run.
    pub fn execute(
        &self,
        kernel: &mut KernelSupervisor,
        workspace: Option<&WorkspaceStore>,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult> {
        if !kernel.was_started() {
            return Err(Error::KernelNotStarted);
        }
        if !kernel.is_alive() {
            return Ok(ExecutionResult::failed(
                FailureKind::KernelNotRunning,
                "Kernel is not running",
                None,
            ));
        }

        tracing::debug!("Executing {} bytes of code", request.code.len());
        if let Err(e) = kernel.submit(&ExecuteRequest::new(request.code.clone())) {
            kernel.is_alive();
            return Ok(ExecutionResult::failed(
                FailureKind::KernelNotRunning,
                format!("Failed to submit code: {}", e),
                None,
            ));
        }

        let mut aggregator = EventAggregator::new();
        let started = Instant::now();
        loop {
            let elapsed = started.elapsed();
            if elapsed >= request.timeout {
                // The kernel is left running. Its late idle event is not
                // filtered and can end the next execution early.
                tracing::warn!("Execution timed out after {:?}", request.timeout);
                return Ok(ExecutionResult::failed(
                    FailureKind::ExecutionTimeout,
                    format!("Execution timeout after {} seconds", request.timeout.as_secs_f64()),
                    aggregator.output(),
                ));
            }

            let wait = self.poll_slice.min(request.timeout - elapsed);
            match kernel.next_event(wait) {
                Ok(Some(event)) => {
                    if aggregator.fold(&event) == Fold::Finished {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    kernel.is_alive();
                    tracing::error!("Kernel stopped during execution: {}", e);
                    return Ok(ExecutionResult::failed(
                        FailureKind::KernelNotRunning,
                        format!("Kernel stopped during execution: {}", e),
                        aggregator.output(),
                    ));
                }
            }
        }

        if let Some(errors) = aggregator.error_text() {
            let output = aggregator.output();
            let mut result = ExecutionResult::failed(FailureKind::InterpreterError, errors, output);
            result.images = aggregator.into_images();
            return Ok(result);
        }

        let output = aggregator.output();
        let mut result = ExecutionResult::succeeded(output, aggregator.into_images());

        if let Some(store) = workspace {
            match store.upload_all() {
                Ok(outcomes) => {
                    if !outcomes.is_empty() {
                        tracing::info!("Persisted {} workspace file(s)", outcomes.len());
                    }
                    result.artifacts = outcomes;
                }
                Err(e) => {
                    tracing::warn!("Workspace persistence failed: {}", e);
                    result.persistence_warning = Some(e.to_string());
                }
            }
        }

        Ok(result)
    }
}
