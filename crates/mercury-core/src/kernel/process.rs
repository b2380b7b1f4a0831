//! Interpreter process management.
//!
//! [`KernelLauncher`] and [`KernelProcess`] are the seam between the
//! supervisor and whatever actually runs code. [`StdioLauncher`] is the
//! default implementation: a Python process running the bundled bridge
//! script, with requests on stdin and event records on stdout.

use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::event::ExecutionEvent;

use super::protocol::{ExecuteRequest, read_line, write_message};

/// Bridge script run by the interpreter.
const KERNEL_BRIDGE: &str = include_str!("../../assets/kernel_bridge.py");

/// Decoded events buffered between the reader thread and the engine.
const EVENT_QUEUE_CAPACITY: usize = 1024;

/// A running interpreter with its request and event channels.
pub trait KernelProcess: Send {
    /// Submit code on the request channel. Does not wait for a reply.
    fn submit(&mut self, request: &ExecuteRequest) -> Result<()>;

    /// Wait up to `wait` for the next event.
    ///
    /// Returns `Ok(None)` when the slice elapses without an event and an
    /// error once the event channel is closed.
    fn next_event(&mut self, wait: Duration) -> Result<Option<ExecutionEvent>>;

    /// Non-blocking liveness probe.
    fn is_alive(&mut self) -> bool;

    /// Terminate immediately. Idempotent.
    fn kill(&mut self);

    /// Operating-system process id, if there is one.
    fn pid(&self) -> Option<u32>;
}

/// Starts interpreter processes.
pub trait KernelLauncher: Send {
    /// Launch a fresh interpreter whose working directory is `working_dir`.
    fn launch(&mut self, working_dir: &Path) -> Result<Box<dyn KernelProcess>>;

    /// Kernel name reported by status queries.
    fn kernel_name(&self) -> &str {
        "python3"
    }
}

/// Launches the interpreter as a child process speaking JSON lines.
pub struct StdioLauncher {
    interpreter: PathBuf,
}

impl StdioLauncher {
    pub fn new(interpreter: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }

    /// Find the interpreter binary.
    ///
    /// Absolute or relative paths are used as given; bare names are
    /// looked up in `PATH`.
    fn find_interpreter(&self) -> Result<PathBuf> {
        if self.interpreter.components().count() > 1 {
            if self.interpreter.exists() {
                return Ok(self.interpreter.clone());
            }
            return Err(Error::StartupFailure(format!(
                "Interpreter not found: {}",
                self.interpreter.display()
            )));
        }

        which::which(&self.interpreter).map_err(|e| {
            Error::StartupFailure(format!(
                "Could not find '{}' in PATH: {}. Set MERCURY_PYTHON to the interpreter path.",
                self.interpreter.display(),
                e
            ))
        })
    }
}

impl KernelLauncher for StdioLauncher {
    fn launch(&mut self, working_dir: &Path) -> Result<Box<dyn KernelProcess>> {
        let interpreter = self.find_interpreter()?;

        let mut child = Command::new(&interpreter)
            .arg("-u")
            .arg("-c")
            .arg(KERNEL_BRIDGE)
            .current_dir(working_dir)
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit()) // Let interpreter stderr pass through for debugging
            .spawn()
            .map_err(|e| {
                Error::StartupFailure(format!(
                    "Failed to spawn interpreter '{}': {}",
                    interpreter.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::StartupFailure("Failed to get interpreter stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::StartupFailure("Failed to get interpreter stdout".to_string()))?;

        let pid = child.id();
        let events = spawn_event_reader(stdout, EVENT_QUEUE_CAPACITY, pid)?;

        tracing::info!("Launched interpreter {} (pid {})", interpreter.display(), pid);

        Ok(Box::new(StdioKernel {
            child,
            stdin: BufWriter::new(stdin),
            events,
            killed: false,
        }))
    }
}

/// Decode JSON-line events from `source` on a detached thread.
///
/// The queue holds at most `capacity` events. A full queue blocks the
/// reader, which stops draining the pipe and so stalls the interpreter's
/// writes until the engine catches up.
fn spawn_event_reader<R: Read + Send + 'static>(
    source: R,
    capacity: usize,
    pid: u32,
) -> std::io::Result<Receiver<ExecutionEvent>> {
    let (tx, events) = mpsc::sync_channel(capacity);
    std::thread::Builder::new()
        .name(format!("kernel-events-{}", pid))
        .spawn(move || {
            let mut source = BufReader::new(source);
            loop {
                match read_line(&mut source) {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => match ExecutionEvent::from_json_line(&line) {
                        Ok(Some(event)) => {
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => tracing::warn!("Skipping kernel output line: {}", e),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("Kernel event channel failed: {}", e);
                        break;
                    }
                }
            }
            tracing::debug!("Kernel event reader for pid {} exiting", pid);
        })?;
    Ok(events)
}

/// Child interpreter process. A detached reader thread decodes stdout
/// into the `events` queue.
struct StdioKernel {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    events: Receiver<ExecutionEvent>,
    killed: bool,
}

impl KernelProcess for StdioKernel {
    fn submit(&mut self, request: &ExecuteRequest) -> Result<()> {
        if self.killed {
            return Err(Error::Transport("Kernel has been killed".to_string()));
        }
        write_message(&mut self.stdin, request)
    }

    fn next_event(&mut self, wait: Duration) -> Result<Option<ExecutionEvent>> {
        match self.events.recv_timeout(wait) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(Error::Transport("Kernel event channel closed".to_string()))
            }
        }
    }

    fn is_alive(&mut self) -> bool {
        if self.killed {
            return false;
        }
        matches!(self.child.try_wait(), Ok(None))
    }

    fn kill(&mut self) {
        if self.killed {
            return;
        }
        self.killed = true;

        if let Err(e) = self.child.kill() {
            // InvalidInput means the process already exited, which is fine
            if e.kind() != std::io::ErrorKind::InvalidInput {
                tracing::warn!("Failed to kill kernel: {}", e);
            }
        }

        // Wait to reap zombie; the reader thread exits on EOF
        let _ = self.child.wait();
    }

    fn pid(&self) -> Option<u32> {
        Some(self.child.id())
    }
}

impl Drop for StdioKernel {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_missing_interpreter_path() {
        let launcher = StdioLauncher::new("/nonexistent/bin/python3");
        let err = launcher.find_interpreter().unwrap_err();
        assert!(matches!(err, Error::StartupFailure(_)));
    }

    #[test]
    fn test_missing_interpreter_name() {
        let mut launcher = StdioLauncher::new("mercury-no-such-interpreter");
        let temp = tempfile::TempDir::new().unwrap();
        let err = launcher.launch(temp.path()).err().unwrap();
        assert!(matches!(err, Error::StartupFailure(_)));
    }

    /// Hands out one JSON line per read and counts the lines taken.
    struct CountingLines {
        remaining: usize,
        taken: Arc<AtomicUsize>,
    }

    impl Read for CountingLines {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.remaining == 0 {
                return Ok(0);
            }
            let line = b"{\"msg_type\": \"stream\", \"content\": {\"name\": \"stdout\", \"text\": \"x\"}}\n";
            buf[..line.len()].copy_from_slice(line);
            self.remaining -= 1;
            self.taken.fetch_add(1, Ordering::SeqCst);
            Ok(line.len())
        }
    }

    #[test]
    fn test_event_queue_applies_back_pressure() {
        let taken = Arc::new(AtomicUsize::new(0));
        let source = CountingLines {
            remaining: 50,
            taken: taken.clone(),
        };
        let events = spawn_event_reader(source, 4, 0).unwrap();

        std::thread::sleep(Duration::from_millis(200));
        // Queue of 4, one event blocked in send, one line being decoded
        assert!(taken.load(Ordering::SeqCst) <= 6, "reader ran ahead: {}", taken.load(Ordering::SeqCst));

        let mut received = 0;
        while events.recv_timeout(Duration::from_secs(1)).is_ok() {
            received += 1;
        }
        assert_eq!(received, 50);
    }

    #[test]
    fn test_bridge_is_bundled() {
        assert!(KERNEL_BRIDGE.contains("def main()"));
    }

    #[test]
    #[ignore = "Requires python3"]
    fn test_launch_reports_ready() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut kernel = StdioLauncher::new("python3").launch(temp.path()).unwrap();

        let mut ready = false;
        for _ in 0..30 {
            if let Some(event) = kernel.next_event(Duration::from_secs(1)).unwrap() {
                if event.is_idle() {
                    ready = true;
                    break;
                }
            }
        }
        assert!(ready);
        assert!(kernel.is_alive());

        kernel.kill();
        assert!(!kernel.is_alive());
    }
}
