//! Scripted in-memory kernel for tests.
//!
//! [`ScriptedLauncher`] launches fake kernels that answer each submitted
//! request by replaying a [`Script`] of events and delays. A
//! [`ScriptProbe`] observes what was submitted and can crash the current
//! kernel.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::event::{ExecutionEvent, KernelActivity, MimeBundle};
use crate::kernel::{ExecuteRequest, KernelLauncher, KernelProcess};

#[derive(Debug, Clone)]
enum Step {
    Emit(ExecutionEvent),
    Delay(Duration),
    Crash,
}

/// Events a fake kernel produces in answer to one request.
#[derive(Debug, Clone, Default)]
pub struct Script {
    steps: Vec<Step>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// The answer of a kernel that runs code with no output.
    pub fn quiet() -> Self {
        Self::new().busy().idle()
    }

    pub fn event(mut self, event: ExecutionEvent) -> Self {
        self.steps.push(Step::Emit(event));
        self
    }

    pub fn busy(self) -> Self {
        self.event(ExecutionEvent::Status(KernelActivity::Busy))
    }

    pub fn idle(self) -> Self {
        self.event(ExecutionEvent::Status(KernelActivity::Idle))
    }

    pub fn stdout(self, text: &str) -> Self {
        self.event(ExecutionEvent::stdout(text))
    }

    pub fn result(self, bundle: MimeBundle) -> Self {
        self.event(ExecutionEvent::Result(bundle))
    }

    pub fn display(self, bundle: MimeBundle) -> Self {
        self.event(ExecutionEvent::Display(bundle))
    }

    pub fn error(self, ename: &str, evalue: &str, traceback: &[&str]) -> Self {
        self.event(ExecutionEvent::Error {
            ename: ename.to_string(),
            evalue: evalue.to_string(),
            traceback: traceback.iter().map(|line| line.to_string()).collect(),
        })
    }

    /// Pause before the next step.
    pub fn delay(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Delay(duration));
        self
    }

    /// Kill the kernel at this point.
    pub fn crash(mut self) -> Self {
        self.steps.push(Step::Crash);
        self
    }
}

struct Shared {
    scripts: VecDeque<Script>,
    init_script: Script,
    submissions: Vec<ExecuteRequest>,
    launches: usize,
    fail_launch: bool,
    ready: bool,
    current: Option<Arc<AtomicBool>>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Launches scripted fake kernels.
pub struct ScriptedLauncher {
    shared: Arc<Mutex<Shared>>,
}

impl ScriptedLauncher {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                scripts: VecDeque::new(),
                init_script: Script::quiet(),
                submissions: Vec::new(),
                launches: 0,
                fail_launch: false,
                ready: true,
                current: None,
            })),
        }
    }

    /// Answer the next non-silent requests with these scripts, in order.
    ///
    /// Requests beyond the queued scripts get [`Script::quiet`].
    pub fn with_scripts(self, scripts: impl IntoIterator<Item = Script>) -> Self {
        lock(&self.shared).scripts.extend(scripts);
        self
    }

    /// Answer silent requests (kernel init code) with this script.
    pub fn with_init_script(self, script: Script) -> Self {
        lock(&self.shared).init_script = script;
        self
    }

    /// Launched kernels never report readiness.
    pub fn never_ready(self) -> Self {
        lock(&self.shared).ready = false;
        self
    }

    /// Every launch fails.
    pub fn fail_launch(self) -> Self {
        lock(&self.shared).fail_launch = true;
        self
    }

    pub fn probe(&self) -> ScriptProbe {
        ScriptProbe {
            shared: self.shared.clone(),
        }
    }
}

impl Default for ScriptedLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelLauncher for ScriptedLauncher {
    fn launch(&mut self, _working_dir: &Path) -> Result<Box<dyn KernelProcess>> {
        let mut shared = lock(&self.shared);
        if shared.fail_launch {
            return Err(Error::StartupFailure("scripted launch failure".to_string()));
        }

        shared.launches += 1;
        let alive = Arc::new(AtomicBool::new(true));
        shared.current = Some(alive.clone());

        let mut pending = VecDeque::new();
        if shared.ready {
            pending.push_back(Step::Emit(ExecutionEvent::Status(KernelActivity::Starting)));
            pending.push_back(Step::Emit(ExecutionEvent::Status(KernelActivity::Idle)));
        }

        Ok(Box::new(ScriptedProcess {
            shared: self.shared.clone(),
            pending,
            alive,
        }))
    }

    fn kernel_name(&self) -> &str {
        "scripted"
    }
}

/// Observes and manipulates scripted kernels from a test.
#[derive(Clone)]
pub struct ScriptProbe {
    shared: Arc<Mutex<Shared>>,
}

impl ScriptProbe {
    /// Number of successful launches so far.
    pub fn launches(&self) -> usize {
        lock(&self.shared).launches
    }

    /// Every request submitted, across all launched kernels.
    pub fn submissions(&self) -> Vec<ExecuteRequest> {
        lock(&self.shared).submissions.clone()
    }

    /// Queue another script.
    pub fn push_script(&self, script: Script) {
        lock(&self.shared).scripts.push_back(script);
    }

    /// Make future launches fail or succeed.
    pub fn set_fail_launch(&self, fail: bool) {
        lock(&self.shared).fail_launch = fail;
    }

    /// Kill the most recently launched kernel as if it crashed.
    pub fn crash(&self) {
        if let Some(alive) = &lock(&self.shared).current {
            alive.store(false, Ordering::SeqCst);
        }
    }

    /// Whether the most recently launched kernel is alive.
    pub fn current_alive(&self) -> bool {
        lock(&self.shared)
            .current
            .as_ref()
            .is_some_and(|alive| alive.load(Ordering::SeqCst))
    }
}

struct ScriptedProcess {
    shared: Arc<Mutex<Shared>>,
    pending: VecDeque<Step>,
    alive: Arc<AtomicBool>,
}

impl KernelProcess for ScriptedProcess {
    fn submit(&mut self, request: &ExecuteRequest) -> Result<()> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(Error::Transport("Kernel has exited".to_string()));
        }

        let mut shared = lock(&self.shared);
        shared.submissions.push(request.clone());
        let script = if request.silent {
            shared.init_script.clone()
        } else {
            shared.scripts.pop_front().unwrap_or_else(Script::quiet)
        };
        self.pending.extend(script.steps);
        Ok(())
    }

    fn next_event(&mut self, wait: Duration) -> Result<Option<ExecutionEvent>> {
        let mut remaining = wait;
        loop {
            if !self.alive.load(Ordering::SeqCst) {
                return Err(Error::Transport("Kernel event channel closed".to_string()));
            }

            match self.pending.pop_front() {
                Some(Step::Emit(event)) => return Ok(Some(event)),
                Some(Step::Delay(delay)) if delay <= remaining => {
                    std::thread::sleep(delay);
                    remaining -= delay;
                }
                Some(Step::Delay(delay)) => {
                    std::thread::sleep(remaining);
                    self.pending.push_front(Step::Delay(delay - remaining));
                    return Ok(None);
                }
                Some(Step::Crash) => {
                    self.alive.store(false, Ordering::SeqCst);
                }
                None => {
                    std::thread::sleep(remaining);
                    return Ok(None);
                }
            }
        }
    }

    fn is_alive(&mut self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn kill(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        self.pending.clear();
    }

    fn pid(&self) -> Option<u32> {
        None
    }
}
