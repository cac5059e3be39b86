// src/provider.rs

//! The capability boundary from spec.md §4.4: every task kind is reduced to
//! a single operation, `start_one_task(task, exit_handler) -> (control, error)`.
//!
//! Grounded on the teacher's `exec/task_runner.rs`: spawning `sh -c`/`cmd /C`
//! with `Stdio::piped()` and `kill_on_drop(true)`, racing the child's exit
//! against a cancellation channel via `tokio::select!`. The teacher hands
//! completions to a single `mpsc::Sender<RuntimeEvent>`; here each provider
//! call gets its own [`ExitHandle`] closing over the node id and run id, so
//! completions can be routed back to the right [`crate::dag::Scheduler`]
//! call regardless of which task produced them.

use std::process::Stdio;
use std::sync::Arc;

use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::model::Task;
use crate::types::TaskOutcome;

/// Sent back to the [`crate::runner::TaskRunner`] event loop whenever a
/// dispatched leaf finishes, wherever that completion actually originates.
#[derive(Debug)]
pub struct LeafDone {
    pub run_id: u64,
    pub id: String,
    pub outcome: TaskOutcome,
}

/// Handed to a provider's `start_one_task`; calling it is the only way a
/// provider reports completion. Safe to call from any task/thread — it only
/// sends a message, never touches scheduler state directly (spec.md §5's
/// "scheduler-safe adapter").
#[derive(Clone)]
pub struct ExitHandle {
    tx: mpsc::UnboundedSender<LeafDone>,
    run_id: u64,
    id: String,
}

impl ExitHandle {
    pub fn new(tx: mpsc::UnboundedSender<LeafDone>, run_id: u64, id: String) -> Self {
        Self { tx, run_id, id }
    }

    /// Invoked exactly once by the provider. Dropping the handle without
    /// calling `complete` silently leaks the leaf — providers must always
    /// call this, including on their own internal errors.
    pub fn complete(self, outcome: TaskOutcome) {
        let _ = self.tx.send(LeafDone {
            run_id: self.run_id,
            id: self.id,
            outcome,
        });
    }
}

/// Returned by a provider when it starts a leaf; the only operation on it is
/// `terminate()`, matching spec.md §4.4 exactly.
pub trait Control: Send {
    fn terminate(&mut self);
}

pub enum StartOutcome {
    /// The provider started work; `exit_handler` will be invoked later.
    Started(Box<dyn Control>),
    /// `start_one_task` refused synchronously.
    Failed(String),
}

/// One task kind's implementation of the capability boundary.
pub trait Provider: Send + Sync {
    fn start_one_task(&self, task: &Task, exit: ExitHandle) -> StartOutcome;
}

/// `composite`: no work of its own; immediately reports success. Its
/// semantics come entirely from the scheduler executing its `deps`
/// (spec.md §4.4, §9 open question: composite may declare `depends_order`
/// but has no leaf work of its own).
pub struct CompositeProvider;

struct NoopControl;
impl Control for NoopControl {
    fn terminate(&mut self) {}
}

impl Provider for CompositeProvider {
    fn start_one_task(&self, task: &Task, exit: ExitHandle) -> StartOutcome {
        debug!(task = %task.name, "composite task: reporting immediate success");
        exit.complete(TaskOutcome::Success);
        StartOutcome::Started(Box::new(NoopControl))
    }
}

/// `shell`: runs `task.payload["cmd"]` via `sh -c` / `cmd /C`, grounded on
/// the teacher's `exec/task_runner.rs::run_task_inner`.
pub struct ShellProvider {
    handle: tokio::runtime::Handle,
}

impl ShellProvider {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }
}

struct ShellControl {
    cancel: Option<oneshot::Sender<()>>,
}

impl Control for ShellControl {
    fn terminate(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }
}

impl Provider for ShellProvider {
    fn start_one_task(&self, task: &Task, exit: ExitHandle) -> StartOutcome {
        let cmd_str = match task.payload.get("cmd").and_then(|v| v.as_str()) {
            Some(s) => s.to_string(),
            None => return StartOutcome::Failed(format!("shell task '{}' is missing a 'cmd' field", task.name)),
        };

        let mut command = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&cmd_str);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&cmd_str);
            c
        };
        command.stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);

        let child = match command.spawn() {
            Ok(c) => c,
            Err(e) => return StartOutcome::Failed(format!("spawning process for task '{}': {}", task.name, e)),
        };

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let name = task.name.clone();
        self.handle.spawn(run_shell_child(name, child, exit, cancel_rx));

        StartOutcome::Started(Box::new(ShellControl { cancel: Some(cancel_tx) }))
    }
}

async fn run_shell_child(name: String, mut child: Child, exit: ExitHandle, mut cancel_rx: oneshot::Receiver<()>) {
    tokio::select! {
        status = child.wait() => {
            match status {
                Ok(status) if status.success() => {
                    info!(task = %name, "shell task exited successfully");
                    exit.complete(TaskOutcome::Success);
                }
                Ok(status) => {
                    let code = status.code().unwrap_or(-1);
                    warn!(task = %name, exit_code = code, "shell task exited with failure");
                    exit.complete(TaskOutcome::Failed {
                        reason: format!("task '{}' exited with code {}", name, code),
                    });
                }
                Err(e) => {
                    warn!(task = %name, error = %e, "failed to wait on shell task process");
                    exit.complete(TaskOutcome::Failed {
                        reason: format!("waiting for process of task '{}': {}", name, e),
                    });
                }
            }
        }
        _ = &mut cancel_rx => {
            info!(task = %name, "terminating shell task on cancellation");
            let _ = child.kill().await;
            exit.complete(TaskOutcome::Failed {
                reason: "terminated".to_string(),
            });
        }
    }
}

/// Maps `Task::kind` to a [`Provider`]. An unregistered kind is itself a
/// `NodeStartError` (spec.md §6: `"No provider registered for task type: X"`).
#[derive(Default)]
pub struct ProviderRegistry {
    providers: std::collections::HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(kind.into(), provider);
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(kind).cloned()
    }

    /// A registry with `composite` and `shell` already wired in, the set
    /// every workspace gets for free.
    pub fn with_builtins(runtime: tokio::runtime::Handle) -> Self {
        let mut registry = Self::new();
        registry.register("composite", Arc::new(CompositeProvider));
        registry.register("shell", Arc::new(ShellProvider::new(runtime)));
        registry
    }
}
