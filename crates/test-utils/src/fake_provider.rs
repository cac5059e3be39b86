use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use taskloop::model::Task;
use taskloop::provider::{Control, ExitHandle, Provider, StartOutcome};
use taskloop::types::TaskOutcome;

/// A scripted, synchronous [`Provider`]: reports `Success` for every task by
/// default, unless `fail` names it, and records the order in which tasks
/// were started and terminated for assertions.
///
/// Unlike [`taskloop::provider::ShellProvider`], completion happens
/// immediately and synchronously inside `start_one_task` — tests that need
/// a task to stay running until cancelled should use [`FakeProvider::hold`]
/// instead, which defers completion until `terminate()` is called.
pub struct FakeProvider {
    fail: Mutex<HashMap<String, String>>,
    held: Mutex<std::collections::HashSet<String>>,
    started: Arc<Mutex<Vec<String>>>,
    terminated: Arc<Mutex<Vec<String>>>,
    payloads: Arc<Mutex<HashMap<String, Value>>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            fail: Mutex::new(HashMap::new()),
            held: Mutex::new(std::collections::HashSet::new()),
            started: Arc::new(Mutex::new(vec![])),
            terminated: Arc::new(Mutex::new(vec![])),
            payloads: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The macro-expanded payload a task was started with, if it has run.
    pub fn payload_of(&self, task_name: &str) -> Option<Value> {
        self.payloads.lock().expect("fake provider poisoned").get(task_name).cloned()
    }

    /// Make `task_name` fail with `reason` instead of succeeding.
    pub fn fail(&self, task_name: &str, reason: &str) {
        self.fail.lock().expect("fake provider poisoned").insert(task_name.to_string(), reason.to_string());
    }

    /// Make `task_name` stay "running" until its control is terminated,
    /// then report `Failed { reason: "terminated" }`.
    pub fn hold(&self, task_name: &str) {
        self.held.lock().expect("fake provider poisoned").insert(task_name.to_string());
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().expect("fake provider poisoned").clone()
    }

    pub fn terminated(&self) -> Vec<String> {
        self.terminated.lock().expect("fake provider poisoned").clone()
    }
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

struct HeldControl {
    name: String,
    exit: Mutex<Option<ExitHandle>>,
    terminated: Arc<Mutex<Vec<String>>>,
}

impl Control for HeldControl {
    fn terminate(&mut self) {
        self.terminated.lock().expect("fake provider poisoned").push(self.name.clone());
        if let Some(exit) = self.exit.lock().expect("fake provider poisoned").take() {
            exit.complete(TaskOutcome::Failed {
                reason: "terminated".to_string(),
            });
        }
    }
}

struct NoopControl;
impl Control for NoopControl {
    fn terminate(&mut self) {}
}

impl Provider for FakeProvider {
    fn start_one_task(&self, task: &Task, exit: ExitHandle) -> StartOutcome {
        self.started.lock().expect("fake provider poisoned").push(task.name.clone());
        self.payloads
            .lock()
            .expect("fake provider poisoned")
            .insert(task.name.clone(), task.payload_value());

        if self.held.lock().expect("fake provider poisoned").contains(&task.name) {
            return StartOutcome::Started(Box::new(HeldControl {
                name: task.name.clone(),
                exit: Mutex::new(Some(exit)),
                terminated: self.terminated.clone(),
            }));
        }

        match self.fail.lock().expect("fake provider poisoned").get(&task.name) {
            Some(reason) => exit.complete(TaskOutcome::Failed { reason: reason.clone() }),
            None => exit.complete(TaskOutcome::Success),
        }
        StartOutcome::Started(Box::new(NoopControl))
    }
}
