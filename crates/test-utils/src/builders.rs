#![allow(dead_code)]

use serde_json::{Map, Value};
use taskloop::model::{Task, TaskSet};
use taskloop::types::{ConcurrencyPolicy, DependsOrder};

/// Builder for a [`TaskSet`] to simplify test setup.
pub struct TaskSetBuilder {
    tasks: Vec<Task>,
}

impl TaskSetBuilder {
    pub fn new() -> Self {
        Self { tasks: vec![] }
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn build(self) -> TaskSet {
        TaskSet { tasks: self.tasks }
    }
}

impl Default for TaskSetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a single [`Task`], defaulting to a `composite` kind so tests
/// can focus on dependency shape unless they opt into `shell`/another kind.
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            task: Task {
                name: name.to_string(),
                kind: "composite".to_string(),
                deps: vec![],
                depends_order: DependsOrder::Sequence,
                concurrency: ConcurrencyPolicy::Restart,
                save_buffers: false,
                payload: Map::new(),
            },
        }
    }

    pub fn kind(mut self, kind: &str) -> Self {
        self.task.kind = kind.to_string();
        self
    }

    pub fn depends_on(mut self, dep: &str) -> Self {
        self.task.deps.push(dep.to_string());
        self
    }

    pub fn depends_order(mut self, order: DependsOrder) -> Self {
        self.task.depends_order = order;
        self
    }

    pub fn concurrency(mut self, policy: ConcurrencyPolicy) -> Self {
        self.task.concurrency = policy;
        self
    }

    pub fn save_buffers(mut self, val: bool) -> Self {
        self.task.save_buffers = val;
        self
    }

    pub fn payload(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.task.payload.insert(key.to_string(), value.into());
        self
    }

    pub fn cmd(self, cmd: &str) -> Self {
        self.kind("shell").payload("cmd", cmd)
    }

    pub fn build(self) -> Task {
        self.task
    }
}
