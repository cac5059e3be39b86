// src/model.rs

//! Core data model: `Task` (input entity), `Node` (plan entity) and `Plan`.
//!
//! Mirrors the teacher's `config::model::TaskConfig` / `dag::task_info::TaskInfo`
//! split: `Task` is what's read from JSON and is immutable after loading;
//! `Node` is the scheduler's reduced view of one task within one plan.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::types::{ConcurrencyPolicy, DependsOrder};

/// A named unit of work with dependencies and a kind (provider), as read
/// from `tasks.json`.
///
/// Immutable after loading. Kind-specific fields (command string, working
/// directory, environment, ...) are opaque to the scheduler and runner; they
/// are kept as a flattened JSON map and handed to the provider verbatim
/// after macro resolution.
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, rename = "depends_on")]
    pub deps: Vec<String>,
    #[serde(default)]
    pub depends_order: DependsOrder,
    #[serde(default)]
    pub concurrency: ConcurrencyPolicy,
    #[serde(default)]
    pub save_buffers: bool,
    /// Kind-specific payload, e.g. `{"cmd": "echo ${file}"}` for `shell`.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Task {
    /// `payload` as a single JSON value, for macro resolution to walk via
    /// [`crate::macro_resolver::resolve_value`].
    pub fn payload_value(&self) -> Value {
        Value::Object(self.payload.clone())
    }
}

/// `{ "tasks": [Task, ...] }` — the root of `tasks.json`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TaskSet {
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl TaskSet {
    /// Name → Task map. Does not check for duplicates; see
    /// [`crate::plan::builder::build_plan`] for that.
    pub fn by_name(&self) -> BTreeMap<&str, &Task> {
        self.tasks.iter().map(|t| (t.name.as_str(), t)).collect()
    }
}

/// The scheduler's reduced view of one task within one plan: `{id, deps, order}`.
///
/// Every `Node::id` must be present as a `Task` in the same plan (invariant
/// from spec.md §3).
#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub deps: Vec<String>,
    pub order: DependsOrder,
}

impl Node {
    pub fn from_task(task: &Task) -> Self {
        Self {
            id: task.name.clone(),
            deps: task.deps.clone(),
            order: task.depends_order,
        }
    }
}

/// One live execution attempt: `(tasks, root, plan_id)`.
///
/// `plan_id` is assigned by the [`crate::runner::TaskRunner`] and is the
/// identity used by cross-plan coordination (spec.md §3, §4.2).
#[derive(Debug, Clone)]
pub struct Plan {
    pub tasks: BTreeMap<String, Task>,
    pub root: String,
    pub plan_id: u64,
}
