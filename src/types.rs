// src/types.rs

//! Small shared enums used across the data model, scheduler and runner.

use serde::Deserialize;

/// How a node's `deps` are launched relative to one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependsOrder {
    /// Resolve dependencies left to right; first failure short-circuits.
    Sequence,
    /// Dispatch all dependencies concurrently; success requires all to succeed.
    Parallel,
}

impl Default for DependsOrder {
    fn default() -> Self {
        DependsOrder::Sequence
    }
}

/// Cross-plan concurrency policy for a task name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyPolicy {
    /// Terminate every other running instance of this task name, then start.
    Restart,
    /// Reject the start if another plan already has this task name running.
    Refuse,
    /// Start unconditionally, irrespective of other plans.
    Parallel,
}

impl Default for ConcurrencyPolicy {
    fn default() -> Self {
        ConcurrencyPolicy::Restart
    }
}

/// Outcome of one leaf task execution, as reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed { reason: String },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }
}

/// Exit trigger carried in a scheduler outcome, for diagnostics (spec.md
/// §4.1's "Exit triggers").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTrigger {
    Cycle,
    InvalidNode,
    Interrupt,
    Node,
}

impl ExitTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitTrigger::Cycle => "cycle",
            ExitTrigger::InvalidNode => "invalid_node",
            ExitTrigger::Interrupt => "interrupt",
            ExitTrigger::Node => "node",
        }
    }
}
