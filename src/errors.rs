// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Names follow the error taxonomy in the spec: each scheduler/runner
//! failure mode gets its own variant, carrying the same human-readable
//! message that is surfaced to the host as a plan/node exit reason.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Task-set validation or plan reduction failed before the scheduler
    /// ever saw the graph: duplicate names, unknown references, or a cycle
    /// found by the Task Runner's own DFS.
    #[error("{0}")]
    PlanBuildError(String),

    /// `${...}` expansion failed (unknown macro, unterminated placeholder,
    /// a builtin's own error, or prompt cancellation).
    #[error("{0}")]
    MacroExpansionError(String),

    /// The scheduler observed a back-edge to a node still in its DFS path.
    #[error("Task dependency loop detected in task: {0}")]
    CycleError(String),

    /// A node id was requested that is not part of the plan.
    #[error("Invalid task name: {0}")]
    InvalidNodeError(String),

    /// Cancellation (explicit `terminate()`) or cross-plan preemption.
    #[error("{0}")]
    InterruptError(String),

    /// A provider refused to start a task (`start_one_task` returned no
    /// control handle).
    #[error("{0}")]
    NodeStartError(String),

    /// A provider reported that a running task failed.
    #[error("{0}")]
    NodeRunError(String),

    /// `concurrency = "refuse"` and another plan already holds the task name.
    #[error("Task refused (already running)")]
    ConcurrencyRefusedError,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, EngineError>;
