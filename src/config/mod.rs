// src/config/mod.rs

//! Loading and (light, hand-rolled) validation of the on-disk task set.
//!
//! Responsibilities:
//! - Define the JSON-backed data model for the workspace-level files
//!   described in spec.md §6 (`tasks.json`, `variables.json`,
//!   `workspace.json`). The directory layout and editor tooling around
//!   these files (`.nvimloop/`, `$schema` references, JSON-Schema editing)
//!   are host concerns and out of scope here; this module only needs to
//!   parse the files and hand back typed structures.
//! - Load a task set from disk (`loader.rs`).
//! - Apply the ambient checks that don't require knowing the reachable
//!   subgraph from a root (`validate.rs`) — duplicate-name and
//!   unknown-dependency checks live in [`crate::plan::builder`] instead,
//!   since they are part of the Task Runner's plan-construction algorithm.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_task_set, load_variables};
pub use model::{TaskSetFile, VariablesFile, WorkspaceConfig};
