// src/config/model.rs

//! JSON-backed configuration types for the workspace files from spec.md §6.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::model::Task;

/// `tasks.json`: `{ "tasks": [Task, ...] }`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TaskSetFile {
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// `variables.json`: `{ "variables": { "<name>": "<value>" } }`.
///
/// Keys are expected to match `[A-Za-z_][A-Za-z0-9_]*`; this is enforced in
/// [`crate::config::validate::validate_variables`] rather than at the type
/// level, so a malformed file produces a descriptive error instead of a
/// deserialization failure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct VariablesFile {
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

/// `workspace.json`'s `save` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SaveConfig {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

/// `workspace.json`'s `persistence` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_true")]
    pub shada: bool,
    #[serde(default = "default_true")]
    pub undo: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            shada: true,
            undo: true,
        }
    }
}

/// `workspace.json`: workspace-level metadata. The crate only reads `name`
/// and `save`; `persistence` is parsed for completeness but is the host's
/// concern (undo/shada persistence is explicitly out of scope, spec.md §1).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub save: SaveConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}
