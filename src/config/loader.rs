// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{TaskSetFile, VariablesFile};
use crate::config::validate::validate_variables;
use crate::errors::Result;
use crate::model::TaskSet;

/// Load `tasks.json` from `path` and return the raw task list.
///
/// This only performs JSON deserialization; it does not check for duplicate
/// names, unknown dependencies, or cycles — those require a chosen root and
/// are the Task Runner's job (see [`crate::plan::builder::build_plan`]).
pub fn load_task_set(path: impl AsRef<Path>) -> Result<TaskSet> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let file: TaskSetFile = serde_json::from_str(&contents)?;
    Ok(TaskSet { tasks: file.tasks })
}

/// Load an optional `variables.json`. Returns an empty table if the file
/// does not exist.
pub fn load_variables(path: impl AsRef<Path>) -> Result<VariablesFile> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(VariablesFile::default());
    }

    let contents = fs::read_to_string(path)?;
    let file: VariablesFile = serde_json::from_str(&contents)?;
    validate_variables(&file)?;
    Ok(file)
}
