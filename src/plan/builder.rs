// src/plan/builder.rs

use std::collections::{BTreeMap, HashSet};

use crate::errors::{EngineError, Result};
use crate::model::{Plan, Task, TaskSet};

/// Build `(reduced_tree, used_tasks)` from `task_set` and `root`, per
/// spec.md §4.2's plan-construction algorithm:
///
/// 1. Name→task map; duplicate names fail with `Duplicate task: <name>`.
/// 2. DFS from `root`, maintaining `visiting` (current path) and `visited`
///    (ever expanded). A node still `visiting` is a cycle; an unknown
///    reference fails with `Unknown task: <name>`.
/// 3. The output only contains tasks reachable from `root` — unreachable
///    tasks in the input are dropped, and only reachable tasks are
///    macro-expanded later.
pub fn build_plan(task_set: &TaskSet, root: &str, plan_id: u64) -> Result<Plan> {
    let mut by_name: BTreeMap<&str, &Task> = BTreeMap::new();
    for task in &task_set.tasks {
        if by_name.insert(task.name.as_str(), task).is_some() {
            return Err(EngineError::PlanBuildError(format!("Duplicate task: {}", task.name)));
        }
    }

    let mut visiting = HashSet::new();
    let mut visited = HashSet::new();
    let mut reduced: BTreeMap<String, Task> = BTreeMap::new();
    expand(root, &by_name, &mut visiting, &mut visited, &mut reduced)?;

    Ok(Plan {
        tasks: reduced,
        root: root.to_string(),
        plan_id,
    })
}

fn expand(
    name: &str,
    by_name: &BTreeMap<&str, &Task>,
    visiting: &mut HashSet<String>,
    visited: &mut HashSet<String>,
    reduced: &mut BTreeMap<String, Task>,
) -> Result<()> {
    if visited.contains(name) {
        // Already fully expanded via another path (diamond); don't re-walk.
        return Ok(());
    }
    if visiting.contains(name) {
        return Err(EngineError::PlanBuildError(format!(
            "Task dependency loop detected in task: {}",
            name
        )));
    }

    let task = *by_name
        .get(name)
        .ok_or_else(|| EngineError::PlanBuildError(format!("Unknown task: {}", name)))?;

    visiting.insert(name.to_string());
    for dep in &task.deps {
        expand(dep, by_name, visiting, visited, reduced)?;
    }
    visiting.remove(name);
    visited.insert(name.to_string());
    reduced.insert(name.to_string(), task.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConcurrencyPolicy, DependsOrder};
    use serde_json::Map;

    fn task(name: &str, deps: &[&str]) -> Task {
        Task {
            name: name.to_string(),
            kind: "composite".to_string(),
            deps: deps.iter().map(|s| s.to_string()).collect(),
            depends_order: DependsOrder::Sequence,
            concurrency: ConcurrencyPolicy::Restart,
            save_buffers: false,
            payload: Map::new(),
        }
    }

    #[test]
    fn linear_chain_reduces_to_reachable_tasks() {
        let set = TaskSet {
            tasks: vec![task("a", &[]), task("b", &["a"]), task("c", &["b"]), task("unrelated", &[])],
        };
        let plan = build_plan(&set, "c", 1).unwrap();
        let mut names: Vec<&String> = plan.tasks.keys().collect();
        names.sort();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn duplicate_task_name_fails() {
        let set = TaskSet {
            tasks: vec![task("a", &[]), task("a", &[])],
        };
        let err = build_plan(&set, "a", 1).unwrap_err();
        assert!(err.to_string().contains("Duplicate task: a"));
    }

    #[test]
    fn unknown_dependency_fails() {
        let set = TaskSet {
            tasks: vec![task("a", &["ghost"])],
        };
        let err = build_plan(&set, "a", 1).unwrap_err();
        assert!(err.to_string().contains("Unknown task: ghost"));
    }

    #[test]
    fn cycle_fails_at_plan_construction() {
        let set = TaskSet {
            tasks: vec![task("a", &["b"]), task("b", &["a"])],
        };
        let err = build_plan(&set, "a", 1).unwrap_err();
        assert!(err.to_string().contains("Task dependency loop detected in task"));
    }

    #[test]
    fn diamond_is_only_expanded_once() {
        let set = TaskSet {
            tasks: vec![task("a", &[]), task("b", &["a"]), task("c", &["a"]), task("d", &["b", "c"])],
        };
        let plan = build_plan(&set, "d", 1).unwrap();
        assert_eq!(plan.tasks.len(), 4);
    }
}
