//! Loading `tasks.json` / `variables.json` from disk (spec.md §6).

use std::io::Write;

use taskloop::config::{load_task_set, load_variables};

#[test]
fn loads_a_task_set_with_dependencies() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.json");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(
        file,
        r#"{{
            "tasks": [
                {{ "name": "build", "type": "shell", "cmd": "make" }},
                {{ "name": "test", "type": "shell", "cmd": "make test", "depends_on": ["build"] }}
            ]
        }}"#
    )
    .unwrap();

    let task_set = load_task_set(&path).unwrap();
    assert_eq!(task_set.tasks.len(), 2);
    let test_task = task_set.tasks.iter().find(|t| t.name == "test").unwrap();
    assert_eq!(test_task.deps, vec!["build".to_string()]);
}

#[test]
fn missing_variables_file_is_treated_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("variables.json");
    let variables = load_variables(&path).unwrap();
    assert!(variables.variables.is_empty());
}

#[test]
fn invalid_variable_name_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("variables.json");
    std::fs::write(&path, r#"{ "variables": { "1bad": "x" } }"#).unwrap();

    let err = load_variables(&path).unwrap_err();
    assert!(err.to_string().contains("invalid variable name"));
}
