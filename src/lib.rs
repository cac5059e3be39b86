// src/lib.rs

pub mod cli;
pub mod concurrency;
pub mod config;
pub mod dag;
pub mod errors;
pub mod logging;
pub mod macro_resolver;
pub mod model;
pub mod plan;
pub mod provider;
pub mod runner;
pub mod types;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tracing::info;

use crate::cli::CliArgs;
use crate::config::{load_task_set, load_variables};
use crate::dag::PlanOutcome;
use crate::errors::{EngineError, Result};
use crate::macro_resolver::{Interact, MacroContext};
use crate::provider::ProviderRegistry;
use crate::runner::{outcome_to_result, TaskRunner, TracingEventSink};

/// A non-interactive [`Interact`]: the CLI has no surface to show a prompt
/// through, so `prompt`/`select-pid` macros fail with a clear error rather
/// than hang. A host editor integration supplies its own implementation.
pub struct NonInteractive;

impl Interact for NonInteractive {
    fn prompt<'a>(
        &'a self,
        _text: &'a str,
        _default: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async {
            Err(EngineError::MacroExpansionError(
                "prompt macros are not supported in this host".to_string(),
            ))
        })
    }

    fn select_pid<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async {
            Err(EngineError::MacroExpansionError(
                "select-pid macros are not supported in this host".to_string(),
            ))
        })
    }
}

/// High-level entry point used by `main.rs`: load the task set and
/// variables, build a `MacroContext`, and run a single plan rooted at
/// `args.task`.
pub async fn run(args: CliArgs) -> Result<()> {
    let root_dir = PathBuf::from(&args.root);
    let tasks_path = resolve_under(&root_dir, &args.tasks);
    let variables_path = resolve_under(&root_dir, &args.variables);

    let task_set = load_task_set(&tasks_path)?;

    if args.dry_run {
        print_dry_run(&task_set, &args.task)?;
        return Ok(());
    }

    let variables_file = load_variables(&variables_path)?;
    let ctx = MacroContext::new(root_dir, Arc::new(NonInteractive)).with_variables(variables_file.variables);

    let runtime = tokio::runtime::Handle::current();
    let providers = ProviderRegistry::with_builtins(runtime);
    let runner = TaskRunner::new(providers);

    let events = TracingEventSink;
    info!(task = %args.task, "starting plan");
    let outcome: PlanOutcome = runner.run(&task_set, &args.task, &ctx, &events).await?;
    outcome_to_result(outcome)
}

fn resolve_under(root: &Path, path: &str) -> PathBuf {
    let candidate = PathBuf::from(path);
    if candidate.is_absolute() {
        candidate
    } else {
        root.join(candidate)
    }
}

fn print_dry_run(task_set: &crate::model::TaskSet, root: &str) -> Result<()> {
    let plan = crate::plan::build_plan(task_set, root, 0)?;
    println!("taskloop dry-run");
    println!("root: {}", plan.root);
    println!("tasks ({}):", plan.tasks.len());
    for (name, task) in &plan.tasks {
        println!("  - {} [{}]", name, task.kind);
        if !task.deps.is_empty() {
            println!("      depends_on: {:?} ({:?})", task.deps, task.depends_order);
        }
        if task.save_buffers {
            println!("      save_buffers: true");
        }
    }
    Ok(())
}
