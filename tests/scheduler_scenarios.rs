//! End-to-end scenarios driving a full [`taskloop::runner::TaskRunner`]:
//! linear chains, diamonds, cycles, parallel-sibling failure, cross-plan
//! restart, and macro expansion.

use std::path::PathBuf;
use std::sync::Arc;

use taskloop_test_utils::builders::{TaskBuilder, TaskSetBuilder};
use taskloop_test_utils::fake_provider::FakeProvider;

use taskloop::macro_resolver::MacroContext;
use taskloop::provider::ProviderRegistry;
use taskloop::runner::{TaskRunner, TracingEventSink};
use taskloop::types::DependsOrder;
use taskloop::NonInteractive;

fn ctx() -> MacroContext {
    MacroContext::new(PathBuf::from("/workspace"), Arc::new(NonInteractive))
}

fn runner_with(provider: Arc<FakeProvider>) -> TaskRunner {
    let mut providers = ProviderRegistry::new();
    providers.register("composite", provider);
    TaskRunner::new(providers)
}

#[tokio::test]
async fn linear_chain_runs_in_dependency_order() {
    let provider = Arc::new(FakeProvider::new());
    let runner = runner_with(provider.clone());

    let set = TaskSetBuilder::new()
        .with_task(TaskBuilder::new("a").build())
        .with_task(TaskBuilder::new("b").depends_on("a").build())
        .with_task(TaskBuilder::new("c").depends_on("b").build())
        .build();

    let outcome = runner.run(&set, "c", &ctx(), &TracingEventSink).await.unwrap();
    assert!(outcome.success);
    assert_eq!(provider.started(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn diamond_dependency_is_only_started_once() {
    let provider = Arc::new(FakeProvider::new());
    let runner = runner_with(provider.clone());

    let set = TaskSetBuilder::new()
        .with_task(TaskBuilder::new("a").build())
        .with_task(TaskBuilder::new("b").depends_on("a").build())
        .with_task(TaskBuilder::new("c").depends_on("a").build())
        .with_task(
            TaskBuilder::new("d")
                .depends_on("b")
                .depends_on("c")
                .depends_order(DependsOrder::Parallel)
                .build(),
        )
        .build();

    let outcome = runner.run(&set, "d", &ctx(), &TracingEventSink).await.unwrap();
    assert!(outcome.success);
    let started = provider.started();
    assert_eq!(started.iter().filter(|n| n.as_str() == "a").count(), 1);
    assert!(started.contains(&"b".to_string()));
    assert!(started.contains(&"c".to_string()));
    assert!(started.contains(&"d".to_string()));
}

#[tokio::test]
async fn cycle_is_rejected_before_any_task_starts() {
    let provider = Arc::new(FakeProvider::new());
    let runner = runner_with(provider.clone());

    let set = TaskSetBuilder::new()
        .with_task(TaskBuilder::new("a").depends_on("b").build())
        .with_task(TaskBuilder::new("b").depends_on("a").build())
        .build();

    let err = runner.run(&set, "a", &ctx(), &TracingEventSink).await.unwrap_err();
    assert!(err.to_string().contains("Task dependency loop detected in task"));
    assert!(provider.started().is_empty());
}

#[tokio::test]
async fn parallel_sibling_failure_does_not_cancel_the_other_sibling() {
    let provider = Arc::new(FakeProvider::new());
    provider.fail("x", "boom");
    let runner = runner_with(provider.clone());

    let set = TaskSetBuilder::new()
        .with_task(TaskBuilder::new("x").build())
        .with_task(TaskBuilder::new("y").build())
        .with_task(
            TaskBuilder::new("root")
                .depends_on("x")
                .depends_on("y")
                .depends_order(DependsOrder::Parallel)
                .build(),
        )
        .build();

    let outcome = runner.run(&set, "root", &ctx(), &TracingEventSink).await.unwrap();
    assert!(!outcome.success);
    assert!(provider.started().contains(&"y".to_string()));
    assert!(!provider.terminated().contains(&"y".to_string()));
}

#[tokio::test]
async fn sequence_short_circuits_on_first_failure() {
    let provider = Arc::new(FakeProvider::new());
    provider.fail("a", "boom");
    let runner = runner_with(provider.clone());

    let set = TaskSetBuilder::new()
        .with_task(TaskBuilder::new("a").build())
        .with_task(TaskBuilder::new("b").depends_on("a").build())
        .build();

    let outcome = runner.run(&set, "b", &ctx(), &TracingEventSink).await.unwrap();
    assert!(!outcome.success);
    assert_eq!(provider.started(), vec!["a"]);
}

#[tokio::test]
async fn macro_expansion_resolves_workspace_variables_before_dispatch() {
    let provider = Arc::new(FakeProvider::new());
    let runner = runner_with(provider.clone());

    let set = TaskSetBuilder::new()
        .with_task(
            TaskBuilder::new("root")
                .payload("note", "hello ${var:name}")
                .build(),
        )
        .build();

    let mut variables = std::collections::BTreeMap::new();
    variables.insert("name".to_string(), "world".to_string());
    let ctx = MacroContext::new(PathBuf::from("/workspace"), Arc::new(NonInteractive)).with_variables(variables);

    let outcome = runner.run(&set, "root", &ctx, &TracingEventSink).await.unwrap();
    assert!(outcome.success);
    let payload = provider.payload_of("root").unwrap();
    assert_eq!(payload["note"], "hello world");
}

/// A [`taskloop::provider::Provider`] whose completion is externally
/// controlled, letting the test hold a task "running" until it explicitly
/// wants it to finish — needed to exercise genuine cross-plan overlap,
/// which `FakeProvider`'s synchronous completion can't represent.
mod signal_provider {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use taskloop::model::Task;
    use taskloop::provider::{Control, ExitHandle, Provider, StartOutcome};
    use taskloop::types::TaskOutcome;

    #[derive(Default, Clone)]
    pub struct SignalProvider {
        slots: Arc<Mutex<HashMap<String, ExitHandle>>>,
        terminated: Arc<Mutex<Vec<String>>>,
    }

    struct SignalControl {
        name: String,
        slots: Arc<Mutex<HashMap<String, ExitHandle>>>,
        terminated: Arc<Mutex<Vec<String>>>,
    }

    impl Control for SignalControl {
        fn terminate(&mut self) {
            self.terminated.lock().unwrap().push(self.name.clone());
            if let Some(exit) = self.slots.lock().unwrap().remove(&self.name) {
                exit.complete(TaskOutcome::Failed {
                    reason: "terminated".to_string(),
                });
            }
        }
    }

    impl SignalProvider {
        pub fn terminated(&self) -> Vec<String> {
            self.terminated.lock().unwrap().clone()
        }

        pub fn is_running(&self, name: &str) -> bool {
            self.slots.lock().unwrap().contains_key(name)
        }

        /// Complete the still-running task named `name` with `outcome`.
        pub fn finish(&self, name: &str, outcome: TaskOutcome) {
            if let Some(exit) = self.slots.lock().unwrap().remove(name) {
                exit.complete(outcome);
            }
        }
    }

    impl Provider for SignalProvider {
        fn start_one_task(&self, task: &Task, exit: ExitHandle) -> StartOutcome {
            self.slots.lock().unwrap().insert(task.name.clone(), exit);
            StartOutcome::Started(Box::new(SignalControl {
                name: task.name.clone(),
                slots: self.slots.clone(),
                terminated: self.terminated.clone(),
            }))
        }
    }
}

#[tokio::test]
async fn restart_policy_terminates_the_other_plans_holder() {
    use signal_provider::SignalProvider;
    use taskloop::types::{ConcurrencyPolicy, TaskOutcome};

    let signal = Arc::new(SignalProvider::default());
    let mut providers = ProviderRegistry::new();
    providers.register("composite", signal.clone());
    let runner = Arc::new(TaskRunner::new(providers));

    let set = Arc::new(
        TaskSetBuilder::new()
            .with_task(TaskBuilder::new("serve").concurrency(ConcurrencyPolicy::Restart).build())
            .build(),
    );

    let runner1 = runner.clone();
    let set1 = set.clone();
    let plan1 = tokio::spawn(async move { runner1.run(&set1, "serve", &ctx(), &TracingEventSink).await });

    // Wait for the first plan to actually dispatch `serve` before starting
    // the second plan, so the overlap (and thus the restart) is genuine.
    while !signal.is_running("serve") {
        tokio::task::yield_now().await;
    }

    let runner2 = runner.clone();
    let set2 = set.clone();
    let plan2 = tokio::spawn(async move { runner2.run(&set2, "serve", &ctx(), &TracingEventSink).await });

    // Plan 2's `acquire()` terminates plan 1's holder and waits for it to
    // release the name before dispatching its own `serve` instance, so
    // plan 1 is guaranteed to finish (with failure) first.
    let outcome1 = plan1.await.unwrap().unwrap();
    assert!(!outcome1.success, "the preempted plan should report failure");
    assert!(signal.terminated().contains(&"serve".to_string()));

    while !signal.is_running("serve") {
        tokio::task::yield_now().await;
    }
    signal.finish("serve", TaskOutcome::Success);

    let outcome2 = plan2.await.unwrap().unwrap();
    assert!(outcome2.success, "the restarting plan should finish successfully");
}
