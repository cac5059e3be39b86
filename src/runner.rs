// src/runner.rs

//! The Task Runner: the policy layer above the scheduler (spec.md §4.2).
//! Validates the task set, reduces it to the reachable subgraph from a
//! root, macro-expands it, enforces cross-plan concurrency at node start,
//! drives a fresh [`Scheduler`] per plan, and fans lifecycle events out.
//!
//! This is the async IO shell around the scheduler's pure synchronous core
//! — the same split as the teacher's `engine::{CoreRuntime, Runtime}`, with
//! [`Scheduler`] playing `CoreRuntime`'s role.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::concurrency::{Acquired, ConcurrencyRegistry};
use crate::dag::{DagGraph, NodeEvent, PlanOutcome, Scheduler, SchedulerStep};
use crate::errors::{EngineError, Result};
use crate::macro_resolver::{resolve_task, MacroContext};
use crate::model::{Node, Task, TaskSet};
use crate::plan::build_plan;
use crate::provider::{Control, ExitHandle, ProviderRegistry, StartOutcome};

/// Receives every `(id, event)` pair and the terminal plan outcome. The
/// default `tracing`-backed sink matches spec.md §4.2's "writes a
/// user-visible log line"; a host UI would implement this to drive its
/// status tree instead.
pub trait EventSink: Send + Sync {
    fn on_node_event(&self, id: &str, event: &NodeEvent);
    fn on_plan_exit(&self, outcome: &PlanOutcome);
}

pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn on_node_event(&self, id: &str, event: &NodeEvent) {
        match event {
            NodeEvent::Start => info!(task = id, "start"),
            NodeEvent::Stop { success: true, .. } => info!(task = id, "stop ok"),
            NodeEvent::Stop {
                success: false,
                trigger,
                param,
            } => warn!(
                task = id,
                trigger = trigger.map(|t| t.as_str()).unwrap_or("unknown"),
                reason = param.as_deref().unwrap_or(""),
                "stop failed"
            ),
        }
    }

    fn on_plan_exit(&self, outcome: &PlanOutcome) {
        if outcome.success {
            info!("plan finished ok");
        } else {
            warn!(
                trigger = outcome.trigger.map(|t| t.as_str()).unwrap_or("unknown"),
                reason = outcome.param.as_deref().unwrap_or(""),
                "plan failed"
            );
        }
    }
}

/// `save_buffers` is advisory (spec.md §9): "the runner asks the host to
/// persist and waits synchronously for the host's reply". Buffer
/// persistence itself is out of scope (spec.md §1); this is the seam a host
/// editor would implement.
pub trait BufferSaver: Send + Sync {
    fn save_all<'a>(&'a self) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

pub struct NoopBufferSaver;
impl BufferSaver for NoopBufferSaver {
    fn save_all<'a>(&'a self) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async {})
    }
}

pub struct TaskRunner {
    providers: ProviderRegistry,
    concurrency: ConcurrencyRegistry,
    buffer_saver: Arc<dyn BufferSaver>,
    plan_counter: AtomicU64,
}

impl TaskRunner {
    pub fn new(providers: ProviderRegistry) -> Self {
        Self {
            providers,
            concurrency: ConcurrencyRegistry::new(),
            buffer_saver: Arc::new(NoopBufferSaver),
            plan_counter: AtomicU64::new(0),
        }
    }

    pub fn with_buffer_saver(mut self, saver: Arc<dyn BufferSaver>) -> Self {
        self.buffer_saver = saver;
        self
    }

    /// Run one plan to completion: build it, macro-expand it, run the
    /// `save_buffers` hint if needed, and drive a fresh scheduler.
    pub async fn run(&self, task_set: &TaskSet, root: &str, ctx: &MacroContext, events: &dyn EventSink) -> Result<PlanOutcome> {
        let plan_id = self.plan_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let plan = build_plan(task_set, root, plan_id)?;

        let mut expanded: BTreeMap<String, Task> = BTreeMap::new();
        for (name, task) in &plan.tasks {
            expanded.insert(name.clone(), resolve_task(task, ctx).await?);
        }

        if expanded.values().any(|t| t.save_buffers) {
            self.buffer_saver.save_all().await;
        }

        let nodes: std::collections::HashMap<String, Node> =
            expanded.values().map(|t| (t.name.clone(), Node::from_task(t))).collect();
        let graph = DagGraph::new(nodes);

        let mut scheduler = Scheduler::new();
        let (leaf_tx, leaf_rx) = mpsc::unbounded_channel();
        let step = scheduler.start(graph.into_nodes(), root);

        let outcome = self.drive(scheduler, &expanded, step, leaf_tx, leaf_rx, events, plan_id).await;
        events.on_plan_exit(&outcome);
        Ok(outcome)
    }

    async fn drive(
        &self,
        mut scheduler: Scheduler,
        plan: &BTreeMap<String, Task>,
        mut step: SchedulerStep,
        leaf_tx: mpsc::UnboundedSender<crate::provider::LeafDone>,
        mut leaf_rx: mpsc::UnboundedReceiver<crate::provider::LeafDone>,
        events: &dyn EventSink,
        plan_id: u64,
    ) -> PlanOutcome {
        let mut controls: std::collections::HashMap<String, Arc<Mutex<Option<Box<dyn Control>>>>> = std::collections::HashMap::new();

        loop {
            for (id, ev) in step.events.drain(..) {
                events.on_node_event(&id, &ev);
            }
            for id in step.terminate_leaves.drain(..) {
                if let Some(cell) = controls.get(&id) {
                    if let Some(ctrl) = cell.lock().expect("control cell poisoned").as_mut() {
                        ctrl.terminate();
                    }
                }
            }

            let ids = std::mem::take(&mut step.dispatch);
            if ids.is_empty() {
                if let Some(outcome) = step.plan_outcome.take() {
                    return outcome;
                }
                match leaf_rx.recv().await {
                    Some(done) => {
                        controls.remove(&done.id);
                        self.concurrency.release(&done.id, plan_id);
                        step = scheduler.on_leaf_done(done.run_id, &done.id, done.outcome);
                        continue;
                    }
                    None => {
                        error!("leaf completion channel closed unexpectedly");
                        return PlanOutcome {
                            success: false,
                            trigger: Some(crate::types::ExitTrigger::Interrupt),
                            param: Some("Task interrupted".to_string()),
                        };
                    }
                }
            }

            let mut next = SchedulerStep::default();
            for id in ids {
                let run_id = scheduler.current_run_id();
                let task = match plan.get(&id) {
                    Some(t) => t,
                    None => continue,
                };

                let cell: Arc<Mutex<Option<Box<dyn Control>>>> = Arc::new(Mutex::new(None));
                let cell_for_terminate = cell.clone();
                let terminate: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
                    if let Some(ctrl) = cell_for_terminate.lock().expect("control cell poisoned").as_mut() {
                        ctrl.terminate();
                    }
                });

                match self.concurrency.acquire(&task.name, plan_id, task.concurrency, terminate).await {
                    Acquired::Refused => {
                        let s = scheduler.on_start_failed(run_id, &id, "Task refused (already running)".to_string());
                        next.merge(s);
                        continue;
                    }
                    Acquired::Proceed => {}
                }

                let provider = match self.providers.get(&task.kind) {
                    Some(p) => p,
                    None => {
                        self.concurrency.release(&task.name, plan_id);
                        let s = scheduler.on_start_failed(
                            run_id,
                            &id,
                            format!("No provider registered for task type: {}", task.kind),
                        );
                        next.merge(s);
                        continue;
                    }
                };

                let exit = ExitHandle::new(leaf_tx.clone(), run_id, id.clone());
                match provider.start_one_task(task, exit) {
                    StartOutcome::Started(control) => {
                        *cell.lock().expect("control cell poisoned") = Some(control);
                        controls.insert(id.clone(), cell);
                    }
                    StartOutcome::Failed(reason) => {
                        self.concurrency.release(&task.name, plan_id);
                        let s = scheduler.on_start_failed(run_id, &id, reason);
                        next.merge(s);
                    }
                }
            }
            step = next;
        }
    }
}

/// Convenience wrapper matching the error taxonomy the host expects back
/// from an interrupted/refused plan (spec.md §6's "Exit reasons surfaced
/// upward").
pub fn outcome_to_result(outcome: PlanOutcome) -> Result<()> {
    if outcome.success {
        return Ok(());
    }
    let message = outcome.param.unwrap_or_else(|| "Task failed".to_string());
    match outcome.trigger {
        Some(crate::types::ExitTrigger::Cycle) => Err(EngineError::CycleError(message)),
        Some(crate::types::ExitTrigger::InvalidNode) => Err(EngineError::InvalidNodeError(message)),
        Some(crate::types::ExitTrigger::Interrupt) => Err(EngineError::InterruptError(message)),
        _ => Err(EngineError::NodeRunError(message)),
    }
}
