// src/dag/scheduler.rs

//! The reentrant, cancellable DAG walker from spec.md §4.1.
//!
//! This is a pure, synchronous state machine: it never touches providers,
//! channels, or async runtimes directly. Instead of calling out to a
//! `start_node` capability itself (which would force every provider call to
//! be synchronous-initiate), it *reports* which node ids the caller should
//! now dispatch and which running leaves should now be terminated, via
//! [`SchedulerStep`]. This mirrors the teacher's `CoreRuntime`/`Runtime`
//! split: the scheduler is the pure core, [`crate::runner::TaskRunner`] is
//! the async IO shell that actually talks to providers and feeds completions
//! back in through `on_leaf_done`.
//!
//! Being pure synchronous logic also sidesteps a real borrow-checker
//! headache: dependency resolution (`sequence`/`parallel`, diamonds,
//! coalescing) is naturally recursive, and recursion that suspends across
//! `.await` points while holding `&mut self` doesn't compose in Rust. Here,
//! the only true suspension point is the leaf boundary (`start_node` →
//! `on_leaf_done`), and that's modeled as two ordinary, non-async method
//! calls with scheduler state threaded explicitly between them — exactly the
//! "re-dispatch onto the scheduler's execution context" contract spec.md §5
//! describes.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, trace, warn};

use crate::model::Node;
use crate::types::{DependsOrder, ExitTrigger, TaskOutcome};

/// One `(id, event)` pair the caller should fan out to logs/UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    Start,
    Stop {
        success: bool,
        trigger: Option<ExitTrigger>,
        param: Option<String>,
    },
}

/// The scheduler's one, terminal report per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOutcome {
    pub success: bool,
    pub trigger: Option<ExitTrigger>,
    pub param: Option<String>,
}

/// Everything a single scheduler call (`start`, `on_leaf_done`,
/// `on_start_failed`, `terminate`) produced. The caller is expected to:
/// 1. Fan out `events` to logs/UI.
/// 2. For each id in `dispatch`, call the matching provider's
///    `start_one_task` and route completion back through `on_leaf_done`
///    (or `on_start_failed` if the provider refused synchronously).
/// 3. For each id in `terminate_leaves`, call `control.terminate()`.
/// 4. If `plan_outcome` is set, the plan is finished; no further calls on
///    this scheduler are meaningful.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStep {
    pub dispatch: Vec<String>,
    pub terminate_leaves: Vec<String>,
    pub events: Vec<(String, NodeEvent)>,
    pub plan_outcome: Option<PlanOutcome>,
}

impl SchedulerStep {
    /// Append `other` into `self`, used by the runner when it needs to feed
    /// a synchronous follow-up call's result (e.g. `on_start_failed`) back
    /// into a step it's still draining.
    pub fn merge(&mut self, mut other: SchedulerStep) {
        self.dispatch.append(&mut other.dispatch);
        self.terminate_leaves.append(&mut other.terminate_leaves);
        self.events.append(&mut other.events);
        if other.plan_outcome.is_some() {
            self.plan_outcome = other.plan_outcome;
        }
    }
}

/// A node's pending-dependency state while it waits on one or more deps.
#[derive(Debug, Clone)]
enum DepWait {
    Sequence { remaining: VecDeque<String> },
    Parallel { remaining: HashSet<String> },
}

enum ResolveOutcome {
    Immediate(NodeResult),
    Pending,
}

#[derive(Debug, Clone)]
struct NodeResult {
    ok: bool,
    trigger: ExitTrigger,
    param: Option<String>,
}

fn ok_result() -> NodeResult {
    NodeResult {
        ok: true,
        trigger: ExitTrigger::Node,
        param: None,
    }
}

fn fail_result(trigger: ExitTrigger, param: Option<String>) -> NodeResult {
    NodeResult {
        ok: false,
        trigger,
        param,
    }
}

/// See the module doc for the overall design. Field names follow spec.md §3
/// ("Scheduler state") directly.
#[derive(Debug, Default)]
pub struct Scheduler {
    graph: HashMap<String, Node>,
    root: Option<String>,
    run_id: u64,
    finished: bool,
    terminating: bool,

    visiting: HashSet<String>,
    done: HashSet<String>,
    failed: HashMap<String, (ExitTrigger, Option<String>)>,
    /// id -> parent ids whose dependency resolution is waiting on id.
    waiters: HashMap<String, Vec<String>>,
    /// id -> that node's own pending-dependency state, while it waits.
    dep_wait: HashMap<String, DepWait>,
    /// Leaves currently dispatched (start_node called, no outcome yet).
    running: HashSet<String>,
    pending_running: usize,
    /// Set once the root node itself has resolved, but the terminal
    /// `PlanOutcome` is only reported once `pending_running` drains to zero
    /// (spec.md §4.1: "lets the ordinary exit path close the plan once the
    /// last leaf reports", §7/§8: already-running siblings run to their own
    /// completion or cancellation before `on_plan_exit` fires).
    root_result: Option<NodeResult>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.root.is_some() && !self.finished
    }

    pub fn is_terminating(&self) -> bool {
        self.terminating
    }

    pub fn is_terminated(&self) -> bool {
        self.finished
    }

    /// Begin a run over `nodes`, starting dependency resolution at `root`.
    ///
    /// Fails synchronously (via `plan_outcome`) if a run is already active,
    /// matching spec.md §4.1's `start()` contract.
    pub fn start(&mut self, nodes: HashMap<String, Node>, root: &str) -> SchedulerStep {
        let mut out = SchedulerStep::default();

        if self.root.is_some() && !self.finished {
            warn!(root, "scheduler: start() called while a run is already active");
            out.plan_outcome = Some(PlanOutcome {
                success: false,
                trigger: Some(ExitTrigger::Interrupt),
                param: Some("Task interrupted".to_string()),
            });
            return out;
        }

        *self = Scheduler {
            run_id: self.run_id + 1,
            graph: nodes,
            root: Some(root.to_string()),
            ..Scheduler::default()
        };
        debug!(run_id = self.run_id, root, "scheduler: starting new run");

        if !self.graph.contains_key(root) {
            self.finished = true;
            out.plan_outcome = Some(PlanOutcome {
                success: false,
                trigger: Some(ExitTrigger::InvalidNode),
                param: Some(format!("Invalid task name: {}", root)),
            });
            return out;
        }

        let root = root.to_string();
        if let ResolveOutcome::Immediate(r) = self.resolve_node(&root, &mut out) {
            self.finish_plan(r, &mut out);
        }
        out
    }

    /// Deliver a leaf completion. Stale callbacks (wrong `run_id`, unknown
    /// id) are silently discarded, matching spec.md §4.1 step 5 and the
    /// run-id token discipline in §9.
    pub fn on_leaf_done(&mut self, run_id: u64, id: &str, outcome: TaskOutcome) -> SchedulerStep {
        let mut out = SchedulerStep::default();
        if run_id != self.run_id || self.finished {
            trace!(id, run_id, current = self.run_id, "scheduler: discarding stale leaf completion");
            return out;
        }
        self.complete_leaf(id, outcome, &mut out);
        out
    }

    /// A provider's `start_one_task` refused synchronously. Equivalent to an
    /// immediate leaf failure (spec.md §4.1 step 4: "On start_node failure:
    /// decrement pending_running, emit stop(false, node, err), reply with
    /// the error").
    pub fn on_start_failed(&mut self, run_id: u64, id: &str, reason: String) -> SchedulerStep {
        self.on_leaf_done(run_id, id, TaskOutcome::Failed { reason })
    }

    /// Idempotent. Marks the scheduler `terminating`, tells the caller which
    /// running leaves to call `control.terminate()` on, and immediately
    /// fails any node still mid dependency-resolution with `interrupt`.
    pub fn terminate(&mut self) -> SchedulerStep {
        let mut out = SchedulerStep::default();
        if self.finished || self.terminating {
            return out;
        }
        self.terminating = true;

        let waiting_ids: Vec<String> = self.dep_wait.keys().cloned().collect();
        for id in waiting_ids {
            if self.dep_wait.remove(&id).is_some() {
                let r = fail_result(ExitTrigger::Interrupt, Some("Task interrupted".to_string()));
                self.propagate_failure(&id, r, &mut out);
            }
        }

        out.terminate_leaves = self.running.iter().cloned().collect();
        out
    }

    pub fn current_run_id(&self) -> u64 {
        self.run_id
    }

    // ---- internal: node-execution algorithm (spec.md §4.1) ----

    fn resolve_node(&mut self, id: &str, out: &mut SchedulerStep) -> ResolveOutcome {
        if self.terminating {
            let r = fail_result(ExitTrigger::Interrupt, Some("Task interrupted".to_string()));
            return ResolveOutcome::Immediate(r);
        }
        if self.done.contains(id) {
            out.events.push((id.to_string(), NodeEvent::Start));
            out.events.push((
                id.to_string(),
                NodeEvent::Stop {
                    success: true,
                    trigger: None,
                    param: None,
                },
            ));
            return ResolveOutcome::Immediate(ok_result());
        }
        if let Some((trigger, param)) = self.failed.get(id).cloned() {
            out.events.push((id.to_string(), NodeEvent::Start));
            out.events.push((
                id.to_string(),
                NodeEvent::Stop {
                    success: false,
                    trigger: Some(trigger),
                    param: param.clone(),
                },
            ));
            return ResolveOutcome::Immediate(fail_result(trigger, param));
        }
        if self.visiting.contains(id) {
            out.events.push((
                id.to_string(),
                NodeEvent::Stop {
                    success: false,
                    trigger: Some(ExitTrigger::Cycle),
                    param: Some(id.to_string()),
                },
            ));
            return ResolveOutcome::Immediate(fail_result(ExitTrigger::Cycle, Some(id.to_string())));
        }
        if self.dep_wait.contains_key(id) || self.running.contains(id) {
            // Request coalescing: the caller registers itself as a waiter.
            return ResolveOutcome::Pending;
        }

        let node = match self.graph.get(id) {
            Some(n) => n.clone(),
            None => {
                return ResolveOutcome::Immediate(fail_result(
                    ExitTrigger::InvalidNode,
                    Some(format!("Invalid task name: {}", id)),
                ));
            }
        };

        self.visiting.insert(id.to_string());
        self.resolve_deps(&node, out)
    }

    fn resolve_deps(&mut self, node: &Node, out: &mut SchedulerStep) -> ResolveOutcome {
        match node.order {
            DependsOrder::Sequence => self.drive_sequence(&node.id, node.deps.iter().cloned().collect(), out),
            DependsOrder::Parallel => self.drive_parallel(&node.id, node.deps.clone(), out),
        }
    }

    /// Advance a `sequence` wait starting from `remaining`, synchronously
    /// resolving deps that are already memoized/failed, stopping at the
    /// first `Pending` dep (registering `id` as its waiter) or the first
    /// failure.
    fn drive_sequence(&mut self, id: &str, mut remaining: VecDeque<String>, out: &mut SchedulerStep) -> ResolveOutcome {
        loop {
            let Some(dep) = remaining.pop_front() else {
                self.visiting.remove(id);
                self.begin_leaf(id, out);
                return ResolveOutcome::Pending;
            };
            match self.resolve_node(&dep, out) {
                ResolveOutcome::Immediate(r) if r.ok => continue,
                ResolveOutcome::Immediate(r) => {
                    self.visiting.remove(id);
                    return ResolveOutcome::Immediate(r);
                }
                ResolveOutcome::Pending => {
                    self.visiting.remove(id);
                    self.waiters.entry(dep.clone()).or_default().push(id.to_string());
                    self.dep_wait.insert(id.to_string(), DepWait::Sequence { remaining });
                    return ResolveOutcome::Pending;
                }
            }
        }
    }

    fn drive_parallel(&mut self, id: &str, deps: Vec<String>, out: &mut SchedulerStep) -> ResolveOutcome {
        let mut remaining: HashSet<String> = HashSet::new();
        let mut first_failure: Option<NodeResult> = None;
        for dep in &deps {
            match self.resolve_node(dep, out) {
                ResolveOutcome::Immediate(r) if r.ok => {}
                ResolveOutcome::Immediate(r) => {
                    if first_failure.is_none() {
                        first_failure = Some(r);
                    }
                }
                ResolveOutcome::Pending => {
                    remaining.insert(dep.clone());
                    self.waiters.entry(dep.clone()).or_default().push(id.to_string());
                }
            }
        }
        self.visiting.remove(id);

        if let Some(r) = first_failure {
            return ResolveOutcome::Immediate(r);
        }
        if remaining.is_empty() {
            self.begin_leaf(id, out);
            return ResolveOutcome::Pending;
        }
        self.dep_wait.insert(id.to_string(), DepWait::Parallel { remaining });
        ResolveOutcome::Pending
    }

    fn begin_leaf(&mut self, id: &str, out: &mut SchedulerStep) {
        self.running.insert(id.to_string());
        self.pending_running += 1;
        out.events.push((id.to_string(), NodeEvent::Start));
        out.dispatch.push(id.to_string());
    }

    fn complete_leaf(&mut self, id: &str, outcome: TaskOutcome, out: &mut SchedulerStep) {
        if !self.running.remove(id) {
            // Already completed or never dispatched; ignore.
            return;
        }
        self.pending_running -= 1;

        let result = match outcome {
            TaskOutcome::Success => ok_result(),
            TaskOutcome::Failed { reason } => fail_result(ExitTrigger::Node, Some(reason)),
        };
        out.events.push((
            id.to_string(),
            NodeEvent::Stop {
                success: result.ok,
                trigger: if result.ok { None } else { Some(result.trigger) },
                param: result.param.clone(),
            },
        ));

        if result.ok {
            self.done.insert(id.to_string());
        } else {
            self.failed.insert(id.to_string(), (result.trigger, result.param.clone()));
        }

        self.notify_waiters(id, result.clone(), out);

        self.record_root_result(id, &result);
        self.maybe_finish_plan(out);
    }

    fn propagate_failure(&mut self, id: &str, result: NodeResult, out: &mut SchedulerStep) {
        self.failed.insert(id.to_string(), (result.trigger, result.param.clone()));
        out.events.push((
            id.to_string(),
            NodeEvent::Stop {
                success: false,
                trigger: Some(result.trigger),
                param: result.param.clone(),
            },
        ));
        self.notify_waiters(id, result.clone(), out);
        self.record_root_result(id, &result);
        self.maybe_finish_plan(out);
    }

    /// Record the root's own outcome the first time it becomes known,
    /// however it arrives: its own `complete_leaf`, or a failure cascading
    /// up through `propagate_failure` because one of its dependencies failed
    /// before the root itself ever reached `begin_leaf`.
    fn record_root_result(&mut self, id: &str, result: &NodeResult) {
        if self.root.as_deref() == Some(id) && self.root_result.is_none() {
            self.root_result = Some(result.clone());
        }
    }

    /// Only report the plan's terminal outcome once the root has resolved
    /// *and* every leaf currently dispatched has reported back. A parallel
    /// sibling still running when the root's result becomes known (e.g. a
    /// failing sibling determines the root's fate before another sibling
    /// finishes) must be left to run to its own completion or cancellation
    /// first.
    fn maybe_finish_plan(&mut self, out: &mut SchedulerStep) {
        if self.pending_running == 0 {
            if let Some(result) = self.root_result.take() {
                self.finish_plan(result, out);
            }
        }
    }

    fn notify_waiters(&mut self, id: &str, result: NodeResult, out: &mut SchedulerStep) {
        let parents = self.waiters.remove(id).unwrap_or_default();
        for parent in parents {
            self.resume_parent(&parent, id, &result, out);
        }
    }

    fn resume_parent(&mut self, parent: &str, completed_dep: &str, result: &NodeResult, out: &mut SchedulerStep) {
        let wait = match self.dep_wait.remove(parent) {
            Some(w) => w,
            None => return, // parent already resolved (e.g. a sibling failed first)
        };

        match wait {
            DepWait::Sequence { remaining } => {
                if !result.ok {
                    self.propagate_failure(parent, result.clone(), out);
                    return;
                }
                match self.drive_sequence(parent, remaining, out) {
                    ResolveOutcome::Immediate(r) => {
                        if r.ok {
                            // Sequence with no remaining deps already calls
                            // begin_leaf internally; Immediate(ok) here can't
                            // happen in practice, but propagate defensively.
                        } else {
                            self.propagate_failure(parent, r, out);
                        }
                    }
                    ResolveOutcome::Pending => {}
                }
            }
            DepWait::Parallel { mut remaining } => {
                remaining.remove(completed_dep);
                if !result.ok {
                    self.propagate_failure(parent, result.clone(), out);
                    return;
                }
                if remaining.is_empty() {
                    self.begin_leaf(parent, out);
                } else {
                    self.dep_wait.insert(parent.to_string(), DepWait::Parallel { remaining });
                }
            }
        }
    }

    fn finish_plan(&mut self, result: NodeResult, out: &mut SchedulerStep) {
        if self.finished {
            return;
        }
        self.finished = true;
        out.plan_outcome = Some(PlanOutcome {
            success: result.ok,
            trigger: if result.ok { None } else { Some(result.trigger) },
            param: result.param,
        });
    }
}
