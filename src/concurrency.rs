// src/concurrency.rs

//! Cross-plan concurrency coordination (spec.md §4.2, §4.3's table, §9
//! "Cross-plan registry"): a single, process-wide map keyed by task name,
//! enforced only at node start. Within a plan, the scheduler alone owns
//! ordering.
//!
//! spec.md §5 describes this registry as lock-free because the source
//! assumes one logical thread. Each [`crate::runner::TaskRunner`] in this
//! crate instead runs as its own async task so two plans can genuinely
//! overlap, so the registry is `Arc<Mutex<..>>`-guarded here — a small,
//! deliberate deviation from "no locks", recorded in DESIGN.md.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tracing::{debug, info};

use crate::types::ConcurrencyPolicy;

type TerminateFn = Arc<dyn Fn() + Send + Sync>;

struct RunningRecord {
    plan_id: u64,
    terminate: TerminateFn,
    finished: Arc<Notify>,
}

#[derive(Clone, Default)]
pub struct ConcurrencyRegistry {
    entries: Arc<Mutex<HashMap<String, RunningRecord>>>,
}

pub enum Acquired {
    /// The caller may proceed to start the task now.
    Proceed,
    /// `concurrency = "refuse"` and another plan already holds this name.
    Refused,
}

impl ConcurrencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enforce `policy` for `task_name` on behalf of `plan_id`, registering
    /// a running record on success. `terminate` is called (possibly
    /// multiple times, must be idempotent) to preempt a conflicting holder.
    pub async fn acquire(
        &self,
        task_name: &str,
        plan_id: u64,
        policy: ConcurrencyPolicy,
        terminate: TerminateFn,
    ) -> Acquired {
        match policy {
            ConcurrencyPolicy::Parallel => {
                self.register(task_name, plan_id, terminate);
                Acquired::Proceed
            }
            ConcurrencyPolicy::Refuse => {
                let holder_exists = {
                    let entries = self.entries.lock().expect("concurrency registry poisoned");
                    entries.get(task_name).is_some()
                };
                if holder_exists {
                    info!(task = task_name, "concurrency: refusing start, task already running elsewhere");
                    return Acquired::Refused;
                }
                self.register(task_name, plan_id, terminate);
                Acquired::Proceed
            }
            ConcurrencyPolicy::Restart => {
                loop {
                    let others: Vec<(TerminateFn, Arc<Notify>)> = {
                        let entries = self.entries.lock().expect("concurrency registry poisoned");
                        entries
                            .get(task_name)
                            .filter(|r| r.plan_id != plan_id)
                            .map(|r| vec![(r.terminate.clone(), r.finished.clone())])
                            .unwrap_or_default()
                    };
                    if others.is_empty() {
                        self.register(task_name, plan_id, terminate);
                        return Acquired::Proceed;
                    }
                    for (other_terminate, finished) in others {
                        debug!(task = task_name, "concurrency: restart policy terminating other instance");
                        // Register the waiter before terminating: `terminate`
                        // may synchronously call `release`, which fires
                        // `notify_waiters` with no stored permit. Calling
                        // `notified()` after that point would miss the wakeup
                        // and hang forever.
                        let notified = finished.notified();
                        tokio::pin!(notified);
                        notified.as_mut().enable();
                        other_terminate();
                        notified.await;
                    }
                    // Loop again: another contender may have registered
                    // while we were waiting.
                }
            }
        }
    }

    fn register(&self, task_name: &str, plan_id: u64, terminate: TerminateFn) {
        let mut entries = self.entries.lock().expect("concurrency registry poisoned");
        entries.insert(
            task_name.to_string(),
            RunningRecord {
                plan_id,
                terminate,
                finished: Arc::new(Notify::new()),
            },
        );
    }

    /// Release the record for `task_name` owned by `plan_id`, waking any
    /// `restart` waiters blocked on its completion.
    pub fn release(&self, task_name: &str, plan_id: u64) {
        let mut entries = self.entries.lock().expect("concurrency registry poisoned");
        if let Some(record) = entries.get(task_name) {
            if record.plan_id == plan_id {
                record.finished.notify_waiters();
                entries.remove(task_name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refuse_rejects_while_another_plan_holds_the_name() {
        let registry = ConcurrencyRegistry::new();
        let noop: TerminateFn = Arc::new(|| {});
        assert!(matches!(
            registry.acquire("serve", 1, ConcurrencyPolicy::Refuse, noop.clone()).await,
            Acquired::Proceed
        ));
        assert!(matches!(
            registry.acquire("serve", 2, ConcurrencyPolicy::Refuse, noop).await,
            Acquired::Refused
        ));
    }

    #[tokio::test]
    async fn parallel_never_refuses() {
        let registry = ConcurrencyRegistry::new();
        let noop: TerminateFn = Arc::new(|| {});
        assert!(matches!(
            registry.acquire("build", 1, ConcurrencyPolicy::Parallel, noop.clone()).await,
            Acquired::Proceed
        ));
        assert!(matches!(
            registry.acquire("build", 2, ConcurrencyPolicy::Parallel, noop).await,
            Acquired::Proceed
        ));
    }

    #[tokio::test]
    async fn restart_terminates_the_other_holder_then_proceeds() {
        let registry = ConcurrencyRegistry::new();
        let terminated = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let terminated_clone = terminated.clone();
        let registry_clone = registry.clone();
        let first_terminate: TerminateFn = Arc::new(move || {
            terminated_clone.store(true, std::sync::atomic::Ordering::SeqCst);
            registry_clone.release("serve", 1);
        });
        assert!(matches!(
            registry.acquire("serve", 1, ConcurrencyPolicy::Restart, first_terminate).await,
            Acquired::Proceed
        ));

        let noop: TerminateFn = Arc::new(|| {});
        assert!(matches!(
            registry.acquire("serve", 2, ConcurrencyPolicy::Restart, noop).await,
            Acquired::Proceed
        ));
        assert!(terminated.load(std::sync::atomic::Ordering::SeqCst));
    }
}
