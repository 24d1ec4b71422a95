//! Per-task execution context and the cooperative interrupt flag.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::Notify;

use crate::models::{PlanId, TaskPath};

/// Interrupt request shared by everything running on behalf of one plan run.
///
/// Setting the flag never stops a thread; tasks observe it at their own poll
/// points and the executor stops dispatching new work.
#[derive(Debug, Default)]
pub struct InterruptFlag {
    requested: AtomicBool,
    notify: Notify,
}

impl InterruptFlag {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Requests an interrupt and wakes anything waiting on [`Self::wait`].
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolves once an interrupt has been requested.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_requested() {
                return;
            }
            notified.await;
        }
    }
}

/// Read-only view handed to jobs while they run.
#[derive(Debug, Clone)]
pub struct TaskContext {
    plan_id: PlanId,
    path: TaskPath,
    interrupt: Arc<InterruptFlag>,
}

impl TaskContext {
    pub(crate) fn new(plan_id: PlanId, path: TaskPath, interrupt: Arc<InterruptFlag>) -> Self {
        Self {
            plan_id,
            path,
            interrupt,
        }
    }

    pub fn plan_id(&self) -> PlanId {
        self.plan_id
    }

    pub fn path(&self) -> &TaskPath {
        &self.path
    }

    /// Long-running jobs poll this and return `INTERRUPTED` when it is set.
    pub fn is_interrupt_requested(&self) -> bool {
        self.interrupt.is_requested()
    }
}
