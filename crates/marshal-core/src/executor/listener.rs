//! Observer hooks invoked around plan and task transitions.

use std::{
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use log::warn;

use crate::models::{PlanId, PlanState, TaskKindTag, TaskPath, TaskState};

/// Read-only view of a plan run handed to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanView {
    pub plan_id: PlanId,
    pub name: String,
    pub attempt: u32,
    /// Number of leaf tasks in the plan
    pub task_count: usize,
}

/// Read-only view of a task run handed to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskView {
    pub plan_id: PlanId,
    pub path: TaskPath,
    pub name: String,
    pub kind: TaskKindTag,
}

/// Monitoring hooks. Called synchronously by the executor; implementations
/// should return quickly and cannot influence scheduling.
pub trait ExecutionListener: Send + Sync {
    fn plan_start(&self, _plan: &PlanView) {}

    fn plan_end(&self, _plan: &PlanView, _state: PlanState) {}

    fn task_start(&self, _task: &TaskView) {}

    fn task_end(&self, _task: &TaskView, _state: TaskState) {}
}

/// Ordered list of listeners, invoked in registration order.
#[derive(Clone, Default)]
pub struct ListenerSet {
    listeners: Vec<Arc<dyn ExecutionListener>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, listener: Arc<dyn ExecutionListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub(crate) fn plan_start(&self, plan: &PlanView) {
        self.each("plan_start", |l| l.plan_start(plan));
    }

    pub(crate) fn plan_end(&self, plan: &PlanView, state: PlanState) {
        self.each("plan_end", |l| l.plan_end(plan, state));
    }

    pub(crate) fn task_start(&self, task: &TaskView) {
        self.each("task_start", |l| l.task_start(task));
    }

    pub(crate) fn task_end(&self, task: &TaskView, state: TaskState) {
        self.each("task_end", |l| l.task_end(task, state));
    }

    /// A panicking listener is logged and skipped.
    fn each(&self, hook: &str, call: impl Fn(&dyn ExecutionListener)) {
        for listener in &self.listeners {
            let result = catch_unwind(AssertUnwindSafe(|| call(listener.as_ref())));
            if result.is_err() {
                warn!("Execution listener panicked in {hook}; ignoring");
            }
        }
    }
}

impl fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl ExecutionListener for Counting {
        fn task_start(&self, _task: &TaskView) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Exploding;

    impl ExecutionListener for Exploding {
        fn task_start(&self, _task: &TaskView) {
            panic!("listener bug");
        }
    }

    #[test]
    fn test_panicking_listener_does_not_stop_others() {
        let counting = Arc::new(Counting::default());
        let mut set = ListenerSet::new();
        set.push(Arc::new(Exploding));
        set.push(counting.clone());

        set.task_start(&TaskView {
            plan_id: 1,
            path: TaskPath::root(0),
            name: "noop".to_string(),
            kind: TaskKindTag::SingleJob,
        });

        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
        assert_eq!(set.len(), 2);
    }
}
