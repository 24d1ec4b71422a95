//! Bookkeeping for a single plan run attempt.

use std::sync::{Mutex, MutexGuard, PoisonError};

use jiff::Timestamp;

use crate::{
    error::TaskFault,
    models::{ExceptionTransfer, PlanRun, PlanState, TaskPath, TaskRun, TaskState},
};

#[derive(Debug)]
struct Inner {
    run: PlanRun,
    fatal: Option<ExceptionTransfer>,
    first: Option<ExceptionTransfer>,
}

/// Counters, task runs and captured faults of the attempt in flight.
///
/// Mutated only by the worker futures of the plan that owns it.
#[derive(Debug)]
pub struct ExecutionState {
    inner: Mutex<Inner>,
}

impl ExecutionState {
    pub fn new(attempt: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                run: PlanRun::start(attempt),
                fatal: None,
                first: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a task start and returns the index of its run entry.
    pub fn task_started(&self, path: &TaskPath, name: &str) -> usize {
        let mut inner = self.lock();
        inner.run.tasks_started += 1;
        inner.run.task_runs.push(TaskRun {
            path: path.clone(),
            name: name.to_string(),
            state: TaskState::Running,
            started_at: Timestamp::now(),
            ended_at: None,
            failure: None,
            cleaned_up: false,
        });
        inner.run.task_runs.len() - 1
    }

    pub fn task_ended(&self, index: usize, state: TaskState, fault: Option<&TaskFault>) {
        let mut inner = self.lock();
        inner.run.tasks_ended += 1;
        if let Some(run) = inner.run.task_runs.get_mut(index) {
            run.state = state;
            run.ended_at = Some(Timestamp::now());
            run.failure = fault.map(ToString::to_string);
        }
    }

    pub fn mark_cleaned(&self, index: usize) {
        if let Some(run) = self.lock().run.task_runs.get_mut(index) {
            run.cleaned_up = true;
        }
    }

    /// Captures a fault; the first fatal fault wins over earlier tolerated
    /// ones when the run is finished.
    pub fn record_fault(&self, fault: &TaskFault, description: &str, fatal: bool) {
        let transfer = ExceptionTransfer::from_fault(fault, description);
        let mut inner = self.lock();
        if fatal && inner.fatal.is_none() {
            inner.fatal = Some(transfer.clone());
        }
        if inner.first.is_none() {
            inner.first = Some(transfer);
        }
    }

    /// Closes the attempt in `state`.
    pub fn finish(self, state: PlanState) -> PlanRun {
        let inner = self.inner.into_inner().unwrap_or_else(PoisonError::into_inner);
        let mut run = inner.run;
        run.state = state;
        run.ended_at = Some(Timestamp::now());
        if matches!(state, PlanState::Error | PlanState::Interrupted) {
            run.exception = inner.fatal.or(inner.first);
        }
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CleanupDirective, ErrorCode};

    #[test]
    fn test_fatal_fault_wins() {
        let state = ExecutionState::new(1);
        let i = state.task_started(&TaskPath::root(0), "check");
        state.task_ended(i, TaskState::Error, None);
        state.record_fault(&TaskFault::internal("tolerated"), "task 1", false);
        state.record_fault(
            &TaskFault::command(ErrorCode::COMMAND_FAILURE, CleanupDirective::Retry, "fatal"),
            "task 2",
            true,
        );

        let run = state.finish(PlanState::Error);
        let exception = run.exception.expect("exception retained");
        assert_eq!(exception.message, "fatal");
        assert_eq!(exception.cleanup, CleanupDirective::Retry);
        assert_eq!(run.tasks_started, 1);
        assert_eq!(run.tasks_ended, 1);
    }

    #[test]
    fn test_successful_run_has_no_exception() {
        let state = ExecutionState::new(2);
        state.record_fault(&TaskFault::internal("tolerated"), "task 1", false);
        let run = state.finish(PlanState::Succeeded);
        assert!(run.exception.is_none());
        assert_eq!(run.attempt, 2);
        assert!(run.is_finished());
    }
}
