//! Plan executor: walks a plan's task tree and drives it to a terminal state.
//!
//! # Scheduling
//!
//! ```text
//! top-level tasks ──▶ run in order (serial)
//! SerialBundle    ──▶ children in order; each resolves before the next
//! ParallelBundle  ──▶ all children dispatched; join (fan-in barrier)
//! leaf task       ──▶ WorkerPool job(s); multi-job tasks re-queue after a delay
//! ```
//!
//! A leaf that fails without `continue_past_error` aborts its enclosing
//! bundle: siblings that have not started are skipped, and siblings that
//! already succeeded run their cleanup jobs in reverse completion order.
//!
//! # Interruption
//!
//! Interrupts are cooperative. Once requested, no new leaf is started, not
//! even one already queued for a worker; jobs already running finish or
//! observe the flag through [`TaskContext::is_interrupt_requested`]. The
//! attempt then ends `INTERRUPTED` unless a fatal fault was raised.
//!
//! # Faults
//!
//! No task fault or panic unwinds past this module. Everything is classified
//! into an [`ExceptionTransfer`](crate::models::ExceptionTransfer) on the run.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};

use futures::future::{join_all, BoxFuture, FutureExt};
use log::{debug, info, warn};

use crate::{
    error::TaskFault,
    models::{PlanId, PlanRun, PlanState, TaskPath, TaskState},
    plan::Plan,
    planner::LockTable,
    task::{CleanupJob, InterruptFlag, MultiJobTask, NextJob, Task, TaskContext},
};

pub mod listener;
pub mod pool;
pub mod state;


pub use listener::{ExecutionListener, ListenerSet, PlanView, TaskView};
pub use pool::{
    default_pool_size, Admission, PoolError, Worker, WorkerPool, DEFAULT_QUEUE_CAPACITY,
};
pub use state::ExecutionState;

/// Everything the executor needs to run one attempt of a plan.
pub struct RunRequest {
    pub plan_id: PlanId,
    pub plan: Arc<Plan>,
    pub attempt: u32,
    pub interrupt: Arc<InterruptFlag>,
    pub locks: LockTable,
}

/// Final state and record of an attempt.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: PlanState,
    pub run: PlanRun,
}

/// Resolution of one node of the tree within an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Succeeded,
    /// Failed; `fatal` when the failure must abort the enclosing bundle
    Failed { fatal: bool },
    Interrupted,
    /// Never started because of an interrupt or an aborted ancestor
    Skipped,
}

/// Tally of child outcomes inside a bundle.
#[derive(Debug, Default)]
struct Tally {
    fatal: bool,
    failed: bool,
    interrupted: bool,
    skipped: bool,
}

impl Tally {
    fn add(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Succeeded => {}
            Outcome::Failed { fatal } => {
                self.failed = true;
                self.fatal |= fatal;
            }
            Outcome::Interrupted => self.interrupted = true,
            Outcome::Skipped => self.skipped = true,
        }
    }

    /// Fatal error beats interruption, which beats tolerated failures.
    fn resolve(&self, interrupt_requested: bool, continue_past_error: bool) -> Outcome {
        if self.fatal {
            Outcome::Failed {
                fatal: !continue_past_error,
            }
        } else if self.interrupted || (self.skipped && interrupt_requested) {
            Outcome::Interrupted
        } else if self.skipped {
            Outcome::Skipped
        } else if self.failed {
            Outcome::Failed { fatal: false }
        } else {
            Outcome::Succeeded
        }
    }
}

/// Abort flags of the enclosing parallel bundles.
#[derive(Clone, Default)]
struct Scope {
    aborts: Vec<Arc<AtomicBool>>,
    /// Flags raised as soon as the current node fails fatally. Stops at the
    /// first ancestor bundle that tolerates the failure.
    sinks: Vec<Arc<AtomicBool>>,
}

impl Scope {
    fn parallel_child(&self, abort: Arc<AtomicBool>, continue_past_error: bool) -> Self {
        let mut aborts = self.aborts.clone();
        aborts.push(Arc::clone(&abort));
        let mut sinks = vec![abort];
        if !continue_past_error {
            sinks.extend(self.sinks.iter().cloned());
        }
        Self { aborts, sinks }
    }

    fn serial_child(&self, continue_past_error: bool) -> Self {
        Self {
            aborts: self.aborts.clone(),
            sinks: if continue_past_error {
                Vec::new()
            } else {
                self.sinks.clone()
            },
        }
    }

    fn aborted(&self) -> bool {
        self.aborts.iter().any(|a| a.load(Ordering::SeqCst))
    }

    fn raise_fatal(&self) {
        for sink in &self.sinks {
            sink.store(true, Ordering::SeqCst);
        }
    }
}

/// Shared state of one attempt.
struct Run {
    plan_id: PlanId,
    interrupt: Arc<InterruptFlag>,
    locks: LockTable,
    state: ExecutionState,
}

impl Run {
    fn halted(&self, scope: &Scope) -> bool {
        self.interrupt.is_requested() || scope.aborted()
    }
}

/// Drives plan runs on a shared [`WorkerPool`].
#[derive(Clone, Debug)]
pub struct PlanExecutor {
    pool: WorkerPool,
    listeners: ListenerSet,
}

impl PlanExecutor {
    pub fn new(pool: WorkerPool, listeners: ListenerSet) -> Self {
        Self { pool, listeners }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Runs one attempt of a plan to a terminal-for-this-attempt state.
    pub async fn execute(&self, request: RunRequest) -> RunOutcome {
        let RunRequest {
            plan_id,
            plan,
            attempt,
            interrupt,
            locks,
        } = request;

        let view = PlanView {
            plan_id,
            name: plan.name().to_string(),
            attempt,
            task_count: plan.task_count(),
        };
        info!(
            "Plan {plan_id} ({}) attempt {attempt} starting with {} task(s)",
            view.name, view.task_count
        );
        self.listeners.plan_start(&view);

        let run = Run {
            plan_id,
            interrupt,
            locks,
            state: ExecutionState::new(attempt),
        };
        let outcome = self
            .run_serial(&run, plan.tasks(), None, false, Scope::default())
            .await;

        // An interrupt observed during the attempt wins over everything but
        // a fatal fault, even if the work still in flight finished cleanly.
        let state = match outcome {
            Outcome::Failed { fatal: true } => PlanState::Error,
            _ if run.interrupt.is_requested() => PlanState::Interrupted,
            Outcome::Succeeded => PlanState::Succeeded,
            Outcome::Failed { fatal: false } => PlanState::Error,
            Outcome::Interrupted | Outcome::Skipped => PlanState::Interrupted,
        };
        let record = run.state.finish(state);
        info!(
            "Plan {plan_id} attempt {attempt} ended {} ({} started, {} ended)",
            state.as_str(),
            record.tasks_started,
            record.tasks_ended
        );
        self.listeners.plan_end(&view, state);

        RunOutcome { state, run: record }
    }

    fn run_task<'a>(
        &'a self,
        run: &'a Run,
        task: &'a Task,
        path: TaskPath,
        scope: Scope,
    ) -> BoxFuture<'a, Outcome> {
        async move {
            match task {
                Task::Serial(bundle) => {
                    self.run_serial(
                        run,
                        &bundle.tasks,
                        Some(&path),
                        bundle.continue_past_error,
                        scope,
                    )
                    .await
                }
                Task::Parallel(bundle) => {
                    self.run_parallel(run, &bundle.tasks, &path, bundle.continue_past_error, scope)
                        .await
                }
                Task::Single(_) | Task::Multi(_) => self.run_leaf(run, task, path, &scope).await,
            }
        }
        .boxed()
    }

    /// Runs `tasks` in order. `parent` is `None` for the plan's top level.
    async fn run_serial(
        &self,
        run: &Run,
        tasks: &[Task],
        parent: Option<&TaskPath>,
        continue_past_error: bool,
        scope: Scope,
    ) -> Outcome {
        let mut tally = Tally::default();
        let mut completed: Vec<(TaskPath, CleanupJob)> = Vec::new();
        let child_scope = scope.serial_child(continue_past_error);

        for (task, i) in tasks.iter().zip(0u32..) {
            if run.halted(&scope) {
                tally.add(Outcome::Skipped);
                break;
            }
            let path = match parent {
                Some(parent) => parent.child(i),
                None => TaskPath::root(i),
            };
            let outcome = self.run_task(run, task, path.clone(), child_scope.clone()).await;
            tally.add(outcome);
            match outcome {
                Outcome::Succeeded => {
                    if let Some(cleanup) = task.cleanup_job() {
                        completed.push((path, cleanup));
                    }
                }
                Outcome::Failed { fatal: false } => {}
                Outcome::Failed { fatal: true } => {
                    debug!(
                        "Plan {}: task {path} failed, aborting remaining siblings",
                        run.plan_id
                    );
                    self.unwind(run, completed).await;
                    return tally.resolve(run.interrupt.is_requested(), continue_past_error);
                }
                Outcome::Interrupted | Outcome::Skipped => break,
            }
        }

        if scope.aborted() {
            self.unwind(run, completed).await;
        }
        tally.resolve(run.interrupt.is_requested(), continue_past_error)
    }

    /// Dispatches every child and waits for all of them.
    async fn run_parallel(
        &self,
        run: &Run,
        tasks: &[Task],
        parent: &TaskPath,
        continue_past_error: bool,
        scope: Scope,
    ) -> Outcome {
        let abort = Arc::new(AtomicBool::new(false));
        let child_scope = scope.parallel_child(Arc::clone(&abort), continue_past_error);
        let completed: Mutex<Vec<(TaskPath, CleanupJob)>> = Mutex::new(Vec::new());

        let children = tasks.iter().zip(0u32..).map(|(task, i)| {
            let path = parent.child(i);
            let child_scope = child_scope.clone();
            let abort = Arc::clone(&abort);
            let completed = &completed;
            async move {
                let outcome = self.run_task(run, task, path.clone(), child_scope).await;
                match outcome {
                    Outcome::Succeeded => {
                        if let Some(cleanup) = task.cleanup_job() {
                            completed
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .push((path, cleanup));
                        }
                    }
                    Outcome::Failed { fatal: true } => abort.store(true, Ordering::SeqCst),
                    _ => {}
                }
                outcome
            }
        });
        let outcomes = join_all(children).await;

        let mut tally = Tally::default();
        outcomes.into_iter().for_each(|o| tally.add(o));
        if tally.fatal || scope.aborted() {
            let completed = completed.into_inner().unwrap_or_else(PoisonError::into_inner);
            self.unwind(run, completed).await;
        }
        tally.resolve(run.interrupt.is_requested(), continue_past_error)
    }

    async fn run_leaf(&self, run: &Run, task: &Task, path: TaskPath, scope: &Scope) -> Outcome {
        if run.halted(scope) {
            return Outcome::Skipped;
        }

        // A queued leaf may wait a long time for a worker; the bundle can
        // abort or the plan be interrupted in the meantime.
        let worker = match self.pool.admit() {
            Ok(admission) => admission.acquire().await,
            Err(e) => Err(e),
        };
        if run.halted(scope) {
            return Outcome::Skipped;
        }

        let view = TaskView {
            plan_id: run.plan_id,
            path: path.clone(),
            name: task.name(),
            kind: task.kind(),
        };
        self.listeners.task_start(&view);
        let index = run.state.task_started(&path, &view.name);
        debug!("Plan {}: task {path} {} started", run.plan_id, view.name);

        let ctx = TaskContext::new(run.plan_id, path.clone(), Arc::clone(&run.interrupt));
        let result = match worker {
            Err(e) => Err(e.into_fault()),
            Ok(worker) => match task.acquire_locks(run.plan_id, &run.locks) {
                Err(e) => Err(TaskFault::from(e)),
                Ok(()) => match task {
                    Task::Single(t) => {
                        let t = Arc::clone(t);
                        let job_ctx = ctx.clone();
                        match worker.run(move || t.do_work(&job_ctx)).await {
                            Ok(result) => result,
                            Err(e) => Err(e.into_fault()),
                        }
                    }
                    Task::Multi(t) => {
                        self.run_jobs(worker, Arc::clone(t), ctx, &run.interrupt)
                            .await
                    }
                    Task::Serial(_) | Task::Parallel(_) => {
                        Err(TaskFault::internal("bundle dispatched as a leaf task"))
                    }
                },
            },
        };

        let (state, fault) = match result {
            Ok(TaskState::Running) => (
                TaskState::Error,
                Some(TaskFault::internal("task returned RUNNING as its final state")),
            ),
            Ok(state) => (state, None),
            Err(fault) => (TaskState::Error, Some(fault)),
        };

        let fatal = match &fault {
            Some(f) => !task.continue_past_error() || f.is_fatal(),
            None => false,
        };
        if fatal {
            // Before cleanup: siblings still queued for a worker must see it.
            scope.raise_fatal();
        }
        if let Some(f) = &fault {
            warn!(
                "Plan {}: task {path} {} failed: {f}",
                run.plan_id, view.name
            );
            run.state
                .record_fault(f, &format!("task {path} {}", view.name), fatal);
        }

        if matches!(state, TaskState::Error | TaskState::Interrupted) {
            if let Some(cleanup) = task.cleanup_job() {
                self.run_cleanup(run, &path, cleanup).await;
                run.state.mark_cleaned(index);
            }
        }

        run.state.task_ended(index, state, fault.as_ref());
        self.listeners.task_end(&view, state);
        debug!("Plan {}: task {path} ended {}", run.plan_id, state.as_str());

        match state {
            TaskState::Succeeded => Outcome::Succeeded,
            TaskState::Interrupted => Outcome::Interrupted,
            TaskState::Error | TaskState::Running => Outcome::Failed { fatal },
        }
    }

    /// Runs the job chain of a multi-job task, starting on `worker`. Waiting
    /// between jobs holds no worker; an interrupt cuts the wait short so the
    /// next job can see it.
    async fn run_jobs(
        &self,
        worker: Worker,
        task: Arc<dyn MultiJobTask>,
        ctx: TaskContext,
        interrupt: &InterruptFlag,
    ) -> Result<TaskState, TaskFault> {
        let first_ctx = ctx.clone();
        let mut next = worker
            .run(move || task.first_job(&first_ctx).and_then(|job| job.run(&first_ctx)))
            .await
            .map_err(PoolError::into_fault)??;

        loop {
            match next {
                NextJob::Done(state) => return Ok(state),
                NextJob::After { delay, job } => {
                    debug!(
                        "Plan {}: task {} re-queues {} in {delay:?}",
                        ctx.plan_id(),
                        ctx.path(),
                        job.name()
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = interrupt.wait() => {}
                    }
                    let job_ctx = ctx.clone();
                    next = self
                        .pool
                        .execute(move || job.run(&job_ctx))
                        .await
                        .map_err(PoolError::into_fault)??;
                }
            }
        }
    }

    /// Runs cleanups of succeeded siblings, most recently completed first.
    async fn unwind(&self, run: &Run, completed: Vec<(TaskPath, CleanupJob)>) {
        for (path, cleanup) in completed.into_iter().rev() {
            self.run_cleanup(run, &path, cleanup).await;
        }
    }

    /// Best effort: a failing cleanup is logged and never propagates.
    async fn run_cleanup(&self, run: &Run, path: &TaskPath, cleanup: CleanupJob) {
        debug!("Plan {}: running cleanup for task {path}", run.plan_id);
        match tokio::task::spawn_blocking(move || cleanup.run()).await {
            Ok(Ok(())) => {}
            Ok(Err(fault)) => warn!(
                "Plan {}: cleanup for task {path} failed: {fault}",
                run.plan_id
            ),
            Err(e) => warn!(
                "Plan {}: cleanup for task {path} did not complete: {e}",
                run.plan_id
            ),
        }
    }
}
