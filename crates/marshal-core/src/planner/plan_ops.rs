//! Plan lifecycle commands.

use std::{
    sync::{atomic::Ordering, Arc},
    time::Duration,
};

use futures::future::join_all;
use jiff::Timestamp;
use log::{debug, error, info, warn};
use tokio::sync::watch;

use super::{LivePlan, Planner};
use crate::{
    error::{PlanError, Result},
    executor::{RunOutcome, RunRequest},
    models::{
        CleanupDirective, CommandResult, ErrorCode, LockCategory, PlanId, PlanRecord, PlanRun,
        PlanState, RECORD_VERSION,
    },
    plan::Plan,
    task::InterruptFlag,
};

/// What `begin_run` hands to the caller once a run attempt is opened.
struct Started {
    record: PlanRecord,
    previous: PlanState,
    attempt: u32,
    plan: Arc<Plan>,
    interrupt: Arc<InterruptFlag>,
}

impl Planner {
    /// Registers a plan and assigns its id. The plan must be approved
    /// before it can run.
    pub async fn register_plan(&self, plan: Plan) -> Result<PlanId> {
        self.ensure_accepting()?;
        let now = Timestamp::now();
        let mut registry = self.registry();
        let id = registry.next_id;
        registry.next_id += 1;

        let record = PlanRecord {
            id,
            name: plan.name().to_string(),
            is_system: plan.is_system(),
            state: PlanState::Approved,
            required_privileges: plan.required_privileges().to_vec(),
            tree: plan.to_tree(),
            runs: Vec::new(),
            created_at: now,
            updated_at: now,
            version: RECORD_VERSION,
        };
        info!(
            "Registered plan {id} ({}) with {} task(s)",
            record.name,
            plan.task_count()
        );
        let (state_tx, _) = watch::channel(record.state);
        registry.live.insert(
            id,
            LivePlan {
                plan: Arc::new(plan),
                record,
                approved: false,
                state_tx,
                interrupt: None,
                handle: None,
            },
        );
        Ok(id)
    }

    /// Approves a registered plan and persists it.
    pub async fn approve_plan(&self, id: PlanId) -> Result<()> {
        let record = {
            let mut registry = self.registry();
            let entry = registry
                .live
                .get_mut(&id)
                .ok_or(PlanError::PlanNotFound { id })?;
            if entry.record.state != PlanState::Approved {
                return Err(PlanError::illegal(format!(
                    "plan {id} is {} and cannot be approved",
                    entry.record.state
                )));
            }
            entry.approved = true;
            entry.record.clone()
        };
        self.inner.store.save_plan(record).await?;
        debug!("Approved plan {id}");
        Ok(())
    }

    /// Starts a run attempt and returns without waiting for it.
    ///
    /// # Errors
    ///
    /// - [`PlanError::IllegalCommand`] if the plan is unregistered, not
    ///   approved, in a state that cannot run, or fails its pre-execute check
    /// - [`PlanError::Unauthorized`] if the access checker refuses it
    /// - [`PlanError::PlanLocksHeld`] if another plan holds one of its locks
    pub async fn execute_plan(&self, id: PlanId, force: bool) -> Result<()> {
        self.ensure_accepting()?;
        self.make_resident(id).await?;

        let started = self.begin_run(id, force)?;
        if let Err(e) = self.inner.store.save_plan(started.record.clone()).await {
            self.abandon_run(id, started.previous);
            return Err(e);
        }
        self.spawn_run(id, started);
        Ok(())
    }

    /// Executes `id` unless a logically equivalent plan is already running,
    /// in which case `id` is canceled and the running plan's id returned.
    pub async fn execute_plan_or_find_match(&self, id: PlanId) -> Result<PlanId> {
        self.ensure_accepting()?;
        self.make_resident(id).await?;

        let duplicate = {
            let mut registry = self.registry();
            let candidate = registry
                .live
                .get(&id)
                .map(|e| Arc::clone(&e.plan))
                .ok_or_else(|| not_registered(id))?;
            let running = registry
                .live
                .iter()
                .filter(|(other, e)| **other != id && e.record.state == PlanState::Running)
                .find(|(_, e)| e.plan.logical_compare(&candidate))
                .map(|(other, _)| *other);

            match running.and_then(|r| registry.live.remove(&id).map(|e| (r, e))) {
                Some((running_id, mut entry)) => {
                    entry.record.set_state(PlanState::Canceled);
                    entry.state_tx.send_replace(PlanState::Canceled);
                    Some((running_id, entry.record))
                }
                None => None,
            }
        };

        match duplicate {
            Some((running_id, record)) => {
                info!("Plan {id} duplicates running plan {running_id}; canceled");
                self.inner.store.save_plan(record).await?;
                Ok(running_id)
            }
            None => {
                self.execute_plan(id, false).await?;
                Ok(id)
            }
        }
    }

    /// Waits up to `timeout` for the current attempt to end and returns the
    /// plan's state. On timeout the state at that moment is returned.
    pub async fn await_plan(&self, id: PlanId, timeout: Duration) -> Result<PlanState> {
        let rx = self
            .registry()
            .live
            .get(&id)
            .map(|e| e.state_tx.subscribe());
        let Some(mut rx) = rx else {
            return self.stored_record(id).await.map(|r| r.state);
        };

        let waited = tokio::time::timeout(timeout, rx.wait_for(PlanState::ends_attempt))
            .await
            .map(|r| r.map(|state| *state));
        match waited {
            Ok(Ok(state)) => Ok(state),
            Ok(Err(_)) => self.stored_record(id).await.map(|r| r.state),
            Err(_) => Ok(*rx.borrow()),
        }
    }

    /// Requests a cooperative interrupt. A plan with no run in flight moves
    /// to `INTERRUPTED` directly.
    pub async fn interrupt_plan(&self, id: PlanId) -> Result<()> {
        let record = {
            let mut registry = self.registry();
            match registry.live.get_mut(&id) {
                Some(entry) => match entry.record.state {
                    PlanState::Running => {
                        if let Some(flag) = &entry.interrupt {
                            flag.request();
                        }
                        info!("Interrupt requested for plan {id}");
                        return Ok(());
                    }
                    PlanState::Approved => {
                        entry.record.set_state(PlanState::Interrupted);
                        entry.state_tx.send_replace(PlanState::Interrupted);
                        Some(entry.record.clone())
                    }
                    PlanState::Interrupted | PlanState::Error => return Ok(()),
                    state => return Err(cannot(id, state, "interrupted")),
                },
                None => None,
            }
        };

        let record = match record {
            Some(record) => record,
            None => {
                let mut record = self.stored_record(id).await?;
                match record.state {
                    PlanState::Approved | PlanState::Running => {
                        record.set_state(PlanState::Interrupted)
                    }
                    PlanState::Interrupted | PlanState::Error => return Ok(()),
                    state => return Err(cannot(id, state, "interrupted")),
                }
                record
            }
        };
        self.inner.store.save_plan(record).await?;
        info!("Plan {id} interrupted before running");
        Ok(())
    }

    /// Cancels a plan that is not running, releasing its locks.
    pub async fn cancel_plan(&self, id: PlanId) -> Result<()> {
        let record = {
            let mut registry = self.registry();
            match registry.live.get(&id).map(|e| e.record.state) {
                Some(state) => {
                    check_cancel(id, state)?;
                    registry.live.remove(&id).map(|mut entry| {
                        entry.record.set_state(PlanState::Canceled);
                        entry.state_tx.send_replace(PlanState::Canceled);
                        entry.record
                    })
                }
                None => None,
            }
        };

        let record = match record {
            Some(record) => record,
            None => {
                let mut record = self.stored_record(id).await?;
                check_cancel(id, record.state)?;
                record.set_state(PlanState::Canceled);
                record
            }
        };
        self.inner.locks.release_all(id);
        self.inner.store.save_plan(record).await?;
        info!("Canceled plan {id}");
        Ok(())
    }

    /// Fails with [`PlanError::PlanFailed`] unless the plan `SUCCEEDED`.
    pub async fn assert_success(&self, id: PlanId) -> Result<()> {
        let record = self.get_plan(id).await?;
        check_success(&record)
    }

    /// The in-memory record if the plan is live, else the persisted one.
    pub async fn get_plan(&self, id: PlanId) -> Result<PlanRecord> {
        let live = self.registry().live.get(&id).map(|e| e.record.clone());
        match live {
            Some(record) => Ok(record),
            None => self.stored_record(id).await,
        }
    }

    /// Up to `count` persisted plans with id at or above `start`.
    pub async fn get_plan_range(&self, start: PlanId, count: usize) -> Result<Vec<PlanRecord>> {
        self.inner.store.get_plan_range(start, count).await
    }

    /// The most recently registered persisted plans, newest first.
    pub async fn recent_plans(&self, count: usize) -> Result<Vec<PlanRecord>> {
        self.inner.store.recent_plans(count).await
    }

    /// Acquires `(category, key)` for `plan_id`; re-entrant for the holder.
    pub fn lock(
        &self,
        plan_id: PlanId,
        plan_name: &str,
        category: LockCategory,
        key: &str,
    ) -> Result<()> {
        self.inner.locks.lock(plan_id, plan_name, category, key)
    }

    pub fn lock_elasticity(&self, plan_id: PlanId, plan_name: &str) -> Result<()> {
        self.inner.locks.lock_elasticity(plan_id, plan_name)
    }

    /// Releases every lock held by `plan_id`.
    pub fn release_locks(&self, plan_id: PlanId) -> usize {
        self.inner.locks.release_all(plan_id)
    }

    /// Prunes terminal plans down to `limit`, or the configured retention
    /// limit when `None`.
    pub async fn prune(&self, limit: Option<usize>) -> Result<usize> {
        let store = &self.inner.store;
        store.prune(limit.unwrap_or_else(|| store.limit())).await
    }

    /// Stops accepting work, interrupts every running plan and waits for
    /// their attempts to end.
    pub async fn shutdown(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
        let handles: Vec<_> = {
            let mut registry = self.registry();
            registry
                .live
                .values_mut()
                .filter_map(|entry| {
                    if let Some(flag) = &entry.interrupt {
                        flag.request();
                    }
                    entry.handle.take()
                })
                .collect()
        };

        info!("Shutting down planner; waiting for {} run(s)", handles.len());
        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!("Plan run ended abnormally during shutdown: {e}");
            }
        }
        self.inner.executor.pool().close();
    }

    fn ensure_accepting(&self) -> Result<()> {
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return Err(PlanError::illegal("planner is shutting down"));
        }
        Ok(())
    }

    async fn stored_record(&self, id: PlanId) -> Result<PlanRecord> {
        self.inner
            .store
            .get_plan(id)
            .await?
            .ok_or(PlanError::PlanNotFound { id })
    }

    /// Loads a persisted, re-executable plan into memory if it is not live.
    async fn make_resident(&self, id: PlanId) -> Result<()> {
        if self.registry().live.contains_key(&id) {
            return Ok(());
        }

        let record = self
            .inner
            .store
            .get_plan(id)
            .await?
            .ok_or_else(|| not_registered(id))?;
        if !record.state.can_execute() {
            return Err(cannot(id, record.state, "executed"));
        }
        let tasks = self.inner.factory.build(&record.tree)?;
        let plan = Plan::from_parts(
            record.name.clone(),
            record.is_system,
            tasks,
            record.required_privileges.clone(),
        );
        debug!("Rebuilt plan {id} from its persisted record");
        self.insert_live(plan, record);
        Ok(())
    }

    /// Adds an approved plan to the live set unless it is already there.
    pub(super) fn insert_live(&self, plan: Plan, record: PlanRecord) {
        let mut registry = self.registry();
        registry.live.entry(record.id).or_insert_with(|| {
            let (state_tx, _) = watch::channel(record.state);
            LivePlan {
                plan: Arc::new(plan),
                record,
                approved: true,
                state_tx,
                interrupt: None,
                handle: None,
            }
        });
    }

    /// Validates the plan and opens a new attempt in `RUNNING`.
    fn begin_run(&self, id: PlanId, force: bool) -> Result<Started> {
        let mut registry = self.registry();
        let entry = registry
            .live
            .get_mut(&id)
            .ok_or_else(|| not_registered(id))?;

        if !entry.approved {
            return Err(PlanError::illegal(format!(
                "plan {id} has not been approved"
            )));
        }
        let previous = entry.record.state;
        if !previous.can_execute() {
            return Err(cannot(id, previous, "executed"));
        }

        let plan = Arc::clone(&entry.plan);
        self.inner
            .access
            .check(id, plan.name(), plan.required_privileges())
            .map_err(|message| PlanError::Unauthorized { message })?;
        plan.pre_execute_check(force).map_err(|fault| {
            PlanError::illegal(format!("plan {id} failed its pre-execute check: {fault}"))
        })?;
        if let Err(e) = plan.acquire_locks(id, &self.inner.locks) {
            self.inner.locks.release_all(id);
            return Err(e);
        }

        let attempt = entry.record.runs.len() as u32 + 1;
        let interrupt = InterruptFlag::new();
        entry.record.runs.push(PlanRun::start(attempt));
        entry.record.set_state(PlanState::Running);
        entry.interrupt = Some(Arc::clone(&interrupt));
        entry.state_tx.send_replace(PlanState::Running);

        Ok(Started {
            record: entry.record.clone(),
            previous,
            attempt,
            plan,
            interrupt,
        })
    }

    /// Rolls back `begin_run` when the attempt could not be persisted.
    fn abandon_run(&self, id: PlanId, previous: PlanState) {
        self.inner.locks.release_all(id);
        let mut registry = self.registry();
        if let Some(entry) = registry.live.get_mut(&id) {
            entry.record.runs.pop();
            entry.record.set_state(previous);
            entry.interrupt = None;
            entry.state_tx.send_replace(previous);
        }
    }

    fn spawn_run(&self, id: PlanId, started: Started) {
        let request = RunRequest {
            plan_id: id,
            plan: started.plan,
            attempt: started.attempt,
            interrupt: started.interrupt,
            locks: self.inner.locks.clone(),
        };
        let planner = self.clone();

        let mut registry = self.registry();
        let handle = tokio::spawn(async move {
            let outcome = planner.inner.executor.execute(request).await;
            planner.finish_run(id, outcome).await;
        });
        if let Some(entry) = registry.live.get_mut(&id) {
            entry.handle = Some(handle);
        }
    }

    /// Persists the attempt's outcome, then releases locks and publishes the
    /// new state.
    async fn finish_run(&self, id: PlanId, outcome: RunOutcome) {
        let record = {
            let registry = self.registry();
            let Some(entry) = registry.live.get(&id) else {
                warn!("Plan {id} finished but is no longer registered");
                return;
            };
            let mut record = entry.record.clone();
            if let Some(run) = record.latest_run_mut() {
                *run = outcome.run;
            }
            record.set_state(outcome.state);
            record
        };

        if let Err(e) = self.inner.store.save_plan(record.clone()).await {
            error!("Failed to persist plan {id} after its run: {e}");
        }
        self.inner.locks.release_all(id);

        let mut registry = self.registry();
        if let Some(entry) = registry.live.get_mut(&id) {
            entry.record = record;
            entry.interrupt = None;
            entry.state_tx.send_replace(outcome.state);
        }
        if outcome.state.is_final() {
            registry.live.remove(&id);
        }
        info!("Plan {id} is now {}", outcome.state);
    }
}

/// Checks a plan record the way [`Planner::assert_success`] does.
///
/// The failure carries the latest attempt's error code and cleanup
/// directive. A plan that never failed but did not succeed reports
/// `COMMAND_FAILURE`, with a retry directive if it was interrupted.
pub fn check_success(record: &PlanRecord) -> Result<()> {
    if record.state == PlanState::Succeeded {
        return Ok(());
    }

    let result = match record.latest_exception() {
        Some(exception) => exception.command_result(),
        None => {
            let cleanup = if record.state == PlanState::Interrupted {
                CleanupDirective::Retry
            } else {
                CleanupDirective::None
            };
            CommandResult::new(
                ErrorCode::COMMAND_FAILURE,
                cleanup,
                format!("plan {} is {}", record.id, record.state),
            )
        }
    };
    Err(PlanError::PlanFailed {
        id: record.id,
        state: record.state,
        result,
    })
}

fn not_registered(id: PlanId) -> PlanError {
    PlanError::illegal(format!("plan {id} is not registered"))
}

fn cannot(id: PlanId, state: PlanState, what: &str) -> PlanError {
    PlanError::illegal(format!("plan {id} is {state} and cannot be {what}"))
}

fn check_cancel(id: PlanId, state: PlanState) -> Result<()> {
    match state {
        PlanState::Running => Err(PlanError::illegal(format!(
            "plan {id} is RUNNING; interrupt it before canceling"
        ))),
        PlanState::Succeeded | PlanState::Canceled => Err(cannot(id, state, "canceled")),
        _ => Ok(()),
    }
}
