//! Reloading persisted plans after a process restart.
//!
//! `APPROVED` plans come back waiting for an execute call. `RUNNING` plans
//! were cut off mid-attempt: the attempt is closed as `INTERRUPTED` and the
//! plan is resubmitted.

use jiff::Timestamp;
use log::{info, warn};

use super::Planner;
use crate::{
    error::Result,
    models::{PlanRecord, PlanState},
    plan::Plan,
};

/// Counts of what startup recovery did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Recovered {
    /// Plans reloaded awaiting an execute call
    pub approved: usize,
    /// Crashed runs resubmitted to the executor
    pub resubmitted: usize,
    /// Plans whose tasks could not be rebuilt
    pub unrecoverable: usize,
}

impl Planner {
    pub(super) async fn recover(&self) -> Result<Recovered> {
        let records = self
            .inner
            .store
            .load_plans_in_states(vec![PlanState::Approved, PlanState::Running])
            .await?;
        let mut recovered = Recovered::default();

        for mut record in records {
            let id = record.id;
            let was_running = record.state == PlanState::Running;
            if was_running {
                close_crashed_attempt(&mut record);
                self.inner.store.save_plan(record.clone()).await?;
            }

            let tasks = match self.inner.factory.build(&record.tree) {
                Ok(tasks) => tasks,
                Err(e) => {
                    warn!("Plan {id} ({}) cannot be rebuilt: {e}", record.name);
                    recovered.unrecoverable += 1;
                    continue;
                }
            };
            let plan = Plan::from_parts(
                record.name.clone(),
                record.is_system,
                tasks,
                record.required_privileges.clone(),
            );
            self.insert_live(plan, record);

            if was_running {
                info!("Resubmitting plan {id} after restart");
                match self.execute_plan(id, false).await {
                    Ok(()) => recovered.resubmitted += 1,
                    Err(e) => warn!("Plan {id} could not be resubmitted: {e}"),
                }
            } else {
                recovered.approved += 1;
            }
        }

        Ok(recovered)
    }
}

fn close_crashed_attempt(record: &mut PlanRecord) {
    if let Some(run) = record.latest_run_mut() {
        if !run.is_finished() {
            run.state = PlanState::Interrupted;
            run.ended_at = Some(Timestamp::now());
        }
    }
    record.set_state(PlanState::Interrupted);
}
