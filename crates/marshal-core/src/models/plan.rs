//! Persisted plan record.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{ExceptionTransfer, PlanRun, PlanState, Privilege, TaskTree};

/// Identifier assigned to a plan at registration, monotonically increasing.
pub type PlanId = u64;

/// Version tag written with every record.
pub const RECORD_VERSION: u32 = 1;

/// Durable form of a plan: identity, state, task tree shape and run history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanRecord {
    pub id: PlanId,

    pub name: String,

    /// System plans are hidden from user accounting and pruned first
    #[serde(default)]
    pub is_system: bool,

    pub state: PlanState,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_privileges: Vec<Privilege>,

    pub tree: TaskTree,

    /// Every execution attempt, oldest first
    #[serde(default)]
    pub runs: Vec<PlanRun>,

    pub created_at: Timestamp,

    pub updated_at: Timestamp,

    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    RECORD_VERSION
}

impl PlanRecord {
    /// The most recent execution attempt, if any.
    pub fn latest_run(&self) -> Option<&PlanRun> {
        self.runs.last()
    }

    pub fn latest_run_mut(&mut self) -> Option<&mut PlanRun> {
        self.runs.last_mut()
    }

    /// Failure information retained from the latest attempt.
    pub fn latest_exception(&self) -> Option<&ExceptionTransfer> {
        self.latest_run().and_then(|r| r.exception.as_ref())
    }

    /// Sets the state and bumps `updated_at`.
    pub fn set_state(&mut self, state: PlanState) {
        self.state = state;
        self.updated_at = Timestamp::now();
    }
}
