//! Records of execution attempts.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{ExceptionTransfer, PlanState, TaskPath, TaskState};

/// One attempt at executing a single task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRun {
    pub path: TaskPath,

    /// Display name of the task
    pub name: String,

    pub state: TaskState,

    pub started_at: Timestamp,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<Timestamp>,

    /// Message of the fault that ended the task, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,

    /// Whether the task's cleanup job ran for this attempt
    #[serde(default)]
    pub cleaned_up: bool,
}

/// One attempt at executing a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanRun {
    /// 1-based attempt number
    pub attempt: u32,

    pub started_at: Timestamp,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<Timestamp>,

    /// `RUNNING` while in flight, then the state the attempt ended in
    pub state: PlanState,

    /// Number of `task_start` transitions observed
    #[serde(default)]
    pub tasks_started: u32,

    /// Number of `task_end` transitions observed
    #[serde(default)]
    pub tasks_ended: u32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub task_runs: Vec<TaskRun>,

    /// Present iff the attempt ended with failure information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionTransfer>,
}

impl PlanRun {
    /// Opens a new attempt in the `RUNNING` state.
    pub fn start(attempt: u32) -> Self {
        Self {
            attempt,
            started_at: Timestamp::now(),
            ended_at: None,
            state: PlanState::Running,
            tasks_started: 0,
            tasks_ended: 0,
            task_runs: Vec::new(),
            exception: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Task runs that ended in the given state.
    pub fn count_in_state(&self, state: TaskState) -> usize {
        self.task_runs.iter().filter(|r| r.state == state).count()
    }
}
