//! State enumerations for plans and tasks.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanState {
    /// Registered and approved, waiting for an execute call
    #[default]
    Approved,

    /// A run attempt is in flight
    Running,

    /// The last run attempt observed an interrupt; may be executed again
    Interrupted,

    /// The last run attempt failed; may be executed again
    Error,

    /// All tasks succeeded
    Succeeded,

    /// Canceled by the operator or as a duplicate of a running plan
    Canceled,
}

impl PlanState {
    /// Every state, in declaration order.
    pub const ALL: [PlanState; 6] = [
        PlanState::Approved,
        PlanState::Running,
        PlanState::Interrupted,
        PlanState::Error,
        PlanState::Succeeded,
        PlanState::Canceled,
    ];

    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanState::Approved => "APPROVED",
            PlanState::Running => "RUNNING",
            PlanState::Interrupted => "INTERRUPTED",
            PlanState::Error => "ERROR",
            PlanState::Succeeded => "SUCCEEDED",
            PlanState::Canceled => "CANCELED",
        }
    }

    /// Terminal states end the plan's lifecycle for retention purposes.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlanState::Succeeded | PlanState::Error | PlanState::Canceled
        )
    }

    /// States that reject any further execute call.
    pub fn is_final(&self) -> bool {
        matches!(self, PlanState::Succeeded | PlanState::Canceled)
    }

    /// Whether a plan in this state may transition to `RUNNING`.
    pub fn can_execute(&self) -> bool {
        matches!(
            self,
            PlanState::Approved | PlanState::Interrupted | PlanState::Error
        )
    }

    /// Whether the state ends a run attempt.
    pub fn ends_attempt(&self) -> bool {
        !matches!(self, PlanState::Approved | PlanState::Running)
    }
}

impl FromStr for PlanState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "APPROVED" => Ok(PlanState::Approved),
            "RUNNING" => Ok(PlanState::Running),
            "INTERRUPTED" => Ok(PlanState::Interrupted),
            "ERROR" => Ok(PlanState::Error),
            "SUCCEEDED" => Ok(PlanState::Succeeded),
            "CANCELED" | "CANCELLED" => Ok(PlanState::Canceled),
            _ => Err(format!("Invalid plan state: {s}")),
        }
    }
}

/// State of a single task run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Running,
    Succeeded,
    Error,
    Interrupted,
}

impl TaskState {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Running => "RUNNING",
            TaskState::Succeeded => "SUCCEEDED",
            TaskState::Error => "ERROR",
            TaskState::Interrupted => "INTERRUPTED",
        }
    }

    /// Whether the task has finished this attempt.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Running)
    }

    /// Status icon used when rendering task runs.
    pub fn with_icon(&self) -> &'static str {
        match self {
            TaskState::Succeeded => "✓ SUCCEEDED",
            TaskState::Running => "➤ RUNNING",
            TaskState::Error => "✗ ERROR",
            TaskState::Interrupted => "‖ INTERRUPTED",
        }
    }
}

impl FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RUNNING" => Ok(TaskState::Running),
            "SUCCEEDED" => Ok(TaskState::Succeeded),
            "ERROR" => Ok(TaskState::Error),
            "INTERRUPTED" => Ok(TaskState::Interrupted),
            _ => Err(format!("Invalid task state: {s}")),
        }
    }
}
