//! Error-code taxonomy and the serializable fault envelope.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TaskFault;

/// Stable numeric error code reported to callers.
///
/// Task implementations may carry their own codes; the associated constants
/// are the ones the engine itself produces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ErrorCode(pub u32);

impl ErrorCode {
    /// Precondition or user error (plan not approved, already terminal, ...)
    pub const ILLEGAL_COMMAND: ErrorCode = ErrorCode(5100);
    /// A lock the plan needs is held by another plan
    pub const LOCK_CONFLICT: ErrorCode = ErrorCode(5110);
    /// A task reported a recoverable failure
    pub const COMMAND_FAILURE: ErrorCode = ErrorCode(5200);
    /// The worker pool refused a submission
    pub const SCHEDULER_REJECTED: ErrorCode = ErrorCode(5300);
    /// Authentication or authorization failure
    pub const SECURITY_FAILURE: ErrorCode = ErrorCode(5400);
    /// Plan records could not be read or written
    pub const STORAGE_FAILURE: ErrorCode = ErrorCode(5450);
    /// Unclassified runtime fault
    pub const INTERNAL_ERROR: ErrorCode = ErrorCode(5500);
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// Remediation the engine already attempted or recommends to the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum CleanupDirective {
    /// Nothing to clean up
    #[default]
    None,
    /// Cancel the plan, then create and run a new one
    CancelPlan,
    /// Run a repair-topology plan before retrying
    RepairTopology,
    /// Retry the same command
    Retry,
}

impl CleanupDirective {
    /// Human readable instruction for operators.
    pub fn describe(&self) -> &'static str {
        match self {
            CleanupDirective::None => "no cleanup needed",
            CleanupDirective::CancelPlan => "cancel the plan and retry",
            CleanupDirective::RepairTopology => "run the repair-topology plan",
            CleanupDirective::Retry => "retry the command",
        }
    }
}

/// The error-code/cleanup pair surfaced to administrative callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandResult {
    pub error_code: ErrorCode,
    pub cleanup: CleanupDirective,
    pub description: String,
}

impl CommandResult {
    /// Builds a result from a code, a directive and any displayable cause.
    pub fn new(
        error_code: ErrorCode,
        cleanup: CleanupDirective,
        description: impl fmt::Display,
    ) -> Self {
        Self {
            error_code,
            cleanup,
            description: description.to_string(),
        }
    }
}

/// Serializable copy of the fault that ended a run attempt.
///
/// Decoupled from the live [`TaskFault`] so it survives persistence and a
/// process restart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExceptionTransfer {
    /// Class of the fault, e.g. `CommandFault` or `RejectedExecution`
    pub class: String,

    /// Message carried by the fault
    pub message: String,

    /// Short description of where the fault happened
    pub description: String,

    pub error_code: ErrorCode,

    #[serde(default)]
    pub cleanup: CleanupDirective,
}

impl ExceptionTransfer {
    /// Captures a task fault together with a short description of where it
    /// was raised.
    pub fn from_fault(fault: &TaskFault, description: impl Into<String>) -> Self {
        Self {
            class: fault.class.clone(),
            message: fault.message.clone(),
            description: description.into(),
            error_code: fault.error_code,
            cleanup: fault.cleanup,
        }
    }

    /// The result a caller of `assert_success` receives.
    pub fn command_result(&self) -> CommandResult {
        CommandResult {
            error_code: self.error_code,
            cleanup: self.cleanup,
            description: format!("{}: {} ({})", self.class, self.message, self.description),
        }
    }
}
