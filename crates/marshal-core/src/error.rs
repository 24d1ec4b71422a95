//! Error types for the plan engine.
//!
//! Two families live here. [`PlanError`] is what the engine's own API returns
//! to callers (command rejections, lock conflicts, persistence failures).
//! [`TaskFault`] is what task implementations raise from inside a job; the
//! executor catches it at the task boundary and turns it into an
//! [`ExceptionTransfer`](crate::models::ExceptionTransfer).

use std::path::PathBuf;

use thiserror::Error;

use crate::models::{
    CleanupDirective, CommandResult, ErrorCode, LockCategory, PlanId, PlanState,
};

/// Comprehensive error type for all planner operations.
#[derive(Error, Debug)]
pub enum PlanError {
    /// Database connection or query errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: rusqlite::Error,
    },
    /// Plan not found for the given ID
    #[error("Plan with ID {id} not found")]
    PlanNotFound { id: PlanId },
    /// The command is not legal for the plan in its current state
    #[error("Illegal command: {message}")]
    IllegalCommand { message: String },
    /// A lock the plan needs is held by another plan
    #[error("{category} lock '{key}' is held by plan {holder_id} ({holder_name})")]
    PlanLocksHeld {
        category: LockCategory,
        key: String,
        holder_id: PlanId,
        holder_name: String,
    },
    /// The caller lacks a privilege the plan requires
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },
    /// Raised by `assert_success` when the plan did not succeed
    #[error("Plan {id} ended in state {state}: {result}")]
    PlanFailed {
        id: PlanId,
        state: PlanState,
        result: CommandResult,
    },
    /// File system operation errors
    #[error("File system error at path '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        source: std::io::Error,
    },
    /// XDG directory specification errors
    #[error("XDG directory error: {0}")]
    XdgDirectory(String),
    /// Invalid input validation errors
    #[error("Invalid input for field '{field}': {reason}")]
    InvalidInput { field: String, reason: String },
    /// Serialization/deserialization errors
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Builder for creating database errors with optional context.
pub struct DatabaseErrorBuilder {
    message: String,
}

impl DatabaseErrorBuilder {
    /// Create a new database error builder with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Build the error with the given source.
    pub fn with_source(self, source: rusqlite::Error) -> PlanError {
        PlanError::Database {
            message: self.message,
            source,
        }
    }
}

/// Builder for creating input validation errors.
pub struct InvalidInputBuilder {
    field: String,
}

impl InvalidInputBuilder {
    /// Create a new invalid input error builder for a field.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    /// Build the error with the given reason.
    pub fn with_reason(self, reason: impl Into<String>) -> PlanError {
        PlanError::InvalidInput {
            field: self.field,
            reason: reason.into(),
        }
    }
}

impl PlanError {
    /// Creates a builder for database errors.
    pub fn database(message: impl Into<String>) -> DatabaseErrorBuilder {
        DatabaseErrorBuilder::new(message)
    }

    /// Creates a builder for input validation errors.
    pub fn invalid_input(field: impl Into<String>) -> InvalidInputBuilder {
        InvalidInputBuilder::new(field)
    }

    /// Shorthand for an [`PlanError::IllegalCommand`].
    pub fn illegal(message: impl Into<String>) -> Self {
        Self::IllegalCommand {
            message: message.into(),
        }
    }

    /// Wraps a tokio join failure from a blocking database call.
    pub(crate) fn join(err: tokio::task::JoinError) -> Self {
        Self::Configuration {
            message: format!("Task join error: {err}"),
        }
    }

    /// Maps the error onto the error-code/cleanup pair reported to callers.
    pub fn command_result(&self) -> CommandResult {
        match self {
            Self::PlanNotFound { .. } | Self::IllegalCommand { .. } | Self::InvalidInput { .. } => {
                CommandResult::new(ErrorCode::ILLEGAL_COMMAND, CleanupDirective::None, self)
            }
            Self::PlanLocksHeld { .. } => {
                CommandResult::new(ErrorCode::LOCK_CONFLICT, CleanupDirective::None, self)
            }
            Self::Unauthorized { .. } => {
                CommandResult::new(ErrorCode::SECURITY_FAILURE, CleanupDirective::None, self)
            }
            Self::PlanFailed { result, .. } => result.clone(),
            Self::Database { .. } | Self::FileSystem { .. } | Self::XdgDirectory(_) => {
                CommandResult::new(ErrorCode::STORAGE_FAILURE, CleanupDirective::Retry, self)
            }
            Self::Serialization { .. } | Self::Configuration { .. } => {
                CommandResult::new(ErrorCode::INTERNAL_ERROR, CleanupDirective::None, self)
            }
        }
    }
}

/// A fault raised by a task while doing its work.
///
/// Carries its own error code and cleanup directive so the executor can
/// propagate them verbatim when the plan ends in `ERROR`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{class}: {message}")]
pub struct TaskFault {
    pub class: String,
    pub message: String,
    pub error_code: ErrorCode,
    pub cleanup: CleanupDirective,
}

impl TaskFault {
    /// A recoverable, task-reported fault with a caller-chosen code.
    pub fn command(
        error_code: ErrorCode,
        cleanup: CleanupDirective,
        message: impl Into<String>,
    ) -> Self {
        Self {
            class: "CommandFault".to_string(),
            message: message.into(),
            error_code,
            cleanup,
        }
    }

    /// An authentication or authorization failure. Nothing to roll back.
    pub fn security(message: impl Into<String>) -> Self {
        Self {
            class: "SecurityFault".to_string(),
            message: message.into(),
            error_code: ErrorCode::SECURITY_FAILURE,
            cleanup: CleanupDirective::None,
        }
    }

    /// An unclassified runtime fault; fatal and never retried automatically.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            class: "InternalFault".to_string(),
            message: message.into(),
            error_code: ErrorCode::INTERNAL_ERROR,
            cleanup: CleanupDirective::None,
        }
    }

    /// The worker pool refused a submission; the plan's in-flight state is
    /// indeterminate so the caller is told to cancel it.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            class: "RejectedExecution".to_string(),
            message: message.into(),
            error_code: ErrorCode::SCHEDULER_REJECTED,
            cleanup: CleanupDirective::CancelPlan,
        }
    }

    /// Internal and scheduler faults abort the plan even under
    /// `continue_past_error`.
    pub fn is_fatal(&self) -> bool {
        self.error_code == ErrorCode::INTERNAL_ERROR
            || self.error_code == ErrorCode::SCHEDULER_REJECTED
    }

    /// Overrides the class name recorded for the fault.
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = class.into();
        self
    }
}

impl From<PlanError> for TaskFault {
    fn from(err: PlanError) -> Self {
        let class = match &err {
            PlanError::PlanLocksHeld { .. } => "PlanLocksHeldException",
            PlanError::Unauthorized { .. } => "SecurityFault",
            PlanError::IllegalCommand { .. } => "IllegalCommandException",
            _ => "PlanError",
        };
        let result = err.command_result();
        Self {
            class: class.to_string(),
            message: err.to_string(),
            error_code: result.error_code,
            cleanup: result.cleanup,
        }
    }
}

/// Specialized extension trait for database-related Results.
pub trait DatabaseResultExt<T> {
    /// Map database errors with a message.
    fn db_context(self, message: &str) -> Result<T>;
}

impl<T> DatabaseResultExt<T> for std::result::Result<T, rusqlite::Error> {
    fn db_context(self, message: &str) -> Result<T> {
        self.map_err(|e| PlanError::database(message).with_source(e))
    }
}

/// Result type alias for planner operations
pub type Result<T> = std::result::Result<T, PlanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_result_for_user_errors() {
        let result = PlanError::illegal("plan 3 is not approved").command_result();
        assert_eq!(result.error_code, ErrorCode::ILLEGAL_COMMAND);
        assert_eq!(result.cleanup, CleanupDirective::None);
        assert!(result.description.contains("not approved"));
    }

    #[test]
    fn test_lock_conflict_becomes_task_fault() {
        let err = PlanError::PlanLocksHeld {
            category: LockCategory::Elasticity,
            key: "elasticity".to_string(),
            holder_id: 7,
            holder_name: "rebalance".to_string(),
        };
        let fault = TaskFault::from(err);
        assert_eq!(fault.class, "PlanLocksHeldException");
        assert_eq!(fault.error_code, ErrorCode::LOCK_CONFLICT);
        assert!(fault.message.contains("plan 7"));
    }

    #[test]
    fn test_rejection_directs_cancel() {
        let fault = TaskFault::rejected("queue full");
        assert_eq!(fault.cleanup, CleanupDirective::CancelPlan);
        assert_eq!(fault.error_code, ErrorCode::SCHEDULER_REJECTED);
    }
}
