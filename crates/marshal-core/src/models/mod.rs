//! Data models for plans, tasks and their execution history.
//!
//! Everything in this module is plain data: serializable with `serde`,
//! comparable, and free of live task behavior. The executable side of a plan
//! lives in [`crate::task`] and [`crate::plan`]; a [`PlanRecord`] is what the
//! engine persists and reports after a process restart.
//!
//! Display implementations for these models are located in
//! [`crate::display::models`].
//!
//! # Examples
//!
//! ```rust
//! use marshal_core::models::{PlanState, TaskPath};
//!
//! assert!(PlanState::Succeeded.is_terminal());
//! assert!(PlanState::Interrupted.can_execute());
//! assert_eq!(TaskPath::root(0).child(1).to_string(), "1.2");
//! ```

pub mod lock;
pub mod plan;
pub mod privilege;
pub mod result;
pub mod run;
pub mod status;
pub mod tree;

#[cfg(test)]
mod tests;

pub use lock::{LockCategory, PlanLock};
pub use plan::{PlanId, PlanRecord, RECORD_VERSION};
pub use privilege::Privilege;
pub use result::{CleanupDirective, CommandResult, ErrorCode, ExceptionTransfer};
pub use run::{PlanRun, TaskRun};
pub use status::{PlanState, TaskState};
pub use tree::{TaskDescriptor, TaskKindTag, TaskNode, TaskPath, TaskTree};
