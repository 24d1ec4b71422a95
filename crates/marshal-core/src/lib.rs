//! Core library for Marshal, a resumable plan and task execution engine for
//! cluster administration.
//!
//! A *plan* is a named tree of *tasks* (single-job, multi-job, serial and
//! parallel bundles). The [`Planner`] registers plans, enforces locks and
//! lifecycle rules, and hands runs to the [`PlanExecutor`], which walks the
//! tree on a bounded [`WorkerPool`]. Every state transition is persisted
//! through the [`PlanStore`] so plans survive a process restart.
//!
//! # Display Architecture
//!
//! - **Domain Models** ([`models`]): implement [`std::fmt::Display`] as
//!   markdown
//! - **Display Wrappers** ([`display`]): list and status formatting
//! - **Terminal Rendering**: the CLI renders the markdown with termimad
//!
//! # Quick Start
//!
//! ```rust
//! use std::time::Duration;
//!
//! use marshal_core::{
//!     models::{TaskDescriptor, TaskState},
//!     task::{LeafTask, SingleJobTask, TaskContext},
//!     Plan, PlanState, PlannerBuilder, Task, TaskFault,
//! };
//!
//! struct Restart;
//!
//! impl LeafTask for Restart {
//!     fn descriptor(&self) -> TaskDescriptor {
//!         TaskDescriptor::named("restart-admin")
//!     }
//! }
//!
//! impl SingleJobTask for Restart {
//!     fn do_work(&self, _ctx: &TaskContext) -> Result<TaskState, TaskFault> {
//!         Ok(TaskState::Succeeded)
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = tempfile::tempdir()?;
//! let planner = PlannerBuilder::new()
//!     .with_database_path(Some(dir.path().join("plans.db")))
//!     .build()
//!     .await?;
//!
//! let plan = Plan::builder("restart").task(Task::single(Restart)).build();
//! let id = planner.register_plan(plan).await?;
//! planner.approve_plan(id).await?;
//! planner.execute_plan(id, false).await?;
//!
//! let state = planner.await_plan(id, Duration::from_secs(5)).await?;
//! assert_eq!(state, PlanState::Succeeded);
//! println!("{}", planner.get_plan(id).await?);
//! # Ok(())
//! # }
//! ```

pub mod db;
pub mod display;
pub mod error;
pub mod executor;
pub mod models;
pub mod plan;
pub mod planner;
pub mod store;
pub mod task;

// Re-export commonly used types
pub use db::Database;
pub use display::{LocalDateTime, PlanRecords, PlanVerdict, PruneReport};
pub use error::{PlanError, Result, TaskFault};
pub use executor::{ExecutionListener, PlanExecutor, WorkerPool};
pub use models::{
    CleanupDirective, CommandResult, ErrorCode, ExceptionTransfer, LockCategory, PlanId,
    PlanRecord, PlanRun, PlanState, Privilege, TaskState,
};
pub use plan::{Plan, PlanBuilder, PlanPolicy};
pub use planner::{check_success, AccessChecker, Planner, PlannerBuilder};
pub use store::PlanStore;
pub use task::{Task, TaskFactory};
