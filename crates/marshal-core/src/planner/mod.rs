//! The planner: plan registry, lock manager and administrative boundary.
//!
//! The [`Planner`] is the single authority over plan identity, lifecycle
//! transitions and locks. It hands validated plans to the
//! [`PlanExecutor`](crate::executor::PlanExecutor) and persists every
//! transition through the [`PlanStore`](crate::store::PlanStore).
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │  Admin callers  │    │     Planner     │    │    PlanStore    │
//! │ (CLI, services) │───▶│ registry, locks │───▶│   (via db/)     │
//! └─────────────────┘    └────────┬────────┘    └─────────────────┘
//!                                 │ RunRequest
//!                                 ▼
//!                        ┌─────────────────┐
//!                        │  PlanExecutor   │
//!                        │  + WorkerPool   │
//!                        └─────────────────┘
//! ```
//!
//! ## Submodules
//!
//! - [`builder`]: configuration
//! - [`plan_ops`]: registration, execution and the other lifecycle commands
//! - [`recovery`]: reloading persisted plans at startup
//! - [`locks`]: the category lock table
//! - [`access`]: the authorization hook consulted on execute
//!
//! # Live plans
//!
//! Registered plans are kept in memory while a run may still be requested
//! for them. `SUCCEEDED` and `CANCELED` plans are released once persisted;
//! `ERROR` and `INTERRUPTED` plans stay resident so a retry reuses the same
//! task objects. A plan persisted in a re-executable state but not resident
//! is rebuilt through the [`TaskFactory`] on its next execute call.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use marshal_core::{Plan, PlannerBuilder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let planner = PlannerBuilder::new()
//!     .with_database_path(Some("/var/lib/marshal/plans.db"))
//!     .build()
//!     .await?;
//!
//! let id = planner.register_plan(Plan::builder("noop").build()).await?;
//! planner.approve_plan(id).await?;
//! planner.execute_plan(id, false).await?;
//! let state = planner.await_plan(id, Duration::from_secs(30)).await?;
//! println!("plan {id} ended {state}");
//! planner.assert_success(id).await?;
//! # Ok(())
//! # }
//! ```

use std::{
    collections::HashMap,
    sync::{atomic::AtomicBool, Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::{sync::watch, task::JoinHandle};

use crate::{
    executor::PlanExecutor,
    models::{PlanId, PlanRecord, PlanState},
    plan::Plan,
    store::PlanStore,
    task::{InterruptFlag, TaskFactory},
};

pub mod access;
pub mod builder;
pub mod locks;
pub mod plan_ops;
pub mod recovery;


pub use access::{AccessChecker, AllowAll, PrivilegeSet};
pub use builder::PlannerBuilder;
pub use locks::LockTable;
pub use plan_ops::check_success;

/// A plan held in memory.
struct LivePlan {
    plan: Arc<Plan>,
    record: PlanRecord,
    approved: bool,
    state_tx: watch::Sender<PlanState>,
    /// Set while a run attempt is in flight
    interrupt: Option<Arc<InterruptFlag>>,
    handle: Option<JoinHandle<()>>,
}

struct Registry {
    next_id: PlanId,
    live: HashMap<PlanId, LivePlan>,
}

struct PlannerInner {
    registry: Mutex<Registry>,
    locks: LockTable,
    executor: PlanExecutor,
    store: PlanStore,
    factory: TaskFactory,
    access: Arc<dyn AccessChecker>,
    shutting_down: AtomicBool,
}

/// Main planner interface. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Planner {
    inner: Arc<PlannerInner>,
}

impl Planner {
    pub(crate) fn new(
        store: PlanStore,
        executor: PlanExecutor,
        factory: TaskFactory,
        access: Arc<dyn AccessChecker>,
        next_id: PlanId,
    ) -> Self {
        Self {
            inner: Arc::new(PlannerInner {
                registry: Mutex::new(Registry {
                    next_id,
                    live: HashMap::new(),
                }),
                locks: LockTable::new(),
                executor,
                store,
                factory,
                access,
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.inner
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The lock table shared by every plan of this planner.
    pub fn locks(&self) -> &LockTable {
        &self.inner.locks
    }

    pub fn store(&self) -> &PlanStore {
        &self.inner.store
    }

    pub fn executor(&self) -> &PlanExecutor {
        &self.inner.executor
    }

    /// Number of plans currently held in memory.
    pub fn live_count(&self) -> usize {
        self.registry().live.len()
    }
}

impl std::fmt::Debug for Planner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Planner")
            .field("db_path", &self.inner.store.db_path())
            .field("live", &self.live_count())
            .finish()
    }
}
