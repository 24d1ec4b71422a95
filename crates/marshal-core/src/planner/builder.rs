//! Builder for creating and configuring Planner instances.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use log::info;

use super::{AccessChecker, AllowAll, Planner};
use crate::{
    error::{PlanError, Result},
    executor::{
        default_pool_size, ExecutionListener, ListenerSet, PlanExecutor, WorkerPool,
        DEFAULT_QUEUE_CAPACITY,
    },
    store::{PlanStore, DEFAULT_PLAN_LIMIT},
    task::TaskFactory,
};

/// Builder for creating and configuring Planner instances.
#[derive(Clone)]
pub struct PlannerBuilder {
    database_path: Option<PathBuf>,
    pool_size: Option<usize>,
    queue_capacity: usize,
    plan_limit: usize,
    listeners: ListenerSet,
    factory: TaskFactory,
    access: Arc<dyn AccessChecker>,
}

impl PlannerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            database_path: None,
            pool_size: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            plan_limit: DEFAULT_PLAN_LIMIT,
            listeners: ListenerSet::new(),
            factory: TaskFactory::new(),
            access: Arc::new(AllowAll),
        }
    }

    /// Sets a custom database file path.
    ///
    /// If not specified, uses XDG Base Directory specification:
    /// `$XDG_DATA_HOME/marshal/plans.db` or `~/.local/share/marshal/plans.db`
    pub fn with_database_path<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        if let Some(path) = path {
            self.database_path = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// Number of jobs that may run at once. Defaults to the machine's
    /// available parallelism.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = Some(pool_size);
        self
    }

    /// Jobs admitted beyond the running ones before submissions are
    /// rejected.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Soft limit on stored plan records.
    pub fn with_plan_limit(mut self, limit: usize) -> Self {
        self.plan_limit = limit;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn ExecutionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Constructors used to rebuild persisted plans.
    pub fn with_task_factory(mut self, factory: TaskFactory) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_access_checker(mut self, access: Arc<dyn AccessChecker>) -> Self {
        self.access = access;
        self
    }

    /// Builds the configured planner and recovers persisted plans.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::FileSystem` if the database path is invalid
    /// Returns `PlanError::Database` if database initialization fails
    pub async fn build(self) -> Result<Planner> {
        let db_path = if let Some(path) = self.database_path {
            path
        } else {
            Self::default_database_path()?
        };

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PlanError::FileSystem {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let store = PlanStore::open(db_path, self.plan_limit).await?;
        let next_id = store.max_plan_id().await?.unwrap_or(0) + 1;

        let pool = WorkerPool::new(
            self.pool_size.unwrap_or_else(default_pool_size),
            self.queue_capacity,
        );
        info!(
            "Starting planner on {} with {} worker(s)",
            store.db_path().display(),
            pool.pool_size()
        );
        let executor = PlanExecutor::new(pool, self.listeners);

        let planner = Planner::new(store, executor, self.factory, self.access, next_id);
        let recovered = planner.recover().await?;
        if recovered != Default::default() {
            info!(
                "Recovered {} approved plan(s), resubmitted {}, {} unrecoverable",
                recovered.approved, recovered.resubmitted, recovered.unrecoverable
            );
        }
        Ok(planner)
    }

    /// Returns the default database path following XDG Base Directory
    /// specification, creating the data directory if needed.
    pub fn default_database_path() -> Result<PathBuf> {
        xdg::BaseDirectories::with_prefix("marshal")
            .place_data_file("plans.db")
            .map_err(|e| PlanError::XdgDirectory(e.to_string()))
    }
}

impl Default for PlannerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
