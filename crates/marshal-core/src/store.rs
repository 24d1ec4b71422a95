//! Async plan store over the SQLite [`Database`].
//!
//! Every operation opens its own connection on a blocking thread, so the
//! store is cheap to clone and safe to share between plans. Pruning runs on
//! a background task after saves once the record count passes the
//! retention limit; at most one prune is in flight at a time, so the limit
//! is a soft bound.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use log::{debug, warn};
use tokio::task;

use crate::{
    db::Database,
    error::{PlanError, Result},
    models::{PlanId, PlanRecord, PlanState},
};

/// Default number of plan records retained before pruning kicks in.
pub const DEFAULT_PLAN_LIMIT: usize = 1000;

#[derive(Debug)]
struct StoreInner {
    db_path: PathBuf,
    limit: usize,
    pruning: AtomicBool,
}

/// Durable, size-bounded record of every plan.
#[derive(Debug, Clone)]
pub struct PlanStore {
    inner: Arc<StoreInner>,
}

impl PlanStore {
    /// Opens (and initializes) the database at `db_path`.
    pub async fn open(db_path: PathBuf, limit: usize) -> Result<Self> {
        let path = db_path.clone();
        task::spawn_blocking(move || Database::new(&path).map(drop))
            .await
            .map_err(PlanError::join)??;

        Ok(Self {
            inner: Arc::new(StoreInner {
                db_path,
                limit,
                pruning: AtomicBool::new(false),
            }),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.inner.db_path
    }

    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    async fn with_db<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db_path = self.inner.db_path.clone();
        task::spawn_blocking(move || {
            let mut db = Database::new(&db_path)?;
            op(&mut db)
        })
        .await
        .map_err(PlanError::join)?
    }

    /// Persists `record` and schedules a prune if the store is over its
    /// limit.
    pub async fn save_plan(&self, record: PlanRecord) -> Result<()> {
        let count = self
            .with_db(move |db| {
                db.save_plan(&record)?;
                db.count_plans()
            })
            .await?;

        if count > self.inner.limit {
            self.schedule_prune();
        }
        Ok(())
    }

    pub async fn get_plan(&self, id: PlanId) -> Result<Option<PlanRecord>> {
        self.with_db(move |db| db.get_plan(id)).await
    }

    pub async fn get_plan_range(&self, start: PlanId, count: usize) -> Result<Vec<PlanRecord>> {
        self.with_db(move |db| db.get_plan_range(start, count)).await
    }

    pub async fn recent_plans(&self, count: usize) -> Result<Vec<PlanRecord>> {
        self.with_db(move |db| db.recent_plans(count)).await
    }

    pub async fn load_plans_in_states(&self, states: Vec<PlanState>) -> Result<Vec<PlanRecord>> {
        self.with_db(move |db| db.load_plans_in_states(&states)).await
    }

    pub async fn delete_plan(&self, id: PlanId) -> Result<bool> {
        self.with_db(move |db| db.delete_plan(id)).await
    }

    pub async fn count_plans(&self) -> Result<usize> {
        self.with_db(|db| db.count_plans()).await
    }

    pub async fn max_plan_id(&self) -> Result<Option<PlanId>> {
        self.with_db(|db| db.max_plan_id()).await
    }

    /// Prunes terminal plans down to `limit` now. Returns how many were
    /// removed.
    pub async fn prune(&self, limit: usize) -> Result<usize> {
        let removed = self.with_db(move |db| db.prune_terminal(limit)).await?;
        if removed > 0 {
            debug!("Pruned {removed} plan record(s) to limit {limit}");
        }
        Ok(removed)
    }

    /// Starts a background prune unless one is already running.
    fn schedule_prune(&self) {
        if self.inner.pruning.swap(true, Ordering::SeqCst) {
            return;
        }
        let store = self.clone();
        tokio::spawn(async move {
            if let Err(e) = store.prune(store.inner.limit).await {
                warn!("Background plan pruning failed: {e}");
            }
            store.inner.pruning.store(false, Ordering::SeqCst);
        });
    }

    /// Whether a background prune is in flight.
    pub fn is_pruning(&self) -> bool {
        self.inner.pruning.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use jiff::Timestamp;
    use tempfile::TempDir;

    use super::*;
    use crate::models::{TaskTree, RECORD_VERSION};

    fn record(id: PlanId, state: PlanState) -> PlanRecord {
        let now = Timestamp::now();
        PlanRecord {
            id,
            name: format!("plan-{id}"),
            is_system: false,
            state,
            required_privileges: Vec::new(),
            tree: TaskTree::new(),
            runs: Vec::new(),
            created_at: now,
            updated_at: now,
            version: RECORD_VERSION,
        }
    }

    #[tokio::test]
    async fn test_saves_past_limit_prune_in_background() {
        let dir = TempDir::new().expect("temp dir");
        let store = PlanStore::open(dir.path().join("plans.db"), 5)
            .await
            .expect("open store");

        store
            .save_plan(record(1, PlanState::Running))
            .await
            .expect("save");
        for id in 2..=12 {
            store
                .save_plan(record(id, PlanState::Succeeded))
                .await
                .expect("save");
        }

        let mut count = store.count_plans().await.expect("count");
        for _ in 0..50 {
            if count <= 5 && !store.is_pruning() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            count = store.count_plans().await.expect("count");
        }
        // Pruning is asynchronous; a late save may still be pending.
        if count > 5 {
            store.prune(5).await.expect("prune");
            count = store.count_plans().await.expect("count");
        }
        assert_eq!(count, 5);

        assert!(store.get_plan(1).await.expect("get").is_some());
        assert!(store.get_plan(12).await.expect("get").is_some());
        assert!(store.get_plan(2).await.expect("get").is_none());
    }
}
