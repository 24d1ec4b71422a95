//! Category lock table shared by all plans.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::debug;

use crate::{
    error::{PlanError, Result},
    models::{LockCategory, PlanId, PlanLock},
};

#[derive(Debug, Clone)]
struct Holder {
    plan_id: PlanId,
    plan_name: String,
}

/// Mutex-guarded map from lock to the plan holding it.
///
/// Acquisition is re-entrant for the holding plan id and never blocks: a
/// conflicting request fails immediately with [`PlanError::PlanLocksHeld`].
#[derive(Debug, Clone, Default)]
pub struct LockTable {
    held: Arc<Mutex<HashMap<PlanLock, Holder>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<PlanLock, Holder>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquires `(category, key)` for `plan_id`.
    pub fn lock(
        &self,
        plan_id: PlanId,
        plan_name: &str,
        category: LockCategory,
        key: &str,
    ) -> Result<()> {
        let lock = PlanLock::new(category, key);
        let mut table = self.table();
        match table.get(&lock) {
            Some(holder) if holder.plan_id == plan_id => Ok(()),
            Some(holder) => Err(PlanError::PlanLocksHeld {
                category,
                key: key.to_string(),
                holder_id: holder.plan_id,
                holder_name: holder.plan_name.clone(),
            }),
            None => {
                debug!("Plan {plan_id} acquired lock {lock}");
                table.insert(
                    lock,
                    Holder {
                        plan_id,
                        plan_name: plan_name.to_string(),
                    },
                );
                Ok(())
            }
        }
    }

    /// Acquires the singleton elasticity lock.
    pub fn lock_elasticity(&self, plan_id: PlanId, plan_name: &str) -> Result<()> {
        self.lock(
            plan_id,
            plan_name,
            LockCategory::Elasticity,
            PlanLock::ELASTICITY_KEY,
        )
    }

    /// Id of the plan holding `lock`, if any.
    pub fn holder(&self, lock: &PlanLock) -> Option<PlanId> {
        self.table().get(lock).map(|h| h.plan_id)
    }

    /// Locks currently held by `plan_id`.
    pub fn held_by(&self, plan_id: PlanId) -> Vec<PlanLock> {
        let mut locks: Vec<PlanLock> = self
            .table()
            .iter()
            .filter(|(_, h)| h.plan_id == plan_id)
            .map(|(l, _)| l.clone())
            .collect();
        locks.sort_by(|a, b| (a.category.as_str(), &a.key).cmp(&(b.category.as_str(), &b.key)));
        locks
    }

    /// Releases every lock held by `plan_id` and returns how many there were.
    pub fn release_all(&self, plan_id: PlanId) -> usize {
        let mut table = self.table();
        let before = table.len();
        table.retain(|_, h| h.plan_id != plan_id);
        let released = before - table.len();
        if released > 0 {
            debug!("Plan {plan_id} released {released} lock(s)");
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_is_reentrant_for_holder() {
        let locks = LockTable::new();
        locks.lock(1, "create-table", LockCategory::Table, "users").expect("first");
        locks.lock(1, "create-table", LockCategory::Table, "users").expect("re-entrant");
        assert_eq!(locks.held_by(1).len(), 1);
    }

    #[test]
    fn test_conflicting_lock_names_holder() {
        let locks = LockTable::new();
        locks.lock_elasticity(1, "deploy-topology").expect("first");
        let err = locks.lock_elasticity(2, "rebalance").expect_err("held by plan 1");
        match err {
            PlanError::PlanLocksHeld {
                holder_id,
                holder_name,
                category,
                ..
            } => {
                assert_eq!(holder_id, 1);
                assert_eq!(holder_name, "deploy-topology");
                assert_eq!(category, LockCategory::Elasticity);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_release_frees_locks_for_other_plans() {
        let locks = LockTable::new();
        locks.lock_elasticity(1, "a").expect("lock");
        locks.lock(1, "a", LockCategory::Table, "t1").expect("lock");
        assert_eq!(locks.release_all(1), 2);
        assert_eq!(locks.holder(&PlanLock::elasticity()), None);
        locks.lock_elasticity(2, "b").expect("free now");
        assert_eq!(locks.holder(&PlanLock::elasticity()), Some(2));
    }

    #[test]
    fn test_distinct_keys_do_not_conflict() {
        let locks = LockTable::new();
        locks.lock(1, "a", LockCategory::Table, "t1").expect("lock");
        locks.lock(2, "b", LockCategory::Table, "t2").expect("different key");
        locks.lock(3, "c", LockCategory::Topology, "t1").expect("different category");
    }
}
