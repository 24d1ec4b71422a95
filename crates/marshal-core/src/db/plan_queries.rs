//! Plan record queries.

use rusqlite::{params, params_from_iter, OptionalExtension, TransactionBehavior};

use crate::{
    error::{DatabaseResultExt, Result},
    models::{PlanId, PlanRecord, PlanState},
};

const UPSERT_PLAN_SQL: &str = "INSERT INTO plans (id, name, state, is_system, version, record, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
     ON CONFLICT(id) DO UPDATE SET
        name = excluded.name,
        state = excluded.state,
        is_system = excluded.is_system,
        version = excluded.version,
        record = excluded.record,
        updated_at = excluded.updated_at";
const SELECT_PLAN_SQL: &str = "SELECT record FROM plans WHERE id = ?1";
const SELECT_RANGE_SQL: &str = "SELECT record FROM plans WHERE id >= ?1 ORDER BY id ASC LIMIT ?2";
const SELECT_RECENT_SQL: &str = "SELECT record FROM plans ORDER BY id DESC LIMIT ?1";
const DELETE_PLAN_SQL: &str = "DELETE FROM plans WHERE id = ?1";
const COUNT_PLANS_SQL: &str = "SELECT COUNT(*) FROM plans";
const BUMP_SEQUENCE_SQL: &str = "INSERT INTO plan_sequence (id, high_water) VALUES (1, ?1)
     ON CONFLICT(id) DO UPDATE SET high_water = MAX(high_water, excluded.high_water)";
const MAX_PLAN_ID_SQL: &str = "SELECT MAX(
        COALESCE((SELECT high_water FROM plan_sequence WHERE id = 1), 0),
        COALESCE((SELECT MAX(id) FROM plans), 0)
     )";

/// Terminal plans only; system plans before user plans, oldest first.
const PRUNE_SQL: &str = "DELETE FROM plans WHERE id IN (
        SELECT id FROM plans
        WHERE state IN ('SUCCEEDED', 'ERROR', 'CANCELED')
        ORDER BY is_system DESC, id ASC
        LIMIT ?1
     )";

impl super::Database {
    /// Inserts or replaces the record stored under `record.id` and raises
    /// the id high-water mark.
    pub fn save_plan(&mut self, record: &PlanRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        tx.execute(
            UPSERT_PLAN_SQL,
            params![
                record.id as i64,
                &record.name,
                record.state.as_str(),
                record.is_system,
                record.version,
                json,
                record.created_at.to_string(),
                record.updated_at.to_string(),
            ],
        )
        .db_context("Failed to save plan")?;
        tx.execute(BUMP_SEQUENCE_SQL, params![record.id as i64])
            .db_context("Failed to update plan id sequence")?;
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(())
    }

    /// Retrieves a plan record by its ID.
    pub fn get_plan(&self, id: PlanId) -> Result<Option<PlanRecord>> {
        let json: Option<String> = self
            .connection
            .query_row(SELECT_PLAN_SQL, params![id as i64], |row| row.get(0))
            .optional()
            .db_context("Failed to query plan")?;

        json.map(|j| decode(&j)).transpose()
    }

    /// Up to `count` records with id at or above `start`, in id order.
    pub fn get_plan_range(&self, start: PlanId, count: usize) -> Result<Vec<PlanRecord>> {
        self.query_records(SELECT_RANGE_SQL, params![start as i64, count as i64])
    }

    /// The `count` most recently registered plans, newest first.
    pub fn recent_plans(&self, count: usize) -> Result<Vec<PlanRecord>> {
        self.query_records(SELECT_RECENT_SQL, params![count as i64])
    }

    /// Every plan currently in one of `states`, in id order.
    pub fn load_plans_in_states(&self, states: &[PlanState]) -> Result<Vec<PlanRecord>> {
        if states.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; states.len()].join(", ");
        let sql = format!("SELECT record FROM plans WHERE state IN ({placeholders}) ORDER BY id ASC");
        self.query_records(&sql, params_from_iter(states.iter().map(PlanState::as_str)))
    }

    /// Permanently deletes a plan. Returns whether a row was removed.
    pub fn delete_plan(&mut self, id: PlanId) -> Result<bool> {
        let rows = self
            .connection
            .execute(DELETE_PLAN_SQL, params![id as i64])
            .db_context("Failed to delete plan")?;
        Ok(rows > 0)
    }

    pub fn count_plans(&self) -> Result<usize> {
        let count: i64 = self
            .connection
            .query_row(COUNT_PLANS_SQL, [], |row| row.get(0))
            .db_context("Failed to count plans")?;
        Ok(count as usize)
    }

    /// Highest id ever stored, used to seed id assignment after a restart.
    /// Deleted and pruned records still count.
    pub fn max_plan_id(&self) -> Result<Option<PlanId>> {
        let max: i64 = self
            .connection
            .query_row(MAX_PLAN_ID_SQL, [], |row| row.get(0))
            .db_context("Failed to query highest plan id")?;
        Ok((max > 0).then_some(max as PlanId))
    }

    /// Deletes terminal plans until at most `limit` records remain, or no
    /// terminal plan is left. Returns the number of records removed.
    pub fn prune_terminal(&mut self, limit: usize) -> Result<usize> {
        // Immediate: concurrent pruners must not both act on a stale count.
        let tx = self
            .connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .db_context("Failed to begin transaction")?;
        let count: i64 = tx
            .query_row(COUNT_PLANS_SQL, [], |row| row.get(0))
            .db_context("Failed to count plans")?;
        let excess = (count as usize).saturating_sub(limit);
        if excess == 0 {
            return Ok(0);
        }

        let removed = tx
            .execute(PRUNE_SQL, params![excess as i64])
            .db_context("Failed to prune plans")?;
        tx.commit().db_context("Failed to commit transaction")?;

        Ok(removed)
    }

    fn query_records<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<PlanRecord>> {
        let mut stmt = self
            .connection
            .prepare(sql)
            .db_context("Failed to prepare query")?;

        let rows = stmt
            .query_map(params, |row| row.get::<_, String>(0))
            .db_context("Failed to query plans")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to read plan rows")?;

        rows.iter().map(|j| decode(j)).collect()
    }
}

fn decode(json: &str) -> Result<PlanRecord> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use tempfile::TempDir;

    use super::*;
    use crate::{db::Database, models::TaskTree};

    fn record(id: PlanId, state: PlanState, is_system: bool) -> PlanRecord {
        let now = Timestamp::now();
        PlanRecord {
            id,
            name: format!("plan-{id}"),
            is_system,
            state,
            required_privileges: Vec::new(),
            tree: TaskTree::new(),
            runs: Vec::new(),
            created_at: now,
            updated_at: now,
            version: crate::models::RECORD_VERSION,
        }
    }

    fn open() -> (TempDir, Database) {
        let dir = TempDir::new().expect("temp dir");
        let db = Database::new(dir.path().join("plans.db")).expect("open database");
        (dir, db)
    }

    #[test]
    fn test_save_is_an_upsert() {
        let (_dir, mut db) = open();
        let mut plan = record(1, PlanState::Approved, false);
        db.save_plan(&plan).expect("insert");
        plan.set_state(PlanState::Running);
        db.save_plan(&plan).expect("update");

        assert_eq!(db.count_plans().expect("count"), 1);
        let loaded = db.get_plan(1).expect("query").expect("present");
        assert_eq!(loaded.state, PlanState::Running);
        assert!(db.get_plan(2).expect("query").is_none());
    }

    #[test]
    fn test_range_and_recovery_queries() {
        let (_dir, mut db) = open();
        let states = [
            PlanState::Succeeded,
            PlanState::Running,
            PlanState::Approved,
            PlanState::Canceled,
            PlanState::Interrupted,
        ];
        for (id, state) in (1..).zip(states) {
            db.save_plan(&record(id, state, false)).expect("save");
        }

        let ids: Vec<_> = db
            .get_plan_range(2, 2)
            .expect("range")
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![2, 3]);

        let recovered: Vec<_> = db
            .load_plans_in_states(&[PlanState::Approved, PlanState::Running])
            .expect("load")
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(recovered, vec![2, 3]);
        assert_eq!(db.max_plan_id().expect("max"), Some(5));
        assert_eq!(db.recent_plans(1).expect("recent")[0].id, 5);
    }

    #[test]
    fn test_prune_prefers_system_then_oldest_and_keeps_live_plans() {
        let (_dir, mut db) = open();
        db.save_plan(&record(1, PlanState::Running, false)).expect("save");
        db.save_plan(&record(2, PlanState::Succeeded, false)).expect("save");
        db.save_plan(&record(3, PlanState::Error, false)).expect("save");
        db.save_plan(&record(4, PlanState::Succeeded, true)).expect("save");
        db.save_plan(&record(5, PlanState::Approved, false)).expect("save");

        assert_eq!(db.prune_terminal(3).expect("prune"), 2);
        let left: Vec<_> = db
            .get_plan_range(0, 10)
            .expect("range")
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(left, vec![1, 3, 5]);

        // Only live plans and one terminal plan remain; the limit is soft.
        assert_eq!(db.prune_terminal(0).expect("prune"), 1);
        assert_eq!(db.count_plans().expect("count"), 2);
    }

    #[test]
    fn test_deleted_ids_stay_reserved() {
        let (_dir, mut db) = open();
        db.save_plan(&record(7, PlanState::Canceled, false)).expect("save");
        assert!(db.delete_plan(7).expect("delete"));
        assert!(!db.delete_plan(7).expect("delete again"));
        assert_eq!(db.max_plan_id().expect("max"), Some(7));
    }
}
