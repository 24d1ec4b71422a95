//! Database schema initialization and migrations.

use log::info;

use crate::error::{DatabaseResultExt, PlanError, Result};

/// Schema version stamped into `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 2;

const SEED_SEQUENCE_SQL: &str = "INSERT OR IGNORE INTO plan_sequence (id, high_water)
     SELECT 1, COALESCE(MAX(id), 0) FROM plans";

impl super::Database {
    /// Initializes the database schema using the embedded SQL file.
    pub(super) fn initialize_schema(&self) -> Result<()> {
        let schema_sql = include_str!("../../assets/schema.sql");
        self.connection
            .execute_batch(schema_sql)
            .db_context("Failed to initialize database schema")?;

        self.apply_migrations()
    }

    /// Stamps fresh databases and refuses ones written by a newer release.
    fn apply_migrations(&self) -> Result<()> {
        let version: i64 = self
            .connection
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .db_context("Failed to read schema version")?;

        if version > SCHEMA_VERSION {
            return Err(PlanError::Configuration {
                message: format!(
                    "database schema version {version} is newer than supported version {SCHEMA_VERSION}"
                ),
            });
        }

        if version < SCHEMA_VERSION {
            info!("Migrating plan database schema from version {version} to {SCHEMA_VERSION}");
            // Version 1 databases have no sequence row yet.
            self.connection
                .execute(SEED_SEQUENCE_SQL, [])
                .db_context("Failed to seed plan id sequence")?;
            self.connection
                .pragma_update(None, "user_version", SCHEMA_VERSION)
                .db_context("Failed to record schema version")?;
        }

        Ok(())
    }
}
