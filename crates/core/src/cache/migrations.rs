//! Cache database schema.
//!
//! Each migration runs in its own transaction together with the row that
//! records it, so a failed migration leaves the schema at the previous
//! version.

use super::Error;
use tokio_rusqlite::{Connection, params};

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Applied in ascending version order.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "cache_entries",
        sql: include_str!("../../migrations/001_cache_entries.sql"),
    },
    Migration {
        version: 2,
        name: "installed_entries",
        sql: include_str!("../../migrations/002_installed_entries.sql"),
    },
    Migration {
        version: 3,
        name: "cache_expiration",
        sql: include_str!("../../migrations/003_cache_expiration.sql"),
    },
];

/// Bring the schema up to the latest version.
///
/// # Errors
///
/// Returns [`Error::MigrationFailed`] naming the migration whose SQL failed.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_versions (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )",
        )?;

        let current: i64 =
            conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_versions", [], |row| row.get(0))?;

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            tracing::debug!(version = migration.version, name = migration.name, "applying cache migration");

            let tx = conn.transaction()?;
            tx.execute_batch(migration.sql)
                .map_err(|e| Error::MigrationFailed(format!("{} ({}): {e}", migration.name, migration.version)))?;
            tx.execute(
                "INSERT INTO schema_versions (version, name, applied_at) VALUES (?1, ?2, ?3)",
                params![migration.version, migration.name, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
