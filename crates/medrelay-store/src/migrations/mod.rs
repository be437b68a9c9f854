//! Schema migration runner.
//!
//! Migrations are embedded via [`include_str!`] and applied in version
//! order, each inside its own transaction. The `schema_version` table
//! records what has been applied, so running the migrator twice is a
//! no-op.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::{Result, StoreError};

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "schedules and append-only logs",
    sql: include_str!("v001_schema.sql"),
}];

/// Apply all pending migrations, returning how many ran.
pub fn run_migrations(conn: &Connection) -> Result<u32> {
    ensure_version_table(conn)?;
    let current = current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version <= current {
            debug!(version = migration.version, "migration already applied");
            continue;
        }
        info!(
            version = migration.version,
            description = migration.description,
            "applying migration"
        );
        apply(conn, migration)?;
        applied += 1;
    }

    Ok(applied)
}

/// The highest applied migration version, or 0 on a fresh database.
pub fn current_version(conn: &Connection) -> Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|e| StoreError::Migration {
        message: format!("failed to read schema_version: {e}"),
    })
}

fn ensure_version_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
           version     INTEGER PRIMARY KEY,
           applied_at  TEXT    NOT NULL,
           description TEXT
         );",
    )
    .map_err(|e| StoreError::Migration {
        message: format!("failed to create schema_version table: {e}"),
    })
}

fn apply(conn: &Connection, migration: &Migration) -> Result<()> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| StoreError::Migration {
            message: format!("v{:03}: failed to open transaction: {e}", migration.version),
        })?;

    tx.execute_batch(migration.sql)
        .map_err(|e| StoreError::Migration {
            message: format!("v{:03} ({}): {e}", migration.version, migration.description),
        })?;

    let _ = tx
        .execute(
            "INSERT INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                migration.version,
                chrono::Utc::now().to_rfc3339(),
                migration.description,
            ],
        )
        .map_err(|e| StoreError::Migration {
            message: format!("v{:03}: failed to record version: {e}", migration.version),
        })?;

    tx.commit().map_err(|e| StoreError::Migration {
        message: format!("v{:03}: commit failed: {e}", migration.version),
    })
}
