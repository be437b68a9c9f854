//! The store gateway trait and its `SQLite` implementation.
//!
//! Handlers never touch SQL; they speak [`StoreGateway`]. Keeping the
//! trait narrow (three operations, one per message kind) means a future
//! backend swap touches nothing above this module.

use async_trait::async_trait;
use medrelay_core::LogEntry;
use rusqlite::OptionalExtension;
use serde_json::Value;

use crate::connection::{new_in_memory, ConnectionConfig, ConnectionPool};
use crate::errors::{Result, StoreError};
use crate::migrations::run_migrations;

/// What an upsert did. Distinguished for operational logging only —
/// callers broadcast the same frame in all three cases.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No document matched; a new one was created.
    Created,
    /// A document matched and its payload was replaced.
    Updated,
    /// A document matched but the payload was already identical.
    Unchanged,
}

/// Typed access to the two relay collections.
#[async_trait]
pub trait StoreGateway: Send + Sync {
    /// Fetch the schedule payload for one patient, if any.
    async fn find_schedule(&self, patient_id: &str) -> Result<Option<Value>>;

    /// Write (or create) the schedule document for one patient.
    async fn upsert_schedule(&self, patient_id: &str, schedule: &Value) -> Result<UpsertOutcome>;

    /// Append one adherence log record. Records are never mutated.
    async fn append_log(&self, entry: &LogEntry) -> Result<()>;
}

/// Production gateway backed by the pooled `SQLite` database.
pub struct SqliteStore {
    pool: ConnectionPool,
}

impl SqliteStore {
    /// Wrap an already-migrated pool.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// In-memory store with migrations applied (for tests).
    pub fn in_memory() -> Result<Self> {
        let pool = new_in_memory(&ConnectionConfig::default())?;
        {
            let conn = pool.get()?;
            let _ = run_migrations(&conn)?;
        }
        Ok(Self::new(pool))
    }
}

/// Run a closure on the blocking pool with its own pool handle.
async fn blocking<T, F>(pool: &ConnectionPool, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(ConnectionPool) -> Result<T> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || op(pool))
        .await
        .map_err(|e| StoreError::Internal(format!("blocking store task failed: {e}")))?
}

#[async_trait]
impl StoreGateway for SqliteStore {
    async fn find_schedule(&self, patient_id: &str) -> Result<Option<Value>> {
        let patient_id = patient_id.to_owned();
        blocking(&self.pool, move |pool| {
            let conn = pool.get()?;
            let raw: Option<String> = conn
                .query_row(
                    "SELECT schedule FROM schedules WHERE patient_id = ?1",
                    [&patient_id],
                    |row| row.get(0),
                )
                .optional()?;
            raw.map(|s| serde_json::from_str(&s))
                .transpose()
                .map_err(StoreError::from)
        })
        .await
    }

    async fn upsert_schedule(&self, patient_id: &str, schedule: &Value) -> Result<UpsertOutcome> {
        let patient_id = patient_id.to_owned();
        let schedule = schedule.clone();
        blocking(&self.pool, move |pool| {
            let mut conn = pool.get()?;
            let tx = conn.transaction()?;

            let existing: Option<String> = tx
                .query_row(
                    "SELECT schedule FROM schedules WHERE patient_id = ?1",
                    [&patient_id],
                    |row| row.get(0),
                )
                .optional()?;

            let payload = serde_json::to_string(&schedule)?;
            let now = chrono::Utc::now().to_rfc3339();

            let outcome = match existing {
                None => {
                    let _ = tx.execute(
                        "INSERT INTO schedules (patient_id, schedule, updated_at)
                         VALUES (?1, ?2, ?3)",
                        rusqlite::params![patient_id, payload, now],
                    )?;
                    UpsertOutcome::Created
                }
                Some(current) => {
                    // Compare as values, not text, so formatting differences
                    // don't count as a change
                    let unchanged = serde_json::from_str::<Value>(&current)
                        .map(|v| v == schedule)
                        .unwrap_or(false);
                    if unchanged {
                        UpsertOutcome::Unchanged
                    } else {
                        let _ = tx.execute(
                            "UPDATE schedules SET schedule = ?2, updated_at = ?3
                             WHERE patient_id = ?1",
                            rusqlite::params![patient_id, payload, now],
                        )?;
                        UpsertOutcome::Updated
                    }
                }
            };

            tx.commit()?;
            Ok(outcome)
        })
        .await
    }

    async fn append_log(&self, entry: &LogEntry) -> Result<()> {
        let entry = entry.clone();
        blocking(&self.pool, move |pool| {
            let conn = pool.get()?;
            let _ = conn.execute(
                "INSERT INTO logs (patient_id, time_taken, status, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    entry.patient_id,
                    entry.time_taken,
                    entry.status,
                    chrono::Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }
}
