//! `SQLite` connection pooling.
//!
//! `r2d2` + `r2d2_sqlite`, with a customizer that puts every new
//! connection into WAL mode with a busy timeout. The relay's write load
//! is light (one logical operation per inbound frame) but handlers from
//! different peers run concurrently, so pooled connections must tolerate
//! each other's writes.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::errors::Result;

/// Alias for the connection pool type.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Alias for a pooled connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Pool tuning knobs.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Maximum pool size (default: 8).
    pub pool_size: u32,
    /// Busy timeout in milliseconds (default: 5000).
    pub busy_timeout_ms: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug)]
struct RelayPragmas {
    busy_timeout_ms: u32,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for RelayPragmas {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;\
             PRAGMA busy_timeout = {};\
             PRAGMA synchronous = NORMAL;\
             PRAGMA foreign_keys = ON;",
            self.busy_timeout_ms
        ))
    }
}

fn build_pool(manager: SqliteConnectionManager, config: &ConnectionConfig, size: u32) -> Result<ConnectionPool> {
    let pool = Pool::builder()
        .max_size(size)
        .connection_timeout(Duration::from_secs(5))
        .connection_customizer(Box::new(RelayPragmas {
            busy_timeout_ms: config.busy_timeout_ms,
        }))
        .build(manager)?;
    Ok(pool)
}

/// Create a file-backed connection pool.
pub fn new_file(path: &str, config: &ConnectionConfig) -> Result<ConnectionPool> {
    build_pool(SqliteConnectionManager::file(path), config, config.pool_size)
}

/// Create an in-memory connection pool (for testing).
///
/// Capped at a single connection: each `:memory:` handle is its own
/// database, so a wider pool would hand out empty databases with no
/// schema.
pub fn new_in_memory(config: &ConnectionConfig) -> Result<ConnectionPool> {
    build_pool(SqliteConnectionManager::memory(), config, 1)
}
