//! Error types for store operations.

use thiserror::Error;

/// Errors surfaced by the store gateway.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A stored document failed to (de)serialize.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Which migration failed and why.
        message: String,
    },

    /// Internal error (e.g. a blocking task failed to join).
    #[error("internal store error: {0}")]
    Internal(String),
}

/// Convenience alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_error_display() {
        let err = StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows);
        assert!(err.to_string().contains("sqlite error"));
    }

    #[test]
    fn serde_error_display() {
        let inner = serde_json::from_str::<String>("{").unwrap_err();
        let err = StoreError::Serde(inner);
        assert!(err.to_string().contains("serde error"));
    }

    #[test]
    fn migration_error_display() {
        let err = StoreError::Migration {
            message: "v001 failed".into(),
        };
        assert_eq!(err.to_string(), "migration error: v001 failed");
    }

    #[test]
    fn internal_error_display() {
        let err = StoreError::Internal("task join".into());
        assert_eq!(err.to_string(), "internal store error: task join");
    }
}
