//! # medrelay-store
//!
//! `SQLite`-backed persistence for the relay: two logical collections,
//! `schedules` (one document per patient) and `logs` (append-only).
//!
//! The [`StoreGateway`] trait is the seam the message handlers talk to;
//! [`SqliteStore`] is the production implementation. All operations run
//! on the blocking thread pool so handler tasks suspend cleanly while
//! the store works.

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod gateway;
pub mod migrations;

pub use connection::{new_file, new_in_memory, ConnectionConfig, ConnectionPool, PooledConnection};
pub use errors::{Result, StoreError};
pub use gateway::{SqliteStore, StoreGateway, UpsertOutcome};
pub use migrations::run_migrations;
