//! # medrelay-server
//!
//! The relay's network core:
//!
//! - `WebSocket` gateway: connection registry, per-peer session loop,
//!   heartbeat, bounded outbound queues
//! - Message dispatch: one frame at a time per connection, routed to the
//!   `get_schedule` / `log_event` / `update_schedule` handlers
//! - Broadcast fan-out behind the [`Broadcaster`](websocket::Broadcaster)
//!   trait — unaddressed, fire-and-forget, per-peer failure isolation
//! - HTTP surface: `/ws` upgrade and `/health`
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod dispatch;
pub mod handlers;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use dispatch::Dispatcher;
pub use server::RelayServer;
pub use shutdown::ShutdownCoordinator;
