//! `WebSocket` gateway: per-peer connections, the registry, broadcast
//! fan-out, and the session lifecycle.

pub mod broadcast;
pub mod connection;
pub mod registry;
pub mod session;

pub use broadcast::{Broadcaster, FanoutBroadcaster};
pub use connection::PeerConnection;
pub use registry::ConnectionRegistry;
