//! # medrelay-core
//!
//! Shared vocabulary for the medrelay schedule-relay server:
//!
//! - **Frames**: `InboundFrame` / `OutboundFrame` — one JSON object per
//!   WebSocket text message, discriminated by a `type` field
//! - **Records**: `LogEntry`, the adherence log record carried on the wire
//!   and persisted to the store
//! - **Errors**: `FrameError` parse/validation taxonomy and the wire-level
//!   error codes sent back in `error` frames
//! - **IDs**: `ConnectionId`, a UUID v7 newtype identifying a peer session

#![deny(unsafe_code)]

pub mod errors;
pub mod frames;
pub mod ids;

pub use errors::FrameError;
pub use frames::{InboundFrame, LogEntry, OutboundFrame};
pub use ids::ConnectionId;
