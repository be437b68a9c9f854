//! Server configuration with environment overrides.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign, used by tests).
    pub port: u16,
    /// Maximum concurrent `WebSocket` connections.
    pub max_connections: usize,
    /// Interval between server-initiated pings, in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close a peer that hasn't ponged for this many seconds.
    pub heartbeat_timeout_secs: u64,
    /// Maximum `WebSocket` message size in bytes.
    pub max_message_size: usize,
    /// Per-connection outbound queue depth; frames beyond this are
    /// dropped rather than stalling a broadcast pass.
    pub outbound_queue_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 64,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 64 * 1024,
            outbound_queue_size: 256,
        }
    }
}

impl ServerConfig {
    /// Apply `MEDRELAY_*` environment overrides.
    ///
    /// Parsing is strict: a value that doesn't parse, or falls outside
    /// its accepted range, is ignored with a warning rather than
    /// half-applied.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(host) = get("MEDRELAY_HOST") {
            self.host = host;
        }
        if let Some(port) = parse_env::<u16>("MEDRELAY_PORT", &get) {
            self.port = port;
        }
        if let Some(secs) = parse_env::<u64>("MEDRELAY_HEARTBEAT_INTERVAL_SECS", &get) {
            if (1..=3_600).contains(&secs) {
                self.heartbeat_interval_secs = secs;
            } else {
                warn!(secs, "MEDRELAY_HEARTBEAT_INTERVAL_SECS out of range (1..=3600), ignoring");
            }
        }
        if let Some(secs) = parse_env::<u64>("MEDRELAY_HEARTBEAT_TIMEOUT_SECS", &get) {
            if (1..=86_400).contains(&secs) {
                self.heartbeat_timeout_secs = secs;
            } else {
                warn!(secs, "MEDRELAY_HEARTBEAT_TIMEOUT_SECS out of range (1..=86400), ignoring");
            }
        }
    }
}

fn parse_env<T: std::str::FromStr>(
    name: &str,
    get: &impl Fn(&str) -> Option<String>,
) -> Option<T> {
    let raw = get(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(name, raw, "ignoring unparseable environment override");
            None
        }
    }
}
