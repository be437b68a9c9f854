//! The connection registry.
//!
//! Membership is mutated only by the transport layer — add on upgrade,
//! remove on disconnect or error. Everything else (handlers, the
//! broadcaster, the health endpoint) reads snapshots.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use medrelay_core::ConnectionId;
use tokio::sync::RwLock;

use super::connection::PeerConnection;

/// Owns the set of currently open peer connections.
pub struct ConnectionRegistry {
    peers: RwLock<HashMap<ConnectionId, Arc<PeerConnection>>>,
    // Mirrors peers.len() so sync callers (health, admission) can read
    // the count without taking the lock
    count: AtomicUsize,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
            count: AtomicUsize::new(0),
        }
    }

    /// Add a peer. Called by the session task after upgrade.
    pub async fn add(&self, peer: Arc<PeerConnection>) {
        let mut peers = self.peers.write().await;
        let _ = peers.insert(peer.id.clone(), peer);
        self.count.store(peers.len(), Ordering::Relaxed);
    }

    /// Remove a peer by ID. Called on disconnect or transport error.
    pub async fn remove(&self, id: &ConnectionId) {
        let mut peers = self.peers.write().await;
        let _ = peers.remove(id);
        self.count.store(peers.len(), Ordering::Relaxed);
    }

    /// Clone the current membership. The read lock is released before
    /// the caller does anything with the result.
    pub async fn snapshot(&self) -> Vec<Arc<PeerConnection>> {
        self.peers.read().await.values().cloned().collect()
    }

    /// Current connection count.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Whether no peers are connected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
