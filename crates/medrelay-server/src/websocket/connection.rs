//! State for one connected peer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use medrelay_core::ConnectionId;
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// A live peer session: a device on the ward network or a dashboard tab.
///
/// The relay draws no distinction between the two — there is no identity
/// linking a connection to a patient, which is why broadcasts are
/// unaddressed.
pub struct PeerConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Queue feeding the connection's write task. Frames are shared so a
    /// broadcast serializes once regardless of peer count.
    tx: mpsc::Sender<Arc<String>>,
    /// When the peer connected.
    pub connected_at: Instant,
    /// Whether the peer has answered the last ping.
    is_alive: AtomicBool,
    /// When the last pong (or ping) arrived.
    last_pong: Mutex<Instant>,
    /// Frames dropped because the outbound queue was full.
    dropped_frames: AtomicU64,
}

impl PeerConnection {
    /// Create a connection wrapping the given outbound queue.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Enqueue a frame without blocking.
    ///
    /// Returns `false` if the queue is full or the peer's write task is
    /// gone; a full queue also bumps the dropped-frame counter.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Whether the peer can still receive frames.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Record a pong (or any liveness signal) from the peer.
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Take and reset the alive flag for the heartbeat check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last pong (or connection establishment).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Total frames dropped for this peer.
    pub fn drop_count(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }
}
