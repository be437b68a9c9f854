//! Broadcast fan-out.
//!
//! Broadcasts are unaddressed: every open peer gets every state-change
//! frame, sender included. That is the simplest correct topology for a
//! deployment of a handful of devices and dashboards; the [`Broadcaster`]
//! trait is the seam where a per-patient subscription fan-out could be
//! slotted in without touching the handlers.

use std::sync::Arc;

use async_trait::async_trait;
use medrelay_core::OutboundFrame;
use tracing::{debug, warn};

use super::registry::ConnectionRegistry;

/// Delivers an outbound frame to interested peers.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Deliver `frame` to every open connection. Fire-and-forget: no
    /// queuing for absent peers, no retry, and one peer's failure never
    /// blocks delivery to the rest.
    async fn broadcast(&self, frame: &OutboundFrame);
}

/// The all-peers fan-out over the connection registry.
pub struct FanoutBroadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl FanoutBroadcaster {
    /// Create a broadcaster reading membership from `registry`.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Broadcaster for FanoutBroadcaster {
    async fn broadcast(&self, frame: &OutboundFrame) {
        let json = match frame.to_json() {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(frame_type = frame.frame_type(), error = %e, "failed to serialize broadcast frame");
                return;
            }
        };

        // Snapshot under the read lock, deliver after releasing it — a
        // slow pass must not block registry mutation
        let peers = self.registry.snapshot().await;

        let mut delivered = 0_usize;
        let mut skipped = 0_usize;
        let mut failed = 0_usize;
        for peer in &peers {
            if !peer.is_open() {
                skipped += 1;
                continue;
            }
            if peer.send(json.clone()) {
                delivered += 1;
            } else {
                failed += 1;
                warn!(conn_id = %peer.id, "broadcast enqueue failed");
            }
        }

        debug!(
            frame_type = frame.frame_type(),
            delivered, skipped, failed, "broadcast pass complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medrelay_core::{ConnectionId, LogEntry};
    use serde_json::json;
    use tokio::sync::mpsc;

    use crate::websocket::connection::PeerConnection;

    fn make_peer(queue: usize) -> (Arc<PeerConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(queue);
        (Arc::new(PeerConnection::new(ConnectionId::new(), tx)), rx)
    }

    fn update_frame() -> OutboundFrame {
        OutboundFrame::ScheduleUpdate {
            patient_id: "p1".into(),
            schedule: json!([{"time": "08:00"}]),
        }
    }

    async fn setup() -> (Arc<ConnectionRegistry>, FanoutBroadcaster) {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = FanoutBroadcaster::new(registry.clone());
        (registry, broadcaster)
    }

    #[tokio::test]
    async fn reaches_every_open_peer() {
        let (registry, broadcaster) = setup().await;
        let (a, mut rx_a) = make_peer(8);
        let (b, mut rx_b) = make_peer(8);
        registry.add(a).await;
        registry.add(b).await;

        broadcaster.broadcast(&update_frame()).await;

        for rx in [&mut rx_a, &mut rx_b] {
            let frame = rx.try_recv().expect("peer should have received");
            let parsed: serde_json::Value = serde_json::from_str(&frame).unwrap();
            assert_eq!(parsed["type"], "schedule_update");
            assert_eq!(parsed["patient_id"], "p1");
        }
    }

    #[tokio::test]
    async fn skips_closed_peers_without_affecting_others() {
        let (registry, broadcaster) = setup().await;
        let (open, mut rx_open) = make_peer(8);
        let (closed, rx_closed) = make_peer(8);
        registry.add(open).await;
        registry.add(closed).await;
        drop(rx_closed); // peer went away mid-flight

        broadcaster.broadcast(&update_frame()).await;

        assert!(rx_open.try_recv().is_ok());
    }

    #[tokio::test]
    async fn full_queue_does_not_block_remaining_peers() {
        let (registry, broadcaster) = setup().await;
        let (slow, _rx_slow) = make_peer(1);
        let (fast, mut rx_fast) = make_peer(8);
        // Saturate the slow peer's queue
        assert!(slow.send(Arc::new("stuck".into())));
        registry.add(slow.clone()).await;
        registry.add(fast).await;

        broadcaster.broadcast(&update_frame()).await;

        assert!(rx_fast.try_recv().is_ok());
        assert_eq!(slow.drop_count(), 1);
    }

    #[tokio::test]
    async fn empty_registry_is_a_no_op() {
        let (_registry, broadcaster) = setup().await;
        broadcaster.broadcast(&update_frame()).await;
    }

    #[tokio::test]
    async fn sender_is_included_in_fanout() {
        // No addressing: the peer that triggered the change hears it too
        let (registry, broadcaster) = setup().await;
        let (sender, mut rx) = make_peer(8);
        registry.add(sender).await;

        broadcaster
            .broadcast(&OutboundFrame::NewLog {
                log: LogEntry {
                    patient_id: "p1".into(),
                    time_taken: "08:00".into(),
                    status: "taken".into(),
                },
            })
            .await;

        let frame = rx.try_recv().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(parsed["type"], "new_log");
        assert_eq!(parsed["log"]["status"], "taken");
    }

    #[tokio::test]
    async fn peers_share_one_serialization() {
        let (registry, broadcaster) = setup().await;
        let (a, mut rx_a) = make_peer(8);
        let (b, mut rx_b) = make_peer(8);
        registry.add(a).await;
        registry.add(b).await;

        broadcaster.broadcast(&update_frame()).await;

        let frame_a = rx_a.try_recv().unwrap();
        let frame_b = rx_b.try_recv().unwrap();
        assert!(Arc::ptr_eq(&frame_a, &frame_b));
    }
}
