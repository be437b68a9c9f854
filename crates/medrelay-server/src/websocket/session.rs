//! Per-connection session lifecycle.
//!
//! Each upgraded socket gets two halves: an outbound writer task that
//! drains the peer's queue and drives the heartbeat, and the inbound
//! loop below that feeds frames to the dispatcher one at a time. The
//! inbound loop never reads the next frame until the previous one has
//! been fully handled, which is what keeps a single device's messages
//! in arrival order.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use medrelay_core::ConnectionId;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::server::AppState;
use crate::websocket::PeerConnection;

/// Drive one `WebSocket` session to completion.
///
/// Registers the peer, runs until the peer hangs up, errors, or the
/// server shuts down, then deregisters it. Frame-level failures are
/// absorbed by the dispatcher; only transport failures end the session.
pub async fn run_session(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (tx, mut outbound_rx) = mpsc::channel::<Arc<String>>(state.config.outbound_queue_size);
    let conn = Arc::new(PeerConnection::new(ConnectionId::new(), tx));
    state.registry.add(conn.clone()).await;
    info!(conn_id = %conn.id, peers = state.registry.len(), "peer connected");

    let ping_interval = Duration::from_secs(state.config.heartbeat_interval_secs);
    let pong_timeout = Duration::from_secs(state.config.heartbeat_timeout_secs);

    // Writer task: owns the sink half. Queue drain and heartbeat share
    // it so pings and frames never interleave mid-write.
    let heartbeat_conn = conn.clone();
    let writer = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ping_interval);
        let _ = ticker.tick().await; // the first tick is immediate
        loop {
            tokio::select! {
                frame = outbound_rx.recv() => {
                    let Some(frame) = frame else { break };
                    if ws_tx.send(Message::Text(frame.to_string().into())).await.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if !heartbeat_conn.check_alive()
                        && heartbeat_conn.last_pong_elapsed() > pong_timeout
                    {
                        warn!(conn_id = %heartbeat_conn.id, "peer unresponsive, closing");
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                    if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let shutdown = state.shutdown.token();
    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        state.dispatcher.dispatch(text.as_str(), &conn).await;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        debug!(conn_id = %conn.id, "ignoring binary frame");
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        conn.mark_alive();
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(conn_id = %conn.id, error = %e, "transport error");
                        break;
                    }
                }
            }
            () = shutdown.cancelled() => {
                debug!(conn_id = %conn.id, "session closing on shutdown");
                break;
            }
        }
    }

    state.registry.remove(&conn.id).await;
    writer.abort();
    info!(
        conn_id = %conn.id,
        dropped_frames = conn.drop_count(),
        "peer disconnected"
    );
}
