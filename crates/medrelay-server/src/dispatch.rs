//! Message dispatch.
//!
//! One inbound text frame at a time, per connection: the session loop
//! awaits [`Dispatcher::dispatch`] before reading the peer's next frame,
//! so a device's messages are handled strictly in arrival order. Frames
//! from different connections interleave freely.
//!
//! Every failure is caught here, at the task boundary. Nothing that goes
//! wrong while handling a frame — bad JSON, an unknown operation, a
//! store rejection, a hung handler — ever closes the peer's connection.

use std::sync::Arc;
use std::time::Duration;

use medrelay_core::{errors as codes, FrameError, InboundFrame, OutboundFrame};
use medrelay_store::StoreGateway;
use tracing::{error, instrument, warn};

use crate::handlers;
use crate::websocket::{Broadcaster, PeerConnection};

/// Maximum time a single handler is allowed to run.
const HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

/// Routes parsed frames to their handlers.
pub struct Dispatcher {
    store: Arc<dyn StoreGateway>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl Dispatcher {
    /// Create a dispatcher over the given store and broadcaster.
    pub fn new(store: Arc<dyn StoreGateway>, broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self { store, broadcaster }
    }

    /// Handle one raw text frame from `conn`.
    #[instrument(skip_all, fields(conn_id = %conn.id, frame_type = tracing::field::Empty))]
    pub async fn dispatch(&self, raw: &str, conn: &PeerConnection) {
        let frame = match InboundFrame::parse(raw) {
            Ok(frame) => frame,
            Err(err) if err.warrants_reply() => {
                warn!(%err, "rejecting invalid frame");
                send_error(conn, codes::MISSING_FIELD, err.to_string());
                return;
            }
            Err(err) => {
                // Malformed, no discriminant, or unknown type: dropped
                // with no outbound traffic of any kind
                warn!(%err, "dropping undispatchable frame");
                return;
            }
        };

        let _ = tracing::Span::current().record("frame_type", frame.frame_type());

        match tokio::time::timeout(HANDLER_TIMEOUT, self.run(frame, conn)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!(%err, "store operation failed");
                // Full error stays in the log; the peer gets a generic code
                send_error(conn, codes::STORE_ERROR, "store operation failed");
            }
            Err(_elapsed) => {
                error!("handler timed out after {HANDLER_TIMEOUT:?}");
                send_error(conn, codes::INTERNAL_ERROR, "handler timed out");
            }
        }
    }

    async fn run(
        &self,
        frame: InboundFrame,
        conn: &PeerConnection,
    ) -> Result<(), medrelay_store::StoreError> {
        match frame {
            InboundFrame::GetSchedule { patient_id } => {
                handlers::get_schedule(self.store.as_ref(), conn, &patient_id).await
            }
            InboundFrame::LogEvent { entry } => {
                handlers::log_event(self.store.as_ref(), self.broadcaster.as_ref(), entry).await
            }
            InboundFrame::UpdateSchedule {
                patient_id,
                schedule,
            } => {
                handlers::update_schedule(
                    self.store.as_ref(),
                    self.broadcaster.as_ref(),
                    patient_id,
                    schedule,
                )
                .await
            }
        }
    }
}

fn send_error(conn: &PeerConnection, code: &str, message: impl Into<String>) {
    let frame = OutboundFrame::error(code, message);
    match frame.to_json() {
        Ok(json) => {
            if !conn.send(Arc::new(json)) {
                warn!(conn_id = %conn.id, "failed to enqueue error frame");
            }
        }
        Err(e) => error!(error = %e, "failed to serialize error frame"),
    }
}
