//! Frame handlers.
//!
//! One free function per inbound frame type. Handlers talk to the store
//! and the broadcaster through their traits and never touch transport
//! state beyond the requesting peer's outbound queue; error replies and
//! timeouts are the dispatcher's job.

use std::sync::Arc;

use medrelay_core::{LogEntry, OutboundFrame};
use medrelay_store::{Result as StoreResult, StoreGateway, UpsertOutcome};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::websocket::{Broadcaster, PeerConnection};

/// `get_schedule`: fetch the stored schedule and reply to the requester
/// only. An unknown patient yields a `schedule` frame with a null body,
/// which clients render as "no schedule yet".
pub async fn get_schedule(
    store: &dyn StoreGateway,
    conn: &PeerConnection,
    patient_id: &str,
) -> StoreResult<()> {
    let schedule = store.find_schedule(patient_id).await?;
    if schedule.is_none() {
        debug!(patient_id, "no schedule on record");
    }
    reply(
        conn,
        &OutboundFrame::Schedule {
            schedule: schedule.unwrap_or(Value::Null),
        },
    );
    Ok(())
}

/// `log_event`: append the dose event, then announce it to every peer.
/// The log is append-only and independent of the schedules collection;
/// events are accepted for patients with no stored schedule.
pub async fn log_event(
    store: &dyn StoreGateway,
    broadcaster: &dyn Broadcaster,
    entry: LogEntry,
) -> StoreResult<()> {
    store.append_log(&entry).await?;
    info!(patient_id = %entry.patient_id, status = %entry.status, "dose event logged");
    broadcaster.broadcast(&OutboundFrame::NewLog { log: entry }).await;
    Ok(())
}

/// `update_schedule`: write the full replacement schedule, then announce
/// it to every peer. The broadcast fires even when the write was a
/// no-op, so a retried update still resynchronizes late-joining clients.
pub async fn update_schedule(
    store: &dyn StoreGateway,
    broadcaster: &dyn Broadcaster,
    patient_id: String,
    schedule: Value,
) -> StoreResult<()> {
    let outcome = store.upsert_schedule(&patient_id, &schedule).await?;
    match outcome {
        UpsertOutcome::Created => info!(%patient_id, "schedule created"),
        UpsertOutcome::Updated => info!(%patient_id, "schedule replaced"),
        UpsertOutcome::Unchanged => debug!(%patient_id, "schedule unchanged"),
    }
    broadcaster
        .broadcast(&OutboundFrame::ScheduleUpdate {
            patient_id,
            schedule,
        })
        .await;
    Ok(())
}

/// Enqueue a frame for the requesting peer only.
fn reply(conn: &PeerConnection, frame: &OutboundFrame) {
    match frame.to_json() {
        Ok(json) => {
            if !conn.send(Arc::new(json)) {
                warn!(conn_id = %conn.id, frame_type = frame.frame_type(), "failed to enqueue reply");
            }
        }
        Err(e) => warn!(error = %e, "failed to serialize reply frame"),
    }
}
