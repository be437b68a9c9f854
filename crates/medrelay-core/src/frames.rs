//! Wire-protocol frames.
//!
//! Every message is a single JSON object with a `type` discriminant.
//! Inbound frames are parsed in two stages: the envelope (JSON + `type`)
//! first, then each operation's declared required fields. The required
//! fields live in one table so every handler validates the same way —
//! no operation gets to skip presence checks.
//!
//! Schedule payloads are opaque to the relay: whatever JSON the dashboard
//! writes is what the devices read back. The core never inspects dose
//! times.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::FrameError;

/// One adherence log record, as carried on the wire and persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Patient the dose belongs to.
    pub patient_id: String,
    /// When the dose was (or should have been) taken. Timestamp-like,
    /// but not interpreted by the relay.
    pub time_taken: String,
    /// Adherence outcome (e.g. `taken`, `missed`). Opaque.
    pub status: String,
}

/// A parsed, validated inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundFrame {
    /// Request the stored schedule for one patient.
    GetSchedule {
        /// Patient whose schedule to fetch.
        patient_id: String,
    },
    /// Record an adherence event.
    LogEvent {
        /// The record to append.
        entry: LogEntry,
    },
    /// Replace (or create) a patient's schedule.
    UpdateSchedule {
        /// Patient whose schedule to write.
        patient_id: String,
        /// Opaque schedule payload.
        schedule: Value,
    },
}

/// Required fields per operation. Checked before any field is extracted,
/// in declaration order — the first absent field wins.
const REQUIRED_FIELDS: &[(&str, &[&str])] = &[
    ("get_schedule", &["patient_id"]),
    ("log_event", &["patient_id", "time_taken", "status"]),
    ("update_schedule", &["patient_id", "schedule"]),
];

impl InboundFrame {
    /// Parse one raw text message into a frame.
    pub fn parse(raw: &str) -> Result<Self, FrameError> {
        let body: Value = serde_json::from_str(raw).map_err(|e| FrameError::Malformed {
            message: e.to_string(),
        })?;

        let Some(frame_type) = body.get("type").and_then(Value::as_str) else {
            return Err(FrameError::MissingDiscriminant);
        };

        match frame_type {
            "get_schedule" => {
                check_required("get_schedule", &body)?;
                Ok(Self::GetSchedule {
                    patient_id: require_str(&body, "get_schedule", "patient_id")?.to_owned(),
                })
            }
            "log_event" => {
                check_required("log_event", &body)?;
                Ok(Self::LogEvent {
                    entry: LogEntry {
                        patient_id: require_str(&body, "log_event", "patient_id")?.to_owned(),
                        time_taken: require_str(&body, "log_event", "time_taken")?.to_owned(),
                        status: require_str(&body, "log_event", "status")?.to_owned(),
                    },
                })
            }
            "update_schedule" => {
                check_required("update_schedule", &body)?;
                Ok(Self::UpdateSchedule {
                    patient_id: require_str(&body, "update_schedule", "patient_id")?.to_owned(),
                    schedule: body
                        .get("schedule")
                        .cloned()
                        .unwrap_or(Value::Null),
                })
            }
            other => Err(FrameError::UnknownType(other.to_owned())),
        }
    }

    /// The wire discriminant for this frame.
    #[must_use]
    pub fn frame_type(&self) -> &'static str {
        match self {
            Self::GetSchedule { .. } => "get_schedule",
            Self::LogEvent { .. } => "log_event",
            Self::UpdateSchedule { .. } => "update_schedule",
        }
    }
}

/// Verify every declared required field is present and non-null.
fn check_required(frame_type: &'static str, body: &Value) -> Result<(), FrameError> {
    let fields = REQUIRED_FIELDS
        .iter()
        .find(|(t, _)| *t == frame_type)
        .map(|(_, f)| *f)
        .unwrap_or_default();
    for field in fields {
        match body.get(field) {
            None | Some(Value::Null) => {
                return Err(FrameError::MissingField { frame_type, field });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Extract a string field, treating a wrong-typed value like an absent one.
fn require_str<'a>(
    body: &'a Value,
    frame_type: &'static str,
    field: &'static str,
) -> Result<&'a str, FrameError> {
    body.get(field)
        .and_then(Value::as_str)
        .ok_or(FrameError::MissingField { frame_type, field })
}

/// A frame pushed to one or all peers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Reply to `get_schedule`, sent to the requester only. A `null`
    /// payload means no schedule is configured — distinct from no reply
    /// at all, which means something went wrong.
    Schedule {
        /// The stored payload, or `Value::Null`.
        schedule: Value,
    },
    /// Fan-out after a successful `log_event`.
    NewLog {
        /// The record that was just persisted.
        log: LogEntry,
    },
    /// Fan-out after a successful `update_schedule`.
    ScheduleUpdate {
        /// Patient whose schedule changed.
        patient_id: String,
        /// The new payload.
        schedule: Value,
    },
    /// Validation or store failure, sent to the requester only.
    Error {
        /// Machine-readable code (see [`crate::errors`]).
        code: String,
        /// Human-readable description.
        message: String,
    },
}

impl OutboundFrame {
    /// Build an error frame.
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_owned(),
            message: message.into(),
        }
    }

    /// The wire discriminant for this frame.
    #[must_use]
    pub fn frame_type(&self) -> &'static str {
        match self {
            Self::Schedule { .. } => "schedule",
            Self::NewLog { .. } => "new_log",
            Self::ScheduleUpdate { .. } => "schedule_update",
            Self::Error { .. } => "error",
        }
    }

    /// Serialize to the JSON text sent over the socket.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use serde_json::json;

    // ── Inbound parsing ─────────────────────────────────────────────

    #[test]
    fn parse_get_schedule() {
        let frame =
            InboundFrame::parse(r#"{"type":"get_schedule","patient_id":"p1"}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::GetSchedule {
                patient_id: "p1".into()
            }
        );
        assert_eq!(frame.frame_type(), "get_schedule");
    }

    #[test]
    fn parse_log_event() {
        let raw = r#"{"type":"log_event","patient_id":"p2","time_taken":"2026-08-31T08:00:00Z","status":"taken"}"#;
        let frame = InboundFrame::parse(raw).unwrap();
        assert_matches!(frame, InboundFrame::LogEvent { entry } => {
            assert_eq!(entry.patient_id, "p2");
            assert_eq!(entry.time_taken, "2026-08-31T08:00:00Z");
            assert_eq!(entry.status, "taken");
        });
    }

    #[test]
    fn parse_update_schedule_keeps_payload_opaque() {
        let raw = r#"{"type":"update_schedule","patient_id":"p3","schedule":[{"time":"08:00","dose":2}]}"#;
        let frame = InboundFrame::parse(raw).unwrap();
        assert_matches!(frame, InboundFrame::UpdateSchedule { patient_id, schedule } => {
            assert_eq!(patient_id, "p3");
            assert_eq!(schedule, json!([{"time":"08:00","dose":2}]));
        });
    }

    #[test]
    fn parse_rejects_non_json() {
        let err = InboundFrame::parse("definitely not json").unwrap_err();
        assert_matches!(err, FrameError::Malformed { .. });
    }

    #[test]
    fn parse_rejects_missing_discriminant() {
        let err = InboundFrame::parse(r#"{"patient_id":"p1"}"#).unwrap_err();
        assert_matches!(err, FrameError::MissingDiscriminant);
    }

    #[test]
    fn parse_rejects_non_string_discriminant() {
        let err = InboundFrame::parse(r#"{"type":42}"#).unwrap_err();
        assert_matches!(err, FrameError::MissingDiscriminant);
    }

    #[test]
    fn parse_rejects_non_object_json() {
        // Arrays and scalars have no `type` field to read
        assert_matches!(
            InboundFrame::parse("[1,2,3]").unwrap_err(),
            FrameError::MissingDiscriminant
        );
        assert_matches!(
            InboundFrame::parse("\"get_schedule\"").unwrap_err(),
            FrameError::MissingDiscriminant
        );
    }

    #[test]
    fn parse_rejects_unknown_type() {
        let err = InboundFrame::parse(r#"{"type":"delete_schedule","patient_id":"p1"}"#)
            .unwrap_err();
        assert_matches!(err, FrameError::UnknownType(t) => assert_eq!(t, "delete_schedule"));
    }

    #[test]
    fn get_schedule_requires_patient_id() {
        let err = InboundFrame::parse(r#"{"type":"get_schedule"}"#).unwrap_err();
        assert_matches!(
            err,
            FrameError::MissingField {
                frame_type: "get_schedule",
                field: "patient_id"
            }
        );
    }

    #[test]
    fn null_field_counts_as_missing() {
        let err =
            InboundFrame::parse(r#"{"type":"get_schedule","patient_id":null}"#).unwrap_err();
        assert_matches!(err, FrameError::MissingField { field: "patient_id", .. });
    }

    #[test]
    fn wrong_typed_field_counts_as_missing() {
        let err =
            InboundFrame::parse(r#"{"type":"get_schedule","patient_id":17}"#).unwrap_err();
        assert_matches!(err, FrameError::MissingField { field: "patient_id", .. });
    }

    #[test]
    fn log_event_reports_first_missing_field() {
        let err = InboundFrame::parse(r#"{"type":"log_event","patient_id":"p1"}"#).unwrap_err();
        assert_matches!(
            err,
            FrameError::MissingField {
                frame_type: "log_event",
                field: "time_taken"
            }
        );
    }

    #[test]
    fn log_event_requires_status() {
        let raw = r#"{"type":"log_event","patient_id":"p1","time_taken":"08:00"}"#;
        let err = InboundFrame::parse(raw).unwrap_err();
        assert_matches!(err, FrameError::MissingField { field: "status", .. });
    }

    #[test]
    fn update_schedule_requires_schedule() {
        let err = InboundFrame::parse(r#"{"type":"update_schedule","patient_id":"p1"}"#)
            .unwrap_err();
        assert_matches!(
            err,
            FrameError::MissingField {
                frame_type: "update_schedule",
                field: "schedule"
            }
        );
    }

    #[test]
    fn update_schedule_accepts_any_non_null_payload() {
        for payload in ["[]", "{}", "\"text\"", "123", "false"] {
            let raw = format!(
                r#"{{"type":"update_schedule","patient_id":"p1","schedule":{payload}}}"#
            );
            assert!(InboundFrame::parse(&raw).is_ok(), "payload {payload} rejected");
        }
    }

    #[test]
    fn extra_fields_are_ignored() {
        let raw = r#"{"type":"get_schedule","patient_id":"p1","firmware":"v2.1"}"#;
        assert!(InboundFrame::parse(raw).is_ok());
    }

    // ── Outbound serialization ──────────────────────────────────────

    #[test]
    fn schedule_frame_shape() {
        let frame = OutboundFrame::Schedule {
            schedule: json!([{"time": "08:00"}]),
        };
        let parsed: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(parsed["type"], "schedule");
        assert_eq!(parsed["schedule"][0]["time"], "08:00");
    }

    #[test]
    fn schedule_frame_null_payload_is_explicit() {
        let frame = OutboundFrame::Schedule {
            schedule: Value::Null,
        };
        let json = frame.to_json().unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        // The key must be present and null, not omitted
        assert!(parsed.as_object().unwrap().contains_key("schedule"));
        assert!(parsed["schedule"].is_null());
    }

    #[test]
    fn new_log_frame_nests_record() {
        let frame = OutboundFrame::NewLog {
            log: LogEntry {
                patient_id: "p1".into(),
                time_taken: "08:00".into(),
                status: "missed".into(),
            },
        };
        let parsed: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(parsed["type"], "new_log");
        assert_eq!(parsed["log"]["patient_id"], "p1");
        assert_eq!(parsed["log"]["status"], "missed");
    }

    #[test]
    fn schedule_update_frame_shape() {
        let frame = OutboundFrame::ScheduleUpdate {
            patient_id: "p1".into(),
            schedule: json!([{"time": "20:00"}]),
        };
        let parsed: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(parsed["type"], "schedule_update");
        assert_eq!(parsed["patient_id"], "p1");
        assert_eq!(parsed["schedule"][0]["time"], "20:00");
    }

    #[test]
    fn error_frame_shape() {
        let frame = OutboundFrame::error(crate::errors::MISSING_FIELD, "missing patient_id");
        let parsed: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(parsed["type"], "error");
        assert_eq!(parsed["code"], "MISSING_FIELD");
        assert_eq!(parsed["message"], "missing patient_id");
    }

    #[test]
    fn outbound_roundtrip() {
        let frame = OutboundFrame::ScheduleUpdate {
            patient_id: "p9".into(),
            schedule: json!({"slots": []}),
        };
        let back: OutboundFrame =
            serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(back, frame);
    }

    // ── Robustness ──────────────────────────────────────────────────

    proptest! {
        #[test]
        fn parse_never_panics(raw in "\\PC*") {
            let _ = InboundFrame::parse(&raw);
        }

        #[test]
        fn parse_arbitrary_objects_never_panics(
            fields in prop::collection::hash_map("[a-z_]{1,12}", "[ -~]{0,24}", 0..6)
        ) {
            let raw = serde_json::to_string(&fields).unwrap();
            let _ = InboundFrame::parse(&raw);
        }
    }
}
