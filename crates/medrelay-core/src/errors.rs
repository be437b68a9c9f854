//! Frame parse/validation errors and wire error codes.
//!
//! The four [`FrameError`] variants map onto distinct dispatch behaviors:
//! malformed frames, missing discriminants, and unknown types are dropped
//! with a log entry and produce no outbound traffic, while a missing
//! required field earns the requester an `error` frame. The distinction
//! matters — a peer speaking a newer protocol revision must not be spammed
//! with error frames for every message we can't parse.

use thiserror::Error;

// ── Wire error codes (sent in `error` frames) ───────────────────────

/// A required field was absent, null, or of the wrong type.
pub const MISSING_FIELD: &str = "MISSING_FIELD";
/// The store rejected the operation.
pub const STORE_ERROR: &str = "STORE_ERROR";
/// Handler timed out or failed unexpectedly.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// Why an inbound frame could not be turned into an [`crate::InboundFrame`].
#[derive(Debug, Error)]
pub enum FrameError {
    /// The message was not valid JSON.
    #[error("malformed frame: {message}")]
    Malformed {
        /// Parser diagnostic, logged but never sent to the peer.
        message: String,
    },

    /// The message parsed but carried no string `type` field.
    #[error("frame has no 'type' discriminant")]
    MissingDiscriminant,

    /// The discriminant named an operation we don't know.
    #[error("unknown frame type '{0}'")]
    UnknownType(String),

    /// A field the operation declares as required was absent, null, or
    /// of the wrong type.
    #[error("{frame_type} frame is missing required field '{field}'")]
    MissingField {
        /// Which operation rejected the frame.
        frame_type: &'static str,
        /// The offending field.
        field: &'static str,
    },
}

impl FrameError {
    /// Whether this error should be answered with an `error` frame.
    ///
    /// Only validation failures get a reply; everything else is dropped
    /// silently from the protocol's perspective.
    #[must_use]
    pub fn warrants_reply(&self) -> bool {
        matches!(self, Self::MissingField { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_display() {
        let err = FrameError::Malformed {
            message: "expected value at line 1".into(),
        };
        assert!(err.to_string().starts_with("malformed frame:"));
    }

    #[test]
    fn missing_field_display_names_frame_and_field() {
        let err = FrameError::MissingField {
            frame_type: "get_schedule",
            field: "patient_id",
        };
        assert_eq!(
            err.to_string(),
            "get_schedule frame is missing required field 'patient_id'"
        );
    }

    #[test]
    fn unknown_type_display() {
        let err = FrameError::UnknownType("drop_tables".into());
        assert_eq!(err.to_string(), "unknown frame type 'drop_tables'");
    }

    #[test]
    fn only_missing_field_warrants_reply() {
        assert!(
            FrameError::MissingField {
                frame_type: "log_event",
                field: "status",
            }
            .warrants_reply()
        );
        assert!(!FrameError::MissingDiscriminant.warrants_reply());
        assert!(!FrameError::UnknownType("x".into()).warrants_reply());
        assert!(
            !FrameError::Malformed {
                message: "bad".into()
            }
            .warrants_reply()
        );
    }
}
