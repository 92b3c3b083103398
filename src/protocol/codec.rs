//! Inbound frame parsing and validation.
//!
//! Validation is synchronous and completes before any side effect: a
//! frame either deserializes into a [`ClientFrame`], survives as
//! [`Frame::Unknown`] (structurally valid JSON with an unrecognized
//! `type`), or fails with [`BridgeError::MalformedMessage`]. No state is
//! mutated on invalid input.

use super::messages::ClientFrame;
use crate::error::BridgeError;

/// Message types the bridge accepts from device clients.
const CLIENT_VOCABULARY: [&str; 4] = ["SESSION_START", "VR_DATA", "SESSION_END", "HEARTBEAT"];

/// Outcome of parsing a structurally valid frame.
#[derive(Debug, Clone)]
pub enum Frame {
    /// A frame from the fixed vocabulary.
    Known(ClientFrame),
    /// Valid JSON with a `type` outside the vocabulary. The session
    /// bridge answers with an ERROR reply echoing the offending type;
    /// the connection is not closed.
    Unknown {
        /// The unrecognized `type` value.
        message_type: String,
    },
}

/// Parses and validates one raw text frame.
///
/// With `strict` set, VR_DATA frames carrying an empty `sessionId` are
/// rejected as malformed; the default permissive mode defers session
/// validity entirely to the ingest pipeline and the store.
///
/// # Errors
///
/// Returns [`BridgeError::MalformedMessage`] when the frame is not valid
/// JSON, lacks a non-empty string `type` field, or names a known type
/// but fails to deserialize into it.
pub fn parse(raw: &str, strict: bool) -> Result<Frame, BridgeError> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| BridgeError::MalformedMessage(format!("invalid JSON: {e}")))?;

    let message_type = match value.get("type").and_then(|t| t.as_str()) {
        Some(t) if !t.is_empty() => t.to_string(),
        Some(_) => {
            return Err(BridgeError::MalformedMessage(
                "message type is empty".to_string(),
            ));
        }
        None => {
            return Err(BridgeError::MalformedMessage(
                "message type is required".to_string(),
            ));
        }
    };

    if !CLIENT_VOCABULARY.contains(&message_type.as_str()) {
        return Ok(Frame::Unknown { message_type });
    }

    let frame: ClientFrame = serde_json::from_value(value)
        .map_err(|e| BridgeError::MalformedMessage(format!("{message_type}: {e}")))?;

    if strict
        && let ClientFrame::VrData { session_id, .. } = &frame
        && session_id.is_empty()
    {
        return Err(BridgeError::MalformedMessage(
            "VR_DATA: sessionId is empty".to_string(),
        ));
    }

    Ok(Frame::Known(frame))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::VrDataType;

    #[test]
    fn invalid_json_is_malformed() {
        let result = parse("{not json", false);
        assert!(matches!(result, Err(BridgeError::MalformedMessage(_))));
    }

    #[test]
    fn missing_type_is_malformed() {
        let result = parse("{\"sessionId\":\"s1\"}", false);
        assert!(matches!(result, Err(BridgeError::MalformedMessage(_))));
    }

    #[test]
    fn empty_type_is_malformed() {
        let result = parse("{\"type\":\"\"}", false);
        assert!(matches!(result, Err(BridgeError::MalformedMessage(_))));
    }

    #[test]
    fn non_string_type_is_malformed() {
        let result = parse("{\"type\":42}", false);
        assert!(matches!(result, Err(BridgeError::MalformedMessage(_))));
    }

    #[test]
    fn unknown_type_survives_parsing() {
        let result = parse("{\"type\":\"TELEPORT\",\"x\":1}", false);
        let Ok(Frame::Unknown { message_type }) = result else {
            panic!("expected unknown frame");
        };
        assert_eq!(message_type, "TELEPORT");
    }

    #[test]
    fn session_start_parses() {
        let raw = "{\"type\":\"SESSION_START\",\"sessionId\":\"s1\",\"patientId\":\"p1\",\"gameId\":\"g1\"}";
        let result = parse(raw, false);
        let Ok(Frame::Known(ClientFrame::SessionStart {
            session_id,
            patient_id,
            ..
        })) = result
        else {
            panic!("expected SESSION_START");
        };
        assert_eq!(session_id, "s1");
        assert_eq!(patient_id.as_deref(), Some("p1"));
    }

    #[test]
    fn vr_data_parses() {
        let raw = "{\"type\":\"VR_DATA\",\"sessionId\":\"s1\",\
                   \"timestamp\":\"2025-03-01T10:00:00Z\",\
                   \"dataType\":\"MOVEMENT\",\"data\":{\"x\":0.5}}";
        let result = parse(raw, false);
        let Ok(Frame::Known(ClientFrame::VrData { data_type, .. })) = result else {
            panic!("expected VR_DATA");
        };
        assert_eq!(data_type, VrDataType::Movement);
    }

    #[test]
    fn vr_data_missing_fields_is_malformed() {
        let raw = "{\"type\":\"VR_DATA\",\"sessionId\":\"s1\"}";
        let result = parse(raw, false);
        assert!(matches!(result, Err(BridgeError::MalformedMessage(_))));
    }

    #[test]
    fn vr_data_bad_data_type_is_malformed() {
        let raw = "{\"type\":\"VR_DATA\",\"sessionId\":\"s1\",\
                   \"timestamp\":\"2025-03-01T10:00:00Z\",\
                   \"dataType\":\"TELEPATHY\",\"data\":{}}";
        let result = parse(raw, false);
        assert!(matches!(result, Err(BridgeError::MalformedMessage(_))));
    }

    #[test]
    fn strict_mode_rejects_empty_session_id() {
        let raw = "{\"type\":\"VR_DATA\",\"sessionId\":\"\",\
                   \"timestamp\":\"2025-03-01T10:00:00Z\",\
                   \"dataType\":\"GAZE\",\"data\":{}}";
        assert!(matches!(parse(raw, false), Ok(Frame::Known(_))));
        assert!(matches!(
            parse(raw, true),
            Err(BridgeError::MalformedMessage(_))
        ));
    }

    #[test]
    fn session_end_defaults_optional_fields() {
        let raw = "{\"type\":\"SESSION_END\",\"sessionId\":\"s1\"}";
        let result = parse(raw, false);
        let Ok(Frame::Known(ClientFrame::SessionEnd {
            duration, summary, ..
        })) = result
        else {
            panic!("expected SESSION_END");
        };
        assert!(duration.is_none());
        assert!(summary.is_none());
    }

    #[test]
    fn heartbeat_parses_without_timestamp() {
        let result = parse("{\"type\":\"HEARTBEAT\"}", false);
        assert!(matches!(
            result,
            Ok(Frame::Known(ClientFrame::Heartbeat { .. }))
        ));
    }
}
