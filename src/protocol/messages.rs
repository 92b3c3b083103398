//! Device protocol frames: inbound commands and outbound replies.
//!
//! Frames are JSON text messages with a SCREAMING_SNAKE `type`
//! discriminator and camelCase fields, e.g.
//! `{"type":"VR_DATA","sessionId":"s1","dataType":"MOVEMENT",...}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::VrDataType;

/// Frames a VR device client sends to the bridge.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// Device reports that it started (or re-bound to) a session.
    #[serde(rename = "SESSION_START", rename_all = "camelCase")]
    SessionStart {
        /// Session the device is binding to.
        session_id: String,
        /// Patient the session belongs to.
        #[serde(default)]
        patient_id: Option<String>,
        /// Supervising clinician.
        #[serde(default)]
        doctor_id: Option<String>,
        /// Therapy game being played.
        #[serde(default)]
        game_id: Option<String>,
    },

    /// One streamed sensor data frame.
    #[serde(rename = "VR_DATA", rename_all = "camelCase")]
    VrData {
        /// Session the frame belongs to.
        session_id: String,
        /// Device-side capture timestamp.
        timestamp: DateTime<Utc>,
        /// Sensor data category.
        data_type: VrDataType,
        /// Opaque structured payload.
        data: serde_json::Value,
    },

    /// Session completion report.
    #[serde(rename = "SESSION_END", rename_all = "camelCase")]
    SessionEnd {
        /// Session being completed.
        session_id: String,
        /// Client-measured duration in seconds; the bridge prefers the
        /// duration computed from the stored session start.
        #[serde(default)]
        duration: Option<i64>,
        /// Free-form session summary persisted as notes.
        #[serde(default)]
        summary: Option<serde_json::Value>,
    },

    /// Application-level liveness probe; answered with an ACK.
    #[serde(rename = "HEARTBEAT", rename_all = "camelCase")]
    Heartbeat {
        /// Client-side send timestamp.
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
}

impl ClientFrame {
    /// Returns the frame's wire-format type string.
    #[must_use]
    pub const fn type_str(&self) -> &'static str {
        match self {
            Self::SessionStart { .. } => "SESSION_START",
            Self::VrData { .. } => "VR_DATA",
            Self::SessionEnd { .. } => "SESSION_END",
            Self::Heartbeat { .. } => "HEARTBEAT",
        }
    }
}

/// Frames the bridge sends to a VR device client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    /// Positive acknowledgment.
    #[serde(rename = "ACK", rename_all = "camelCase")]
    Ack {
        /// Session the ack refers to, when contextual.
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        /// Human-readable context.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        /// Server timestamp, included for heartbeat acks.
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },

    /// Negative acknowledgment; the connection stays open.
    #[serde(rename = "ERROR", rename_all = "camelCase")]
    Error {
        /// What went wrong.
        message: String,
        /// Numeric error code, when one applies.
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<u32>,
    },

    /// Instructs connected devices to bind and begin a session.
    /// Broadcast when a session is created from the clinician UI.
    #[serde(rename = "SESSION_START", rename_all = "camelCase")]
    SessionStart {
        /// Newly created session ID.
        session_id: String,
        /// Patient the session belongs to.
        patient_id: String,
        /// Supervising clinician.
        doctor_id: String,
        /// Therapy game to launch.
        game_id: String,
    },
}

impl ServerFrame {
    /// Builds an ACK referring to a session.
    #[must_use]
    pub fn ack_session(session_id: &str, message: &str) -> Self {
        Self::Ack {
            session_id: Some(session_id.to_string()),
            message: Some(message.to_string()),
            timestamp: None,
        }
    }

    /// Builds the heartbeat ACK with the current server time.
    #[must_use]
    pub fn ack_heartbeat() -> Self {
        Self::Ack {
            session_id: None,
            message: None,
            timestamp: Some(Utc::now()),
        }
    }

    /// Builds an ERROR reply.
    #[must_use]
    pub fn error(message: impl Into<String>, code: Option<u32>) -> Self {
        Self::Error {
            message: message.into(),
            code,
        }
    }

    /// Serializes the frame to its JSON wire format.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
