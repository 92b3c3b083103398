//! UI notification events.
//!
//! Every observable state change on the bridge publishes a [`UiEvent`]
//! through the [`super::EventBus`]. Events are pushed one-way to UI
//! subscribers over the `/ws/ui` feed; no acknowledgment is expected.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ConnectionId, VrDataType};

/// What changed about a therapy session.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionUpdateKind {
    /// A session was created or a device bound to it.
    SessionStarted,
    /// A session was completed.
    SessionEnded,
}

/// Notification event pushed to the UI collaborator.
///
/// The `event` tag carries the channel name the UI listens on
/// (`unity-connected`, `vr-data-received`, ...).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum UiEvent {
    /// A VR device client connected.
    UnityConnected {
        /// Registry-assigned connection ID.
        client_id: ConnectionId,
        /// When the socket was accepted.
        timestamp: DateTime<Utc>,
    },

    /// A VR device client disconnected or was evicted.
    UnityDisconnected {
        /// Registry-assigned connection ID.
        client_id: ConnectionId,
        /// Session the connection was bound to, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        /// When the disconnect was observed.
        timestamp: DateTime<Utc>,
    },

    /// A raw sensor frame was received and persisted.
    VrDataReceived {
        /// Session the frame belongs to.
        session_id: String,
        /// Device-side capture timestamp.
        timestamp: DateTime<Utc>,
        /// Sensor data category.
        data_type: VrDataType,
        /// Opaque frame payload.
        data: serde_json::Value,
    },

    /// Scoring completed for a sensor frame.
    VrDataProcessed {
        /// Session the frame belongs to.
        session_id: String,
        /// When scoring completed.
        timestamp: DateTime<Utc>,
        /// Progress score from the analysis (0.0–10.0).
        score: f64,
        /// Full serialized analysis result.
        analysis: serde_json::Value,
    },

    /// A session lifecycle transition occurred.
    SessionUpdate {
        /// Whether the session started or ended.
        kind: SessionUpdateKind,
        /// Affected session ID.
        session_id: String,
        /// Transition-specific payload (start request, end summary).
        data: serde_json::Value,
    },
}

impl UiEvent {
    /// Returns the UI channel name for this event.
    #[must_use]
    pub const fn channel(&self) -> &'static str {
        match self {
            Self::UnityConnected { .. } => "unity-connected",
            Self::UnityDisconnected { .. } => "unity-disconnected",
            Self::VrDataReceived { .. } => "vr-data-received",
            Self::VrDataProcessed { .. } => "vr-data-processed",
            Self::SessionUpdate { .. } => "session-update",
        }
    }

    /// Returns the session ID the event refers to, if it has one.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::UnityConnected { .. } => None,
            Self::UnityDisconnected { session_id, .. } => session_id.as_deref(),
            Self::VrDataReceived { session_id, .. }
            | Self::VrDataProcessed { session_id, .. }
            | Self::SessionUpdate { session_id, .. } => Some(session_id),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn channel_names_match_ui_contract() {
        let connected = UiEvent::UnityConnected {
            client_id: ConnectionId::new(),
            timestamp: Utc::now(),
        };
        assert_eq!(connected.channel(), "unity-connected");

        let processed = UiEvent::VrDataProcessed {
            session_id: "s1".to_string(),
            timestamp: Utc::now(),
            score: 6.2,
            analysis: serde_json::json!({}),
        };
        assert_eq!(processed.channel(), "vr-data-processed");
    }

    #[test]
    fn event_tag_is_kebab_case() {
        let event = UiEvent::VrDataReceived {
            session_id: "s1".to_string(),
            timestamp: Utc::now(),
            data_type: VrDataType::Gaze,
            data: serde_json::json!({"x": 1}),
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("\"event\":\"vr-data-received\""));
        assert!(json.contains("\"sessionId\":\"s1\""));
        assert!(json.contains("\"GAZE\""));
    }

    #[test]
    fn session_id_accessor() {
        let event = UiEvent::SessionUpdate {
            kind: SessionUpdateKind::SessionEnded,
            session_id: "s9".to_string(),
            data: serde_json::json!(null),
        };
        assert_eq!(event.session_id(), Some("s9"));

        let event = UiEvent::UnityConnected {
            client_id: ConnectionId::new(),
            timestamp: Utc::now(),
        };
        assert_eq!(event.session_id(), None);
    }
}
