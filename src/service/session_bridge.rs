//! Session lifecycle orchestration.
//!
//! [`SessionBridge`] maps device protocol events onto domain session
//! state and drives the UI-initiated lifecycle (create/end over REST).
//! Per connection the state machine is `Idle` → SESSION_START →
//! `Active` → SESSION_END → `Idle`, with HEARTBEAT as an acked
//! self-transition. VR_DATA is deliberately accepted whenever a frame
//! carries a session ID, regardless of the binding state; validity is
//! deferred to the ingest pipeline and the store.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use super::sync_manager::SyncManager;
use crate::domain::{ConnectionId, ConnectionRegistry, EventBus, SessionUpdateKind, UiEvent};
use crate::error::BridgeError;
use crate::persistence::{LocalStore, SessionRow, SessionStatus, SyncOpType};
use crate::protocol::ServerFrame;

/// Greeting sent in the ACK that opens every device connection.
const GREETING: &str = "Connected to NeuroBridge system";

/// Orchestrates session state across the registry, store, and UI bus.
#[derive(Debug)]
pub struct SessionBridge {
    registry: Arc<ConnectionRegistry>,
    store: LocalStore,
    sync: Arc<SyncManager>,
    event_bus: EventBus,
}

impl SessionBridge {
    /// Creates a new session bridge.
    #[must_use]
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        store: LocalStore,
        sync: Arc<SyncManager>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            registry,
            store,
            sync,
            event_bus,
        }
    }

    /// Registers a new device connection and returns its greeting ACK.
    pub async fn connection_opened(
        &self,
        sender: tokio::sync::mpsc::UnboundedSender<crate::domain::Outbound>,
    ) -> (ConnectionId, ServerFrame) {
        let id = self.registry.register(sender).await;
        tracing::info!(client_id = %id, "vr client connected");

        self.event_bus.publish(UiEvent::UnityConnected {
            client_id: id,
            timestamp: Utc::now(),
        });

        let greeting = ServerFrame::Ack {
            session_id: None,
            message: Some(GREETING.to_string()),
            timestamp: None,
        };
        (id, greeting)
    }

    /// Removes a device connection and notifies the UI.
    ///
    /// The session row is untouched: a session outlives its socket and
    /// can be resumed or completed later.
    pub async fn connection_closed(&self, id: ConnectionId) {
        if let Some(gone) = self.registry.unregister(id).await {
            tracing::info!(client_id = %id, "vr client disconnected");
            self.event_bus.publish(UiEvent::UnityDisconnected {
                client_id: gone.id,
                session_id: gone.session_id,
                timestamp: Utc::now(),
            });
        }
    }

    /// Handles an inbound SESSION_START: binds the connection and acks.
    pub async fn session_started(
        &self,
        conn_id: ConnectionId,
        session_id: &str,
        details: serde_json::Value,
    ) -> ServerFrame {
        tracing::info!(%conn_id, session_id, "session starting");
        self.registry.bind_session(conn_id, session_id).await;

        self.event_bus.publish(UiEvent::SessionUpdate {
            kind: SessionUpdateKind::SessionStarted,
            session_id: session_id.to_string(),
            data: details,
        });

        ServerFrame::ack_session(session_id, "Session started successfully")
    }

    /// Handles an inbound SESSION_END: persists completion and acks.
    ///
    /// Duration is computed from the stored session start when the row
    /// exists; the client-reported duration is the fallback. A session
    /// unknown to the local store is still acked — it may live only on
    /// the remote side.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError::PersistenceFailure`] when the completion
    /// cannot be written; the connection surfaces it as an ERROR frame.
    pub async fn session_ended(
        &self,
        conn_id: ConnectionId,
        session_id: &str,
        reported_duration: Option<i64>,
        summary: Option<&serde_json::Value>,
    ) -> Result<ServerFrame, BridgeError> {
        tracing::info!(%conn_id, session_id, "session ending");

        let rows = self
            .complete_session(session_id, reported_duration, summary)
            .await?;
        if rows == 0 {
            tracing::warn!(session_id, "SESSION_END for session not in local store");
        }

        self.registry.clear_binding(conn_id).await;
        Ok(ServerFrame::ack_session(
            session_id,
            "Session ended successfully",
        ))
    }

    /// Builds the ERROR reply for a structurally valid frame whose
    /// `type` is outside the protocol vocabulary. The connection stays
    /// open.
    #[must_use]
    pub fn reject_unknown(&self, message_type: &str) -> ServerFrame {
        let err = BridgeError::UnknownMessageType(message_type.to_string());
        tracing::warn!(message_type, "unknown message type");
        ServerFrame::error(err.to_string(), Some(err.error_code()))
    }

    /// Creates a session from the clinician UI and instructs connected
    /// devices to begin.
    ///
    /// Persists an ACTIVE row locally, queues the remote INSERT, and
    /// broadcasts a SESSION_START frame to every device client.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError::PersistenceFailure`] when the session
    /// row cannot be stored.
    pub async fn create_session(
        &self,
        patient_id: &str,
        doctor_id: &str,
        game_id: &str,
        notes: Option<String>,
    ) -> Result<SessionRow, BridgeError> {
        let now = Utc::now();
        let row = SessionRow {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id: patient_id.to_string(),
            doctor_id: doctor_id.to_string(),
            game_id: game_id.to_string(),
            status: SessionStatus::Active,
            start_time: now,
            end_time: None,
            duration_secs: None,
            notes,
            created_at: now,
        };
        self.store.insert_session(&row).await?;

        if let Err(e) = self
            .sync
            .enqueue(
                SyncOpType::Insert,
                "therapy_sessions",
                None,
                serde_json::to_value(&row).unwrap_or_default(),
            )
            .await
        {
            tracing::warn!(session_id = %row.id, error = %e, "failed to queue session for sync");
        }

        let broadcast = ServerFrame::SessionStart {
            session_id: row.id.clone(),
            patient_id: row.patient_id.clone(),
            doctor_id: row.doctor_id.clone(),
            game_id: row.game_id.clone(),
        };
        let delivered = self.registry.broadcast_text(&broadcast.to_json()).await;
        tracing::info!(session_id = %row.id, delivered, "session created");

        self.event_bus.publish(UiEvent::SessionUpdate {
            kind: SessionUpdateKind::SessionStarted,
            session_id: row.id.clone(),
            data: serde_json::to_value(&row).unwrap_or_default(),
        });

        Ok(row)
    }

    /// Ends a session from the clinician UI.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::SessionNotFound`] when the session is not
    /// in the local store, or a [`BridgeError::PersistenceFailure`] when
    /// the completion cannot be written.
    pub async fn end_session(
        &self,
        session_id: &str,
        summary: Option<&serde_json::Value>,
    ) -> Result<SessionRow, BridgeError> {
        let rows = self.complete_session(session_id, None, summary).await?;
        if rows == 0 {
            return Err(BridgeError::SessionNotFound(session_id.to_string()));
        }

        let cleared = self.registry.clear_binding_for_session(session_id).await;
        if !cleared.is_empty() {
            tracing::debug!(session_id, connections = cleared.len(), "bindings cleared");
        }

        self.store
            .get_session(session_id)
            .await?
            .ok_or_else(|| BridgeError::SessionNotFound(session_id.to_string()))
    }

    /// Loads a session row for the REST surface.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::SessionNotFound`] when absent, or a
    /// [`BridgeError::PersistenceFailure`] on database failure.
    pub async fn get_session(&self, session_id: &str) -> Result<SessionRow, BridgeError> {
        self.store
            .get_session(session_id)
            .await?
            .ok_or_else(|| BridgeError::SessionNotFound(session_id.to_string()))
    }

    /// Shared completion path for the WS and REST session-end flows.
    ///
    /// Returns the number of local rows updated.
    async fn complete_session(
        &self,
        session_id: &str,
        reported_duration: Option<i64>,
        summary: Option<&serde_json::Value>,
    ) -> Result<u64, BridgeError> {
        let existing = self.store.get_session(session_id).await?;
        let end_time = Utc::now();
        let duration_secs = existing
            .as_ref()
            .map(|row| (end_time - row.start_time).num_seconds())
            .or(reported_duration);
        let notes = summary.map(std::string::ToString::to_string);

        let rows = self
            .store
            .complete_session(session_id, end_time, duration_secs, notes.as_deref())
            .await?;

        if let Err(e) = self
            .sync
            .enqueue(
                SyncOpType::Update,
                "therapy_sessions",
                Some(session_id.to_string()),
                json!({
                    "status": SessionStatus::Completed.as_str(),
                    "endTime": end_time.to_rfc3339(),
                    "duration": duration_secs,
                    "notes": notes,
                }),
            )
            .await
        {
            tracing::warn!(session_id, error = %e, "failed to queue session update for sync");
        }

        self.event_bus.publish(UiEvent::SessionUpdate {
            kind: SessionUpdateKind::SessionEnded,
            session_id: session_id.to_string(),
            data: summary.cloned().unwrap_or(serde_json::Value::Null),
        });

        Ok(rows)
    }
}
