//! Data Transfer Objects for REST request/response serialization.
//!
//! Every `/api/v1` response is wrapped in the [`ApiResponse`] envelope
//! so UI collaborators can render success and failure uniformly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::persistence::{SessionRow, SessionStatus};

/// Uniform success envelope: `{"success": true, "data": ...}`.
///
/// The failure counterpart is produced by
/// [`crate::error::BridgeError`]'s `IntoResponse` implementation.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Always `true`; failures render through the error envelope.
    pub success: bool,
    /// Operation result.
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Wraps a payload in the success envelope.
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Request body for `POST /api/v1/sessions`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Patient the session is for.
    pub patient_id: String,
    /// Supervising clinician.
    pub doctor_id: String,
    /// Therapy game to launch on the device.
    pub game_id: String,
    /// Optional initial notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request body for `POST /api/v1/sessions/{id}/end`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionRequest {
    /// Free-form completion summary, persisted as session notes.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub summary: Option<serde_json::Value>,
}

/// Session representation returned by the REST surface.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionDto {
    /// Session ID.
    pub id: String,
    /// Patient the session belongs to.
    pub patient_id: String,
    /// Supervising clinician.
    pub doctor_id: String,
    /// Therapy game.
    pub game_id: String,
    /// Lifecycle status (`ACTIVE` / `COMPLETED`).
    #[schema(value_type = String, example = "ACTIVE")]
    pub status: SessionStatus,
    /// Session start time.
    pub start_time: DateTime<Utc>,
    /// Session end time, once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Duration in seconds, once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
    /// Session notes / completion summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl From<SessionRow> for SessionDto {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            patient_id: row.patient_id,
            doctor_id: row.doctor_id,
            game_id: row.game_id,
            status: row.status,
            start_time: row.start_time,
            end_time: row.end_time,
            duration_secs: row.duration_secs,
            notes: row.notes,
        }
    }
}

/// Device client tuning advertised through the status endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientSettingsDto {
    /// Seconds between server pings.
    pub ping_interval_secs: u64,
    /// Seconds a client should wait for a pong.
    pub pong_timeout_secs: u64,
    /// Suggested reconnect attempts.
    pub reconnect_attempts: u32,
    /// Suggested delay between reconnect attempts, in milliseconds.
    pub reconnect_delay_ms: u64,
    /// Maximum frames per batched send.
    pub max_batch_size: u32,
    /// Suggested batch flush interval, in milliseconds.
    pub send_interval_ms: u64,
    /// Maximum client-side outbound queue size.
    pub max_queue_size: u32,
}

/// Bridge status snapshot returned by `GET /api/v1/status`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusDto {
    /// Number of connected device clients.
    pub connected_clients: usize,
    /// Last observed remote store connectivity.
    pub is_online: bool,
    /// Operations waiting in the sync queue.
    pub sync_queue_len: i64,
    /// Scoring tasks currently in flight.
    pub scoring_in_flight: usize,
    /// Bridge version.
    pub version: String,
    /// Tuning parameters for device clients.
    pub client_settings: ClientSettingsDto,
}
