//! Row types for the local store and the sync queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a therapy session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Session is running.
    Active,
    /// Session finished and its summary is persisted.
    Completed,
}

impl SessionStatus {
    /// Returns the stored string form (`"ACTIVE"` / `"COMPLETED"`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
        }
    }

    /// Parses the stored string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(Self::Active),
            "COMPLETED" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// A therapy session row from the `therapy_sessions` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRow {
    /// Session ID (UUID for locally created sessions).
    pub id: String,
    /// Patient the session belongs to.
    pub patient_id: String,
    /// Supervising clinician.
    pub doctor_id: String,
    /// Therapy game being played.
    pub game_id: String,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// When the session started.
    pub start_time: DateTime<Utc>,
    /// When the session ended, if it has.
    pub end_time: Option<DateTime<Utc>>,
    /// Total duration in seconds, set at completion.
    pub duration_secs: Option<i64>,
    /// Session notes / completion summary (JSON text).
    pub notes: Option<String>,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A raw sensor frame row from the `vr_data` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VrFrameRow {
    /// Generated record ID.
    pub id: String,
    /// Session the frame belongs to.
    pub session_id: String,
    /// Device-side capture timestamp.
    pub timestamp: DateTime<Utc>,
    /// Sensor data category (wire string form).
    pub data_type: String,
    /// Opaque payload as JSON text.
    pub raw_data: String,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// An analysis result row from the `ai_analysis` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRow {
    /// Generated record ID.
    pub id: String,
    /// Session the analysis belongs to.
    pub session_id: String,
    /// Version of the model that produced the result.
    pub model_version: String,
    /// Full analysis result as JSON text.
    pub analysis_result: String,
    /// Progress score (0.0–10.0).
    pub progress_score: f64,
    /// Model confidence (0.0–100.0).
    pub confidence: f64,
    /// Clinician-facing recommendation text.
    pub recommendations: String,
    /// Flagged anomalies as JSON text, when any were found.
    pub anomalies: Option<String>,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Kind of write a queued sync operation replays against the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncOpType {
    /// Insert a new row (replayed as an upsert for idempotency).
    Insert,
    /// Update an existing row by ID.
    Update,
    /// Delete a row by ID.
    Delete,
}

impl SyncOpType {
    /// Returns the stored string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    /// Parses the stored string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// One durable entry in the sync queue.
///
/// Lives in the `sync_queue` table from enqueue until its remote replay
/// succeeds. Failed operations stay queued; nothing is silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    /// Generated operation ID.
    pub id: String,
    /// What kind of write to replay.
    pub op_type: SyncOpType,
    /// Target table on the remote store.
    pub table_name: String,
    /// Target row ID, required for UPDATE and DELETE.
    pub row_id: Option<String>,
    /// Row payload for INSERT and UPDATE.
    pub payload: serde_json::Value,
    /// When the operation was enqueued.
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedOperation {
    /// Builds a new operation with a generated ID and timestamp.
    #[must_use]
    pub fn new(
        op_type: SyncOpType,
        table_name: &str,
        row_id: Option<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            op_type,
            table_name: table_name.to_string(),
            row_id,
            payload,
            enqueued_at: Utc::now(),
        }
    }
}
