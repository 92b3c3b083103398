//! Analysis results produced by the scoring collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::VrDataType;

/// Severity of a detected anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    /// Informational, no action needed.
    Low,
    /// Worth clinician attention.
    Medium,
    /// Requires review before the next session.
    High,
}

/// A single anomaly flagged during analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    /// Anomaly category (e.g. `"LOW_CONFIDENCE"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// How severe the anomaly is.
    pub severity: AnomalySeverity,
    /// Human-readable description.
    pub message: String,
}

/// Result of scoring a single VR data frame.
///
/// Produced by the scoring collaborator, persisted to the local store,
/// and relayed to the UI as a `vr-data-processed` event. Analysis is
/// best-effort: when no model is available the scorer degrades to a
/// deterministic placeholder result rather than failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Version string of the model that produced the result.
    pub model_version: String,
    /// Progress score in the range 0.0–10.0.
    pub score: f64,
    /// Model confidence in the range 0.0–100.0.
    pub confidence: f64,
    /// Data type the analysis covers.
    pub data_type: VrDataType,
    /// When the analysis was produced.
    pub analyzed_at: DateTime<Utc>,
    /// Anomalies flagged during analysis, absent when none were found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomalies: Option<Vec<Anomaly>>,
    /// Clinician-facing recommendation text.
    pub recommendations: String,
}
