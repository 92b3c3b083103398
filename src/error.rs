//! Bridge error types with HTTP status code mapping.
//!
//! [`BridgeError`] is the central error type for the bridge. Protocol-level
//! variants are surfaced to the originating device connection as ERROR
//! frames; infrastructure-level variants are logged and contained. On the
//! REST surface every variant renders as the uniform
//! `{success: false, error: {...}}` envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All REST error responses follow this shape:
/// ```json
/// {
///   "success": false,
///   "error": {
///     "code": 3001,
///     "message": "persistence error: database is locked",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Always `false` for error responses.
    pub success: bool,
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`BridgeError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category            | HTTP Status     |
/// |-----------|---------------------|-----------------|
/// | 1000–1999 | Protocol/Validation | 400 Bad Request |
/// | 2000–2999 | Not Found           | 404 Not Found   |
/// | 3000–3999 | Infrastructure      | 500 / 503       |
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Frame was not valid JSON or lacked a usable `type` field.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Frame parsed structurally but carried an unrecognized `type`.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No session with the given ID exists in the local store.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A durable local write failed.
    #[error("persistence error: {0}")]
    PersistenceFailure(String),

    /// The scoring collaborator failed; the single result is dropped.
    #[error("scoring error: {0}")]
    ScoringFailure(String),

    /// The remote store is unreachable; the sync cycle aborts.
    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// A single queued operation failed remote replay and stays queued.
    #[error("sync operation {operation_id} failed: {reason}")]
    OperationSyncFailure {
        /// ID of the queued operation.
        operation_id: String,
        /// Why the remote rejected it.
        reason: String,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::MalformedMessage(_) => 1001,
            Self::UnknownMessageType(_) => 1002,
            Self::InvalidRequest(_) => 1003,
            Self::SessionNotFound(_) => 2001,
            Self::PersistenceFailure(_) => 3001,
            Self::ScoringFailure(_) => 3002,
            Self::RemoteUnavailable(_) => 3003,
            Self::OperationSyncFailure { .. } => 3004,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedMessage(_) | Self::UnknownMessageType(_) | Self::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::RemoteUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::PersistenceFailure(_)
            | Self::ScoringFailure(_)
            | Self::OperationSyncFailure { .. }
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            success: false,
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
