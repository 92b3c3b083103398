//! System endpoints: health check and bridge status.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::dto::{ApiResponse, ClientSettingsDto, StatusDto};
use crate::app_state::AppState;
use crate::error::BridgeError;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /api/v1/status` — Bridge status snapshot.
///
/// # Errors
///
/// Returns a [`BridgeError::PersistenceFailure`] when the sync queue
/// length cannot be read.
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "System",
    summary = "Bridge status",
    description = "Connected device count, last observed remote connectivity, sync queue depth, and the tuning parameters device clients should use.",
    responses(
        (status = 200, description = "Status snapshot", body = StatusDto),
    )
)]
pub async fn status_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, BridgeError> {
    let status = StatusDto {
        connected_clients: state.registry.count().await,
        is_online: state.sync.is_online(),
        sync_queue_len: state.sync.queue_len().await?,
        scoring_in_flight: state.ingest.in_flight(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        client_settings: ClientSettingsDto {
            ping_interval_secs: state.config.ping_interval_secs,
            pong_timeout_secs: state.config.pong_timeout_secs,
            reconnect_attempts: state.config.reconnect_attempts,
            reconnect_delay_ms: state.config.reconnect_delay_ms,
            max_batch_size: state.config.max_batch_size,
            send_interval_ms: state.config.send_interval_ms,
            max_queue_size: state.config.max_queue_size,
        },
    };

    Ok(Json(ApiResponse::ok(status)))
}

/// System routes mounted at the server root.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}

/// System routes mounted under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new().route("/status", get(status_handler))
}
