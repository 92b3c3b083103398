//! Session lifecycle handlers: create, end, get.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{ApiResponse, CreateSessionRequest, EndSessionRequest, SessionDto};
use crate::app_state::AppState;
use crate::error::{BridgeError, ErrorResponse};

/// `POST /sessions` — Create a therapy session and signal devices.
///
/// # Errors
///
/// Returns [`BridgeError`] on validation or persistence failure.
#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    tag = "Sessions",
    summary = "Create a therapy session",
    description = "Persists an ACTIVE session, queues it for remote sync, and broadcasts SESSION_START to every connected VR device.",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = SessionDto),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    )
)]
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, BridgeError> {
    if req.patient_id.is_empty() || req.doctor_id.is_empty() || req.game_id.is_empty() {
        return Err(BridgeError::InvalidRequest(
            "patientId, doctorId, and gameId are required".to_string(),
        ));
    }

    let row = state
        .session_bridge
        .create_session(&req.patient_id, &req.doctor_id, &req.game_id, req.notes)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(SessionDto::from(row))),
    ))
}

/// `POST /sessions/{id}/end` — Complete a session from the UI.
///
/// # Errors
///
/// Returns [`BridgeError`] when the session is unknown or the
/// completion cannot be written.
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/end",
    tag = "Sessions",
    summary = "End a therapy session",
    description = "Marks the session COMPLETED with its computed duration, queues the update for remote sync, and clears device bindings.",
    params(("id" = String, Path, description = "Session ID")),
    request_body = EndSessionRequest,
    responses(
        (status = 200, description = "Session completed", body = SessionDto),
        (status = 404, description = "Session not found", body = ErrorResponse),
    )
)]
pub async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<EndSessionRequest>,
) -> Result<impl IntoResponse, BridgeError> {
    let row = state
        .session_bridge
        .end_session(&id, req.summary.as_ref())
        .await?;

    Ok(Json(ApiResponse::ok(SessionDto::from(row))))
}

/// `GET /sessions/{id}` — Fetch a session from the local store.
///
/// # Errors
///
/// Returns [`BridgeError::SessionNotFound`] when absent.
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}",
    tag = "Sessions",
    summary = "Get a session",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session", body = SessionDto),
        (status = 404, description = "Session not found", body = ErrorResponse),
    )
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, BridgeError> {
    let row = state.session_bridge.get_session(&id).await?;
    Ok(Json(ApiResponse::ok(SessionDto::from(row))))
}

/// Session resource routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{id}/end", post(end_session))
        .route("/sessions/{id}", get(get_session))
}
