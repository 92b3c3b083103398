//! Axum WebSocket upgrade handlers.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::connection::run_device_connection;
use super::ui_feed::run_ui_feed;
use crate::app_state::AppState;

/// `GET /ws/device` — Upgrade a VR device connection.
pub async fn device_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_device_connection(socket, state))
}

/// `GET /ws/ui` — Upgrade a UI notification feed connection.
pub async fn ui_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let event_rx = state.event_bus.subscribe();
    ws.on_upgrade(move |socket| run_ui_feed(socket, event_rx))
}
