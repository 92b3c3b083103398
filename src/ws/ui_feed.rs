//! One-way UI notification feed.
//!
//! Forwards every [`UiEvent`] from the event bus to a connected UI
//! client as JSON. The feed is push-only: inbound messages other than
//! close are ignored, and no acknowledgment is expected.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use crate::domain::UiEvent;

/// Runs the forward loop for a single UI feed connection.
pub async fn run_ui_feed(socket: WebSocket, mut event_rx: broadcast::Receiver<UiEvent>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                match event {
                    Ok(event) => {
                        let json = serde_json::to_string(&event).unwrap_or_default();
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ui feed lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }

    tracing::debug!("ui feed connection closed");
}
