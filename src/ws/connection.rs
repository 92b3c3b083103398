//! Device WebSocket connection loop.
//!
//! Handles the read/write loop for a single VR device connection:
//! inbound frames are validated and dispatched, outbound frames and
//! heartbeat control messages arrive over the connection's channel.
//! Frames from one connection are processed in arrival order up to the
//! point where scoring is dispatched.

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::app_state::AppState;
use crate::domain::{ConnectionId, Outbound};
use crate::protocol::{ClientFrame, Frame, ServerFrame, parse};

/// Runs the read/write loop for a single device connection.
pub async fn run_device_connection(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();

    let (conn_id, greeting) = state.session_bridge.connection_opened(out_tx).await;
    if ws_tx.send(Message::text(greeting.to_json())).await.is_err() {
        state.session_bridge.connection_closed(conn_id).await;
        return;
    }

    loop {
        tokio::select! {
            // Inbound frame from the device
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_frame(&state, conn_id, text.as_str()).await;
                        if let Some(frame) = reply
                            && ws_tx.send(Message::text(frame.to_json())).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        state.registry.mark_alive(conn_id).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::error!(client_id = %conn_id, error = %e, "websocket error");
                        break;
                    }
                    _ => {}
                }
            }
            // Outbound frame or heartbeat control from the bridge
            out = out_rx.recv() => {
                match out {
                    Some(Outbound::Text(frame)) => {
                        if ws_tx.send(Message::text(frame)).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Ping) => {
                        if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Close) | None => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }

    state.session_bridge.connection_closed(conn_id).await;
    tracing::debug!(client_id = %conn_id, "device connection closed");
}

/// Validates one raw frame and dispatches it, returning the reply frame
/// to send (if any).
async fn handle_frame(state: &AppState, conn_id: ConnectionId, raw: &str) -> Option<ServerFrame> {
    let frame = match parse(raw, state.config.strict_validation) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(client_id = %conn_id, error = %e, "rejected inbound frame");
            return Some(ServerFrame::error(e.to_string(), Some(e.error_code())));
        }
    };

    match frame {
        Frame::Unknown { message_type } => {
            Some(state.session_bridge.reject_unknown(&message_type))
        }
        Frame::Known(ClientFrame::SessionStart {
            session_id,
            patient_id,
            doctor_id,
            game_id,
        }) => {
            let details = serde_json::json!({
                "sessionId": session_id,
                "patientId": patient_id,
                "doctorId": doctor_id,
                "gameId": game_id,
            });
            Some(
                state
                    .session_bridge
                    .session_started(conn_id, &session_id, details)
                    .await,
            )
        }
        Frame::Known(ClientFrame::VrData {
            session_id,
            timestamp,
            data_type,
            data,
        }) => {
            // Raw-data durability failures are contained: logged, no
            // ERROR frame, connection keeps streaming.
            if let Err(e) = state
                .ingest
                .ingest(&session_id, data_type, timestamp, data)
                .await
            {
                tracing::error!(client_id = %conn_id, session_id, error = %e, "vr data ingest failed");
            }
            None
        }
        Frame::Known(ClientFrame::SessionEnd {
            session_id,
            duration,
            summary,
        }) => {
            match state
                .session_bridge
                .session_ended(conn_id, &session_id, duration, summary.as_ref())
                .await
            {
                Ok(ack) => Some(ack),
                Err(e) => {
                    tracing::error!(client_id = %conn_id, session_id, error = %e, "session end failed");
                    Some(ServerFrame::error(e.to_string(), Some(e.error_code())))
                }
            }
        }
        Frame::Known(ClientFrame::Heartbeat { .. }) => Some(ServerFrame::ack_heartbeat()),
    }
}
