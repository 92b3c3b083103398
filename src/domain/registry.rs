//! Live connection storage with session bindings and liveness flags.
//!
//! [`ConnectionRegistry`] owns the map of connected VR device clients.
//! Each entry holds the connection metadata plus the sender half of the
//! channel feeding that connection's socket writer task. The registry is
//! the only component allowed to mutate connection state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::sync::mpsc;

use super::ConnectionId;

/// Control and data messages pushed to a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A serialized protocol frame to deliver as a text message.
    Text(String),
    /// WebSocket ping control frame.
    Ping,
    /// Close the socket.
    Close,
}

/// Metadata for one live device connection.
#[derive(Debug)]
struct ConnectionEntry {
    connected_at: DateTime<Utc>,
    session_id: Option<String>,
    alive: bool,
    sender: mpsc::UnboundedSender<Outbound>,
}

/// Read-only snapshot of a connection's state.
#[derive(Debug, Clone)]
pub struct ConnectionSummary {
    /// Registry-assigned connection ID.
    pub id: ConnectionId,
    /// When the socket was accepted.
    pub connected_at: DateTime<Utc>,
    /// Session the connection is bound to, if any.
    pub session_id: Option<String>,
    /// Whether the connection answered the last ping.
    pub alive: bool,
}

/// Result of removing a connection from the registry.
///
/// Carries the session binding that was cleared so the caller can emit
/// the disconnect notification. Removing a connection never touches the
/// session row itself; a session survives its socket.
#[derive(Debug, Clone)]
pub struct Disconnected {
    /// The removed connection's ID.
    pub id: ConnectionId,
    /// Session the connection was bound to when it disappeared.
    pub session_id: Option<String>,
}

/// Central store for all live device connections.
///
/// # Concurrency
///
/// A single `RwLock<HashMap<...>>` guards the map. Lookups and
/// broadcasts take the read lock; register/unregister, binding changes,
/// and the heartbeat sweep take the write lock. Outbound delivery is an
/// unbounded mpsc send and never blocks under the lock.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, ConnectionEntry>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection and returns its fresh ID.
    ///
    /// `sender` is the channel feeding the connection's socket writer
    /// task. The connection starts alive and unbound.
    pub async fn register(&self, sender: mpsc::UnboundedSender<Outbound>) -> ConnectionId {
        let id = ConnectionId::new();
        let entry = ConnectionEntry {
            connected_at: Utc::now(),
            session_id: None,
            alive: true,
            sender,
        };
        self.connections.write().await.insert(id, entry);
        id
    }

    /// Removes a connection, returning its cleared session binding.
    ///
    /// Returns `None` if the connection was already gone (e.g. evicted
    /// by the heartbeat sweep while the close handshake was in flight).
    pub async fn unregister(&self, id: ConnectionId) -> Option<Disconnected> {
        let entry = self.connections.write().await.remove(&id)?;
        Some(Disconnected {
            id,
            session_id: entry.session_id,
        })
    }

    /// Returns a snapshot of the connection's state.
    pub async fn get(&self, id: ConnectionId) -> Option<ConnectionSummary> {
        let map = self.connections.read().await;
        map.get(&id).map(|entry| ConnectionSummary {
            id,
            connected_at: entry.connected_at,
            session_id: entry.session_id.clone(),
            alive: entry.alive,
        })
    }

    /// Returns snapshots of all live connections.
    pub async fn all(&self) -> Vec<ConnectionSummary> {
        let map = self.connections.read().await;
        map.iter()
            .map(|(id, entry)| ConnectionSummary {
                id: *id,
                connected_at: entry.connected_at,
                session_id: entry.session_id.clone(),
                alive: entry.alive,
            })
            .collect()
    }

    /// Binds the connection to a session, replacing any previous binding.
    ///
    /// Returns `false` if the connection is not registered.
    pub async fn bind_session(&self, id: ConnectionId, session_id: &str) -> bool {
        let mut map = self.connections.write().await;
        match map.get_mut(&id) {
            Some(entry) => {
                entry.session_id = Some(session_id.to_string());
                true
            }
            None => false,
        }
    }

    /// Clears the connection's session binding.
    pub async fn clear_binding(&self, id: ConnectionId) {
        let mut map = self.connections.write().await;
        if let Some(entry) = map.get_mut(&id) {
            entry.session_id = None;
        }
    }

    /// Clears the binding on every connection bound to `session_id`.
    ///
    /// Returns the affected connection IDs.
    pub async fn clear_binding_for_session(&self, session_id: &str) -> Vec<ConnectionId> {
        let mut map = self.connections.write().await;
        let mut cleared = Vec::new();
        for (id, entry) in map.iter_mut() {
            if entry.session_id.as_deref() == Some(session_id) {
                entry.session_id = None;
                cleared.push(*id);
            }
        }
        cleared
    }

    /// Marks the connection as alive after a pong was observed.
    pub async fn mark_alive(&self, id: ConnectionId) {
        let mut map = self.connections.write().await;
        if let Some(entry) = map.get_mut(&id) {
            entry.alive = true;
        }
    }

    /// Sends a serialized frame to a single connection.
    ///
    /// Returns `false` if the connection is gone or its writer task has
    /// hung up.
    pub async fn send_text(&self, id: ConnectionId, frame: String) -> bool {
        let map = self.connections.read().await;
        match map.get(&id) {
            Some(entry) => entry.sender.send(Outbound::Text(frame)).is_ok(),
            None => false,
        }
    }

    /// Broadcasts a serialized frame to every live connection.
    ///
    /// Returns the number of connections the frame was queued for.
    pub async fn broadcast_text(&self, frame: &str) -> usize {
        let map = self.connections.read().await;
        map.values()
            .filter(|entry| entry.sender.send(Outbound::Text(frame.to_string())).is_ok())
            .count()
    }

    /// Runs one heartbeat pass over all connections.
    ///
    /// Connections whose liveness flag is still cleared from the previous
    /// pass are told to close and removed from the map; the caller emits
    /// their disconnect notifications. Surviving connections get the flag
    /// cleared and a ping queued. One missed ping/pong round-trip is
    /// enough for eviction; there is no multi-strike tolerance.
    pub async fn sweep(&self) -> Vec<Disconnected> {
        let mut map = self.connections.write().await;
        let dead: Vec<ConnectionId> = map
            .iter()
            .filter(|(_, entry)| !entry.alive)
            .map(|(id, _)| *id)
            .collect();

        let mut evicted = Vec::with_capacity(dead.len());
        for id in dead {
            if let Some(entry) = map.remove(&id) {
                let _ = entry.sender.send(Outbound::Close);
                evicted.push(Disconnected {
                    id,
                    session_id: entry.session_id,
                });
            }
        }

        for entry in map.values_mut() {
            entry.alive = false;
            let _ = entry.sender.send(Outbound::Ping);
        }

        evicted
    }

    /// Returns the number of live connections.
    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Sends a close signal to every connection without removing entries.
    ///
    /// Used during shutdown; the connection tasks unregister themselves
    /// as their sockets close.
    pub async fn close_all(&self) {
        let map = self.connections.read().await;
        for entry in map.values() {
            let _ = entry.sender.send(Outbound::Close);
        }
    }
}
