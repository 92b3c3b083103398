//! WebSocket layer: device connections, UI feed, heartbeat monitor.
//!
//! The device endpoint at `/ws/device` carries the typed device
//! protocol; the UI endpoint at `/ws/ui` is a one-way notification
//! push. The heartbeat monitor runs independently and prunes dead
//! device connections.

pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod ui_feed;
