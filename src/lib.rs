//! # neuro-bridge
//!
//! Real-time WebSocket bridge between VR therapy clients and the
//! clinic data platform. The bridge accepts device connections,
//! exchanges a small typed message protocol, streams sensor data into
//! durable local storage and a scoring collaborator, and reconciles
//! the local store with a remote backing store through a queued,
//! retryable sync manager.
//!
//! ## Architecture
//!
//! ```text
//! VR devices (WebSocket)          Clinician UI (REST + WebSocket)
//!     │                               │
//!     ├── Device protocol (ws/)       ├── Session handlers (api/)
//!     ├── Codec/Validator (protocol/) ├── UI event feed (ws/)
//!     │                               │
//!     ├── SessionBridge (service/)────┤
//!     ├── IngestPipeline (service/)   │
//!     ├── SyncManager (service/)      │
//!     │                               │
//!     ├── ConnectionRegistry (domain/)
//!     ├── EventBus (domain/)
//!     │
//!     ├── SQLite LocalStore (persistence/)
//!     └── PostgREST RemoteStore (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod protocol;
pub mod service;
pub mod ws;
