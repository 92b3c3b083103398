//! Domain layer: connection identity, registry, data categories, and
//! the UI event system.
//!
//! This module contains the bridge's core model: connection IDs and the
//! connection registry with session bindings and liveness flags, the VR
//! sensor data vocabulary, analysis results, and the event bus that
//! pushes notifications to the UI collaborator.

pub mod analysis;
pub mod connection_id;
pub mod data_type;
pub mod event;
pub mod event_bus;
pub mod registry;

pub use analysis::{AnalysisResult, Anomaly, AnomalySeverity};
pub use connection_id::ConnectionId;
pub use data_type::VrDataType;
pub use event::{SessionUpdateKind, UiEvent};
pub use event_bus::EventBus;
pub use registry::{ConnectionRegistry, ConnectionSummary, Disconnected, Outbound};
