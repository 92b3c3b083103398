//! Service layer: business logic orchestration.
//!
//! [`SessionBridge`] drives the session lifecycle, [`IngestPipeline`]
//! handles the streaming sensor path, [`SyncManager`] reconciles the
//! local store with the remote, and [`Scorer`] is the seam to the
//! scoring collaborator.

pub mod ingest;
pub mod scoring;
pub mod session_bridge;
pub mod sync_manager;

pub use ingest::IngestPipeline;
pub use scoring::{HeuristicScorer, Scorer};
pub use session_bridge::SessionBridge;
pub use sync_manager::{DrainOutcome, DrainReport, SyncManager};
