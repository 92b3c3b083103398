//! Persistence layer: durable local SQLite store and remote store client.
//!
//! The local store holds sessions, raw sensor frames, analysis results,
//! and the sync queue; it is the durability guarantee for the ingest
//! path and survives process restart. The remote store is reached over
//! HTTP and reconciled asynchronously by the sync manager.

pub mod local;
pub mod models;
pub mod remote;

pub use local::LocalStore;
pub use models::{
    AnalysisRow, QueuedOperation, SessionRow, SessionStatus, SyncOpType, VrFrameRow,
};
pub use remote::{PostgrestRemote, RemoteError, RemoteStore};
