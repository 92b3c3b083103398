//! Device wire protocol: frame types and the codec/validator.
//!
//! The protocol is a fixed vocabulary of JSON text frames exchanged over
//! a persistent WebSocket connection. Inbound frames are validated
//! synchronously before any side effect; unrecognized types produce an
//! ERROR reply, never a dropped connection.

pub mod codec;
pub mod messages;

pub use codec::{Frame, parse};
pub use messages::{ClientFrame, ServerFrame};
