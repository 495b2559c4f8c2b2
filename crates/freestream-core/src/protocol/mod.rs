//! Wire formats.
//!
//! - `envelope`: the server-side message envelope. Decodes any inbound frame
//!   into an "as received" snapshot and encodes replies as the
//!   `{"origData": {...}, "data": {...}}` response object.
//! - `frame`: the flat `{"event", "sessionID", "message"}` frame a client
//!   sends to the server.
//!
//! Decoding never fails. Malformed JSON or absent keys resolve to defaults so
//! hostile or sloppy traffic cannot abort message handling.

pub mod envelope;
pub mod frame;

/// Namespace of the externally visible event names on both ends.
pub const DEFAULT_PREFIX: &str = "Laravel.Freestream.WebSocket";

pub use envelope::{Field, MessageEnvelope, Snapshot, Source};
pub use frame::ClientFrame;
