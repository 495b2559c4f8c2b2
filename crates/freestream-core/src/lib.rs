//! Freestream core: the message envelope codec, the client wire frame, and the
//! error surface shared by the gateway and the client.
//!
//! This crate carries no transport or runtime dependencies so the same codec
//! runs inside the server and inside any client.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Decoding is total:
//! malformed input degrades to default field values instead of failing.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ClientCode, FreestreamError, Result};
pub use protocol::{ClientFrame, Field, MessageEnvelope, Snapshot, Source, DEFAULT_PREFIX};
