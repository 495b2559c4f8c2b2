use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use freestream_core::error::Result;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique resource identifier of a transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the gateway needs from an accepted transport connection.
///
/// The transport owns the socket lifecycle; the gateway only reads handshake
/// metadata, queues outbound text, and asks for a close.
pub trait RawConnection: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// Handshake query parameter (e.g. `sessionId`).
    fn query_param(&self, key: &str) -> Option<String>;

    /// Queue a text frame. Must not block.
    fn send_text(&self, text: String) -> Result<()>;

    /// Request a close. Idempotent.
    fn close(&self);
}
