use std::sync::Arc;

use serde_json::Value;

use freestream_core::error::Result;
use freestream_core::MessageEnvelope;

use super::connection::{ConnectionId, RawConnection};

/// A raw connection paired with the envelope a reply is composed in.
///
/// `send` serializes the envelope and hands it to the raw connection. The
/// wrapper borrows the connection's capabilities; it never owns its
/// lifecycle. Only `id`, `query_param` and `close` pass through.
#[derive(Clone)]
pub struct ConnectionWrapper {
    raw: Arc<dyn RawConnection>,
    envelope: MessageEnvelope,
}

impl ConnectionWrapper {
    pub fn new(raw: Arc<dyn RawConnection>) -> Self {
        Self::with_envelope(raw, MessageEnvelope::new())
    }

    pub fn with_envelope(raw: Arc<dyn RawConnection>, envelope: MessageEnvelope) -> Self {
        Self { raw, envelope }
    }

    /// Set `message` on the reply copy, encode both snapshots and transmit.
    pub fn send(&mut self, payload: impl Into<Value>) -> Result<()> {
        self.envelope.set_message(payload);
        self.raw.send_text(self.envelope.encode())
    }

    pub fn set_session_id(&mut self, session_id: impl Into<Value>) -> &mut Self {
        self.envelope.set_session_id(session_id);
        self
    }

    pub fn set_event(&mut self, event: impl Into<Value>) -> &mut Self {
        self.envelope.set_event(event);
        self
    }

    pub fn envelope(&self) -> &MessageEnvelope {
        &self.envelope
    }

    pub fn id(&self) -> ConnectionId {
        self.raw.id()
    }

    pub fn query_param(&self, key: &str) -> Option<String> {
        self.raw.query_param(key)
    }

    pub fn close(&self) {
        self.raw.close()
    }
}
