use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use freestream_core::error::{FreestreamError, Result};
use freestream_core::MessageEnvelope;

use crate::realtime::{ConnectionWrapper, SessionRegistry};

/// Listener notifications, keyed by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerEventKind {
    Open,
    OpenAfter,
    Message,
    Close,
    Error,
}

impl ListenerEventKind {
    pub fn suffix(self) -> &'static str {
        match self {
            ListenerEventKind::Open => "Listener.Open",
            ListenerEventKind::OpenAfter => "Listener.Open.After",
            ListenerEventKind::Message => "Listener.Message",
            ListenerEventKind::Close => "Listener.Close",
            ListenerEventKind::Error => "Listener.Error",
        }
    }

    /// Fully qualified name, e.g. `Laravel.Freestream.WebSocket.Listener.Open`.
    pub fn qualified(self, prefix: &str) -> String {
        format!("{prefix}.{}", self.suffix())
    }
}

/// Payload handed to handlers.
pub enum ListenerEvent<'a> {
    Open {
        connection: &'a ConnectionWrapper,
        clients: &'a SessionRegistry,
        session_id: &'a str,
    },
    OpenAfter {
        connection: &'a ConnectionWrapper,
        clients: &'a SessionRegistry,
        session_id: &'a str,
    },
    Message {
        from: &'a ConnectionWrapper,
        envelope: &'a MessageEnvelope,
        session_id: &'a str,
    },
    Close {
        connection: &'a ConnectionWrapper,
        clients: &'a SessionRegistry,
        session_id: &'a str,
    },
    Error {
        connection: &'a ConnectionWrapper,
        clients: &'a SessionRegistry,
        /// `None` when the failing connection never got a session.
        session_id: Option<&'a str>,
        error: &'a FreestreamError,
    },
}

impl ListenerEvent<'_> {
    pub fn kind(&self) -> ListenerEventKind {
        match self {
            ListenerEvent::Open { .. } => ListenerEventKind::Open,
            ListenerEvent::OpenAfter { .. } => ListenerEventKind::OpenAfter,
            ListenerEvent::Message { .. } => ListenerEventKind::Message,
            ListenerEvent::Close { .. } => ListenerEventKind::Close,
            ListenerEvent::Error { .. } => ListenerEventKind::Error,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            ListenerEvent::Open { session_id, .. }
            | ListenerEvent::OpenAfter { session_id, .. }
            | ListenerEvent::Message { session_id, .. }
            | ListenerEvent::Close { session_id, .. } => Some(*session_id),
            ListenerEvent::Error { session_id, .. } => *session_id,
        }
    }
}

/// Handler verdict. `Veto` stops the remaining handlers of this event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Proceed,
    Veto,
}

/// Application-side handler for listener events.
#[async_trait]
pub trait ListenerHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn kinds(&self) -> &'static [ListenerEventKind];
    async fn handle(&self, event: &ListenerEvent<'_>) -> Result<Flow>;
}

/// Handler table keyed by event kind.
#[derive(Default)]
pub struct Dispatcher {
    handlers: DashMap<ListenerEventKind, Vec<Arc<dyn ListenerHandler>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    pub fn register(&self, handler: Arc<dyn ListenerHandler>) {
        for kind in handler.kinds() {
            self.handlers
                .entry(*kind)
                .or_default()
                .push(Arc::clone(&handler));
        }
    }

    pub fn handler_count(&self, kind: ListenerEventKind) -> usize {
        self.handlers.get(&kind).map(|h| h.len()).unwrap_or(0)
    }

    /// Run the handlers registered for this event's kind, in registration
    /// order. Returns `Ok(false)` on the first veto and the first handler
    /// error as-is; `Ok(true)` when every handler proceeded (or none exist).
    pub async fn fire(&self, event: &ListenerEvent<'_>) -> Result<bool> {
        let kind = event.kind();
        // Clone out so no shard lock is held across handler awaits.
        let handlers = match self.handlers.get(&kind) {
            Some(h) => h.value().clone(),
            None => return Ok(true),
        };

        for handler in handlers {
            match handler.handle(event).await? {
                Flow::Proceed => {}
                Flow::Veto => {
                    tracing::debug!(handler = handler.name(), event = kind.suffix(), "vetoed");
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}
