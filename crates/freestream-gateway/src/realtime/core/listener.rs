use std::sync::Arc;

use serde_json::Value;

use freestream_core::error::{FreestreamError, Result};
use freestream_core::MessageEnvelope;

use crate::dispatch::{Dispatcher, ListenerEvent};
use crate::realtime::core::{ConnectionWrapper, RawConnection, SessionRegistry};

/// Handshake query parameter carrying the caller-supplied session id.
pub const SESSION_QUERY_KEY: &str = "sessionId";

/// Lifecycle of one transport connection as seen by the listener.
///
/// `Idle -> Open -> Closed`. A rejected open goes straight to `Closed`.
/// Errors are not a state: they always end in a forced close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Open,
    Closed,
}

/// Drives the session registry and the dispatcher from raw connection
/// lifecycle callbacks.
///
/// Handler failures during open and close are logged and treated as
/// "proceed": registration and unregistration always happen. Handler
/// failures during message handling are returned to the caller.
pub struct EventListener {
    prefix: Arc<str>,
    sessions: Arc<SessionRegistry>,
    dispatcher: Arc<Dispatcher>,
}

impl EventListener {
    pub fn new(
        prefix: impl Into<Arc<str>>,
        sessions: Arc<SessionRegistry>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            sessions,
            dispatcher,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// New connection. On success the session is registered and its id is
    /// returned. A missing or duplicate id closes the connection and fires
    /// nothing; a veto from an `Open` handler unregisters and closes it.
    pub async fn on_open(&self, raw: Arc<dyn RawConnection>) -> Result<String> {
        let conn_id = raw.id();

        let Some(session_id) = requested_session_id(raw.as_ref()) else {
            tracing::warn!(%conn_id, "rejecting connection without sessionId");
            raw.close();
            return Err(FreestreamError::MissingSessionId);
        };

        if let Err(e) = self.sessions.register(&session_id, Arc::clone(&raw)) {
            tracing::warn!(%conn_id, session_id = %session_id, error = %e, "rejecting connection");
            raw.close();
            return Err(e);
        }

        let connection = ConnectionWrapper::new(Arc::clone(&raw));
        let open = ListenerEvent::Open {
            connection: &connection,
            clients: self.sessions.as_ref(),
            session_id: &session_id,
        };
        if !self.notify_lenient(&open).await {
            self.sessions.unregister_connection(&session_id, conn_id);
            raw.close();
            tracing::info!(%conn_id, session_id = %session_id, "connection refused by listener");
            return Err(FreestreamError::SessionRejected(session_id));
        }

        tracing::info!(%conn_id, session_id = %session_id, "connection established");

        let after = ListenerEvent::OpenAfter {
            connection: &connection,
            clients: self.sessions.as_ref(),
            session_id: &session_id,
        };
        self.notify_lenient(&after).await;

        Ok(session_id)
    }

    /// Inbound frame. Unknown sessions surface `SessionNotFound` and fire
    /// nothing. Decoding never fails; handler errors are returned as-is.
    pub async fn on_message(&self, raw: &Arc<dyn RawConnection>, payload: &[u8]) -> Result<()> {
        let session_id = self.resolve(raw.as_ref())?;

        let from = ConnectionWrapper::with_envelope(Arc::clone(raw), MessageEnvelope::decode(payload));
        let event = ListenerEvent::Message {
            from: &from,
            envelope: from.envelope(),
            session_id: &session_id,
        };
        self.dispatcher.fire(&event).await?;
        Ok(())
    }

    /// Connection gone. Fires `Close`, then unregisters regardless of what
    /// handlers returned. A connection that never owned a session (rejected
    /// duplicate, missing id) gets `SessionNotFound` and touches nothing.
    pub async fn on_close(&self, raw: &Arc<dyn RawConnection>) -> Result<()> {
        let conn_id = raw.id();
        let session_id = self.resolve(raw.as_ref())?;

        let connection = ConnectionWrapper::new(Arc::clone(raw));
        let close = ListenerEvent::Close {
            connection: &connection,
            clients: self.sessions.as_ref(),
            session_id: &session_id,
        };
        self.notify_lenient(&close).await;

        self.sessions.unregister_connection(&session_id, conn_id);
        tracing::info!(%conn_id, session_id = %session_id, "connection {conn_id} has disconnected");
        Ok(())
    }

    /// Transport failure. Fires `Error` (session optional) and force-closes
    /// the connection whatever handlers return. The registry is left to the
    /// close path.
    pub async fn on_error(&self, raw: &Arc<dyn RawConnection>, error: &FreestreamError) {
        let conn_id = raw.id();
        let session_id = self.resolve(raw.as_ref()).ok();
        tracing::error!(%conn_id, session_id = ?session_id, error = %error, "an error has occurred");

        let connection = ConnectionWrapper::new(Arc::clone(raw));
        let event = ListenerEvent::Error {
            connection: &connection,
            clients: self.sessions.as_ref(),
            session_id: session_id.as_deref(),
            error,
        };
        if let Err(e) = self.dispatcher.fire(&event).await {
            tracing::warn!(%conn_id, error = %e, "error handler failed");
        }

        raw.close();
    }

    /// Directed message from server-side logic to one session.
    pub fn send_to(
        &self,
        session_id: &str,
        event: impl Into<Value>,
        payload: impl Into<Value>,
    ) -> Result<()> {
        let raw = self.sessions.lookup(session_id)?;
        let mut wrapper = ConnectionWrapper::new(raw);
        wrapper.set_event(event).set_session_id(session_id);
        wrapper.send(payload)
    }

    /// Session id this connection requested and currently owns.
    fn resolve(&self, raw: &dyn RawConnection) -> Result<String> {
        let session_id = requested_session_id(raw)
            .ok_or_else(|| FreestreamError::SessionNotFound(format!("connection {}", raw.id())))?;
        let owner = self.sessions.lookup(&session_id)?;
        if owner.id() != raw.id() {
            return Err(FreestreamError::SessionNotFound(session_id));
        }
        Ok(session_id)
    }

    async fn notify_lenient(&self, event: &ListenerEvent<'_>) -> bool {
        match self.dispatcher.fire(event).await {
            Ok(proceed) => proceed,
            Err(e) => {
                tracing::warn!(
                    event = %event.kind().qualified(&self.prefix),
                    error = %e,
                    "listener handler failed; proceeding"
                );
                true
            }
        }
    }
}

fn requested_session_id(raw: &dyn RawConnection) -> Option<String> {
    raw.query_param(SESSION_QUERY_KEY).filter(|id| !id.is_empty())
}
