//! Client session state machine.
//!
//! `ClientSession` holds everything the client knows about its connection
//! without doing any IO: the state, the pending send queue, and the outbound
//! link handed over by the driver once a socket is open. Lifecycle callbacks
//! (`on_open`, `on_message`, `on_close`, `on_error`) are invoked by the driver
//! in [`crate::client`], and by tests directly.

use std::collections::VecDeque;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use url::Url;

use freestream_core::ClientFrame;

use crate::config::{ClientConfig, RECONNECT_DELAY};
use crate::error::{ClientError, ClientResult};

/// Capacity of the lifecycle event broadcast.
const EVENT_CAPACITY: usize = 256;

/// Outbound frames for the currently open socket.
pub type Link = mpsc::UnboundedSender<OutboundFrame>;

/// `Connecting -> Open -> Closed`, and back to `Connecting` on reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientState {
    Connecting,
    Open,
    #[default]
    Closed,
}

/// Lifecycle notifications for application code.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    ConnectionEstablished,
    /// Raw payload, not decoded.
    MessageReceived(String),
    ConnectionClosed,
    Error(String),
}

impl ClientEvent {
    pub fn suffix(&self) -> &'static str {
        match self {
            ClientEvent::ConnectionEstablished => "Connection.Established",
            ClientEvent::MessageReceived(_) => "Message.Received",
            ClientEvent::ConnectionClosed => "Connection.Closed",
            ClientEvent::Error(_) => "Error",
        }
    }

    /// e.g. `Laravel.Freestream.WebSocket.Message.Received`
    pub fn name(&self, prefix: &str) -> String {
        format!("{prefix}.{}", self.suffix())
    }
}

/// A send waiting for the connection to open.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientQueueEntry {
    pub event: String,
    pub payload: Value,
}

/// An encoded frame handed to the socket, together with the send it came
/// from so an unwritten frame can be queued again.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundFrame {
    pub text: String,
    pub entry: ClientQueueEntry,
}

pub struct ClientSession {
    config: ClientConfig,
    state: ClientState,
    queue: VecDeque<ClientQueueEntry>,
    try_reconnect: bool,
    link: Option<Link>,
    events: broadcast::Sender<ClientEvent>,
}

impl ClientSession {
    pub fn new(config: ClientConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let try_reconnect = config.reconnect;
        Self {
            config,
            state: ClientState::Closed,
            queue: VecDeque::new(),
            try_reconnect,
            link: None,
            events,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Number of sends waiting for the connection to open.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn pending(&self) -> impl Iterator<Item = &ClientQueueEntry> {
        self.queue.iter()
    }

    /// Set by every close; starts as the configured `reconnect` flag.
    pub fn reconnect_intent(&self) -> bool {
        self.try_reconnect
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn event_sender(&self) -> broadcast::Sender<ClientEvent> {
        self.events.clone()
    }

    /// Start a connection attempt. Returns the URL to dial.
    pub fn init(&mut self) -> ClientResult<Url> {
        let url = self.config.connection_url()?;
        self.state = ClientState::Connecting;
        self.transition("connecting", Some(url.as_str()));
        Ok(url)
    }

    /// Socket is open. Queued sends are flushed in FIFO order through `link`.
    pub fn on_open(&mut self, link: Link) -> ClientResult<()> {
        self.state = ClientState::Open;
        self.link = Some(link);
        self.transition("connection open", None);
        self.emit(ClientEvent::ConnectionEstablished);

        let mut pending = std::mem::take(&mut self.queue);
        while let Some(entry) = pending.pop_front() {
            if let Err(e) = self.send(entry.event, entry.payload) {
                self.queue.extend(pending);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Pass-through of a server frame.
    pub fn on_message(&mut self, payload: impl Into<String>) {
        let payload = payload.into();
        if self.config.debug {
            tracing::info!(session_id = %self.config.session_id, %payload, "received message");
        } else {
            tracing::debug!(session_id = %self.config.session_id, %payload, "received message");
        }
        self.emit(ClientEvent::MessageReceived(payload));
    }

    /// Socket is gone. Returns the delay before the next `init` when
    /// reconnecting is enabled.
    pub fn on_close(&mut self) -> Option<Duration> {
        self.state = ClientState::Closed;
        self.link = None;
        self.try_reconnect = true;
        self.transition("connection closed", None);
        self.emit(ClientEvent::ConnectionClosed);

        self.config.reconnect.then_some(RECONNECT_DELAY)
    }

    /// Reported only; the close path follows from the transport.
    pub fn on_error(&mut self, error: &ClientError) {
        let error = error.to_string();
        if self.config.debug {
            tracing::info!(session_id = %self.config.session_id, %error, "caused error");
        } else {
            tracing::debug!(session_id = %self.config.session_id, %error, "caused error");
        }
        self.emit(ClientEvent::Error(error));
    }

    /// Put sends that reached the link but never the socket back at the
    /// head of the queue, ahead of anything queued since.
    pub fn requeue(&mut self, unsent: impl IntoIterator<Item = ClientQueueEntry>) {
        let mut queue: VecDeque<ClientQueueEntry> = unsent.into_iter().collect();
        if queue.is_empty() {
            return;
        }
        tracing::debug!(count = queue.len(), "requeued unsent frames");
        queue.append(&mut self.queue);
        self.queue = queue;
    }

    /// Local shutdown: closed without a reconnect.
    pub fn on_disconnect(&mut self) {
        if self.state == ClientState::Closed {
            return;
        }
        self.state = ClientState::Closed;
        self.link = None;
        self.transition("disconnected", None);
        self.emit(ClientEvent::ConnectionClosed);
    }

    /// Transmit now when open, queue otherwise. A `null` payload goes out as `[]`.
    pub fn send(&mut self, event: impl Into<String>, payload: impl Into<Value>) -> ClientResult<()> {
        let event = event.into();
        let payload = payload.into();

        let link = match (&self.state, &self.link) {
            (ClientState::Open, Some(link)) => link,
            _ => {
                tracing::trace!(%event, "queued until open");
                self.queue.push_back(ClientQueueEntry { event, payload });
                return Ok(());
            }
        };

        let frame = ClientFrame::new(event.as_str(), self.config.session_id.as_str(), Some(payload.clone()));
        let text = serde_json::to_string(&frame)?;

        if let Err(mpsc::error::SendError(frame)) = link.send(OutboundFrame {
            text,
            entry: ClientQueueEntry { event, payload },
        }) {
            // driver went away between open and close; keep it for the next open
            tracing::warn!(event = %frame.entry.event, "link closed; queued until open");
            self.queue.push_back(frame.entry);
        }
        Ok(())
    }

    fn emit(&self, event: ClientEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn transition(&self, what: &str, url: Option<&str>) {
        if self.config.debug {
            tracing::info!(session_id = %self.config.session_id, url, "{what}");
        } else {
            tracing::debug!(session_id = %self.config.session_id, url, "{what}");
        }
    }
}
