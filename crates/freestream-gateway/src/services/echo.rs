use async_trait::async_trait;

use freestream_core::error::Result;
use freestream_core::Source;

use crate::dispatch::{Flow, ListenerEvent, ListenerEventKind, ListenerHandler};
use crate::realtime::ConnectionWrapper;

/// Replies to every message with the same event and payload.
///
/// The reply's `origData` carries the inbound frame verbatim. Object
/// payloads only show up there, since envelope setters drop objects.
#[derive(Debug, Default)]
pub struct EchoService;

impl EchoService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ListenerHandler for EchoService {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn kinds(&self) -> &'static [ListenerEventKind] {
        &[ListenerEventKind::Message]
    }

    async fn handle(&self, event: &ListenerEvent<'_>) -> Result<Flow> {
        let ListenerEvent::Message { from, envelope, session_id } = event else {
            return Ok(Flow::Proceed);
        };

        let mut reply = ConnectionWrapper::clone(from);
        reply
            .set_event(envelope.event(Source::Original).clone())
            .set_session_id(*session_id);
        reply.send(envelope.message(Source::Original).clone())?;
        Ok(Flow::Proceed)
    }
}
