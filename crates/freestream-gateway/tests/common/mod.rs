#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use freestream_core::error::{FreestreamError, Result};
use freestream_gateway::dispatch::{Flow, ListenerEvent, ListenerEventKind, ListenerHandler};
use freestream_gateway::realtime::{ConnectionId, RawConnection};

/// In-memory connection: records sent frames and close requests.
pub struct MockConnection {
    id: ConnectionId,
    query: HashMap<String, String>,
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl MockConnection {
    pub fn new(session_id: Option<&str>) -> Arc<Self> {
        let mut query = HashMap::new();
        if let Some(id) = session_id {
            query.insert("sessionId".to_string(), id.to_string());
        }
        Arc::new(Self {
            id: ConnectionId::next(),
            query,
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn sent(&self) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl RawConnection for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn query_param(&self, key: &str) -> Option<String> {
        self.query.get(key).cloned()
    }

    fn send_text(&self, text: String) -> Result<()> {
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub fn raw(conn: &Arc<MockConnection>) -> Arc<dyn RawConnection> {
    conn.clone()
}

/// What a handler should answer.
#[derive(Clone, Copy)]
pub enum Verdict {
    Proceed,
    Veto,
    Fail,
}

/// Records `(kind, session_id)` for every event it sees.
pub struct Recorder {
    name: &'static str,
    kinds: &'static [ListenerEventKind],
    verdict: Verdict,
    pub seen: Mutex<Vec<(ListenerEventKind, Option<String>)>>,
}

pub const ALL_KINDS: &[ListenerEventKind] = &[
    ListenerEventKind::Open,
    ListenerEventKind::OpenAfter,
    ListenerEventKind::Message,
    ListenerEventKind::Close,
    ListenerEventKind::Error,
];

impl Recorder {
    pub fn new(name: &'static str, kinds: &'static [ListenerEventKind], verdict: Verdict) -> Arc<Self> {
        Arc::new(Self {
            name,
            kinds,
            verdict,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn all() -> Arc<Self> {
        Self::new("recorder", ALL_KINDS, Verdict::Proceed)
    }

    pub fn kinds_seen(&self) -> Vec<ListenerEventKind> {
        self.seen.lock().unwrap().iter().map(|(k, _)| *k).collect()
    }
}

#[async_trait]
impl ListenerHandler for Recorder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kinds(&self) -> &'static [ListenerEventKind] {
        self.kinds
    }

    async fn handle(&self, event: &ListenerEvent<'_>) -> Result<Flow> {
        self.seen
            .lock()
            .unwrap()
            .push((event.kind(), event.session_id().map(str::to_string)));
        match self.verdict {
            Verdict::Proceed => Ok(Flow::Proceed),
            Verdict::Veto => Ok(Flow::Veto),
            Verdict::Fail => Err(FreestreamError::Handler(format!("{} failed", self.name))),
        }
    }
}
