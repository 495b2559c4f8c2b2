use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use freestream_core::error::{FreestreamError, Result};

use super::connection::{ConnectionId, RawConnection};

#[derive(Clone)]
struct SessionEntry {
    conn: Arc<dyn RawConnection>,
    created_seq: u64,
}

/// Session registry: `session_id -> connection`.
///
/// At most one live connection per session id. Registration is atomic per
/// key, so a duplicate id loses even when two opens race on different tasks.
pub struct SessionRegistry {
    sessions: DashMap<String, SessionEntry>,
    seq: AtomicU64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            seq: AtomicU64::new(1),
        }
    }

    /// Fails on an empty or already registered id. The offered connection is
    /// not stored in either case; closing it is the caller's job.
    pub fn register(&self, session_id: &str, conn: Arc<dyn RawConnection>) -> Result<()> {
        if session_id.is_empty() {
            return Err(FreestreamError::MissingSessionId);
        }
        match self.sessions.entry(session_id.to_string()) {
            Entry::Occupied(_) => Err(FreestreamError::DuplicateSession(session_id.to_string())),
            Entry::Vacant(slot) => {
                let created_seq = self.seq.fetch_add(1, Ordering::Relaxed);
                slot.insert(SessionEntry { conn, created_seq });
                Ok(())
            }
        }
    }

    pub fn lookup(&self, session_id: &str) -> Result<Arc<dyn RawConnection>> {
        self.sessions
            .get(session_id)
            .map(|r| Arc::clone(&r.value().conn))
            .ok_or_else(|| FreestreamError::SessionNotFound(session_id.to_string()))
    }

    /// No-op when absent.
    pub fn unregister(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    /// Remove `session_id` only while it is still bound to `conn_id`.
    /// Returns whether an entry was removed.
    pub fn unregister_connection(&self, session_id: &str, conn_id: ConnectionId) -> bool {
        self.sessions
            .remove_if(session_id, |_, entry| entry.conn.id() == conn_id)
            .is_some()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Registered sessions in insertion order.
    pub fn snapshot(&self) -> Vec<(String, Arc<dyn RawConnection>)> {
        let mut entries: Vec<(u64, String, Arc<dyn RawConnection>)> = self
            .sessions
            .iter()
            .map(|r| (r.value().created_seq, r.key().clone(), Arc::clone(&r.value().conn)))
            .collect();
        entries.sort_by_key(|(seq, _, _)| *seq);
        entries.into_iter().map(|(_, id, conn)| (id, conn)).collect()
    }

    /// Registered session ids in insertion order.
    pub fn session_ids(&self) -> Vec<String> {
        self.snapshot().into_iter().map(|(id, _)| id).collect()
    }
}
