//! Client -> server frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FreestreamError, Result};

/// Flat frame a client transmits: `{"event", "sessionID", "message"}`.
///
/// The server reads it with [`MessageEnvelope::decode`](super::MessageEnvelope::decode).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    /// Application payload; an absent payload is sent as `[]`.
    #[serde(default = "empty_message")]
    pub message: Value,
}

fn empty_message() -> Value {
    Value::Array(Vec::new())
}

impl ClientFrame {
    pub fn new(event: impl Into<String>, session_id: impl Into<String>, message: Option<Value>) -> Self {
        let message = match message {
            None | Some(Value::Null) => empty_message(),
            Some(v) => v,
        };
        Self {
            event: event.into(),
            session_id: session_id.into(),
            message,
        }
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| FreestreamError::BadRequest(format!("frame encode failed: {e}")))
    }
}
