//! Message envelope (JSON).
//!
//! An envelope tracks three fields (`event`, `sessionId`, `message`) twice:
//! `original` holds the values as received and is never mutated after
//! decoding; `current` is the working copy a reply is composed in.
//!
//! Field setters only write into `current` and silently ignore JSON objects.
//! Decoding fills `original` directly, so objects received from a peer are
//! kept there.

use serde_json::{json, Map, Value};

/// Value returned for absent fields.
static EMPTY: Value = Value::String(String::new());

/// Top-level keys of the encoded response object.
const ORIG_DATA_KEY: &str = "origData";
const DATA_KEY: &str = "data";

/// One of the three envelope fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Event,
    SessionId,
    Message,
}

impl Field {
    /// JSON key used when encoding.
    pub fn key(self) -> &'static str {
        match self {
            Field::Event => "event",
            Field::SessionId => "sessionId",
            Field::Message => "message",
        }
    }

    /// Static, case-insensitive key matching. Clients send `sessionID`, the
    /// response object uses `sessionId`; both resolve to the same field.
    fn from_key(key: &str) -> Option<Self> {
        if key.eq_ignore_ascii_case("event") {
            Some(Field::Event)
        } else if key.eq_ignore_ascii_case("sessionId") {
            Some(Field::SessionId)
        } else if key.eq_ignore_ascii_case("message") {
            Some(Field::Message)
        } else {
            None
        }
    }
}

/// Which snapshot a getter reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Source {
    /// Values as received.
    Original,
    /// Working copy for the reply.
    #[default]
    Current,
}

/// One group of envelope values. `None` means the key is absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    event: Option<Value>,
    session_id: Option<Value>,
    message: Option<Value>,
}

impl Snapshot {
    fn slot(&self, field: Field) -> &Option<Value> {
        match field {
            Field::Event => &self.event,
            Field::SessionId => &self.session_id,
            Field::Message => &self.message,
        }
    }

    fn slot_mut(&mut self, field: Field) -> &mut Option<Value> {
        match field {
            Field::Event => &mut self.event,
            Field::SessionId => &mut self.session_id,
            Field::Message => &mut self.message,
        }
    }

    /// Value of `field`, or an empty string when absent.
    pub fn get(&self, field: Field) -> &Value {
        self.slot(field).as_ref().unwrap_or(&EMPTY)
    }

    /// Whether `field` was ever set.
    pub fn contains(&self, field: Field) -> bool {
        self.slot(field).is_some()
    }

    /// Read the three known keys out of a JSON object. Unknown keys are ignored.
    fn from_map(map: &Map<String, Value>) -> Self {
        let mut snap = Snapshot::default();
        for (key, value) in map {
            if let Some(field) = Field::from_key(key) {
                *snap.slot_mut(field) = Some(value.clone());
            }
        }
        snap
    }

    fn into_fields(self) -> impl Iterator<Item = (Field, Value)> {
        [
            (Field::Event, self.event),
            (Field::SessionId, self.session_id),
            (Field::Message, self.message),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|v| (field, v)))
    }

    fn to_json(&self) -> Value {
        json!({
            "event": self.get(Field::Event),
            "sessionId": self.get(Field::SessionId),
            "message": self.get(Field::Message),
        })
    }
}

/// Envelope with an immutable "as received" snapshot and a mutable reply copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageEnvelope {
    original: Snapshot,
    current: Snapshot,
}

impl MessageEnvelope {
    /// Empty envelope: every field of both snapshots is absent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a raw frame. Never fails.
    ///
    /// - A flat object (`{"event", "sessionID", "message"}`) fills `original`;
    ///   `current` starts empty.
    /// - A response object (`{"origData": {...}, "data": {...}}` with none of
    ///   the flat keys at top level) fills `original` from `origData` and
    ///   `current` from `data` (through the setters, so objects in `data` are
    ///   dropped). On a flat frame `origData`/`data` are unknown keys.
    /// - Anything else, including invalid JSON, yields an empty envelope.
    pub fn decode(raw: impl AsRef<[u8]>) -> Self {
        let map = match serde_json::from_slice::<Value>(raw.as_ref()) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                tracing::debug!("envelope is not a JSON object; using defaults");
                return Self::default();
            }
            Err(e) => {
                tracing::debug!(error = %e, "envelope is not valid JSON; using defaults");
                return Self::default();
            }
        };

        let orig_group = map.get(ORIG_DATA_KEY).and_then(Value::as_object);
        let data_group = map.get(DATA_KEY).and_then(Value::as_object);
        let has_flat_fields = map.keys().any(|key| Field::from_key(key).is_some());

        if has_flat_fields || (orig_group.is_none() && data_group.is_none()) {
            return Self {
                original: Snapshot::from_map(&map),
                current: Snapshot::default(),
            };
        }

        let mut env = Self {
            original: orig_group.map(Snapshot::from_map).unwrap_or_default(),
            current: Snapshot::default(),
        };
        if let Some(data) = data_group {
            for (field, value) in Snapshot::from_map(data).into_fields() {
                env.set(field, value);
            }
        }
        env
    }

    /// Encode both snapshots as the response object.
    pub fn encode(&self) -> String {
        json!({
            "origData": self.original.to_json(),
            "data": self.current.to_json(),
        })
        .to_string()
    }

    pub fn original(&self) -> &Snapshot {
        &self.original
    }

    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    /// Read a field from the chosen snapshot; absent keys read as `""`.
    pub fn get(&self, field: Field, source: Source) -> &Value {
        match source {
            Source::Original => self.original.get(field),
            Source::Current => self.current.get(field),
        }
    }

    pub fn event(&self, source: Source) -> &Value {
        self.get(Field::Event, source)
    }

    pub fn session_id(&self, source: Source) -> &Value {
        self.get(Field::SessionId, source)
    }

    pub fn message(&self, source: Source) -> &Value {
        self.get(Field::Message, source)
    }

    /// Write into `current`. JSON objects are ignored, everything else
    /// (strings, numbers, booleans, null, arrays) is stored.
    pub fn set(&mut self, field: Field, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        if value.is_object() {
            tracing::trace!(field = field.key(), "object value ignored by setter");
            return self;
        }
        *self.current.slot_mut(field) = Some(value);
        self
    }

    pub fn set_event(&mut self, value: impl Into<Value>) -> &mut Self {
        self.set(Field::Event, value)
    }

    pub fn set_session_id(&mut self, value: impl Into<Value>) -> &mut Self {
        self.set(Field::SessionId, value)
    }

    pub fn set_message(&mut self, value: impl Into<Value>) -> &mut Self {
        self.set(Field::Message, value)
    }
}
