//! Frame classification for the transport layer.
//!
//! - Text and Binary frames carry envelope payloads (decoded by the listener)
//! - Ping/Pong/Close are surfaced for lifecycle management

use axum::extract::ws::Message;
use bytes::Bytes;

#[derive(Debug)]
pub enum Inbound {
    Text(String),
    Binary(Bytes),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

impl Inbound {
    /// Envelope bytes for data frames.
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Inbound::Text(s) => Some(s.as_bytes()),
            Inbound::Binary(b) => Some(b.as_ref()),
            Inbound::Ping(_) | Inbound::Pong(_) | Inbound::Close => None,
        }
    }
}

pub fn decode(msg: Message) -> Inbound {
    match msg {
        Message::Text(s) => Inbound::Text(s),
        Message::Binary(b) => Inbound::Binary(Bytes::from(b)),
        Message::Ping(v) => Inbound::Ping(v),
        Message::Pong(v) => Inbound::Pong(v),
        Message::Close(_) => Inbound::Close,
    }
}
