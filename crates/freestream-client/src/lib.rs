//! Freestream client.
//!
//! A browser-style session manager for the Freestream gateway: one
//! connection, an in-memory send queue flushed on open, and a fixed-delay
//! reconnect after every close.
//!
//! - [`ClientSession`] is the transport-free state machine.
//! - [`Client`] drives it over tokio-tungstenite.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod client;
pub mod config;
pub mod error;
pub mod session;

pub use client::Client;
pub use config::{ClientConfig, RECONNECT_DELAY};
pub use error::{ClientError, ClientResult};
pub use session::{ClientEvent, ClientQueueEntry, ClientSession, ClientState, OutboundFrame};
