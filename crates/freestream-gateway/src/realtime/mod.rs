//! Realtime runtime for the Freestream gateway.
//!
//! Session registry keyed by session id, the connection wrapper used to
//! reply through a connection, and the listener state machine that drives
//! both from raw connection lifecycle callbacks.

pub mod core;

pub use self::core::{
    ConnectionId, ConnectionState, ConnectionWrapper, EventListener, RawConnection,
    SessionRegistry, SESSION_QUERY_KEY,
};
