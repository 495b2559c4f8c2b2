//! Realtime core components for the gateway runtime.

mod connection;
mod listener;
mod session_registry;
mod wrapper;

pub use connection::{ConnectionId, RawConnection};
pub use listener::{ConnectionState, EventListener, SESSION_QUERY_KEY};
pub use session_registry::SessionRegistry;
pub use wrapper::ConnectionWrapper;
