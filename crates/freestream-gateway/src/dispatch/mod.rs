//! Listener dispatcher exports.
//!
//! Re-exports the dispatcher, the event types and the handler trait so
//! application code can depend on this module directly.

pub mod dispatcher;

pub use dispatcher::{Dispatcher, Flow, ListenerEvent, ListenerEventKind, ListenerHandler};
