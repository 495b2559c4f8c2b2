//! Freestream gateway library entry.
//!
//! This crate wires the session registry, the listener state machine, the
//! typed listener dispatcher, and the axum WebSocket transport into one
//! server. It is consumed by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod dispatch;
pub mod realtime;
pub mod router;
pub mod services;
pub mod transport;
