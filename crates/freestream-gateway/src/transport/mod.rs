//! Transport layer (WebSocket).
//!
//! Exposes the WS upgrade handler, the axum-backed `RawConnection`, and the
//! codec that classifies frames before they reach the listener.

pub mod codec;
pub mod ws;
