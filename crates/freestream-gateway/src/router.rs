//! Axum router wiring (HTTP -> WS upgrade).
//!
//! A single route, `gateway.path`, accepts WebSocket upgrades.

use axum::{routing::get, Router};

use crate::{app_state::AppState, transport};

pub fn build_router(state: AppState) -> Router {
    let path = state.cfg().gateway.path.clone();
    Router::new()
        .route(&path, get(transport::ws::ws_upgrade))
        .with_state(state)
}
