//! Shared application state for the Freestream gateway.
//!
//! Wires the session registry, the dispatcher and the listener, and
//! registers built-in services. Startup errors are returned, not panicked.

use std::sync::Arc;

use freestream_core::error::Result;

use crate::config::GatewayConfig;
use crate::dispatch::Dispatcher;
use crate::realtime::{EventListener, SessionRegistry};
use crate::services::EchoService;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    listener: Arc<EventListener>,
}

struct AppStateInner {
    cfg: GatewayConfig,
}

impl AppState {
    /// Build application state with the built-in services enabled by `cfg`.
    pub fn new(cfg: GatewayConfig) -> Result<Self> {
        Self::with_dispatcher(cfg, Dispatcher::new())
    }

    /// Same as [`AppState::new`], with application handlers already
    /// registered on `dispatcher`.
    pub fn with_dispatcher(cfg: GatewayConfig, dispatcher: Dispatcher) -> Result<Self> {
        cfg.validate()?;

        if cfg.services.echo {
            dispatcher.register(Arc::new(EchoService::new()));
            tracing::info!("echo service enabled");
        }

        let listener = EventListener::new(
            cfg.gateway.prefix.as_str(),
            Arc::new(SessionRegistry::default()),
            Arc::new(dispatcher),
        );

        Ok(Self {
            inner: Arc::new(AppStateInner { cfg }),
            listener: Arc::new(listener),
        })
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn listener(&self) -> Arc<EventListener> {
        Arc::clone(&self.listener)
    }

    pub fn sessions(&self) -> &SessionRegistry {
        self.listener.sessions()
    }
}
