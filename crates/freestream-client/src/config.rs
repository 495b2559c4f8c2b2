//! Configuration types for the Freestream client

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use url::Url;

use freestream_core::protocol::DEFAULT_PREFIX;

use crate::error::{ClientError, ClientResult};

/// Fixed wait between a close and the next connection attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Handshake query parameter carrying the session id.
const SESSION_QUERY_KEY: &str = "sessionId";

/// Client options. Every field has a default, so an empty JSON object (or
/// [`ClientConfig::default`]) is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Log every lifecycle transition at `info` instead of `debug`.
    #[serde(default)]
    pub debug: bool,

    /// Namespace of the emitted event names.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_server")]
    pub server: String,

    #[serde(default = "default_port")]
    pub port: String,

    /// Defaults to a random integer in `1..=1000`.
    #[serde(default = "random_session_id")]
    pub session_id: String,

    /// Schedule a new connection attempt after every close.
    #[serde(default = "default_reconnect")]
    pub reconnect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            debug: false,
            prefix: default_prefix(),
            server: default_server(),
            port: default_port(),
            session_id: random_session_id(),
            reconnect: default_reconnect(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(mut self, server: impl Into<String>, port: impl Into<String>) -> Self {
        self.server = server.into();
        self.port = port.into();
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.prefix.is_empty() {
            return Err(ClientError::configuration("prefix must not be empty"));
        }
        if self.session_id.is_empty() {
            return Err(ClientError::configuration("sessionId must not be empty"));
        }
        if self.port.parse::<u16>().is_err() {
            return Err(ClientError::configuration(format!(
                "port must be a number between 0 and 65535, got {:?}",
                self.port
            )));
        }
        Ok(())
    }

    /// `ws://<server>:<port>/?sessionId=<session_id>`
    pub fn connection_url(&self) -> ClientResult<Url> {
        self.validate()?;
        let base = format!("ws://{}:{}/", self.server, self.port);
        let mut url = Url::parse(&base)
            .map_err(|e| ClientError::invalid_url(format!("{base}: {e}")))?;
        url.query_pairs_mut()
            .append_pair(SESSION_QUERY_KEY, &self.session_id);
        Ok(url)
    }
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_server() -> String {
    "localhost".to_string()
}

fn default_port() -> String {
    "8080".to_string()
}

fn default_reconnect() -> bool {
    true
}

fn random_session_id() -> String {
    rand::thread_rng().gen_range(1..=1000u32).to_string()
}
