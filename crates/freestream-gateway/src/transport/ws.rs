//! WebSocket handler.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS, keeping the query string as handshake metadata
//! - Wrap the socket in an `AxumConnection` (bounded outbound queue + close signal)
//! - Drive the listener: open, message*, error, close
//! - Lifecycle: ping/pong + idle timeout

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, Query, State},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Notify};
use tokio::time::{Duration, Instant};
use tracing::Instrument;

use freestream_core::error::{FreestreamError, Result};

use crate::app_state::AppState;
use crate::realtime::{ConnectionId, ConnectionState, EventListener, RawConnection};
use crate::transport::codec::{decode, Inbound};

// --------------------
// Connection handle
// --------------------

/// Axum socket as seen by the listener. Outbound frames go through a bounded
/// queue drained by the session loop; `close` wakes the loop.
pub struct AxumConnection {
    id: ConnectionId,
    query: HashMap<String, String>,
    tx: mpsc::Sender<Message>,
    closing: AtomicBool,
    close_signal: Notify,
}

impl AxumConnection {
    pub fn new(query: HashMap<String, String>, tx: mpsc::Sender<Message>) -> Self {
        Self {
            id: ConnectionId::next(),
            query,
            tx,
            closing: AtomicBool::new(false),
            close_signal: Notify::new(),
        }
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    async fn closed(&self) {
        if self.is_closing() {
            return;
        }
        self.close_signal.notified().await;
    }
}

impl RawConnection for AxumConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn query_param(&self, key: &str) -> Option<String> {
        self.query.get(key).cloned()
    }

    fn send_text(&self, text: String) -> Result<()> {
        if self.is_closing() {
            return Err(FreestreamError::Transport("connection is closing".into()));
        }
        self.tx.try_send(Message::Text(text)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                FreestreamError::Transport("outbound queue full".into())
            }
            mpsc::error::TrySendError::Closed(_) => {
                FreestreamError::Transport("connection closed".into())
            }
        })
    }

    fn close(&self) {
        if !self.closing.swap(true, Ordering::AcqRel) {
            self.close_signal.notify_one();
        }
    }
}

// --------------------
// Session local state
// --------------------
#[derive(Debug)]
struct SessionState {
    state: ConnectionState,
    last_activity: Instant,
}

// --------------------
// Entry
// --------------------
pub async fn ws_upgrade(
    State(app): State<AppState>,
    ws: WebSocketUpgrade,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    ws.on_upgrade(move |socket| {
        let span = tracing::info_span!("ws_session");
        run_session(app, query, socket).instrument(span)
    })
}

// --------------------
// Core session loop
// --------------------
async fn run_session(app: AppState, query: HashMap<String, String>, socket: WebSocket) {
    let listener = app.listener();
    let gw = &app.cfg().gateway;

    // ---- outbound channel
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(gw.outbound_buffer);
    let conn = Arc::new(AxumConnection::new(query, out_tx));
    let raw: Arc<dyn RawConnection> = conn.clone();

    // ---- split socket
    let (mut ws_tx, mut ws_rx) = socket.split();

    if let Err(e) = listener.on_open(Arc::clone(&raw)).await {
        tracing::debug!(conn_id = %raw.id(), code = e.client_code().as_str(), "open rejected");
        let _ = ws_tx.send(Message::Close(None)).await;
        return;
    }

    // ---- timers
    let ping_every = Duration::from_millis(gw.ping_interval_ms);
    let idle_timeout = Duration::from_millis(gw.idle_timeout_ms);

    let mut ping_tick = tokio::time::interval(ping_every);
    ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut sess = SessionState {
        state: ConnectionState::Open,
        last_activity: Instant::now(),
    };

    while sess.state == ConnectionState::Open {
        tokio::select! {
            // close requested (listener error path, rejected handler, ...)
            _ = conn.closed() => {
                sess.state = ConnectionState::Closed;
            }

            // outbound writer
            maybe_out = out_rx.recv() => {
                match maybe_out {
                    Some(m) => {
                        if let Err(e) = ws_tx.send(m).await {
                            listener.on_error(&raw, &FreestreamError::Transport(e.to_string())).await;
                            sess.state = ConnectionState::Closed;
                        }
                    }
                    None => sess.state = ConnectionState::Closed,
                }
            }

            // inbound reader
            incoming = ws_rx.next() => {
                match incoming {
                    None => sess.state = ConnectionState::Closed,
                    Some(Err(e)) => {
                        listener.on_error(&raw, &FreestreamError::Transport(e.to_string())).await;
                        sess.state = ConnectionState::Closed;
                    }
                    Some(Ok(msg)) => {
                        sess.last_activity = Instant::now();
                        let inbound = decode(msg);
                        if let Some(payload) = inbound.payload() {
                            handle_frame(&listener, &raw, payload).await;
                            continue;
                        }
                        match inbound {
                            Inbound::Ping(payload) => {
                                if let Err(e) = ws_tx.send(Message::Pong(payload)).await {
                                    tracing::debug!(conn_id = %raw.id(), error = %e, "pong not sent");
                                }
                            }
                            Inbound::Close => sess.state = ConnectionState::Closed,
                            Inbound::Pong(_) | Inbound::Text(_) | Inbound::Binary(_) => {}
                        }
                    }
                }
            }

            // ping
            // a ping that cannot be written means the socket is gone
            _ = ping_tick.tick() => {
                if let Err(e) = ws_tx.send(Message::Ping(Vec::new())).await {
                    tracing::debug!(conn_id = %raw.id(), error = %e, "ping not sent");
                    listener.on_error(&raw, &FreestreamError::Transport(e.to_string())).await;
                    sess.state = ConnectionState::Closed;
                }
            }

            // idle timeout
            _ = tokio::time::sleep(Duration::from_millis(250)) => {
                if sess.last_activity.elapsed() >= idle_timeout {
                    tracing::debug!(conn_id = %raw.id(), "idle timeout");
                    sess.state = ConnectionState::Closed;
                }
            }
        }
    }

    // flush replies queued before the close, then say goodbye
    while let Ok(m) = out_rx.try_recv() {
        if ws_tx.send(m).await.is_err() {
            break;
        }
    }
    let _ = ws_tx.send(Message::Close(None)).await;

    if let Err(e) = listener.on_close(&raw).await {
        tracing::debug!(conn_id = %raw.id(), error = %e, "closed connection had no session");
    }
}

/// Message path. Unknown sessions are logged; handler failures go down the
/// error path, which force-closes the connection.
async fn handle_frame(listener: &EventListener, raw: &Arc<dyn RawConnection>, payload: &[u8]) {
    match listener.on_message(raw, payload).await {
        Ok(()) => {}
        Err(e @ FreestreamError::SessionNotFound(_)) => {
            tracing::warn!(conn_id = %raw.id(), error = %e, "message for unknown session");
        }
        Err(e) => listener.on_error(raw, &e).await,
    }
}
