//! Native driver using tokio-tungstenite.
//!
//! One background task owns the socket. It runs `init -> connect -> open ->
//! read/write -> close` and then waits [`RECONNECT_DELAY`](crate::RECONNECT_DELAY)
//! before starting again, for as long as reconnecting is enabled. The
//! [`Client`] handle shares the [`ClientSession`] with that task.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::session::{ClientEvent, ClientQueueEntry, ClientSession, ClientState, OutboundFrame};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How a single connection ended.
enum Exit {
    Closed,
    Shutdown,
}

/// Handle to a reconnecting client. Dropping it stops the background task.
pub struct Client {
    config: ClientConfig,
    session: Arc<Mutex<ClientSession>>,
    events: broadcast::Sender<ClientEvent>,
    shutdown: watch::Sender<bool>,
    driver: Option<JoinHandle<()>>,
}

impl Client {
    /// Validate `config` and start connecting in the background. Must be
    /// called from within a tokio runtime.
    pub fn connect(config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;

        let session = ClientSession::new(config.clone());
        let events = session.event_sender();
        let session = Arc::new(Mutex::new(session));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let driver = tokio::spawn(drive(Arc::clone(&session), shutdown_rx));

        Ok(Self {
            config,
            session,
            events,
            shutdown,
            driver: Some(driver),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send now if open, otherwise queue until the next open.
    pub async fn send(&self, event: impl Into<String>, payload: impl Into<Value>) -> ClientResult<()> {
        self.session.lock().await.send(event, payload)
    }

    pub async fn state(&self) -> ClientState {
        self.session.lock().await.state()
    }

    pub async fn queued(&self) -> usize {
        self.session.lock().await.queued()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Close the socket, cancel any scheduled reconnect and wait for the
    /// background task to finish.
    pub async fn disconnect(mut self) -> ClientResult<()> {
        let _ = self.shutdown.send(true);
        if let Some(driver) = self.driver.take() {
            driver
                .await
                .map_err(|e| ClientError::internal(format!("driver task failed: {e}")))?;
        }
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

async fn drive(session: Arc<Mutex<ClientSession>>, mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let init = session.lock().await.init();
        let url = match init {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "cannot start connection");
                session.lock().await.on_error(&e);
                break;
            }
        };

        let attempt = tokio::select! {
            _ = shutdown.changed() => break,
            res = connect_async(url.as_str()) => res,
        };

        match attempt {
            Ok((socket, response)) => {
                debug!(%url, status = %response.status(), "websocket connected");
                if let Exit::Shutdown = run_connection(&session, socket, &mut shutdown).await {
                    break;
                }
            }
            Err(e) => {
                session.lock().await.on_error(&ClientError::WebSocket(e));
            }
        }

        let reconnect = session.lock().await.on_close();
        let Some(delay) = reconnect else {
            break;
        };
        if !wait_reconnect(delay, &mut shutdown).await {
            break;
        }
    }

    session.lock().await.on_disconnect();
    info!("client stopped");
}

async fn run_connection(
    session: &Mutex<ClientSession>,
    socket: Socket,
    shutdown: &mut watch::Receiver<bool>,
) -> Exit {
    let (link, mut outbound) = mpsc::unbounded_channel::<OutboundFrame>();

    {
        let mut session = session.lock().await;
        if let Err(e) = session.on_open(link) {
            session.on_error(&e);
        }
    }

    let (exit, failed) = pump(session, socket, &mut outbound, shutdown).await;

    // frames accepted by the link but never written go back to the queue
    let unsent = drain_unsent(&mut outbound, failed);
    session.lock().await.requeue(unsent);
    exit
}

/// Move frames between the socket and the session until either side ends.
/// Also returns the frame whose write failed, if that is what ended it.
async fn pump(
    session: &Mutex<ClientSession>,
    socket: Socket,
    outbound: &mut mpsc::UnboundedReceiver<OutboundFrame>,
    shutdown: &mut watch::Receiver<bool>,
) -> (Exit, Option<OutboundFrame>) {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if let Err(e) = sink.send(Message::Close(None)).await {
                    debug!(error = %e, "close frame not sent");
                }
                return (Exit::Shutdown, None);
            }

            Some(frame) = outbound.recv() => {
                if let Err(e) = sink.send(Message::Text(frame.text.clone().into())).await {
                    session.lock().await.on_error(&ClientError::WebSocket(e));
                    return (Exit::Closed, Some(frame));
                }
            }

            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        session.lock().await.on_message(text.as_str());
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        session.lock().await.on_message(String::from_utf8_lossy(&bytes));
                    }
                    Some(Ok(Message::Close(_))) | None => return (Exit::Closed, None),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        session.lock().await.on_error(&ClientError::WebSocket(e));
                        return (Exit::Closed, None);
                    }
                }
            }
        }
    }
}

/// Close the link and collect what is still in it, oldest first.
fn drain_unsent(
    outbound: &mut mpsc::UnboundedReceiver<OutboundFrame>,
    failed: Option<OutboundFrame>,
) -> Vec<ClientQueueEntry> {
    outbound.close();
    let mut unsent: Vec<ClientQueueEntry> = failed.into_iter().map(|f| f.entry).collect();
    while let Ok(frame) = outbound.try_recv() {
        unsent.push(frame.entry);
    }
    unsent
}

/// `false` when shutdown arrived first.
async fn wait_reconnect(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = shutdown.changed() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
