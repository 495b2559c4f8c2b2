#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use common::{Recorder, Verdict};
use freestream_gateway::app_state::AppState;
use freestream_gateway::config::GatewayConfig;
use freestream_gateway::dispatch::{Dispatcher, ListenerEventKind};
use freestream_gateway::router::build_router;
use freestream_gateway::services::EchoService;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

/// Serve the gateway router on an ephemeral port.
async fn serve(dispatcher: Dispatcher) -> (AppState, u16) {
    let state = AppState::with_dispatcher(GatewayConfig::default(), dispatcher).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let app = build_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (state, port)
}

async fn dial(port: u16, query: &str) -> Socket {
    let url = format!("ws://127.0.0.1:{port}/{query}");
    let (ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    ws
}

/// Next data or close frame; pings and pongs are skipped.
async fn next_frame(ws: &mut Socket) -> Message {
    loop {
        let msg = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("frame timeout")
            .expect("stream ended")
            .expect("socket error");
        match msg {
            Message::Ping(_) | Message::Pong(_) => continue,
            other => return other,
        }
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached");
}

#[tokio::test]
async fn handshake_without_session_id_is_closed() {
    let rec = Recorder::all();
    let dispatcher = Dispatcher::new();
    dispatcher.register(rec.clone());
    let (state, port) = serve(dispatcher).await;

    let mut ws = dial(port, "").await;

    assert!(matches!(next_frame(&mut ws).await, Message::Close(_)));
    assert!(state.sessions().is_empty());
    assert!(rec.kinds_seen().is_empty());
}

#[tokio::test]
async fn failing_message_handler_closes_and_unregisters() {
    let rec = Recorder::all();
    let dispatcher = Dispatcher::new();
    dispatcher.register(Arc::new(EchoService::new()));
    dispatcher.register(rec.clone());
    dispatcher.register(Recorder::new("boom", &[ListenerEventKind::Message], Verdict::Fail));
    let (state, port) = serve(dispatcher).await;

    let mut ws = dial(port, "?sessionId=42").await;
    wait_until(|| state.sessions().contains("42")).await;

    ws.send(Message::Text(r#"{"event":"chat","sessionID":"42","message":"hi"}"#.into()))
        .await
        .unwrap();

    // the echo reply is queued before the failure and must beat the close frame
    let reply = match next_frame(&mut ws).await {
        Message::Text(text) => serde_json::from_str::<Value>(text.as_str()).unwrap(),
        other => panic!("expected the reply first, got {other:?}"),
    };
    assert_eq!(reply["origData"]["event"], "chat");
    assert_eq!(reply["origData"]["message"], "hi");
    assert!(matches!(next_frame(&mut ws).await, Message::Close(_)));

    wait_until(|| state.sessions().is_empty()).await;
    wait_until(|| rec.kinds_seen().contains(&ListenerEventKind::Close)).await;
    assert_eq!(
        rec.kinds_seen(),
        vec![
            ListenerEventKind::Open,
            ListenerEventKind::OpenAfter,
            ListenerEventKind::Message,
            ListenerEventKind::Error,
            ListenerEventKind::Close,
        ]
    );
}

#[tokio::test]
async fn client_close_unregisters_the_session() {
    let rec = Recorder::all();
    let dispatcher = Dispatcher::new();
    dispatcher.register(rec.clone());
    let (state, port) = serve(dispatcher).await;

    let mut ws = dial(port, "?sessionId=7").await;
    wait_until(|| state.sessions().contains("7")).await;

    ws.close(None).await.unwrap();

    wait_until(|| state.sessions().is_empty()).await;
    wait_until(|| rec.kinds_seen().contains(&ListenerEventKind::Close)).await;
    assert!(!rec.kinds_seen().contains(&ListenerEventKind::Error));
}
