#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::Arc;

use serde_json::json;

use common::{raw, MockConnection, Recorder, Verdict, ALL_KINDS};
use freestream_core::error::FreestreamError;
use freestream_gateway::app_state::AppState;
use freestream_gateway::config;
use freestream_gateway::dispatch::{Dispatcher, ListenerEventKind};
use freestream_gateway::realtime::{EventListener, RawConnection, SessionRegistry};

const PREFIX: &str = "Laravel.Freestream.WebSocket";

fn listener_with(handlers: &[Arc<Recorder>]) -> EventListener {
    let dispatcher = Dispatcher::new();
    for h in handlers {
        dispatcher.register(h.clone());
    }
    EventListener::new(PREFIX, Arc::new(SessionRegistry::new()), Arc::new(dispatcher))
}

#[tokio::test]
async fn open_registers_and_fires_open_then_after() {
    let rec = Recorder::all();
    let listener = listener_with(&[rec.clone()]);
    let conn = MockConnection::new(Some("42"));

    let id = listener.on_open(raw(&conn)).await.unwrap();

    assert_eq!(id, "42");
    assert!(listener.sessions().contains("42"));
    assert!(!conn.is_closed());
    assert_eq!(
        rec.kinds_seen(),
        vec![ListenerEventKind::Open, ListenerEventKind::OpenAfter]
    );
    assert_eq!(rec.seen.lock().unwrap()[0].1.as_deref(), Some("42"));
}

#[tokio::test]
async fn open_without_session_id_closes_and_fires_nothing() {
    let rec = Recorder::all();
    let listener = listener_with(&[rec.clone()]);

    for conn in [MockConnection::new(None), MockConnection::new(Some(""))] {
        let err = listener.on_open(raw(&conn)).await.unwrap_err();
        assert!(matches!(err, FreestreamError::MissingSessionId));
        assert!(conn.is_closed());
    }
    assert!(listener.sessions().is_empty());
    assert!(rec.kinds_seen().is_empty());
}

#[tokio::test]
async fn duplicate_open_is_refused_without_touching_the_owner() {
    let rec = Recorder::all();
    let listener = listener_with(&[rec.clone()]);
    let first = MockConnection::new(Some("s"));
    let second = MockConnection::new(Some("s"));

    listener.on_open(raw(&first)).await.unwrap();
    let err = listener.on_open(raw(&second)).await.unwrap_err();

    assert!(matches!(err, FreestreamError::DuplicateSession(ref id) if id == "s"));
    assert!(second.is_closed());
    assert!(!first.is_closed());
    assert_eq!(listener.sessions().lookup("s").unwrap().id(), first.id());

    // the refused connection's close must not evict the live session
    let err = listener.on_close(&raw(&second)).await.unwrap_err();
    assert_eq!(err.client_code().as_str(), "SESSION_NOT_FOUND");
    assert!(listener.sessions().contains("s"));

    // only the first open was announced
    assert_eq!(
        rec.kinds_seen(),
        vec![ListenerEventKind::Open, ListenerEventKind::OpenAfter]
    );
}

#[tokio::test]
async fn open_veto_unregisters_closes_and_skips_after() {
    let veto = Recorder::new("gate", &[ListenerEventKind::Open], Verdict::Veto);
    let rec = Recorder::all();
    let listener = listener_with(&[veto.clone(), rec.clone()]);
    let conn = MockConnection::new(Some("v"));

    let err = listener.on_open(raw(&conn)).await.unwrap_err();

    assert_eq!(err.client_code().as_str(), "SESSION_REJECTED");
    assert!(conn.is_closed());
    assert!(!listener.sessions().contains("v"));
    assert_eq!(veto.kinds_seen(), vec![ListenerEventKind::Open]);
    // later handlers never ran
    assert!(rec.kinds_seen().is_empty());
}

#[tokio::test]
async fn failing_open_handler_does_not_block_registration() {
    let failing = Recorder::new("broken", &[ListenerEventKind::Open], Verdict::Fail);
    let listener = listener_with(&[failing]);
    let conn = MockConnection::new(Some("f"));

    listener.on_open(raw(&conn)).await.unwrap();
    assert!(listener.sessions().contains("f"));
    assert!(!conn.is_closed());
}

#[tokio::test]
async fn message_is_dispatched_with_session_id() {
    let rec = Recorder::new("msgs", &[ListenerEventKind::Message], Verdict::Proceed);
    let listener = listener_with(&[rec.clone()]);
    let conn = MockConnection::new(Some("42"));
    let raw_conn = raw(&conn);
    listener.on_open(Arc::clone(&raw_conn)).await.unwrap();

    listener
        .on_message(&raw_conn, br#"{"event":"ping","sessionID":"42","message":[]}"#)
        .await
        .unwrap();
    // garbage still reaches handlers as an empty envelope
    listener.on_message(&raw_conn, b"not json").await.unwrap();

    let seen = rec.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert!(seen
        .iter()
        .all(|(k, s)| *k == ListenerEventKind::Message && s.as_deref() == Some("42")));
}

#[tokio::test]
async fn message_from_unknown_connection_fires_nothing() {
    let rec = Recorder::all();
    let listener = listener_with(&[rec.clone()]);
    let stranger = MockConnection::new(Some("ghost"));

    let err = listener
        .on_message(&raw(&stranger), br#"{"event":"x"}"#)
        .await
        .unwrap_err();

    assert_eq!(err.client_code().as_str(), "SESSION_NOT_FOUND");
    assert!(rec.kinds_seen().is_empty());
}

#[tokio::test]
async fn message_handler_error_propagates() {
    let failing = Recorder::new("broken", &[ListenerEventKind::Message], Verdict::Fail);
    let listener = listener_with(&[failing]);
    let conn = MockConnection::new(Some("m"));
    let raw_conn = raw(&conn);
    listener.on_open(Arc::clone(&raw_conn)).await.unwrap();

    let err = listener.on_message(&raw_conn, b"{}").await.unwrap_err();
    assert_eq!(err.client_code().as_str(), "HANDLER");
    // the listener itself does not close on message failure
    assert!(!conn.is_closed());
}

#[tokio::test]
async fn close_fires_close_and_unregisters_even_when_vetoed() {
    let veto = Recorder::new("sticky", &[ListenerEventKind::Close], Verdict::Veto);
    let rec = Recorder::all();
    let listener = listener_with(&[rec.clone(), veto]);
    let conn = MockConnection::new(Some("c"));
    let raw_conn = raw(&conn);
    listener.on_open(Arc::clone(&raw_conn)).await.unwrap();

    listener.on_close(&raw_conn).await.unwrap();

    assert!(!listener.sessions().contains("c"));
    assert_eq!(rec.kinds_seen().last(), Some(&ListenerEventKind::Close));

    // second close: nothing left to do
    let err = listener.on_close(&raw_conn).await.unwrap_err();
    assert_eq!(err.client_code().as_str(), "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn error_fires_error_and_forces_close() {
    let veto = Recorder::new("keep", &[ListenerEventKind::Error], Verdict::Veto);
    let rec = Recorder::new("errors", ALL_KINDS, Verdict::Proceed);
    let listener = listener_with(&[rec.clone(), veto]);
    let conn = MockConnection::new(Some("e"));
    let raw_conn = raw(&conn);
    listener.on_open(Arc::clone(&raw_conn)).await.unwrap();

    listener
        .on_error(&raw_conn, &FreestreamError::Transport("reset by peer".into()))
        .await;

    assert!(conn.is_closed());
    let seen = rec.seen.lock().unwrap().clone();
    assert_eq!(seen.last(), Some(&(ListenerEventKind::Error, Some("e".to_string()))));
    // registry cleanup belongs to the close path
    assert!(listener.sessions().contains("e"));
    listener.on_close(&raw_conn).await.unwrap();
    assert!(listener.sessions().is_empty());
}

#[tokio::test]
async fn error_without_session_still_fires_and_closes() {
    let rec = Recorder::new("errors", &[ListenerEventKind::Error], Verdict::Fail);
    let listener = listener_with(&[rec.clone()]);
    let conn = MockConnection::new(None);

    listener
        .on_error(&raw(&conn), &FreestreamError::Transport("boom".into()))
        .await;

    assert!(conn.is_closed());
    assert_eq!(
        rec.seen.lock().unwrap().clone(),
        vec![(ListenerEventKind::Error, None)]
    );
}

#[tokio::test]
async fn send_to_targets_one_session() {
    let listener = listener_with(&[]);
    let a = MockConnection::new(Some("a"));
    let b = MockConnection::new(Some("b"));
    listener.on_open(raw(&a)).await.unwrap();
    listener.on_open(raw(&b)).await.unwrap();

    listener.send_to("b", "notice", "hello").unwrap();

    assert!(a.sent().is_empty());
    assert_eq!(
        b.sent(),
        vec![json!({
            "origData": {"event": "", "sessionId": "", "message": ""},
            "data": {"event": "notice", "sessionId": "b", "message": "hello"},
        })]
    );

    let err = listener.send_to("zzz", "notice", "hello").unwrap_err();
    assert_eq!(err.client_code().as_str(), "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn echo_service_replies_with_both_groups() {
    let mut cfg = config::GatewayConfig::default();
    cfg.services.echo = true;
    let state = AppState::new(cfg).unwrap();
    let listener = state.listener();
    assert_eq!(listener.dispatcher().handler_count(ListenerEventKind::Message), 1);

    let conn = MockConnection::new(Some("7"));
    let raw_conn = raw(&conn);
    listener.on_open(Arc::clone(&raw_conn)).await.unwrap();
    listener
        .on_message(&raw_conn, br#"{"event":"chat","sessionID":"7","message":[1,2]}"#)
        .await
        .unwrap();

    assert_eq!(
        conn.sent(),
        vec![json!({
            "origData": {"event": "chat", "sessionId": "7", "message": [1, 2]},
            "data": {"event": "chat", "sessionId": "7", "message": [1, 2]},
        })]
    );
}

#[test]
fn event_names_are_qualified_with_prefix() {
    assert_eq!(
        ListenerEventKind::OpenAfter.qualified(PREFIX),
        "Laravel.Freestream.WebSocket.Listener.Open.After"
    );
    assert_eq!(
        ListenerEventKind::Error.qualified("App"),
        "App.Listener.Error"
    );
}
