//! WebSocket binding tests against a local tungstenite server

#![cfg(feature = "websocket")]

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message;

use realtime_core::{
    names, ConnectionState, Credential, RealtimeClient, TransportConfig, WebSocketTransport,
};

/// What the server side saw
#[derive(Debug)]
enum Seen {
    Authorization(Option<String>),
    Frame(Value),
}

/// Accept one connection, push `greeting`, then report frames until the
/// client hangs up
async fn serve_once(greeting: Value) -> (String, mpsc::UnboundedReceiver<Seen>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let auth_tx = tx.clone();
        let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            let auth = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let _ = auth_tx.send(Seen::Authorization(auth));
            Ok(resp)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();

        ws.send(Message::text(greeting.to_string())).await.unwrap();

        while let Some(Ok(message)) = ws.next().await {
            if let Message::Text(text) = message {
                let value: Value = serde_json::from_str(text.as_str()).unwrap();
                let _ = tx.send(Seen::Frame(value));
            }
        }
    });

    (endpoint, rx)
}

#[tokio::test]
async fn test_round_trip_over_websocket() {
    let greeting = json!({"event": "message:received", "data": {"id": "m1"}});
    let (endpoint, mut seen) = serve_once(greeting).await;
    let config = TransportConfig::new(endpoint).with_credential(Credential::new("secret"));
    let client = RealtimeClient::new(WebSocketTransport::new(config.clone()), &config);

    let (tx, mut inbound) = mpsc::unbounded_channel();
    client.subscribe(names::MESSAGE_RECEIVED, move |payload| {
        let _ = tx.send(payload.clone());
        Ok(())
    });

    client.connect().await;
    client.wait_for_state(ConnectionState::Connected).await;

    match seen.recv().await.unwrap() {
        Seen::Authorization(auth) => assert_eq!(auth.as_deref(), Some("Bearer secret")),
        other => panic!("expected handshake first, got {other:?}"),
    }
    assert_eq!(inbound.recv().await.unwrap(), json!({"id": "m1"}));

    assert!(client.commands().join_chat("general").await.unwrap().is_sent());
    match seen.recv().await.unwrap() {
        Seen::Frame(frame) => assert_eq!(
            frame,
            json!({"event": "join:chat", "data": {"chatId": "general"}})
        ),
        other => panic!("expected a frame, got {other:?}"),
    }

    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_server_close_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.close(None).await.unwrap();
    });

    let mut config = TransportConfig::new(endpoint);
    config.reconnect_attempts = 0;
    let client = RealtimeClient::new(WebSocketTransport::new(config.clone()), &config);

    let (tx, mut disconnects) = mpsc::unbounded_channel();
    client.subscribe(names::DISCONNECT, move |payload| {
        let _ = tx.send(payload.clone());
        Ok(())
    });

    client.connect().await;

    let reason = tokio::time::timeout(Duration::from_secs(5), disconnects.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reason, json!({"reason": "server_initiated"}));
}

#[tokio::test]
async fn test_unreachable_endpoint_reports_connect_error() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let mut config = TransportConfig::new(endpoint);
    config.reconnect_attempts = 0;
    let client = RealtimeClient::new(WebSocketTransport::new(config.clone()), &config);
    let (tx, mut errors) = mpsc::unbounded_channel();
    client.subscribe(names::CONNECT_ERROR, move |payload| {
        let _ = tx.send(payload.clone());
        Ok(())
    });

    client.connect().await;

    let error = tokio::time::timeout(Duration::from_secs(5), errors.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(error["message"].is_string());
    assert_eq!(client.state(), ConnectionState::Disconnected);
}
