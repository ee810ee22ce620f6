//! WebSocket Transport
//!
//! Binding over `tokio-tungstenite`. Each connection runs two tasks: a writer
//! draining an outbound queue into the socket sink and a reader decoding
//! [`frame`](super::frame) envelopes into [`TransportSignal::Event`]s. The
//! credential travels as a bearer token on the upgrade request.
//!
//! [`TransportSignal::Event`]: super::TransportSignal::Event

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::config::TransportConfig;
use super::frame;
use super::traits::{DisconnectReason, SignalSender, TransportBinding, TransportError};

struct ActiveConnection {
    outbound: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
    closing: Arc<AtomicBool>,
    signals: SignalSender,
}

/// WebSocket binding
pub struct WebSocketTransport {
    config: TransportConfig,
    active: Option<ActiveConnection>,
}

impl WebSocketTransport {
    /// Binding for `config.endpoint`
    #[must_use]
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            active: None,
        }
    }

    /// Endpoint this binding connects to
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn teardown(&mut self) -> Option<SignalSender> {
        let active = self.active.take()?;
        active.closing.store(true, Ordering::SeqCst);
        // The writer exits after flushing the close frame
        let _ = active.outbound.send(Message::Close(None));
        active.reader.abort();
        Some(active.signals)
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[async_trait]
impl TransportBinding for WebSocketTransport {
    async fn connect(&mut self, signals: SignalSender) -> Result<(), TransportError> {
        // A previous connection is abandoned silently; its epoch is stale
        self.teardown();

        let mut request = self
            .config
            .endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        if let Some(credential) = &self.config.credential {
            let value = HeaderValue::from_str(&format!("Bearer {}", credential.expose()))
                .map_err(|e| TransportError::AuthenticationFailed(e.to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let timeout = self.config.connect_timeout();
        debug!(endpoint = %self.config.endpoint, timeout_ms = self.config.connect_timeout_ms, "Opening WebSocket");

        let (ws, _response) = tokio::time::timeout(timeout, connect_async(request))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let (mut sink, mut stream) = ws.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let closing = Arc::new(AtomicBool::new(false));

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let is_close = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    debug!(error = %e, "WebSocket writer stopped");
                    break;
                }
                if is_close {
                    break;
                }
            }
        });

        // Connected must precede any event the reader forwards
        info!(endpoint = %self.config.endpoint, "WebSocket connected");
        signals.connected();

        let reader = {
            let signals = signals.clone();
            let closing = Arc::clone(&closing);
            tokio::spawn(async move {
                let reason = loop {
                    match stream.next().await {
                        Some(Ok(Message::Text(text))) => match frame::decode(text.as_str()) {
                            Ok(envelope) => {
                                signals.event(envelope.event, envelope.data);
                            }
                            Err(e) => warn!(error = %e, "Dropping undecodable frame"),
                        },
                        Some(Ok(Message::Close(_))) => break DisconnectReason::ServerInitiated,
                        // Ping/pong are answered by tungstenite; binary is not part of the protocol
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket read failed");
                            break DisconnectReason::TransportError;
                        }
                        None => break DisconnectReason::TransportClosed,
                    }
                };
                if !closing.load(Ordering::SeqCst) {
                    signals.disconnected(reason);
                }
            })
        };

        self.active = Some(ActiveConnection {
            outbound,
            reader,
            closing,
            signals,
        });
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(signals) = self.teardown() {
            info!(endpoint = %self.config.endpoint, "WebSocket closed by client");
            signals.disconnected(DisconnectReason::ClientInitiated);
        }
        Ok(())
    }

    async fn send(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| TransportError::InvalidState("WebSocket not connected".to_string()))?;

        let text = frame::encode(event, &payload)?;
        active
            .outbound
            .send(Message::text(text))
            .map_err(|_| TransportError::SendFailed("WebSocket writer closed".to_string()))
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_before_connect() {
        let transport = WebSocketTransport::new(TransportConfig::default());
        let result = transport.send("join:chat", Value::Null).await;
        assert!(matches!(result, Err(TransportError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_invalid_endpoint() {
        let mut transport = WebSocketTransport::new(TransportConfig::new("not a url"));
        let (signals, _rx) = SignalSender::channel(1);
        let result = transport.connect(signals).await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_idle_disconnect_is_silent() {
        let mut transport = WebSocketTransport::new(TransportConfig::default());
        transport.disconnect().await.unwrap();
    }
}
