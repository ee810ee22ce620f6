//! In-Process Transport
//!
//! Channel-free binding for embedding and tests. The binding half is handed
//! to the controller; the [`InProcessPeer`] half plays the server: it decides
//! how connection attempts resolve, pushes inbound events, closes the
//! connection from its side and records everything the client sent.
//!
//! # Usage
//!
//! ```ignore
//! let (transport, peer) = InProcessTransport::new_pair();
//! peer.refuse_next(1, "server warming up");
//!
//! let client = RealtimeClient::new(transport, &TransportConfig::default());
//! client.connect().await;
//! // first attempt is refused, the scheduled retry is accepted
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::traits::{DisconnectReason, SignalSender, TransportBinding, TransportError};

#[derive(Default)]
struct PeerState {
    signals: Option<SignalSender>,
    previous_signals: Option<SignalSender>,
    connected: bool,
    pending: bool,

    hold: bool,
    refuse_forever: bool,
    refuse_remaining: u32,
    refusal_message: String,
    connect_call_error: Option<String>,
    fail_sends: bool,

    connect_calls: u32,
    send_calls: u32,
    sent: Vec<(String, Value)>,
}

/// Client half of an in-process connection
pub struct InProcessTransport {
    state: Arc<Mutex<PeerState>>,
}

/// Server half of an in-process connection
#[derive(Clone)]
pub struct InProcessPeer {
    state: Arc<Mutex<PeerState>>,
}

impl InProcessTransport {
    /// Create a binding and the peer that controls it
    ///
    /// The peer accepts every connection attempt until told otherwise.
    #[must_use]
    pub fn new_pair() -> (Self, InProcessPeer) {
        let state = Arc::new(Mutex::new(PeerState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            InProcessPeer { state },
        )
    }
}

#[async_trait]
impl TransportBinding for InProcessTransport {
    async fn connect(&mut self, signals: SignalSender) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.connect_calls += 1;

        if let Some(message) = state.connect_call_error.take() {
            return Err(TransportError::ConnectionFailed(message));
        }

        state.connected = false;
        state.pending = false;
        state.previous_signals = state.signals.replace(signals.clone());

        if state.refuse_forever || state.refuse_remaining > 0 {
            state.refuse_remaining = state.refuse_remaining.saturating_sub(1);
            signals.connect_error(state.refusal_message.clone());
        } else if state.hold {
            state.pending = true;
        } else {
            state.connected = true;
            signals.connected();
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        let was_connected = state.connected;
        state.connected = false;
        state.pending = false;
        if was_connected {
            if let Some(signals) = &state.signals {
                signals.disconnected(DisconnectReason::ClientInitiated);
            }
        }
        Ok(())
    }

    async fn send(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.send_calls += 1;

        if !state.connected {
            return Err(TransportError::InvalidState(
                "Transport not connected".to_string(),
            ));
        }
        if state.fail_sends {
            return Err(TransportError::SendFailed("Peer rejected event".to_string()));
        }

        state.sent.push((event.to_string(), payload));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in-process"
    }
}

impl InProcessPeer {
    // ========================================================================
    // Connection policy
    // ========================================================================

    /// Accept every attempt immediately (the default)
    pub fn accept_all(&self) {
        let mut state = self.state.lock();
        state.hold = false;
        state.refuse_forever = false;
        state.refuse_remaining = 0;
    }

    /// Refuse the next `count` attempts with `message`
    pub fn refuse_next(&self, count: u32, message: impl Into<String>) {
        let mut state = self.state.lock();
        state.refuse_remaining = count;
        state.refusal_message = message.into();
    }

    /// Refuse every attempt with `message`
    pub fn refuse_all(&self, message: impl Into<String>) {
        let mut state = self.state.lock();
        state.refuse_forever = true;
        state.refusal_message = message.into();
    }

    /// Leave attempts pending until [`accept_pending`](Self::accept_pending)
    /// or [`reject_pending`](Self::reject_pending)
    pub fn hold_connects(&self, hold: bool) {
        self.state.lock().hold = hold;
    }

    /// Make the next `connect` call itself return an error
    pub fn fail_next_connect_call(&self, message: impl Into<String>) {
        self.state.lock().connect_call_error = Some(message.into());
    }

    /// Reject every outbound event while connected
    pub fn fail_sends(&self, fail: bool) {
        self.state.lock().fail_sends = fail;
    }

    // ========================================================================
    // Server actions
    // ========================================================================

    /// Resolve a held attempt as connected
    pub fn accept_pending(&self) -> bool {
        let mut state = self.state.lock();
        if !state.pending {
            return false;
        }
        state.pending = false;
        state.connected = true;
        state.signals.as_ref().is_some_and(SignalSender::connected)
    }

    /// Resolve a held attempt as failed
    pub fn reject_pending(&self, message: impl Into<String>) -> bool {
        let mut state = self.state.lock();
        if !state.pending {
            return false;
        }
        state.pending = false;
        let message = message.into();
        state
            .signals
            .as_ref()
            .is_some_and(|s| s.connect_error(message))
    }

    /// Deliver an inbound event; ignored unless connected
    pub fn emit(&self, event: &str, payload: Value) -> bool {
        let state = self.state.lock();
        if !state.connected {
            return false;
        }
        state
            .signals
            .as_ref()
            .is_some_and(|s| s.event(event, payload))
    }

    /// Deliver an event through the previous connection's signal handle
    pub fn emit_from_previous(&self, event: &str, payload: Value) -> bool {
        self.state
            .lock()
            .previous_signals
            .as_ref()
            .is_some_and(|s| s.event(event, payload))
    }

    /// Close the connection from the server side
    pub fn close(&self) -> bool {
        self.end_connection(DisconnectReason::ServerInitiated)
    }

    /// End the connection with an arbitrary reason
    pub fn end_connection(&self, reason: DisconnectReason) -> bool {
        let mut state = self.state.lock();
        if !state.connected {
            return false;
        }
        state.connected = false;
        state
            .signals
            .as_ref()
            .is_some_and(|s| s.disconnected(reason))
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Number of `connect` calls the binding received
    #[must_use]
    pub fn connect_calls(&self) -> u32 {
        self.state.lock().connect_calls
    }

    /// Number of `send` calls the binding received
    #[must_use]
    pub fn send_calls(&self) -> u32 {
        self.state.lock().send_calls
    }

    /// Events accepted from the client, in order
    #[must_use]
    pub fn sent_events(&self) -> Vec<(String, Value)> {
        self.state.lock().sent.clone()
    }

    /// Whether the peer considers the connection open
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Whether an attempt is waiting for a decision
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.state.lock().pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::traits::TransportSignal;
    use serde_json::json;

    #[tokio::test]
    async fn test_accepts_by_default() {
        let (mut transport, peer) = InProcessTransport::new_pair();
        let (signals, mut rx) = SignalSender::channel(1);

        transport.connect(signals).await.unwrap();

        assert!(peer.is_connected());
        assert_eq!(rx.try_recv().unwrap(), (1, TransportSignal::Connected));
    }

    #[tokio::test]
    async fn test_refuse_next_then_accept() {
        let (mut transport, peer) = InProcessTransport::new_pair();
        peer.refuse_next(1, "busy");
        let (signals, mut rx) = SignalSender::channel(1);

        transport.connect(signals.clone()).await.unwrap();
        assert_eq!(
            rx.try_recv().unwrap().1,
            TransportSignal::ConnectError {
                message: "busy".to_string()
            }
        );

        transport.connect(signals.with_epoch(2)).await.unwrap();
        assert_eq!(rx.try_recv().unwrap(), (2, TransportSignal::Connected));
        assert_eq!(peer.connect_calls(), 2);
    }

    #[tokio::test]
    async fn test_connect_call_error() {
        let (mut transport, peer) = InProcessTransport::new_pair();
        peer.fail_next_connect_call("dns failure");
        let (signals, mut rx) = SignalSender::channel(1);

        let result = transport.connect(signals).await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_held_connect() {
        let (mut transport, peer) = InProcessTransport::new_pair();
        peer.hold_connects(true);
        let (signals, mut rx) = SignalSender::channel(1);

        transport.connect(signals).await.unwrap();
        assert!(peer.has_pending());
        assert!(rx.try_recv().is_err());

        assert!(peer.accept_pending());
        assert_eq!(rx.try_recv().unwrap().1, TransportSignal::Connected);
        assert!(!peer.accept_pending());
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let (mut transport, peer) = InProcessTransport::new_pair();

        let result = transport.send("join:chat", json!({})).await;
        assert!(matches!(result, Err(TransportError::InvalidState(_))));

        let (signals, _rx) = SignalSender::channel(1);
        transport.connect(signals).await.unwrap();
        transport
            .send("join:chat", json!({"chatId": "c1"}))
            .await
            .unwrap();

        assert_eq!(
            peer.sent_events(),
            vec![("join:chat".to_string(), json!({"chatId": "c1"}))]
        );
        assert_eq!(peer.send_calls(), 2);
    }

    #[tokio::test]
    async fn test_client_disconnect_reports_reason() {
        let (mut transport, peer) = InProcessTransport::new_pair();
        let (signals, mut rx) = SignalSender::channel(1);
        transport.connect(signals).await.unwrap();
        let _ = rx.try_recv();

        transport.disconnect().await.unwrap();
        assert!(!peer.is_connected());
        assert_eq!(
            rx.try_recv().unwrap().1,
            TransportSignal::Disconnected {
                reason: DisconnectReason::ClientInitiated
            }
        );

        // Idle disconnect is silent
        transport.disconnect().await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_emit_only_while_connected() {
        let (mut transport, peer) = InProcessTransport::new_pair();
        assert!(!peer.emit("message:received", json!({})));

        let (signals, mut rx) = SignalSender::channel(1);
        transport.connect(signals).await.unwrap();
        let _ = rx.try_recv();

        assert!(peer.emit("message:received", json!({"id": "m1"})));
        assert!(matches!(
            rx.try_recv().unwrap().1,
            TransportSignal::Event { ref name, .. } if name == "message:received"
        ));

        assert!(peer.close());
        assert!(!peer.close());
    }
}
