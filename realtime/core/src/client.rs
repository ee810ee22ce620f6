//! Realtime client
//!
//! One handle bundling a connection's controller, event bus, diagnostics and
//! command facade. This is what a UI embeds: connect once, subscribe to the
//! events it renders, issue commands.
//!
//! # Example
//!
//! ```ignore
//! let (transport, _peer) = InProcessTransport::new_pair();
//! let client = RealtimeClient::new(transport, &TransportConfig::default());
//!
//! client.subscribe(names::MESSAGE_RECEIVED, |payload| {
//!     println!("new message: {payload}");
//!     Ok(())
//! });
//!
//! client.connect().await;
//! client.commands().join_chat("general").await?;
//! ```

use serde_json::Value;
use tokio::sync::{broadcast, watch};

use crate::bus::{EventBus, SubscriptionHandle};
use crate::commands::CommandFacade;
use crate::config::RealtimeConfig;
use crate::connection::{ConnectionController, ConnectionState, ReconnectPolicy};
use crate::diagnostics::{Diagnostic, Diagnostics, DEFAULT_DIAGNOSTICS_CAPACITY};
use crate::events::{session_topic, SessionId};
use crate::streaming::StreamingSession;
use crate::transport::{TransportBinding, TransportConfig};

/// Cloneable handle to a realtime connection
#[derive(Clone, Debug)]
pub struct RealtimeClient {
    controller: ConnectionController,
    commands: CommandFacade,
}

impl RealtimeClient {
    /// Client over `transport` using the reconnect settings in `config`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new<T>(transport: T, config: &TransportConfig) -> Self
    where
        T: TransportBinding + 'static,
    {
        Self::with_policy(transport, config.reconnect_policy(), DEFAULT_DIAGNOSTICS_CAPACITY)
    }

    /// Client built from a fully loaded configuration
    pub fn from_config<T>(transport: T, config: &RealtimeConfig) -> Self
    where
        T: TransportBinding + 'static,
    {
        Self::with_policy(
            transport,
            config.transport.reconnect_policy(),
            config.diagnostics_capacity,
        )
    }

    /// Client with an explicit policy and diagnostics capacity
    pub fn with_policy<T>(transport: T, policy: ReconnectPolicy, diagnostics_capacity: usize) -> Self
    where
        T: TransportBinding + 'static,
    {
        let diagnostics = Diagnostics::new(diagnostics_capacity);
        let bus = EventBus::new(diagnostics.clone());
        let controller = ConnectionController::new(transport, policy, bus, diagnostics);
        let commands = CommandFacade::new(controller.clone());
        Self {
            controller,
            commands,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start connecting; see [`ConnectionController::connect`]
    pub async fn connect(&self) {
        self.controller.connect().await;
    }

    /// Disconnect without reconnecting
    pub async fn disconnect(&self) {
        self.controller.disconnect().await;
    }

    /// Disconnect and connect again with a fresh reconnect budget
    pub async fn reconnect(&self) {
        self.controller.reconnect().await;
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.controller.state()
    }

    /// Whether the connection is up
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.controller.is_connected()
    }

    /// Automatic attempts made since the last reset
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.controller.reconnect_attempts()
    }

    /// Observe state transitions
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.controller.watch_state()
    }

    /// Wait until the connection reaches `target`
    pub async fn wait_for_state(&self, target: ConnectionState) {
        self.controller.wait_for_state(target).await;
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Register `handler` for `event`
    pub fn subscribe<F>(&self, event: impl Into<String>, handler: F) -> SubscriptionHandle
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.controller.bus().subscribe(event, handler)
    }

    /// Register `handler` for every update of one streaming session
    pub fn subscribe_session<F>(&self, session_id: &SessionId, handler: F) -> SubscriptionHandle
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.controller
            .bus()
            .subscribe(session_topic(session_id), handler)
    }

    /// Remove a registration; `false` if it was already gone
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        self.controller.bus().unsubscribe(handle)
    }

    /// The underlying bus
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        self.controller.bus()
    }

    /// Observe diagnostics emitted from now on
    #[must_use]
    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.controller.diagnostics().subscribe()
    }

    // ========================================================================
    // Commands and sessions
    // ========================================================================

    /// Typed outbound commands
    #[must_use]
    pub fn commands(&self) -> &CommandFacade {
        &self.commands
    }

    /// The underlying controller
    #[must_use]
    pub fn controller(&self) -> &ConnectionController {
        &self.controller
    }

    /// Ids of open streaming sessions
    #[must_use]
    pub fn active_sessions(&self) -> Vec<SessionId> {
        self.controller.active_sessions()
    }

    /// Snapshot of one open streaming session
    #[must_use]
    pub fn session(&self, session_id: &SessionId) -> Option<StreamingSession> {
        self.controller.session(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::names;
    use crate::transport::InProcessTransport;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_inbound_events_reach_subscribers() {
        let (transport, peer) = InProcessTransport::new_pair();
        let client = RealtimeClient::new(transport, &TransportConfig::default());
        let (tx, mut rx) = mpsc::unbounded_channel();

        client.subscribe(names::MESSAGE_RECEIVED, move |payload| {
            let _ = tx.send(payload.clone());
            Ok(())
        });

        client.connect().await;
        client.wait_for_state(ConnectionState::Connected).await;
        peer.emit(names::MESSAGE_RECEIVED, json!({"id": "m1", "content": "hi"}));

        assert_eq!(rx.recv().await.unwrap()["id"], json!("m1"));
    }

    #[tokio::test]
    async fn test_lifecycle_events_published() {
        let (transport, peer) = InProcessTransport::new_pair();
        let client = RealtimeClient::new(transport, &TransportConfig::default());
        let (tx, mut rx) = mpsc::unbounded_channel();

        for event in [names::CONNECT, names::DISCONNECT] {
            let tx = tx.clone();
            client.subscribe(event, move |payload| {
                let _ = tx.send((event, payload.clone()));
                Ok(())
            });
        }

        client.connect().await;
        assert_eq!(rx.recv().await.unwrap(), (names::CONNECT, Value::Null));

        client.disconnect().await;
        assert_eq!(
            rx.recv().await.unwrap(),
            (names::DISCONNECT, json!({"reason": "client_initiated"}))
        );
        assert!(!peer.is_connected());
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_unsubscribe_via_client() {
        let (transport, _peer) = InProcessTransport::new_pair();
        let client = RealtimeClient::new(transport, &TransportConfig::default());
        let hits = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let handle = {
            let hits = Arc::clone(&hits);
            client.subscribe("custom", move |_| {
                hits.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            })
        };

        client.bus().publish("custom", Value::Null);
        assert!(client.unsubscribe(&handle));
        client.bus().publish("custom", Value::Null);

        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
