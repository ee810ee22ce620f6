//! Connection lifecycle controller
//!
//! Owns the transport binding, the connection state machine and the
//! reconnect policy. Every [`TransportSignal`] is processed sequentially on
//! one driver task; public operations only ever touch the binding and a few
//! atomics, so they can be called from any task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::policy::ReconnectPolicy;
use super::{ConnectionState, Delivery};
use crate::bus::EventBus;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::events::{is_stream_event, names, session_topic, SessionId};
use crate::streaming::{SessionMultiplexer, StreamingSession};
use crate::transport::{
    DisconnectReason, SignalReceiver, SignalSender, TransportBinding, TransportError,
    TransportSignal,
};

struct ControllerInner {
    transport: AsyncMutex<Box<dyn TransportBinding>>,
    transport_name: &'static str,
    state: watch::Sender<ConnectionState>,
    policy: Mutex<ReconnectPolicy>,
    multiplexer: Mutex<SessionMultiplexer>,
    bus: EventBus,
    diagnostics: Diagnostics,
    /// Sender for epoch 0; cloned with the live epoch for each attempt
    signals: SignalSender,
    /// Epoch whose signals are currently honoured
    epoch: AtomicU64,
    /// Bumped by every manual connect/disconnect to void pending retries
    generation: AtomicU64,
    driver: Mutex<Option<JoinHandle<()>>>,
}

/// Cloneable handle to one connection
#[derive(Clone)]
pub struct ConnectionController {
    inner: Arc<ControllerInner>,
}

impl std::fmt::Debug for ConnectionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionController")
            .field("transport", &self.inner.transport_name)
            .field("state", &self.state())
            .field("attempts", &self.reconnect_attempts())
            .finish()
    }
}

impl ConnectionController {
    /// Build a controller around `transport` and start its driver task
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new<T>(
        transport: T,
        policy: ReconnectPolicy,
        bus: EventBus,
        diagnostics: Diagnostics,
    ) -> Self
    where
        T: TransportBinding + 'static,
    {
        let (signals, signal_rx) = SignalSender::channel(0);
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let transport_name = transport.name();

        let inner = Arc::new(ControllerInner {
            transport: AsyncMutex::new(Box::new(transport)),
            transport_name,
            state,
            policy: Mutex::new(policy),
            multiplexer: Mutex::new(SessionMultiplexer::new(diagnostics.clone())),
            bus,
            diagnostics,
            signals,
            epoch: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            driver: Mutex::new(None),
        });

        let driver = tokio::spawn(drive(Arc::downgrade(&inner), signal_rx));
        *inner.driver.lock() = Some(driver);

        debug!(transport = transport_name, "Connection controller started");
        Self { inner }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start connecting; no-op while connecting or connected
    ///
    /// When it does start, restores the full reconnect budget and voids any
    /// pending retry.
    pub async fn connect(&self) {
        let inner = &self.inner;
        let Some(epoch) = inner.try_begin(None) else {
            return;
        };
        inner.run_connect(epoch).await;
    }

    /// Tear the connection down; never followed by an automatic reconnect
    pub async fn disconnect(&self) {
        let inner = &self.inner;

        // Epoch, generation and state move together under the watch lock, so
        // neither the driver nor a retry timer can act on the closing
        // connection afterwards
        let mut previous = ConnectionState::Disconnected;
        inner.state.send_if_modified(|state| {
            inner.generation.fetch_add(1, Ordering::SeqCst);
            inner.epoch.fetch_add(1, Ordering::SeqCst);
            previous = std::mem::replace(state, ConnectionState::Disconnected);
            previous != ConnectionState::Disconnected
        });

        let result = inner.transport.lock().await.disconnect().await;
        if let Err(e) = result {
            warn!(transport = inner.transport_name, error = %e, "Transport disconnect failed");
        }

        if previous != ConnectionState::Disconnected {
            info!(transport = inner.transport_name, "Disconnected by client");
            inner.bus.publish(
                names::DISCONNECT,
                json!({ "reason": DisconnectReason::ClientInitiated.as_str() }),
            );
        }
    }

    /// Disconnect, then connect with a fresh reconnect budget
    pub async fn reconnect(&self) {
        self.disconnect().await;
        self.connect().await;
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    /// Forward an event to the binding while connected
    ///
    /// Offline sends are dropped, not queued, and are not an error.
    ///
    /// # Errors
    ///
    /// Returns the binding's error when it rejects the event while connected.
    pub async fn send(&self, event: &str, payload: Value) -> Result<Delivery, TransportError> {
        if !self.is_connected() {
            debug!(event = %event, state = %self.state(), "Dropping outbound event while offline");
            return Ok(Delivery::Dropped);
        }

        let result = self.inner.transport.lock().await.send(event, payload).await;
        match result {
            Ok(()) => Ok(Delivery::Sent),
            Err(e) => {
                self.inner.diagnostics.emit(Diagnostic::SendFailed {
                    event: event.to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Current state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Whether the state is `Connected`
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Automatic attempts made since the last reset
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.policy.lock().attempt_count()
    }

    /// Copy of the reconnect policy
    #[must_use]
    pub fn policy(&self) -> ReconnectPolicy {
        self.inner.policy.lock().clone()
    }

    /// Observe state transitions
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Wait until the state equals `target`
    pub async fn wait_for_state(&self, target: ConnectionState) {
        let mut rx = self.inner.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|state| *state == target).await;
    }

    /// Bus this controller publishes on
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Diagnostics sink
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.inner.diagnostics
    }

    /// Binding name
    #[must_use]
    pub fn transport_name(&self) -> &'static str {
        self.inner.transport_name
    }

    // ========================================================================
    // Streaming sessions
    // ========================================================================

    /// Ids of open streaming sessions
    #[must_use]
    pub fn active_sessions(&self) -> Vec<SessionId> {
        self.inner.multiplexer.lock().active_session_ids()
    }

    /// Snapshot of one open session
    #[must_use]
    pub fn session(&self, session_id: &SessionId) -> Option<StreamingSession> {
        self.inner.multiplexer.lock().get(session_id).cloned()
    }

    /// Run `f` against the multiplexer (counters, bulk inspection)
    pub fn with_sessions<R>(&self, f: impl FnOnce(&SessionMultiplexer) -> R) -> R {
        f(&self.inner.multiplexer.lock())
    }

    /// Forget every open session
    pub fn clear_sessions(&self) -> usize {
        self.inner.multiplexer.lock().clear()
    }
}

impl ControllerInner {
    /// Apply `next` only if `epoch` is still current
    ///
    /// The epoch check runs under the watch write lock, the same lock
    /// `disconnect` bumps the epoch under.
    fn transition(&self, epoch: u64, next: ConnectionState) -> bool {
        let mut applied = false;
        let mut previous = next;
        self.state.send_if_modified(|state| {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            applied = true;
            previous = std::mem::replace(state, next);
            previous != next
        });
        if applied && previous != next {
            debug!(from = %previous, to = %next, "Connection state changed");
        }
        applied
    }

    /// `Disconnected -> Connecting`, opening a new epoch
    ///
    /// Returns `None` unless the state is `Disconnected`. A retry timer
    /// passes the generation it was scheduled under and is voided once a
    /// manual call has moved past it. A manual call passes `None` and, only
    /// if it starts, restores the budget and voids pending retries.
    fn try_begin(&self, generation: Option<u64>) -> Option<u64> {
        let mut epoch = None;
        self.state.send_if_modified(|state| {
            if *state != ConnectionState::Disconnected {
                return false;
            }
            match generation {
                Some(g) if g != self.generation.load(Ordering::SeqCst) => return false,
                Some(_) => {}
                None => {
                    self.generation.fetch_add(1, Ordering::SeqCst);
                    self.policy.lock().reset();
                }
            }
            *state = ConnectionState::Connecting;
            epoch = Some(self.epoch.fetch_add(1, Ordering::SeqCst) + 1);
            true
        });
        if epoch.is_none() && generation.is_none() {
            let state = *self.state.borrow();
            debug!(state = %state, "Connect ignored");
        }
        epoch
    }

    async fn run_connect(&self, epoch: u64) {
        let signals = self.signals.with_epoch(epoch);
        debug!(transport = self.transport_name, epoch = epoch, "Connecting");

        let mut transport = self.transport.lock().await;
        let result = transport.connect(signals.clone()).await;

        // Disconnected while the binding was connecting; nothing may keep it open
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!(epoch = epoch, "Connect superseded, closing binding");
            if let Err(e) = transport.disconnect().await {
                warn!(transport = self.transport_name, error = %e, "Transport disconnect failed");
            }
            return;
        }

        if let Err(e) = result {
            // Same path as an asynchronous failure
            signals.connect_error(e.to_string());
        }
    }

    fn handle_signal(self: &Arc<Self>, epoch: u64, signal: TransportSignal) {
        let stale = match &signal {
            TransportSignal::Connected => !self.transition(epoch, ConnectionState::Connected),
            TransportSignal::Disconnected { .. } | TransportSignal::ConnectError { .. } => {
                !self.transition(epoch, ConnectionState::Disconnected)
            }
            TransportSignal::Event { .. } => self.epoch.load(Ordering::SeqCst) != epoch,
        };
        if stale {
            debug!(epoch = epoch, "Ignoring stale transport signal");
            return;
        }

        match signal {
            TransportSignal::Connected => {
                self.policy.lock().reset();
                info!(transport = self.transport_name, "Connected");
                self.bus.publish(names::CONNECT, Value::Null);
            }
            TransportSignal::Disconnected { reason } => {
                info!(transport = self.transport_name, reason = %reason, "Disconnected");
                self.bus
                    .publish(names::DISCONNECT, json!({ "reason": reason.as_str() }));
                if reason != DisconnectReason::ClientInitiated {
                    self.schedule_reconnect();
                }
            }
            TransportSignal::ConnectError { message } => {
                self.diagnostics.emit(Diagnostic::ConnectFailure {
                    message: message.clone(),
                });
                self.bus
                    .publish(names::CONNECT_ERROR, json!({ "message": message }));
                self.schedule_reconnect();
            }
            TransportSignal::Event { name, payload } => self.dispatch_inbound(&name, payload),
        }
    }

    fn dispatch_inbound(&self, name: &str, payload: Value) {
        if !is_stream_event(name) {
            self.bus.publish(name, payload);
            return;
        }

        // Lock released before any handler runs
        let update = self.multiplexer.lock().handle(name, &payload);
        let Some(update) = update else { return };

        match serde_json::to_value(&update) {
            Ok(value) => {
                let topic = session_topic(&update.session_id);
                self.bus.publish(update.event_name(), value.clone());
                self.bus.publish(&topic, value);
            }
            Err(e) => warn!(event = %name, error = %e, "Failed to encode stream update"),
        }
    }

    fn schedule_reconnect(self: &Arc<Self>) {
        let next = self.policy.lock().next_attempt();
        let Some((attempt, delay)) = next else {
            let attempts = self.policy.lock().attempt_count();
            self.diagnostics
                .emit(Diagnostic::ReconnectExhausted { attempts });
            return;
        };

        self.diagnostics
            .emit(Diagnostic::ReconnectScheduled { attempt, delay });

        let generation = self.generation.load(Ordering::SeqCst);
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            // Reconnect backoff; the timer is never cancelled, only voided
            tokio::time::sleep(delay).await;

            let Some(inner) = weak.upgrade() else { return };
            let Some(epoch) = inner.try_begin(Some(generation)) else {
                debug!(attempt = attempt, "Reconnect attempt voided");
                return;
            };
            info!(attempt = attempt, "Reconnecting");
            inner.run_connect(epoch).await;
        });
    }
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.get_mut().take() {
            driver.abort();
        }
    }
}

async fn drive(inner: Weak<ControllerInner>, mut signals: SignalReceiver) {
    while let Some((epoch, signal)) = signals.recv().await {
        let Some(inner) = inner.upgrade() else { break };
        inner.handle_signal(epoch, signal);
    }
}
