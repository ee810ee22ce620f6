//! Event bus
//!
//! Named-topic publish/subscribe with fault isolation. Handlers are
//! synchronous callbacks; a handler that returns an error or panics is
//! reported as a [`Diagnostic::SubscriberFault`] and the remaining handlers
//! still run.
//!
//! # Ordering
//!
//! Handlers for one event run in registration order. A publish issued from
//! inside a handler is queued and delivered after the current dispatch
//! finishes, so delivery never recurses and the global order of publishes is
//! preserved. Subscribe and unsubscribe take effect from the next delivered
//! event: each delivery works on a snapshot of the handler list taken when it
//! starts.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::trace;

use crate::diagnostics::{Diagnostic, Diagnostics};

/// Subscriber callback
pub type Handler = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

/// Token identifying one registration, used to unsubscribe
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    event: String,
    id: u64,
}

impl SubscriptionHandle {
    /// Event this registration listens to
    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }
}

struct Registration {
    id: u64,
    handler: Handler,
}

struct BusInner {
    handlers: RwLock<HashMap<String, Vec<Registration>>>,
    next_id: AtomicU64,
    pending: Mutex<VecDeque<(String, Value)>>,
    dispatching: AtomicBool,
    diagnostics: Diagnostics,
}

/// Cloneable publish/subscribe hub
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.inner.handlers.read();
        f.debug_struct("EventBus")
            .field("events", &handlers.len())
            .field(
                "subscribers",
                &handlers.values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(Diagnostics::default())
    }
}

impl EventBus {
    /// Create an empty bus reporting faults to `diagnostics`
    #[must_use]
    pub fn new(diagnostics: Diagnostics) -> Self {
        Self {
            inner: Arc::new(BusInner {
                handlers: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                pending: Mutex::new(VecDeque::new()),
                dispatching: AtomicBool::new(false),
                diagnostics,
            }),
        }
    }

    /// Register `handler` for `event`
    ///
    /// Registering the same closure twice yields two independent
    /// registrations.
    pub fn subscribe<F>(&self, event: impl Into<String>, handler: F) -> SubscriptionHandle
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let event = event.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .handlers
            .write()
            .entry(event.clone())
            .or_default()
            .push(Registration {
                id,
                handler: Arc::new(handler),
            });
        trace!(event = %event, id = id, "Subscribed");
        SubscriptionHandle { event, id }
    }

    /// Remove a registration
    ///
    /// Returns `false` if the handle was already removed.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let mut handlers = self.inner.handlers.write();
        let Some(list) = handlers.get_mut(&handle.event) else {
            return false;
        };
        let before = list.len();
        list.retain(|r| r.id != handle.id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(&handle.event);
        }
        removed
    }

    /// Remove every registration for `event`, returning how many were removed
    pub fn unsubscribe_all(&self, event: &str) -> usize {
        self.inner
            .handlers
            .write()
            .remove(event)
            .map_or(0, |list| list.len())
    }

    /// Number of handlers currently registered for `event`
    #[must_use]
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.inner.handlers.read().get(event).map_or(0, Vec::len)
    }

    /// Deliver `payload` to every handler of `event`
    ///
    /// Handlers normally run before this returns, on the calling thread. Two
    /// cases defer them:
    ///
    /// - Called from inside a handler, the event is queued and delivered once
    ///   the outer dispatch completes.
    /// - Called while another thread is dispatching on this bus, the event is
    ///   queued and that thread delivers it, so this call may return before
    ///   its handlers have run. Publishers on several threads get one global
    ///   delivery order, not per-call synchronous delivery.
    pub fn publish(&self, event: &str, payload: Value) {
        self.inner
            .pending
            .lock()
            .push_back((event.to_string(), payload));

        loop {
            if self
                .inner
                .dispatching
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                // Another frame (or thread) is draining and will pick it up
                return;
            }

            loop {
                let next = self.inner.pending.lock().pop_front();
                let Some((event, payload)) = next else { break };
                self.deliver(&event, &payload);
            }

            self.inner.dispatching.store(false, Ordering::Release);

            // A concurrent publisher may have queued after our last pop but
            // before the flag was released
            if self.inner.pending.lock().is_empty() {
                return;
            }
        }
    }

    fn deliver(&self, event: &str, payload: &Value) {
        let snapshot: Vec<(u64, Handler)> = match self.inner.handlers.read().get(event) {
            Some(list) => list.iter().map(|r| (r.id, Arc::clone(&r.handler))).collect(),
            None => return,
        };

        trace!(event = %event, handlers = snapshot.len(), "Dispatching");

        for (id, handler) in snapshot {
            let message = match panic::catch_unwind(AssertUnwindSafe(|| handler(payload))) {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => format!("{err:#}"),
                Err(panic) => panic_message(panic.as_ref()),
            };
            trace!(event = %event, id = id, "Handler fault");
            self.inner.diagnostics.emit(Diagnostic::SubscriberFault {
                event: event.to_string(),
                message,
            });
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
