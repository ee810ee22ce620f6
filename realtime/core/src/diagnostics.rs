//! Diagnostic sink for non-fatal anomalies
//!
//! Nothing in the connection manager is allowed to take the process down.
//! Subscriber faults, protocol anomalies in stream correlation, connect
//! failures and reconnect exhaustion are all reported here instead: each
//! [`Diagnostic`] is logged through `tracing` at a level matching its severity
//! and broadcast to any observers (monitoring, tests, a status bar).
//!
//! # Usage
//!
//! ```ignore
//! let diagnostics = Diagnostics::default();
//! let mut rx = diagnostics.subscribe();
//!
//! diagnostics.emit(Diagnostic::ReconnectExhausted { attempts: 5 });
//! assert!(rx.try_recv().unwrap().is_fatal());
//! ```

use std::fmt;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::events::SessionId;

/// Default capacity of the diagnostics broadcast channel
pub const DEFAULT_DIAGNOSTICS_CAPACITY: usize = 256;

/// A structured record of something that went wrong but was absorbed
#[derive(Clone, Debug, PartialEq)]
pub enum Diagnostic {
    /// An event bus handler returned an error or panicked
    SubscriberFault {
        /// Event being dispatched when the handler failed
        event: String,
        /// Error or panic message
        message: String,
    },
    /// A stream-start arrived for a session id that is already open
    DuplicateSession {
        /// The duplicated session id
        session_id: SessionId,
    },
    /// A stream event referenced a session with no open record
    UnknownSession {
        /// Stream event name
        event: String,
        /// The unknown session id
        session_id: SessionId,
    },
    /// A stream event payload could not be parsed
    MalformedStreamEvent {
        /// Stream event name
        event: String,
        /// Parse error
        message: String,
    },
    /// The transport failed to establish a connection
    ConnectFailure {
        /// Error reported by the binding
        message: String,
    },
    /// A reconnection attempt was scheduled
    ReconnectScheduled {
        /// 1-based attempt number
        attempt: u32,
        /// Backoff delay before the attempt fires
        delay: Duration,
    },
    /// The reconnect budget is spent; no further automatic attempts
    ReconnectExhausted {
        /// Number of attempts that were made
        attempts: u32,
    },
    /// The binding rejected an outbound event while connected
    SendFailed {
        /// Outbound event name
        event: String,
        /// Error reported by the binding
        message: String,
    },
}

impl Diagnostic {
    /// Whether this diagnostic leaves the connection idle until a manual connect
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ReconnectExhausted { .. })
    }

    fn log(&self) {
        match self {
            Self::SubscriberFault { event, message } => {
                error!(event = %event, error = %message, "Event handler failed");
            }
            Self::DuplicateSession { session_id } => {
                warn!(session_id = %session_id, "Duplicate stream start, replacing session");
            }
            Self::UnknownSession { event, session_id } => {
                warn!(event = %event, session_id = %session_id, "Stream event for unknown session dropped");
            }
            Self::MalformedStreamEvent { event, message } => {
                warn!(event = %event, error = %message, "Malformed stream event dropped");
            }
            Self::ConnectFailure { message } => {
                warn!(error = %message, "Connection attempt failed");
            }
            Self::ReconnectScheduled { attempt, delay } => {
                info!(
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling reconnection"
                );
            }
            Self::ReconnectExhausted { attempts } => {
                error!(
                    attempts = attempts,
                    "Max reconnection attempts reached, giving up until a manual connect"
                );
            }
            Self::SendFailed { event, message } => {
                warn!(event = %event, error = %message, "Outbound event failed");
            }
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubscriberFault { event, message } => {
                write!(f, "handler for '{event}' failed: {message}")
            }
            Self::DuplicateSession { session_id } => {
                write!(f, "duplicate stream session '{session_id}'")
            }
            Self::UnknownSession { event, session_id } => {
                write!(f, "'{event}' for unknown session '{session_id}'")
            }
            Self::MalformedStreamEvent { event, message } => {
                write!(f, "malformed '{event}' payload: {message}")
            }
            Self::ConnectFailure { message } => write!(f, "connect failed: {message}"),
            Self::ReconnectScheduled { attempt, delay } => {
                write!(f, "reconnect attempt {attempt} in {}ms", delay.as_millis())
            }
            Self::ReconnectExhausted { attempts } => {
                write!(f, "reconnect exhausted after {attempts} attempts")
            }
            Self::SendFailed { event, message } => write!(f, "send '{event}' failed: {message}"),
        }
    }
}

/// Cloneable handle that logs and broadcasts diagnostics
#[derive(Clone, Debug)]
pub struct Diagnostics {
    tx: broadcast::Sender<Diagnostic>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(DEFAULT_DIAGNOSTICS_CAPACITY)
    }
}

impl Diagnostics {
    /// Create a sink whose observers lag after `capacity` unread records
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Log a diagnostic and hand it to every current observer
    pub fn emit(&self, diagnostic: Diagnostic) {
        diagnostic.log();
        // No observers is the common case
        let _ = self.tx.send(diagnostic);
    }

    /// Observe diagnostics emitted from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Diagnostic> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_reaches_observers() {
        let diagnostics = Diagnostics::new(8);
        let mut rx = diagnostics.subscribe();

        diagnostics.emit(Diagnostic::ConnectFailure {
            message: "refused".to_string(),
        });

        let received = rx.try_recv().unwrap();
        assert_eq!(
            received,
            Diagnostic::ConnectFailure {
                message: "refused".to_string()
            }
        );
    }

    #[test]
    fn test_emit_without_observers_is_fine() {
        let diagnostics = Diagnostics::default();
        diagnostics.emit(Diagnostic::ReconnectExhausted { attempts: 5 });
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let diagnostics = Diagnostics::new(0);
        let mut rx = diagnostics.subscribe();
        diagnostics.emit(Diagnostic::ReconnectExhausted { attempts: 1 });
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_only_exhaustion_is_fatal() {
        assert!(Diagnostic::ReconnectExhausted { attempts: 3 }.is_fatal());
        assert!(!Diagnostic::ReconnectScheduled {
            attempt: 1,
            delay: Duration::from_millis(100)
        }
        .is_fatal());
        assert!(!Diagnostic::DuplicateSession {
            session_id: SessionId::from("s1")
        }
        .is_fatal());
    }

    #[test]
    fn test_display() {
        let d = Diagnostic::ReconnectScheduled {
            attempt: 2,
            delay: Duration::from_millis(200),
        };
        assert_eq!(d.to_string(), "reconnect attempt 2 in 200ms");

        let d = Diagnostic::UnknownSession {
            event: "llm:stream-chunk".to_string(),
            session_id: SessionId::from("gone"),
        };
        assert_eq!(d.to_string(), "'llm:stream-chunk' for unknown session 'gone'");
    }
}
