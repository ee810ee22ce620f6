//! Transport Traits
//!
//! The connection controller drives exactly one [`TransportBinding`]. The
//! binding owns the wire; everything it learns about the connection flows
//! back to the controller as [`TransportSignal`]s through the
//! [`SignalSender`] handed to it on every connect.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur during transport operations
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection to peer failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// Connection was closed
    #[error("Connection closed")]
    ConnectionClosed,
    /// Failed to send message
    #[error("Send failed: {0}")]
    SendFailed(String),
    /// Message serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
    /// Authentication or authorization failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    /// Connection attempt exceeded the configured timeout
    #[error("Connect timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    /// IO error from underlying transport
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    /// Transport not in expected state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

/// Why a connection ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// The local application asked to disconnect; never triggers a reconnect
    ClientInitiated,
    /// The server closed the session
    ServerInitiated,
    /// The underlying stream ended without a close handshake
    TransportClosed,
    /// The underlying stream failed
    TransportError,
}

impl DisconnectReason {
    /// Wire spelling, used in the `disconnect` event payload
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientInitiated => "client_initiated",
            Self::ServerInitiated => "server_initiated",
            Self::TransportClosed => "transport_closed",
            Self::TransportError => "transport_error",
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something the binding observed about its connection
#[derive(Clone, Debug, PartialEq)]
pub enum TransportSignal {
    /// The connection attempt succeeded
    Connected,
    /// An established connection ended
    Disconnected {
        /// Why it ended
        reason: DisconnectReason,
    },
    /// The connection attempt failed
    ConnectError {
        /// Human readable cause
        message: String,
    },
    /// The peer delivered a named event
    Event {
        /// Event name
        name: String,
        /// Event payload
        payload: Value,
    },
}

/// Signal tagged with the connection epoch it belongs to
pub type TaggedSignal = (u64, TransportSignal);

/// Receiving end of a signal channel
pub type SignalReceiver = mpsc::UnboundedReceiver<TaggedSignal>;

/// Handle a binding uses to report signals for one connection attempt
///
/// Each connect hands out a sender tagged with a fresh epoch. Signals sent
/// through a sender from an earlier attempt are recognised as stale and
/// ignored, so a binding never has to worry about late callbacks from a
/// connection it already abandoned.
#[derive(Clone, Debug)]
pub struct SignalSender {
    epoch: u64,
    tx: mpsc::UnboundedSender<TaggedSignal>,
}

impl SignalSender {
    /// Create a standalone signal channel, as used by the controller
    #[must_use]
    pub fn channel(epoch: u64) -> (Self, SignalReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { epoch, tx }, rx)
    }

    /// Sender on the same channel for a different epoch
    #[must_use]
    pub fn with_epoch(&self, epoch: u64) -> Self {
        Self {
            epoch,
            tx: self.tx.clone(),
        }
    }

    /// Epoch this sender reports for
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Report a signal; returns `false` once the controller is gone
    pub fn send(&self, signal: TransportSignal) -> bool {
        self.tx.send((self.epoch, signal)).is_ok()
    }

    /// Report a successful connect
    pub fn connected(&self) -> bool {
        self.send(TransportSignal::Connected)
    }

    /// Report the end of an established connection
    pub fn disconnected(&self, reason: DisconnectReason) -> bool {
        self.send(TransportSignal::Disconnected { reason })
    }

    /// Report a failed connect
    pub fn connect_error(&self, message: impl Into<String>) -> bool {
        self.send(TransportSignal::ConnectError {
            message: message.into(),
        })
    }

    /// Report an inbound event
    pub fn event(&self, name: impl Into<String>, payload: Value) -> bool {
        self.send(TransportSignal::Event {
            name: name.into(),
            payload,
        })
    }

    /// Whether the receiving side has been dropped
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A wire-level connection to the realtime backend
///
/// # Contract
///
/// - `connect` starts one attempt. It either returns `Err`, or eventually
///   reports exactly one of [`TransportSignal::Connected`] /
///   [`TransportSignal::ConnectError`] through `signals`.
/// - After `Connected`, inbound events are reported as
///   [`TransportSignal::Event`] and the end of the connection as
///   [`TransportSignal::Disconnected`].
/// - `disconnect` closes an established connection and reports
///   `Disconnected { reason: ClientInitiated }`. On an idle binding it is a
///   no-op.
/// - Bindings never retry on their own.
#[async_trait]
pub trait TransportBinding: Send + Sync {
    /// Start a connection attempt
    async fn connect(&mut self, signals: SignalSender) -> Result<(), TransportError>;

    /// Close the connection
    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Transmit a named event
    async fn send(&self, event: &str, payload: Value) -> Result<(), TransportError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}
