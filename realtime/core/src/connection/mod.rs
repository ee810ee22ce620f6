//! Connection lifecycle
//!
//! # State machine
//!
//! ```text
//!                 connect()                connected
//!  Disconnected ────────────▶ Connecting ────────────▶ Connected
//!       ▲                         │                        │
//!       │      connect error      │                        │
//!       ├─────────────────────────┘                        │
//!       │      disconnect (client, server, transport)      │
//!       └──────────────────────────────────────────────────┘
//! ```
//!
//! Failures other than a client-initiated disconnect schedule a retry per the
//! [`ReconnectPolicy`]. A retry is a plain `Disconnected -> Connecting`
//! transition; there is no direct edge out of `Connected` without first
//! passing through `Disconnected`.

mod controller;
mod policy;

use std::fmt;

pub use controller::ConnectionController;
pub use policy::ReconnectPolicy;

/// Connection state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not connected
    #[default]
    Disconnected,
    /// Attempt in flight
    Connecting,
    /// Connected
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Outcome of an outbound send
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the binding
    Sent,
    /// Dropped because the connection was not up
    Dropped,
}

impl Delivery {
    /// Whether the event reached the binding
    #[must_use]
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}
