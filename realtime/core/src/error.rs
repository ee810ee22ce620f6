//! Crate-level error type.
//!
//! Most failure paths in the connection manager are not errors at all: offline
//! sends are dropped, protocol anomalies and subscriber faults become
//! [`Diagnostic`](crate::diagnostics::Diagnostic)s, and connect failures are
//! published as `connect_error` events. What remains is surfaced here.

use thiserror::Error;

use crate::config::ConfigError;
use crate::transport::TransportError;

/// Errors returned by the public operation surface
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// The transport binding rejected an operation while connected
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Configuration could not be loaded or is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An outbound payload could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for realtime operations
pub type Result<T> = std::result::Result<T, RealtimeError>;
