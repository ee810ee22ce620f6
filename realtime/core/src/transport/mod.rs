//! Transport Layer
//!
//! Abstraction over the wire connection to the realtime backend:
//! - `InProcess`: Peer-controlled binding for embedding and tests
//! - `WebSocket`: JSON envelopes over `tokio-tungstenite` (feature `websocket`)
//!
//! # Design Philosophy
//!
//! The binding only moves bytes and reports what happened. Lifecycle state,
//! reconnection, fan-out and stream correlation all live above it in the
//! connection controller, so every binding gets them for free and none of
//! them retries on its own.

pub mod config;
pub mod frame;
pub mod in_process;
pub mod traits;
#[cfg(feature = "websocket")]
pub mod websocket;

// Re-exports for convenience
pub use config::{Credential, TransportConfig};
pub use frame::Envelope;
pub use in_process::{InProcessPeer, InProcessTransport};
pub use traits::{
    DisconnectReason, SignalReceiver, SignalSender, TaggedSignal, TransportBinding,
    TransportError, TransportSignal,
};

#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;
