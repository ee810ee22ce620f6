//! Realtime Core - client connection layer for a chat and LLM streaming backend
//!
//! One persistent bidirectional connection per client. Inbound server events
//! are fanned out to in-process subscribers by name, concurrent LLM streaming
//! sessions are demultiplexed by session id, and typed commands go the other
//! way.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          RealtimeClient                             │
//! │                                                                     │
//! │  ┌──────────────┐   intents   ┌───────────────────────────────────┐ │
//! │  │CommandFacade │────────────▶│       ConnectionController        │ │
//! │  └──────────────┘             │  state machine + ReconnectPolicy  │ │
//! │                               │  SessionMultiplexer               │ │
//! │                               └───────────────┬───────────────────┘ │
//! │                                  ▲ signals    │ publish             │
//! │                                  │            ▼                     │
//! │  ┌───────────────────────────────┴──┐   ┌─────────────┐             │
//! │  │        TransportBinding          │   │  EventBus   │──▶ handlers │
//! │  │  (WebSocket | InProcess)         │   └─────────────┘             │
//! │  └──────────────────────────────────┘          │                    │
//! │                                          Diagnostics (broadcast)    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`RealtimeClient`]: the handle a UI embeds
//! - [`ConnectionController`]: lifecycle state machine and reconnect timers
//! - [`EventBus`]: name-keyed publish/subscribe with fault isolation
//! - [`SessionMultiplexer`]: per-session LLM stream bookkeeping
//! - [`TransportBinding`]: the seam a concrete transport plugs into
//!
//! # Quick Start
//!
//! ```ignore
//! use realtime_core::{names, RealtimeClient, TransportConfig, WebSocketTransport};
//!
//! let config = TransportConfig::from_env();
//! let client = RealtimeClient::new(WebSocketTransport::new(config.clone()), &config);
//!
//! client.subscribe(names::STREAM_CHUNK, |update| {
//!     println!("{}", update["chunk"]);
//!     Ok(())
//! });
//!
//! client.connect().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bus;
pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod streaming;
pub mod transport;

pub use bus::{EventBus, Handler, SubscriptionHandle};
pub use client::RealtimeClient;
pub use commands::{CommandFacade, OutboundIntent};
pub use config::{load_config, ConfigError, ConfigOverrides, ConfigSource, RealtimeConfig};
pub use connection::{ConnectionController, ConnectionState, Delivery, ReconnectPolicy};
pub use diagnostics::{Diagnostic, Diagnostics};
pub use error::{RealtimeError, Result};
pub use events::{
    names, session_topic, CompletionMessage, CompletionRequest, MessageType, SessionId,
};
pub use streaming::{
    SessionMultiplexer, SessionState, StreamUpdate, StreamUpdateKind, StreamingSession,
};
pub use transport::{
    Credential, DisconnectReason, InProcessPeer, InProcessTransport, SignalSender,
    TransportBinding, TransportConfig, TransportError, TransportSignal,
};

#[cfg(feature = "websocket")]
pub use transport::WebSocketTransport;
