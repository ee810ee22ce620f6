//! Streaming Infrastructure for Concurrent LLM Sessions
//!
//! The backend may stream several completions over one connection at once,
//! interleaving their events. The [`SessionMultiplexer`] keeps one record per
//! open session id and turns every `llm:stream-*` event into a
//! [`StreamUpdate`] tagged with that id.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      SessionMultiplexer                          │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │                    Open Sessions Map                       │  │
//! │  │  ┌──────────────────┐  ┌──────────────────┐                │  │
//! │  │  │ StreamingSession │  │ StreamingSession │  ...           │  │
//! │  │  │  (id: S1)        │  │  (id: S2)        │                │  │
//! │  │  │  Streaming, 42ch │  │  Started, 0ch    │                │  │
//! │  │  └──────────────────┘  └──────────────────┘                │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! │              │                                                   │
//! │         handle(event, payload)                                   │
//! │              │                                                   │
//! │              ▼                                                   │
//! │     StreamUpdate { session_id, state, kind }                     │
//! └──────────────────────────────────────────────────────────────────┘
//!                │
//!                ├──▶ bus: "llm:stream-chunk"
//!                └──▶ bus: "llm:session:S1"
//! ```
//!
//! # Guarantees
//!
//! - **No cross-contamination**: updates carry the id of the session they
//!   belong to and per-session topics only ever see that session
//! - **No resurrection**: events for an unknown or already-finished session
//!   are dropped and reported, never used to create a record
//! - **Transport-independent**: records survive a disconnect; only end, error
//!   or an explicit `clear()` removes them

mod multiplexer;

pub use multiplexer::{
    SessionMultiplexer, SessionState, StreamUpdate, StreamUpdateKind, StreamingSession,
};
