//! Session Multiplexer Implementation
//!
//! Correlates interleaved `llm:stream-*` events by session id.

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::events::{names, SessionId, StreamChunk, StreamEnd, StreamError, StreamStart};

// ============================================================================
// Session Records
// ============================================================================

/// Lifecycle state of a streaming session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Start received, no chunks yet
    Started,
    /// At least one chunk received
    Streaming,
    /// Ended normally
    Completed,
    /// Ended with an error
    Failed,
}

/// Record of one open streaming session
#[derive(Clone, Debug)]
pub struct StreamingSession {
    /// Session id
    pub session_id: SessionId,
    /// Model producing the stream
    pub model: String,
    /// Current state
    pub state: SessionState,
    /// Characters received so far (Unicode scalar values)
    pub accumulated_length: usize,
    /// Chunks received so far
    pub chunk_count: u64,
    /// When the start event arrived
    pub started_at: Instant,
}

impl StreamingSession {
    fn new(start: StreamStart) -> Self {
        Self {
            session_id: start.session_id,
            model: start.model,
            state: SessionState::Started,
            accumulated_length: 0,
            chunk_count: 0,
            started_at: Instant::now(),
        }
    }

    fn update(&self, kind: StreamUpdateKind) -> StreamUpdate {
        StreamUpdate {
            session_id: self.session_id.clone(),
            model: self.model.clone(),
            state: self.state,
            accumulated_length: self.accumulated_length,
            kind,
        }
    }
}

// ============================================================================
// Published Updates
// ============================================================================

/// Snapshot published to subscribers for every routed stream event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamUpdate {
    /// Owning session
    pub session_id: SessionId,
    /// Model producing the stream
    pub model: String,
    /// Session state after this event
    pub state: SessionState,
    /// Characters received so far
    pub accumulated_length: usize,
    /// What happened
    #[serde(flatten)]
    pub kind: StreamUpdateKind,
}

/// Kind of stream update
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamUpdateKind {
    /// Session opened
    Started,
    /// New text arrived
    Chunk {
        /// The text fragment
        chunk: String,
        /// Producer marked this as the final chunk
        #[serde(rename = "isComplete")]
        is_complete: bool,
    },
    /// Session completed
    Ended {
        /// Token usage, when reported
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Value>,
    },
    /// Session failed
    Failed {
        /// Error descriptor from the producer
        error: Value,
    },
}

impl StreamUpdate {
    /// Family event name this update is published under
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self.kind {
            StreamUpdateKind::Started => names::STREAM_START,
            StreamUpdateKind::Chunk { .. } => names::STREAM_CHUNK,
            StreamUpdateKind::Ended { .. } => names::STREAM_END,
            StreamUpdateKind::Failed { .. } => names::STREAM_ERROR,
        }
    }
}

// ============================================================================
// Session Multiplexer
// ============================================================================

/// Owns every open streaming session and turns raw stream events into
/// [`StreamUpdate`]s
///
/// The multiplexer does not publish; the caller fans the returned update out
/// so no lock on the multiplexer is held while handlers run.
#[derive(Debug)]
pub struct SessionMultiplexer {
    sessions: HashMap<SessionId, StreamingSession>,
    diagnostics: Diagnostics,
    total_sessions_started: u64,
    total_chunks_routed: u64,
}

impl SessionMultiplexer {
    /// Create an empty multiplexer
    #[must_use]
    pub fn new(diagnostics: Diagnostics) -> Self {
        Self {
            sessions: HashMap::new(),
            diagnostics,
            total_sessions_started: 0,
            total_chunks_routed: 0,
        }
    }

    /// Route one stream-family event
    ///
    /// Returns the update to publish, or `None` when the event was dropped
    /// (malformed payload, unknown session, or not a stream event).
    pub fn handle(&mut self, event: &str, payload: &Value) -> Option<StreamUpdate> {
        match event {
            names::STREAM_START => self.parse(event, payload).map(|p| self.on_start(p)),
            names::STREAM_CHUNK => self.parse(event, payload).and_then(|p| self.on_chunk(p)),
            names::STREAM_END => self.parse(event, payload).and_then(|p| self.on_end(p)),
            names::STREAM_ERROR => self.parse(event, payload).and_then(|p| self.on_error(p)),
            _ => {
                debug!(event = %event, "Not a stream event");
                None
            }
        }
    }

    fn parse<'a, T: Deserialize<'a>>(&self, event: &str, payload: &'a Value) -> Option<T> {
        match T::deserialize(payload) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                self.diagnostics.emit(Diagnostic::MalformedStreamEvent {
                    event: event.to_string(),
                    message: e.to_string(),
                });
                None
            }
        }
    }

    /// Open a session, replacing any record with the same id
    pub fn on_start(&mut self, start: StreamStart) -> StreamUpdate {
        let session = StreamingSession::new(start);
        let update = session.update(StreamUpdateKind::Started);

        if self
            .sessions
            .insert(session.session_id.clone(), session)
            .is_some()
        {
            self.diagnostics.emit(Diagnostic::DuplicateSession {
                session_id: update.session_id.clone(),
            });
        }
        self.total_sessions_started += 1;

        debug!(session_id = %update.session_id, model = %update.model, "Stream started");
        update
    }

    /// Append a chunk to an open session
    pub fn on_chunk(&mut self, chunk: StreamChunk) -> Option<StreamUpdate> {
        let Some(session) = self.sessions.get_mut(&chunk.session_id) else {
            self.unknown(names::STREAM_CHUNK, chunk.session_id);
            return None;
        };

        session.state = SessionState::Streaming;
        session.accumulated_length += chunk.chunk.chars().count();
        session.chunk_count += 1;
        self.total_chunks_routed += 1;

        Some(session.update(StreamUpdateKind::Chunk {
            chunk: chunk.chunk,
            is_complete: chunk.is_complete,
        }))
    }

    /// Complete and remove a session
    pub fn on_end(&mut self, end: StreamEnd) -> Option<StreamUpdate> {
        let Some(mut session) = self.sessions.remove(&end.session_id) else {
            self.unknown(names::STREAM_END, end.session_id);
            return None;
        };

        session.state = SessionState::Completed;
        debug!(
            session_id = %session.session_id,
            chunks = session.chunk_count,
            length = session.accumulated_length,
            elapsed_ms = session.started_at.elapsed().as_millis() as u64,
            "Stream completed"
        );
        Some(session.update(StreamUpdateKind::Ended { usage: end.usage }))
    }

    /// Fail and remove a session
    pub fn on_error(&mut self, error: StreamError) -> Option<StreamUpdate> {
        let Some(mut session) = self.sessions.remove(&error.session_id) else {
            self.unknown(names::STREAM_ERROR, error.session_id);
            return None;
        };

        session.state = SessionState::Failed;
        debug!(session_id = %session.session_id, "Stream failed");
        Some(session.update(StreamUpdateKind::Failed { error: error.error }))
    }

    fn unknown(&self, event: &str, session_id: SessionId) {
        self.diagnostics.emit(Diagnostic::UnknownSession {
            event: event.to_string(),
            session_id,
        });
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Number of open sessions
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Look up an open session
    #[must_use]
    pub fn get(&self, session_id: &SessionId) -> Option<&StreamingSession> {
        self.sessions.get(session_id)
    }

    /// Whether `session_id` is open
    #[must_use]
    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Ids of every open session, sorted
    #[must_use]
    pub fn active_session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Sessions opened since creation
    #[must_use]
    pub fn total_sessions_started(&self) -> u64 {
        self.total_sessions_started
    }

    /// Chunks routed since creation
    #[must_use]
    pub fn total_chunks_routed(&self) -> u64 {
        self.total_chunks_routed
    }

    /// Forget every open session, returning how many were dropped
    pub fn clear(&mut self) -> usize {
        let dropped = self.sessions.len();
        self.sessions.clear();
        dropped
    }
}
