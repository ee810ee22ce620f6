//! Event vocabulary shared with the chat backend
//!
//! Event names are plain strings on the wire. The constants in [`names`] are
//! the canonical spelling; payload structs in this module describe the shapes
//! the client produces (commands) or parses (LLM stream events). Everything
//! else is forwarded to subscribers as raw JSON.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Canonical event names
pub mod names {
    // ========================================================================
    // Lifecycle (published locally by the connection controller)
    // ========================================================================

    /// Connection established
    pub const CONNECT: &str = "connect";
    /// Connection lost or closed; payload carries `reason`
    pub const DISCONNECT: &str = "disconnect";
    /// Connection attempt failed; payload carries `message`
    pub const CONNECT_ERROR: &str = "connect_error";

    // ========================================================================
    // Inbound application events
    // ========================================================================

    /// New chat message
    pub const MESSAGE_RECEIVED: &str = "message:received";
    /// Typing indicator (also sent outbound)
    pub const MESSAGE_TYPING: &str = "message:typing";
    /// Delivery receipt
    pub const MESSAGE_DELIVERED: &str = "message:delivered";
    /// Read receipt (also sent outbound)
    pub const MESSAGE_READ: &str = "message:read";
    /// A user joined a room
    pub const ROOM_JOINED: &str = "room:joined";
    /// A user left a room
    pub const ROOM_LEFT: &str = "room:left";
    /// Room participant list
    pub const ROOM_PARTICIPANTS: &str = "room:participants";
    /// User came online
    pub const PRESENCE_ONLINE: &str = "presence:online";
    /// User went offline
    pub const PRESENCE_OFFLINE: &str = "presence:offline";
    /// User status changed
    pub const PRESENCE_STATUS: &str = "presence:status";

    // ========================================================================
    // LLM stream family (correlated by session id)
    // ========================================================================

    /// Opens a streaming session
    pub const STREAM_START: &str = "llm:stream-start";
    /// Incremental chunk for an open session
    pub const STREAM_CHUNK: &str = "llm:stream-chunk";
    /// Session completed normally
    pub const STREAM_END: &str = "llm:stream-end";
    /// Session failed
    pub const STREAM_ERROR: &str = "llm:stream-error";

    /// Prefix of per-session topics, see [`super::session_topic`]
    pub const SESSION_TOPIC_PREFIX: &str = "llm:session:";

    // ========================================================================
    // Outbound commands
    // ========================================================================

    /// Join a chat room
    pub const JOIN_CHAT: &str = "join:chat";
    /// Leave a chat room
    pub const LEAVE_CHAT: &str = "leave:chat";
    /// Send a chat message
    pub const MESSAGE_SEND: &str = "message:send";
    /// Request a streamed LLM completion
    pub const STREAM_COMPLETION: &str = "llm:stream-completion";

    /// Every inbound application event, in documentation order
    pub const INBOUND: &[&str] = &[
        MESSAGE_RECEIVED,
        MESSAGE_TYPING,
        MESSAGE_DELIVERED,
        MESSAGE_READ,
        ROOM_JOINED,
        ROOM_LEFT,
        ROOM_PARTICIPANTS,
        PRESENCE_ONLINE,
        PRESENCE_OFFLINE,
        PRESENCE_STATUS,
        STREAM_START,
        STREAM_CHUNK,
        STREAM_END,
        STREAM_ERROR,
    ];
}

/// Whether `name` belongs to the correlated LLM stream family
///
/// `llm:stream-completion` shares the prefix but is an outbound command.
#[must_use]
pub fn is_stream_event(name: &str) -> bool {
    matches!(
        name,
        names::STREAM_START | names::STREAM_CHUNK | names::STREAM_END | names::STREAM_ERROR
    )
}

/// Per-session topic on which every update for `session_id` is republished
#[must_use]
pub fn session_topic(session_id: &SessionId) -> String {
    format!("{}{}", names::SESSION_TOPIC_PREFIX, session_id)
}

/// Identifier correlating the events of one LLM streaming session
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Borrow the raw id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ============================================================================
// Inbound stream payloads
// ============================================================================

/// `llm:stream-start`
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStart {
    /// Session being opened
    pub session_id: SessionId,
    /// Model producing the stream
    pub model: String,
}

/// `llm:stream-chunk`
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamChunk {
    /// Owning session
    pub session_id: SessionId,
    /// Text fragment
    pub chunk: String,
    /// Set by the producer on the final chunk
    #[serde(default)]
    pub is_complete: bool,
}

/// `llm:stream-end`
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEnd {
    /// Session being closed
    pub session_id: SessionId,
    /// Token usage, passed through untouched
    #[serde(default)]
    pub usage: Option<Value>,
}

/// `llm:stream-error`
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamError {
    /// Session that failed
    pub session_id: SessionId,
    /// Error descriptor, either a string or an object
    pub error: Value,
}

// ============================================================================
// Outbound command payloads
// ============================================================================

/// Kind of a chat message
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Plain text (the default)
    #[default]
    Text,
    /// Image attachment
    Image,
    /// File attachment
    File,
    /// System notice
    System,
}

/// Payload naming a single chat room
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRef<'a> {
    /// Target room
    pub chat_id: &'a str,
}

/// `message:send`
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage<'a> {
    /// Target room
    pub chat_id: &'a str,
    /// Message body
    pub content: &'a str,
    /// Message kind
    #[serde(rename = "type")]
    pub message_type: MessageType,
}

/// `message:typing`
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicator<'a> {
    /// Room the user is typing in
    pub chat_id: &'a str,
    /// Whether typing started or stopped
    pub is_typing: bool,
}

/// `message:read`
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt<'a> {
    /// Message being acknowledged
    pub message_id: &'a str,
    /// Room containing the message
    pub chat_id: &'a str,
}

/// One message of a completion conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMessage {
    /// Speaker role (`user`, `assistant`, `system`)
    pub role: String,
    /// Message text
    pub content: String,
}

impl CompletionMessage {
    /// Shorthand constructor
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// `llm:stream-completion`
///
/// Options such as `temperature` or `maxTokens` are flattened into the
/// payload alongside `messages` and `model`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Conversation so far
    pub messages: Vec<CompletionMessage>,
    /// Model to stream from
    pub model: String,
    /// Extra model options
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl CompletionRequest {
    /// Request without extra options
    pub fn new(model: impl Into<String>, messages: Vec<CompletionMessage>) -> Self {
        Self {
            messages,
            model: model.into(),
            options: Map::new(),
        }
    }

    /// Attach an option (builder pattern)
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_stream_family_excludes_completion_command() {
        assert!(is_stream_event(names::STREAM_START));
        assert!(is_stream_event(names::STREAM_ERROR));
        assert!(!is_stream_event(names::STREAM_COMPLETION));
        assert!(!is_stream_event(names::MESSAGE_RECEIVED));
    }

    #[test]
    fn test_session_topic() {
        assert_eq!(session_topic(&SessionId::from("S1")), "llm:session:S1");
    }

    #[test]
    fn test_chunk_defaults_is_complete() {
        let chunk: StreamChunk =
            serde_json::from_value(json!({"sessionId": "S1", "chunk": "hi"})).unwrap();
        assert!(!chunk.is_complete);
        assert_eq!(chunk.session_id.as_str(), "S1");
    }

    #[test]
    fn test_start_requires_session_id() {
        let result: Result<StreamStart, _> = serde_json::from_value(json!({"model": "m"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_outgoing_message_wire_shape() {
        let payload = serde_json::to_value(OutgoingMessage {
            chat_id: "c1",
            content: "hello",
            message_type: MessageType::Image,
        })
        .unwrap();
        assert_eq!(
            payload,
            json!({"chatId": "c1", "content": "hello", "type": "image"})
        );
    }

    #[test]
    fn test_completion_options_are_flattened() {
        let request = CompletionRequest::new("gpt-4", vec![CompletionMessage::new("user", "hi")])
            .with_option("temperature", 0.5);
        let payload = serde_json::to_value(&request).unwrap();
        assert_eq!(
            payload,
            json!({
                "messages": [{"role": "user", "content": "hi"}],
                "model": "gpt-4",
                "temperature": 0.5
            })
        );
    }
}
