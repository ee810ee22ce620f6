//! Frame Protocol
//!
//! Wire format for realtime events over a text-message transport: one JSON
//! envelope per message.
//!
//! # Frame Format
//!
//! ```text
//! {"event": "<name>", "data": <any JSON value>}
//! ```
//!
//! `data` may be omitted on inbound frames and decodes as `null`.
//!
//! # Security
//!
//! - Maximum frame size is enforced in both directions
//! - Oversized inbound frames are rejected before parsing

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::TransportError;

/// Maximum frame size (1 MB)
///
/// This prevents memory exhaustion from malicious or corrupted frames.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// A decoded frame
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event name
    pub event: String,
    /// Event payload
    #[serde(default)]
    pub data: Value,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    event: &'a str,
    data: &'a Value,
}

/// Encode an event into a text frame
///
/// # Errors
///
/// Returns `TransportError::SerializationError` if:
/// - JSON serialization fails
/// - Resulting frame exceeds `MAX_FRAME_SIZE`
pub fn encode(event: &str, data: &Value) -> Result<String, TransportError> {
    let text = serde_json::to_string(&EnvelopeRef { event, data })?;

    if text.len() > MAX_FRAME_SIZE {
        return Err(TransportError::SerializationError(format!(
            "Frame too large: {} bytes (max: {})",
            text.len(),
            MAX_FRAME_SIZE
        )));
    }

    Ok(text)
}

/// Decode a text frame
///
/// # Errors
///
/// Returns `TransportError::SerializationError` for oversized frames,
/// invalid JSON, or JSON that is not an envelope.
pub fn decode(text: &str) -> Result<Envelope, TransportError> {
    if text.len() > MAX_FRAME_SIZE {
        return Err(TransportError::SerializationError(format!(
            "Frame too large: {} bytes (max: {})",
            text.len(),
            MAX_FRAME_SIZE
        )));
    }

    let envelope: Envelope = serde_json::from_str(text)?;
    if envelope.event.is_empty() {
        return Err(TransportError::SerializationError(
            "Frame has an empty event name".to_string(),
        ));
    }
    Ok(envelope)
}
