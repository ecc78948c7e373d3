//! Queue message representation and body codec.
//!
//! Message bodies are base64-encoded UTF-8 JSON. There is no schema version field:
//! consumers deserialize into structs whose optional keys default when missing.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// A message leased from a queue.
///
/// Owned by the transport from lease until it is deleted or poisoned. `id` and
/// `pop_receipt` together identify the lease; a stale receipt cannot delete or requeue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub id: String,
    pub pop_receipt: String,
    /// Number of times this message has been delivered, including this delivery.
    pub dequeue_count: u32,
    /// Encoded body, exactly as stored by the transport.
    pub content: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("payload serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("message body is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("message body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("message body is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
}

/// Encode a payload into a message body.
pub fn encode_payload<T: Serialize>(payload: &T) -> Result<String, CodecError> {
    let json = serde_json::to_string(payload).map_err(CodecError::Serialize)?;
    Ok(STANDARD.encode(json.as_bytes()))
}

/// Decode a message body: base64, then UTF-8, then JSON.
pub fn decode_payload(content: &str) -> Result<JsonValue, CodecError> {
    let bytes = STANDARD.decode(content.trim())?;
    let text = String::from_utf8(bytes)?;
    serde_json::from_str(&text).map_err(CodecError::Json)
}
