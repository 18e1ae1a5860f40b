//! Envelope codec
//!
//! Turns text frames into [`ClientMessage`]s and [`ServerMessage`]s into
//! WebSocket frames. Decoding only fails for input that is not a JSON object;
//! an unrecognized `type` still decodes (as `ClientMessage::Unknown`) so the
//! router can answer it.

use serde_json::{Map, Value};
use tungstenite::protocol::Message as WsMessage;

use crate::protocol::message::{ClientMessage, ServerMessage};

/// How much of an undecodable frame is echoed back in the `received` field.
pub const RECEIVED_PREVIEW_CHARS: usize = 100;

/// Reported when an envelope has no `type` field.
const MISSING_TYPE: &str = "unknown";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    /// The frame is not JSON at all. `received` holds the start of the frame.
    #[error("invalid JSON: {reason}")]
    InvalidJson { received: String, reason: String },

    /// Valid JSON, but not an object, so there is no `type` to route on.
    #[error("envelope is a JSON {0}, expected an object")]
    NotAnObject(&'static str),
}

/// Decodes one text frame.
pub fn decode(frame: &str) -> Result<ClientMessage, DecodeError> {
    let value: Value = serde_json::from_str(frame).map_err(|e| DecodeError::InvalidJson {
        received: preview(frame),
        reason: e.to_string(),
    })?;

    let object = match value {
        Value::Object(object) => object,
        other => return Err(DecodeError::NotAnObject(json_kind(&other))),
    };

    Ok(classify(object))
}

/// Decodes a binary frame, which must hold UTF-8 JSON like a text frame.
pub fn decode_bytes(frame: &[u8]) -> Result<ClientMessage, DecodeError> {
    match std::str::from_utf8(frame) {
        Ok(text) => decode(text),
        Err(e) => Err(DecodeError::InvalidJson {
            received: preview(&String::from_utf8_lossy(frame)),
            reason: e.to_string(),
        }),
    }
}

fn classify(object: Map<String, Value>) -> ClientMessage {
    let kind = match object.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        Some(other) => other.to_string(),
        None => MISSING_TYPE.to_string(),
    };

    match kind.as_str() {
        "ping" => ClientMessage::Ping {
            envelope: Value::Object(object),
        },
        "echo" => ClientMessage::Echo {
            message: message_field(&object),
        },
        "broadcast" => ClientMessage::Broadcast {
            message: message_field(&object),
        },
        "stats" => ClientMessage::Stats,
        _ => ClientMessage::Unknown { kind },
    }
}

/// The `message` field, or an empty string when the client left it out.
fn message_field(object: &Map<String, Value>) -> Value {
    object
        .get("message")
        .cloned()
        .unwrap_or_else(|| Value::String(String::new()))
}

/// First [`RECEIVED_PREVIEW_CHARS`] characters of `frame`.
pub fn preview(frame: &str) -> String {
    frame.chars().take(RECEIVED_PREVIEW_CHARS).collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn encode(msg: &ServerMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(msg)
}

/// Encodes `msg` as a text frame ready for a connection's queue.
pub fn to_frame(msg: &ServerMessage) -> Result<WsMessage, serde_json::Error> {
    encode(msg).map(WsMessage::text)
}
