//! Outbound envelope (client → Tutor backend)
//!
//! Every outbound frame is `{"type": ..., "message": ..., ...extra}`. The
//! `message` field is always a string; structured payloads are JSON-encoded into
//! it and their top-level keys are also copied next to `type`/`message`.

use serde_json::{Map, Value};

use crate::error::ProtocolError;

/// Outbound `type` tags understood by the backend.
pub mod kinds {
    pub const CHAT: &str = "chat";
    pub const RESET: &str = "reset";
    pub const HISTORY: &str = "history";
}

/// What the caller passed as the message body.
#[derive(Debug, Clone, PartialEq)]
pub enum MessagePayload {
    /// No body; encodes as an empty `message`
    Empty,
    /// Sent verbatim as `message`
    Text(String),
    /// Encoded into `message` and merged into the envelope
    Fields(Map<String, Value>),
    /// Any other JSON value; encoded into `message`, nothing merged
    Json(Value),
}

impl From<&str> for MessagePayload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for MessagePayload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Map<String, Value>> for MessagePayload {
    fn from(fields: Map<String, Value>) -> Self {
        Self::Fields(fields)
    }
}

impl From<Value> for MessagePayload {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text),
            Value::Object(fields) => Self::Fields(fields),
            Value::Null => Self::Empty,
            other => Self::Json(other),
        }
    }
}

/// A fully built outbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    body: Map<String, Value>,
}

impl OutboundMessage {
    pub fn new(kind: &str, payload: impl Into<MessagePayload>) -> Result<Self, ProtocolError> {
        let mut body = Map::new();
        body.insert("type".to_string(), Value::from(kind));

        let payload = payload.into();
        let message = match &payload {
            MessagePayload::Empty => String::new(),
            MessagePayload::Text(text) => text.clone(),
            MessagePayload::Fields(fields) => serde_json::to_string(fields)?,
            MessagePayload::Json(value) => serde_json::to_string(value)?,
        };
        body.insert("message".to_string(), Value::String(message));

        if let MessagePayload::Fields(fields) = payload {
            for (key, value) in fields {
                // `type` and `message` are reserved for the envelope itself
                if key == "type" || key == "message" {
                    continue;
                }
                body.insert(key, value);
            }
        }

        Ok(Self { body })
    }

    pub fn kind(&self) -> &str {
        self.body.get("type").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn message(&self) -> &str {
        self.body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Extra top-level field merged from an object payload.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(&self.body)?)
    }
}
