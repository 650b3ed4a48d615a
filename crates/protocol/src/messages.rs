//! Inbound message types (Tutor backend → client)
//!
//! The backend sends one JSON object per text frame, tagged by a `type` field.
//! Only the tag is interpreted here; the rest of the object is kept verbatim so
//! subscribers see exactly what the server sent.
//!
//! ## Versioning Policy
//!
//! - Known tags map to a closed [`MessageKind`] set
//! - Unknown tags deserialize to [`MessageKind::Other`] for forward compatibility

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;

/// Classification of an inbound frame by its `type` tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Server notice (welcome banner, "session reset", ...)
    System,
    /// Progress notice while a request is being processed
    Status,
    /// First event of a streamed AI response
    AiResponseStart,
    /// One piece of a streamed AI response, text in `content`
    AiResponseChunk,
    /// Last event of a streamed AI response
    AiResponseEnd,
    /// Server-side error report
    Error,
    /// Conversation history snapshot
    History,
    /// Any tag outside the known set (empty when the tag is missing)
    Other(String),
}

impl MessageKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "system" => Self::System,
            "status" => Self::Status,
            "ai_response_start" => Self::AiResponseStart,
            "ai_response_chunk" => Self::AiResponseChunk,
            "ai_response_end" => Self::AiResponseEnd,
            "error" => Self::Error,
            "history" => Self::History,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_tag(&self) -> &str {
        match self {
            Self::System => "system",
            Self::Status => "status",
            Self::AiResponseStart => "ai_response_start",
            Self::AiResponseChunk => "ai_response_chunk",
            Self::AiResponseEnd => "ai_response_end",
            Self::Error => "error",
            Self::History => "history",
            Self::Other(tag) => tag,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

/// A decoded inbound frame: its classified tag plus the full JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    kind: MessageKind,
    payload: Map<String, Value>,
}

impl InboundMessage {
    /// Classify an already-decoded JSON object.
    ///
    /// A missing or non-string `type` is classified as `Other("")` rather than
    /// rejected, so the frame still reaches the fallback subscribers.
    pub fn from_object(payload: Map<String, Value>) -> Self {
        let kind = payload
            .get("type")
            .and_then(Value::as_str)
            .map(MessageKind::from_tag)
            .unwrap_or_else(|| MessageKind::Other(String::new()));
        Self { kind, payload }
    }

    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    /// The full object as received.
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.payload)
    }

    /// The `message` text field carried by system/status/error frames.
    pub fn message(&self) -> Option<&str> {
        self.payload.get("message").and_then(Value::as_str)
    }

    /// The chunk text of an `ai_response_chunk` frame.
    pub fn content(&self) -> Option<&str> {
        self.payload.get("content").and_then(Value::as_str)
    }

    /// Entries of a `history` frame.
    ///
    /// Returns an empty list when the frame carries no `history` field.
    pub fn history_entries(&self) -> Result<Vec<HistoryEntry>, ProtocolError> {
        match self.payload.get("history") {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            None => Ok(Vec::new()),
        }
    }
}

/// Parse a text frame into an [`InboundMessage`].
///
/// The frame must be a JSON object; anything else is a parse failure.
pub fn parse_inbound(text: &str) -> Result<InboundMessage, ProtocolError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(payload) => Ok(InboundMessage::from_object(payload)),
        _ => Err(ProtocolError::NotAnObject),
    }
}

/// One turn of the conversation as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}
