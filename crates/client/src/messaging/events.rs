//! Application events published on the [`EventRegistry`](super::EventRegistry).

use std::fmt;

use serde_json::Value;
use socrates_protocol::MessageKind;

/// Every event a subscriber can register for.
///
/// Lifecycle events come from the connection itself; the rest mirror the
/// inbound message tags, with [`ClientEvent::Message`] as the fallback for
/// tags the client does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientEvent {
    Open,
    Close,
    Error,
    MaxReconnectReached,
    System,
    Status,
    AiResponseStart,
    AiResponseChunk,
    AiResponseEnd,
    History,
    Message,
}

impl ClientEvent {
    pub const ALL: [ClientEvent; 11] = [
        ClientEvent::Open,
        ClientEvent::Close,
        ClientEvent::Error,
        ClientEvent::MaxReconnectReached,
        ClientEvent::System,
        ClientEvent::Status,
        ClientEvent::AiResponseStart,
        ClientEvent::AiResponseChunk,
        ClientEvent::AiResponseEnd,
        ClientEvent::History,
        ClientEvent::Message,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientEvent::Open => "open",
            ClientEvent::Close => "close",
            ClientEvent::Error => "error",
            ClientEvent::MaxReconnectReached => "max_reconnect_reached",
            ClientEvent::System => "system",
            ClientEvent::Status => "status",
            ClientEvent::AiResponseStart => "ai_response_start",
            ClientEvent::AiResponseChunk => "ai_response_chunk",
            ClientEvent::AiResponseEnd => "ai_response_end",
            ClientEvent::History => "history",
            ClientEvent::Message => "message",
        }
    }

    /// The event an inbound message of this kind is published under.
    pub fn for_message(kind: &MessageKind) -> Self {
        match kind {
            MessageKind::System => ClientEvent::System,
            MessageKind::Status => ClientEvent::Status,
            MessageKind::AiResponseStart => ClientEvent::AiResponseStart,
            MessageKind::AiResponseChunk => ClientEvent::AiResponseChunk,
            MessageKind::AiResponseEnd => ClientEvent::AiResponseEnd,
            MessageKind::Error => ClientEvent::Error,
            MessageKind::History => ClientEvent::History,
            MessageKind::Other(_) => ClientEvent::Message,
        }
    }
}

impl fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-side failure reported on the `error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    ParseError,
    ConnectionError,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::ParseError => "parse_error",
            FaultKind::ConnectionError => "connection_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub kind: FaultKind,
    pub detail: String,
}

/// Data handed to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    /// Lifecycle events without a body (`open`, `close`, `max_reconnect_reached`)
    None,
    /// Full decoded payload of an inbound message
    Payload(Value),
    /// Client-side failure (`error` event only)
    Fault(Fault),
}

impl EventData {
    pub fn fault(kind: FaultKind, detail: impl Into<String>) -> Self {
        EventData::Fault(Fault {
            kind,
            detail: detail.into(),
        })
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            EventData::Payload(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_fault(&self) -> Option<&Fault> {
        match self {
            EventData::Fault(fault) => Some(fault),
            _ => None,
        }
    }

    /// String field of the payload, e.g. `content` of a chunk.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.payload()?.get(key)?.as_str()
    }
}
