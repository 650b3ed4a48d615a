//! Routes decoded inbound frames onto the event registry.

use socrates_protocol::{parse_inbound, InboundMessage};

use super::event_bus::EventRegistry;
use super::events::{ClientEvent, EventData, FaultKind};

/// Classifies inbound frames by tag and publishes them.
///
/// Known tags go to their own event; anything else is published under
/// [`ClientEvent::Message`] so new server message types are never dropped.
#[derive(Clone)]
pub struct MessageRouter {
    registry: EventRegistry,
}

impl MessageRouter {
    pub fn new(registry: EventRegistry) -> Self {
        Self { registry }
    }

    /// Decode a raw text frame and dispatch it.
    ///
    /// Undecodable frames are reported as a `parse_error` fault on the `error`
    /// event.
    pub fn route_text(&self, text: &str) {
        match parse_inbound(text) {
            Ok(message) => self.dispatch(message),
            Err(e) => {
                tracing::error!("Failed to parse server message: {}", e);
                self.registry.emit(
                    ClientEvent::Error,
                    &EventData::fault(FaultKind::ParseError, e.to_string()),
                );
            }
        }
    }

    pub fn dispatch(&self, message: InboundMessage) {
        let event = ClientEvent::for_message(message.kind());
        if !message.kind().is_known() {
            tracing::warn!(
                kind = message.kind().as_tag(),
                "Unknown message type, forwarding as generic message"
            );
        } else {
            tracing::debug!(kind = message.kind().as_tag(), "Routing server message");
        }
        self.registry
            .emit(event, &EventData::Payload(message.into_value()));
    }
}
