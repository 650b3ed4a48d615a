//! Event registry and message routing.
//!
//! This module provides the publish side of the client:
//! - `EventRegistry`: per-event subscriber lists with isolated fan-out
//! - `MessageRouter`: maps inbound frames to application events
//! - `ConnectionState`: observable state of the link
//!
//! The WebSocket client (in the websocket module) feeds the router and the
//! lifecycle events into the registry.

pub mod connection;
pub mod event_bus;
pub mod events;
pub mod router;

pub use connection::ConnectionState;
pub use event_bus::{listener, EventRegistry, Listener};
pub use events::{ClientEvent, EventData, Fault, FaultKind};
pub use router::MessageRouter;
