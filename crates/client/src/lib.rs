//! Socrates Client - auto-reconnecting WebSocket link to the tutor backend
//!
//! Layers, leaf-first:
//! - `messaging`: event registry, inbound message routing, connection state
//! - `websocket`: connection manager and socket transports
//! - `application`: the `TutorClient` facade, prompt builder, response accumulator

pub mod application;
pub mod config;
pub mod error;
pub mod messaging;
pub mod websocket;

pub use application::{ResponseAccumulator, TutorClient};
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use messaging::{listener, ClientEvent, ConnectionState, EventData, EventRegistry, Listener};
