//! WebSocket client for the tutor backend
//!
//! - `client`: connection manager (state machine, reconnect, send gating)
//! - `core`: runtime-agnostic reconnect bookkeeping
//! - `transport`: the `Connector` seam and socket channel types
//! - `desktop`: tokio-tungstenite based `Connector`

mod client;
mod core;
mod desktop;
pub mod transport;

pub use client::ConnectionManager;
pub use self::core::FixedBackoff;
pub use desktop::TungsteniteConnector;
pub use transport::{
    socket_channel, Connector, SocketCommand, SocketEndpoint, SocketEvent, SocketLink,
};

#[cfg(any(test, feature = "testing"))]
pub use transport::MockConnector;
