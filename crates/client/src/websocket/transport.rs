//! Transport seam between the connection manager and a concrete socket.
//!
//! A [`Connector`] opens one physical socket per call and hands back a
//! [`SocketLink`]: a command sender for outbound frames and an event receiver
//! for everything the socket reports. The socket side holds the matching
//! [`SocketEndpoint`].

use tokio::sync::mpsc;

/// What a socket reports, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// Handshake completed
    Open,
    /// One inbound text frame
    Message(String),
    /// Socket-level failure; always followed by `Closed`
    Error(String),
    /// The server started the close handshake
    Closing,
    /// The socket is gone. Last event of every socket.
    Closed,
}

/// Instructions for a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketCommand {
    /// Write one text frame
    Text(String),
    /// Close the socket
    Close,
}

/// Manager-side half of a socket.
#[derive(Debug)]
pub struct SocketLink {
    pub commands: mpsc::UnboundedSender<SocketCommand>,
    pub events: mpsc::UnboundedReceiver<SocketEvent>,
}

/// Socket-side half of a socket.
#[derive(Debug)]
pub struct SocketEndpoint {
    pub events: mpsc::UnboundedSender<SocketEvent>,
    pub commands: mpsc::UnboundedReceiver<SocketCommand>,
}

/// Create a connected link/endpoint pair.
pub fn socket_channel() -> (SocketLink, SocketEndpoint) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    (
        SocketLink {
            commands: command_tx,
            events: event_rx,
        },
        SocketEndpoint {
            events: event_tx,
            commands: command_rx,
        },
    )
}

/// Opens physical sockets.
///
/// `open` must not block: it starts the connection attempt and returns
/// immediately. The outcome is reported on the link's event channel.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Connector: Send + Sync {
    fn open(&self, url: &str) -> SocketLink;
}
