//! Connection state of the tutor link.

use std::fmt;

/// State of the single physical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No socket (initial state, after close, after disconnect)
    #[default]
    Closed,
    /// Socket created, handshake in flight
    Connecting,
    /// Handshake complete, frames may be sent
    Open,
    /// Close handshake started by the server
    Closing,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Closed => "CLOSED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Open => "OPEN",
            ConnectionState::Closing => "CLOSING",
        }
    }

    /// True while a socket is connecting or open, i.e. `connect()` must not
    /// create another one.
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
