use thiserror::Error;

/// Errors surfaced by [`ConnectionManager::connect`](crate::websocket::ConnectionManager::connect).
///
/// Everything else the client reports goes through events or boolean
/// returns, never through a panic.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("connection attempt ended before the socket opened")]
    ConnectionInterrupted,
}
