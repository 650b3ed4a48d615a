use thiserror::Error;

/// Errors raised while decoding or encoding wire frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame is valid JSON but not an object")]
    NotAnObject,
}
