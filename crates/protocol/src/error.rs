use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Reasons a channel payload is not a usable location record.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing or non-string targetId")]
    MissingTargetId,

    #[error("Invalid targetId: {0}")]
    InvalidTargetId(String),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("Message too long: {len} bytes (max {max})")]
    TooLong { len: usize, max: usize },

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),
}
