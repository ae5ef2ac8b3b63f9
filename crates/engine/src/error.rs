use geotrail_protocol::ProtocolError;
use geotrail_store::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Malformed message: {0}")]
    MalformedMessage(#[from] ProtocolError),

    #[error("Dependency not ready: {0}")]
    DependencyNotReady(String),

    #[error("Dependency failed: {0}")]
    DependencyFailed(String),

    #[error("IO error for target {target}: {source}")]
    Io {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("Router error: {0}")]
    Router(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Tracker is shutting down")]
    ShuttingDown,
}

impl TrackerError {
    pub(crate) fn io(target: &str, source: std::io::Error) -> Self {
        Self::Io {
            target: target.to_string(),
            source,
        }
    }
}
