use thiserror::Error;

/// Failure reported by a host bridge.
///
/// The core never shows these to the user directly: they are logged and
/// turned into playback state or cache events.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The engine no longer knows the session (already destroyed or never created).
    #[error("Unknown playback session: {0}")]
    UnknownSession(String),

    /// A remote asset answered with a non-success status.
    #[error("HTTP {0} response")]
    HttpStatus(u16),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
