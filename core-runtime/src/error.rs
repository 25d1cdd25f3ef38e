//! Runtime setup errors.
//!
//! These only occur while wiring the core together (building a
//! [`CoreConfig`](crate::config::CoreConfig), installing the log subscriber).
//! Once a player is running, failures are expressed as playback state.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A setting or feature flag is inconsistent with the injected bridges.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required host bridge was not injected and has no default.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },
}

impl Error {
    pub(crate) fn capability_missing(capability: &str, message: impl Into<String>) -> Self {
        Error::CapabilityMissing {
            capability: capability.to_string(),
            message: message.into(),
        }
    }

    /// Name of the missing bridge, if that is what went wrong.
    pub fn missing_capability(&self) -> Option<&str> {
        match self {
            Error::CapabilityMissing { capability, .. } => Some(capability),
            Error::Config(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
