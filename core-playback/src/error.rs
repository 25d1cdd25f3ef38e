//! # Playback Error Types
//!
//! Error kinds raised by the orchestrator and its helpers.
//!
//! Most of these never reach the host: inside the control loop they are
//! logged and translated into state transitions. The public API returns
//! them only for argument validation and after shutdown.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Recoverable Playback Errors
    // ========================================================================
    /// Reachability was lost while streaming.
    #[error("Network connection lost")]
    NetworkLost,

    /// The media engine could not load or keep playing the item.
    #[error("Item failed to load: {0}")]
    ItemLoadFailed(String),

    // ========================================================================
    // Terminal Conditions
    // ========================================================================
    /// Every retry attempt was used without the item becoming ready.
    #[error("Retry attempts exhausted after {attempts} attempts")]
    RetryExhausted { attempts: u32 },

    /// The queue has no further item in the current mode.
    #[error("Queue exhausted")]
    QueueExhausted,

    // ========================================================================
    // Internal Conditions (logged, never surfaced)
    // ========================================================================
    /// Requested seek lies outside the seekable range; it is clamped.
    #[error("Seek position out of range: {0:?}")]
    SeekOutOfRange(std::time::Duration),

    /// A background token was ended without being held, or begun twice.
    #[error("Background task token mismatch: {0}")]
    BackgroundTokenMismatch(String),

    // ========================================================================
    // API Errors
    // ========================================================================
    /// `play` was called with no items.
    #[error("Cannot play an empty list of items")]
    EmptyQueue,

    /// Item identity or locator is unusable.
    #[error("Invalid item: {0}")]
    InvalidItem(String),

    /// Player settings failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Offline caching failed; playback is unaffected.
    #[error("Cache error: {0}")]
    CacheError(String),

    /// The control loop has ended.
    #[error("Player has been shut down")]
    PlayerShutDown,

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),
}

impl PlaybackError {
    /// Returns `true` if playback can continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PlaybackError::NetworkLost
                | PlaybackError::ItemLoadFailed(_)
                | PlaybackError::SeekOutOfRange(_)
                | PlaybackError::CacheError(_)
        )
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::NetworkLost | PlaybackError::ItemLoadFailed(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
