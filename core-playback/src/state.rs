//! Playback state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the player gave up on the current item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Every retry attempt was used.
    RetryExhausted,
    /// Reachability did not return within the connection-loss window.
    ConnectionLost,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::RetryExhausted => "retry_exhausted",
            FailureReason::ConnectionLost => "connection_lost",
        }
    }
}

/// State of the player as observed by the host.
///
/// `Failed` is transitional: the player reports it and moves on to
/// `Stopped` in the same step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Buffering,
    Playing,
    Paused,
    WaitingForConnection,
    Failed(FailureReason),
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, PlaybackState::Paused)
    }

    pub fn is_buffering(&self) -> bool {
        matches!(self, PlaybackState::Buffering)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, PlaybackState::Stopped)
    }

    /// Label used in logs and broadcast notifications.
    pub fn label(&self) -> String {
        match self {
            PlaybackState::Stopped => "stopped".to_string(),
            PlaybackState::Buffering => "buffering".to_string(),
            PlaybackState::Playing => "playing".to_string(),
            PlaybackState::Paused => "paused".to_string(),
            PlaybackState::WaitingForConnection => "waiting_for_connection".to_string(),
            PlaybackState::Failed(reason) => format!("failed:{}", reason.as_str()),
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        assert!(PlaybackState::Playing.is_playing());
        assert!(PlaybackState::Paused.is_paused());
        assert!(!PlaybackState::Buffering.is_paused());
        assert_eq!(PlaybackState::default(), PlaybackState::Stopped);
    }

    #[test]
    fn test_labels() {
        assert_eq!(PlaybackState::WaitingForConnection.label(), "waiting_for_connection");
        assert_eq!(
            PlaybackState::Failed(FailureReason::RetryExhausted).to_string(),
            "failed:retry_exhausted"
        );
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(PlaybackState::Failed(FailureReason::ConnectionLost)).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["reason"], "connection_lost");
    }
}
