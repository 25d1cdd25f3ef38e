//! # Player Configuration
//!
//! Settable player properties and their defaults.

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rate applied to the engine while a fast-forward/rewind gesture is held.
pub const SEEK_RATE: f32 = 8.0;

/// How the queue advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayMode {
    /// Play through once and stop at the end.
    #[default]
    Normal,
    /// Replay the current item.
    RepeatOne,
    /// Wrap to the first item after the last.
    RepeatAll,
    /// Random non-repeating order, reshuffled when exhausted.
    Shuffle,
}

/// When a buffering item is considered ready to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferingStrategy {
    /// Leave readiness to the engine.
    #[default]
    Default,
    /// Ready once `preferred_buffer_duration` is buffered ahead of the playhead.
    PlayWhenPreferredBufferDurationFull,
    /// Ready as soon as anything is buffered ahead of the playhead.
    PlayWhenBufferNotEmpty,
}

/// Direction of a seek gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekDirection {
    Forward,
    Backward,
}

/// How a held seek gesture moves the playhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeekingBehavior {
    /// Play at `SEEK_RATE` (negative when rewinding) until released.
    #[default]
    Default,
    /// Jump by `delta` every `every` until released.
    ChangeTime { every: Duration, delta: Duration },
}

/// Player settings.
///
/// Every field can be changed at runtime through the player handle; changes
/// take effect on the next event that consults them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSettings {
    /// Output volume, 0.0 to 1.0.
    ///
    /// Default: 1.0.
    #[serde(default = "default_volume")]
    pub volume: f32,

    #[serde(default)]
    pub mode: PlayMode,

    /// Session recreations attempted after a stall or load failure.
    ///
    /// Default: 10.
    #[serde(default = "default_maximum_retry_count")]
    pub maximum_retry_count: u32,

    /// Time allotted to each retry attempt.
    ///
    /// Default: 10 seconds.
    #[serde(default = "default_retry_timeout")]
    pub retry_timeout: Duration,

    /// Resume when an interruption (call, alarm) ends with a resume hint.
    ///
    /// Default: true.
    #[serde(default = "default_true")]
    pub resume_after_interruption: bool,

    /// Resume playing when reachability returns; otherwise end paused.
    ///
    /// Default: true.
    #[serde(default = "default_true")]
    pub resume_after_connection_loss: bool,

    #[serde(default)]
    pub buffering_strategy: BufferingStrategy,

    /// Required by `PlayWhenPreferredBufferDurationFull`; also passed to the
    /// engine as a buffering hint.
    #[serde(default)]
    pub preferred_buffer_duration: Option<Duration>,

    #[serde(default)]
    pub seeking_behavior: SeekingBehavior,

    /// How long to wait for reachability before giving up on the item.
    ///
    /// Default: 60 seconds.
    #[serde(default = "default_maximum_connection_loss_time")]
    pub maximum_connection_loss_time: Duration,

    /// Reachability must hold steady this long before a change is reported.
    ///
    /// Default: 1 second.
    #[serde(default = "default_network_debounce")]
    pub network_debounce: Duration,

    /// Minimum playhead movement between progress reports.
    ///
    /// Default: 1 second.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: Duration,

    /// Follow-up transport-surface refreshes after each state change.
    ///
    /// Default: 500 ms and 1500 ms.
    #[serde(default = "default_now_playing_refresh_delays")]
    pub now_playing_refresh_delays: Vec<Duration>,

    /// Fetch and embed remote artwork when caching a download.
    ///
    /// Default: true.
    #[serde(default = "default_true")]
    pub cache_artwork: bool,
}

fn default_volume() -> f32 {
    1.0
}

fn default_maximum_retry_count() -> u32 {
    10
}

fn default_retry_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_true() -> bool {
    true
}

fn default_maximum_connection_loss_time() -> Duration {
    Duration::from_secs(60)
}

fn default_network_debounce() -> Duration {
    Duration::from_secs(1)
}

fn default_progress_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_now_playing_refresh_delays() -> Vec<Duration> {
    vec![Duration::from_millis(500), Duration::from_millis(1500)]
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            mode: PlayMode::default(),
            maximum_retry_count: default_maximum_retry_count(),
            retry_timeout: default_retry_timeout(),
            resume_after_interruption: true,
            resume_after_connection_loss: true,
            buffering_strategy: BufferingStrategy::default(),
            preferred_buffer_duration: None,
            seeking_behavior: SeekingBehavior::default(),
            maximum_connection_loss_time: default_maximum_connection_loss_time(),
            network_debounce: default_network_debounce(),
            progress_interval: default_progress_interval(),
            now_playing_refresh_delays: default_now_playing_refresh_delays(),
            cache_artwork: true,
        }
    }
}

impl PlayerSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        validate_volume(self.volume)?;

        if self.maximum_retry_count == 0 {
            return Err(invalid("maximum_retry_count must be > 0"));
        }

        if self.retry_timeout.is_zero() {
            return Err(invalid("retry_timeout must be > 0"));
        }

        if self.maximum_connection_loss_time.is_zero() {
            return Err(invalid("maximum_connection_loss_time must be > 0"));
        }

        if self.buffering_strategy == BufferingStrategy::PlayWhenPreferredBufferDurationFull
            && self.preferred_buffer_duration.map_or(true, |d| d.is_zero())
        {
            return Err(invalid(
                "play_when_preferred_buffer_duration_full requires a non-zero preferred_buffer_duration",
            ));
        }

        if let SeekingBehavior::ChangeTime { every, delta } = self.seeking_behavior {
            if every.is_zero() || delta.is_zero() {
                return Err(invalid("change_time seeking requires non-zero every and delta"));
            }
        }

        if self.progress_interval.is_zero() {
            return Err(invalid("progress_interval must be > 0"));
        }

        Ok(())
    }
}

pub(crate) fn validate_volume(volume: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&volume) {
        return Err(invalid(format!(
            "volume must be between 0.0 and 1.0, got {}",
            volume
        )));
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> PlaybackError {
    PlaybackError::InvalidConfig(message.into())
}
