//! Transport surface ("now playing") abstraction.
//!
//! Lock screens, notification shades, and car displays show what is playing
//! and where. Several of these surfaces apply updates asynchronously, so a
//! late update can overwrite a newer one; callers that care re-publish.

use async_trait::async_trait;
use std::time::Duration;

use crate::{error::Result, playback::PlaybackMetadata};

/// Snapshot pushed to the transport surface.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlayingInfo {
    pub metadata: PlaybackMetadata,
    pub duration: Option<Duration>,
    pub position: Duration,
    /// Playback rate; `0.0` renders the surface as paused.
    pub rate: f32,
}

/// Platform transport surface.
///
/// - **iOS**: `MPNowPlayingInfoCenter`
/// - **Android**: `MediaSession` metadata + playback state
/// - **Desktop**: MPRIS / SMTC
#[async_trait]
pub trait NowPlayingCenter: Send + Sync {
    /// Replace whatever the surface currently displays.
    async fn publish(&self, info: NowPlayingInfo) -> Result<()>;

    /// Remove the entry entirely.
    async fn clear(&self) -> Result<()>;
}
