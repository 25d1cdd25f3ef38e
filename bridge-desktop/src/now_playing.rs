//! Transport surface that writes to the log.
//!
//! Desktop hosts without a media-key integration still get a readable trail
//! of what the lock screen would have shown.

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    now_playing::{NowPlayingCenter, NowPlayingInfo},
};
use tokio::sync::RwLock;
use tracing::info;

#[derive(Default)]
pub struct TracingNowPlayingCenter {
    current: RwLock<Option<NowPlayingInfo>>,
}

impl TracingNowPlayingCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// What the surface currently displays.
    pub async fn current(&self) -> Option<NowPlayingInfo> {
        self.current.read().await.clone()
    }
}

#[async_trait]
impl NowPlayingCenter for TracingNowPlayingCenter {
    async fn publish(&self, now_playing: NowPlayingInfo) -> Result<()> {
        info!(
            title = now_playing.metadata.title.as_deref().unwrap_or("<untitled>"),
            artist = now_playing.metadata.artist.as_deref().unwrap_or(""),
            position_ms = now_playing.position.as_millis() as u64,
            duration_ms = now_playing.duration.map(|d| d.as_millis() as u64),
            rate = now_playing.rate,
            "Now playing"
        );
        *self.current.write().await = Some(now_playing);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        if self.current.write().await.take().is_some() {
            info!("Now playing cleared");
        }
        Ok(())
    }
}
