//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback core and the
//! platform services it drives but does not own. The core decides *when* to
//! buffer, play, pause, retry, or stop; these traits are how it tells the
//! platform to do so, and how the platform reports back.
//!
//! ## Traits
//!
//! ### Media
//! - [`MediaEngine`](playback::MediaEngine) - Decoding/rendering sessions and their event streams
//! - [`NowPlayingCenter`](now_playing::NowPlayingCenter) - Lock screen / transport surface
//!
//! ### Platform Integration
//! - [`NetworkMonitor`](network::NetworkMonitor) - Reachability and change notifications
//! - [`BackgroundTaskService`](background::BackgroundTaskService) - Background execution tokens
//!
//! ### Storage & I/O
//! - [`OfflineStore`](storage::OfflineStore) - Persist documents for downloaded items
//! - [`HttpClient`](http::HttpClient) - Remote asset (artwork) fetching
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Shims (no media engine) |
//! | iOS      | TBD                 | 📋 Planned |
//! | Android  | TBD                 | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). The core never
//! surfaces these to the host directly: failures reported by a bridge are
//! logged and translated into playback state transitions.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so that handles can be shared with
//! the tasks the core spawns for timers and event forwarding.
//!
//! ## Examples
//!
//! ### Implementing NowPlayingCenter
//!
//! ```ignore
//! use async_trait::async_trait;
//! use bridge_traits::error::Result;
//! use bridge_traits::now_playing::{NowPlayingCenter, NowPlayingInfo};
//!
//! struct LockScreen;
//!
//! #[async_trait]
//! impl NowPlayingCenter for LockScreen {
//!     async fn publish(&self, info: NowPlayingInfo) -> Result<()> {
//!         // Forward to MPNowPlayingInfoCenter / MediaSession
//!         Ok(())
//!     }
//!
//!     async fn clear(&self) -> Result<()> {
//!         Ok(())
//!     }
//! }
//! ```

pub mod background;
pub mod error;
pub mod http;
pub mod network;
pub mod now_playing;
pub mod playback;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use background::{BackgroundTaskService, BackgroundTaskToken};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
pub use now_playing::{NowPlayingCenter, NowPlayingInfo};
pub use playback::{
    AudioSource, MediaEngine, MediaSessionEvent, MediaSessionEventStream, PlaybackMetadata,
    PlaybackOptions, PlaybackRequest, PlaybackSessionId, TimeRange,
};
pub use storage::{OfflineDocument, OfflineStore, StoredArtwork};
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
