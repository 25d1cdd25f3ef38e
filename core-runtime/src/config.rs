//! # Core Configuration Module
//!
//! Collects the platform bridges the playback core drives.
//!
//! ## Overview
//!
//! `CoreConfig` is assembled with [`CoreConfigBuilder`] and validated
//! fail-fast: a missing capability is reported at build time with an
//! actionable message instead of surfacing later as a silent no-op.
//!
//! ## Required Dependencies
//!
//! - `MediaEngine` - Always required; there is no desktop default
//! - `NetworkMonitor` - Reachability (desktop default: TCP probe)
//! - `NowPlayingCenter` - Transport surface (desktop default: tracing log)
//! - `BackgroundTaskService` - Background execution tokens (desktop default: bookkeeping only)
//!
//! ## Optional Dependencies
//!
//! - `OfflineStore` - Needed when `enable_offline_cache` is on
//! - `HttpClient` - Needed when `enable_artwork_fetch` is on
//! - `Clock` - Defaults to [`SystemClock`]
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .media_engine(Arc::new(MyAvPlayerEngine::new()))
//!     .offline_store(Arc::new(MyOfflineStore))
//!     .enable_offline_cache(true)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{
    BackgroundTaskService, Clock, HttpClient, MediaEngine, NetworkMonitor, NowPlayingCenter,
    OfflineStore, SystemClock,
};
use std::sync::Arc;

/// Bridges and settings required to construct a player.
#[derive(Clone)]
pub struct CoreConfig {
    pub media_engine: Arc<dyn MediaEngine>,
    pub network_monitor: Arc<dyn NetworkMonitor>,
    pub now_playing: Arc<dyn NowPlayingCenter>,
    pub background_tasks: Arc<dyn BackgroundTaskService>,
    pub offline_store: Option<Arc<dyn OfflineStore>>,
    pub http_client: Option<Arc<dyn HttpClient>>,
    pub clock: Arc<dyn Clock>,
    /// Capacity of the broadcast channel behind the event bus
    pub event_buffer_size: usize,
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("media_engine", &"MediaEngine { ... }")
            .field("network_monitor", &"NetworkMonitor { ... }")
            .field("now_playing", &"NowPlayingCenter { ... }")
            .field("background_tasks", &"BackgroundTaskService { ... }")
            .field(
                "offline_store",
                &self.offline_store.as_ref().map(|_| "OfflineStore { ... }"),
            )
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional functionality.
///
/// Each flag needs the matching bridge; `validate` rejects a flag whose
/// bridge is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags {
    /// Persist finished downloads through the `OfflineStore`
    pub enable_offline_cache: bool,

    /// Fetch remote artwork while caching (requires HttpClient)
    pub enable_artwork_fetch: bool,
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > 10_000 {
            return Err(Error::Config(
                "Event buffer size exceeds maximum of 10,000".to_string(),
            ));
        }

        if self.features.enable_offline_cache && self.offline_store.is_none() {
            return Err(Error::Config(
                "Offline cache enabled but no OfflineStore provided. \
                 Disable the feature or inject an OfflineStore implementation."
                    .to_string(),
            ));
        }

        if self.features.enable_artwork_fetch && self.http_client.is_none() {
            return Err(Error::Config(
                "Artwork fetch enabled but no HttpClient provided. \
                 Disable the feature or inject an HttpClient implementation."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn media_engine_missing_error() -> Error {
    Error::capability_missing(
        "MediaEngine",
        "MediaEngine implementation is required for audio playback. \
                 iOS: inject an AVPlayer-backed engine. \
                 Android: inject an ExoPlayer-backed engine. \
                 Desktop: no default engine is bundled; inject one explicitly.",
    )
}

#[cfg(not(feature = "desktop-shims"))]
fn network_monitor_missing_error() -> Error {
    Error::capability_missing(
        "NetworkMonitor",
        "NetworkMonitor implementation is required for reachability tracking. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default DesktopNetworkMonitor. \
                 Mobile: inject NWPathMonitor/ConnectivityManager.",
    )
}

#[cfg(not(feature = "desktop-shims"))]
fn now_playing_missing_error() -> Error {
    Error::capability_missing(
        "NowPlayingCenter",
        "NowPlayingCenter implementation is required for the transport surface. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default TracingNowPlayingCenter. \
                 Mobile: inject MPNowPlayingInfoCenter/MediaSession.",
    )
}

#[cfg(not(feature = "desktop-shims"))]
fn background_tasks_missing_error() -> Error {
    Error::capability_missing(
        "BackgroundTaskService",
        "BackgroundTaskService implementation is required to keep buffering alive in background. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default DesktopBackgroundTasks. \
                 iOS: inject UIApplication background task bridge.",
    )
}

#[cfg(feature = "desktop-shims")]
fn provide_default_network_monitor() -> Result<Arc<dyn NetworkMonitor>> {
    use bridge_desktop::DesktopNetworkMonitor;

    let monitor: Arc<dyn NetworkMonitor> = Arc::new(DesktopNetworkMonitor::new());
    Ok(monitor)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_network_monitor() -> Result<Arc<dyn NetworkMonitor>> {
    Err(network_monitor_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_now_playing() -> Result<Arc<dyn NowPlayingCenter>> {
    use bridge_desktop::TracingNowPlayingCenter;

    let center: Arc<dyn NowPlayingCenter> = Arc::new(TracingNowPlayingCenter::new());
    Ok(center)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_now_playing() -> Result<Arc<dyn NowPlayingCenter>> {
    Err(now_playing_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_background_tasks() -> Result<Arc<dyn BackgroundTaskService>> {
    use bridge_desktop::DesktopBackgroundTasks;

    let service: Arc<dyn BackgroundTaskService> = Arc::new(DesktopBackgroundTasks::new());
    Ok(service)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_background_tasks() -> Result<Arc<dyn BackgroundTaskService>> {
    Err(background_tasks_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    media_engine: Option<Arc<dyn MediaEngine>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    now_playing: Option<Arc<dyn NowPlayingCenter>>,
    background_tasks: Option<Arc<dyn BackgroundTaskService>>,
    offline_store: Option<Arc<dyn OfflineStore>>,
    http_client: Option<Arc<dyn HttpClient>>,
    clock: Option<Arc<dyn Clock>>,
    event_buffer_size: Option<usize>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Sets the media engine (required).
    pub fn media_engine(mut self, engine: Arc<dyn MediaEngine>) -> Self {
        self.media_engine = Some(engine);
        self
    }

    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    pub fn now_playing(mut self, center: Arc<dyn NowPlayingCenter>) -> Self {
        self.now_playing = Some(center);
        self
    }

    pub fn background_tasks(mut self, service: Arc<dyn BackgroundTaskService>) -> Self {
        self.background_tasks = Some(service);
        self
    }

    /// Sets the offline store used to persist finished downloads.
    pub fn offline_store(mut self, store: Arc<dyn OfflineStore>) -> Self {
        self.offline_store = Some(store);
        self
    }

    /// Sets the HTTP client used to fetch artwork while caching.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the event bus capacity.
    ///
    /// Default: 100. Slow subscribers lag once this many events are queued.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn enable_offline_cache(mut self, enabled: bool) -> Self {
        self.features.enable_offline_cache = enabled;
        self
    }

    pub fn enable_artwork_fetch(mut self, enabled: bool) -> Self {
        self.features.enable_artwork_fetch = enabled;
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Fails with `CapabilityMissing` when a required bridge is absent and no
    /// desktop default applies, and with `Config` when feature flags are
    /// inconsistent with the provided bridges.
    pub fn build(self) -> Result<CoreConfig> {
        let media_engine = self.media_engine.ok_or_else(media_engine_missing_error)?;

        let network_monitor = match self.network_monitor {
            Some(monitor) => monitor,
            None => provide_default_network_monitor()?,
        };

        let now_playing = match self.now_playing {
            Some(center) => center,
            None => provide_default_now_playing()?,
        };

        let background_tasks = match self.background_tasks {
            Some(service) => service,
            None => provide_default_background_tasks()?,
        };

        let config = CoreConfig {
            media_engine,
            network_monitor,
            now_playing,
            background_tasks,
            offline_store: self.offline_store,
            http_client: self.http_client,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}
