//! # Desktop Bridge Implementations
//!
//! Default implementations of the host bridges for desktop platforms
//! (macOS, Windows, Linux), used in development and integration tests.
//!
//! ## Overview
//!
//! - `NetworkMonitor` probing a well-known host over TCP
//! - `HttpClient` using `reqwest`
//! - `OfflineStore` writing JSON documents with `tokio::fs`
//! - `BackgroundTaskService` as bookkeeping only (desktop never suspends)
//! - `NowPlayingCenter` that logs through `tracing`
//!
//! There is no desktop `MediaEngine`; hosts always inject their own.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FileOfflineStore, ReqwestHttpClient};
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .media_engine(engine)
//!     .offline_store(Arc::new(FileOfflineStore::in_temp_dir()))
//!     .http_client(Arc::new(ReqwestHttpClient::new()?))
//!     .enable_offline_cache(true)
//!     .build()?;
//! ```

mod background;
mod http;
mod network;
mod now_playing;
mod offline_store;

pub use background::DesktopBackgroundTasks;
pub use http::ReqwestHttpClient;
pub use network::DesktopNetworkMonitor;
pub use now_playing::TracingNowPlayingCenter;
pub use offline_store::FileOfflineStore;
