//! Background Execution Tokens
//!
//! Mobile platforms suspend an app shortly after it leaves the foreground.
//! While the core is buffering it asks the platform for extra execution time
//! and hands the grant back as soon as buffering resolves.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Opaque grant returned by [`BackgroundTaskService::begin`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackgroundTaskToken(pub String);

impl BackgroundTaskToken {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Background execution service trait
///
/// Abstracts the platform's "finish this work before suspending me" API:
/// - **iOS**: `UIApplication.beginBackgroundTask` / `endBackgroundTask`
/// - **Android**: foreground service / wake lock held by the media service
/// - **Desktop**: no suspension; grants are bookkeeping only
///
/// Every successful [`begin`](Self::begin) must be balanced by exactly one
/// [`end`](Self::end) with the returned token. The core guarantees at most
/// one outstanding token per player.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::background::BackgroundTaskService;
///
/// async fn buffer(service: &dyn BackgroundTaskService) -> Result<()> {
///     let token = service.begin("buffering").await?;
///     // ... wait for the engine ...
///     service.end(token).await
/// }
/// ```
#[async_trait]
pub trait BackgroundTaskService: Send + Sync {
    /// Request extended execution time.
    ///
    /// `name` is a debugging label surfaced by some platforms.
    async fn begin(&self, name: &str) -> Result<BackgroundTaskToken>;

    /// Release a grant previously returned by [`begin`](Self::begin).
    async fn end(&self, token: BackgroundTaskToken) -> Result<()>;

    /// Whether the platform supports background execution at all.
    async fn is_available(&self) -> bool {
        true
    }

    /// Remaining background execution time, when the platform reports it.
    async fn remaining_time(&self) -> Option<Duration> {
        None
    }
}
