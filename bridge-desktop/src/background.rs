//! Background execution tokens for desktop.
//!
//! Desktop processes are never suspended for being in the background, so a
//! grant is pure bookkeeping. Tokens are still tracked so that mismatched
//! `end` calls surface the same way they would on a mobile host.

use async_trait::async_trait;
use bridge_traits::{
    background::{BackgroundTaskService, BackgroundTaskToken},
    error::{BridgeError, Result},
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
pub struct DesktopBackgroundTasks {
    next_id: AtomicU64,
    outstanding: Mutex<HashSet<BackgroundTaskToken>>,
}

impl DesktopBackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of grants that have not been ended yet.
    pub async fn outstanding(&self) -> usize {
        self.outstanding.lock().await.len()
    }
}

#[async_trait]
impl BackgroundTaskService for DesktopBackgroundTasks {
    async fn begin(&self, name: &str) -> Result<BackgroundTaskToken> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = BackgroundTaskToken::new(format!("{}#{}", name, id));
        self.outstanding.lock().await.insert(token.clone());
        debug!(token = token.as_str(), "Background task granted");
        Ok(token)
    }

    async fn end(&self, token: BackgroundTaskToken) -> Result<()> {
        if !self.outstanding.lock().await.remove(&token) {
            return Err(BridgeError::OperationFailed(format!(
                "background task {} is not active",
                token.as_str()
            )));
        }
        debug!(token = token.as_str(), "Background task ended");
        Ok(())
    }
}
