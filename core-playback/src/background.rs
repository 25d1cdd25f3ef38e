//! Background execution while buffering.

use crate::error::PlaybackError;
use bridge_traits::{BackgroundTaskService, BackgroundTaskToken};
use std::sync::Arc;
use tracing::{debug, warn};

const TASK_NAME: &str = "mpc-player.buffering";

/// Holds at most one background token.
///
/// `begin` while held and `end` while not held are no-ops, so the control
/// loop can call them on every buffering edge without bookkeeping.
pub struct BackgroundTaskGuard {
    service: Arc<dyn BackgroundTaskService>,
    token: Option<BackgroundTaskToken>,
}

impl BackgroundTaskGuard {
    pub fn new(service: Arc<dyn BackgroundTaskService>) -> Self {
        Self {
            service,
            token: None,
        }
    }

    pub fn is_held(&self) -> bool {
        self.token.is_some()
    }

    pub async fn begin(&mut self) {
        if self.token.is_some() {
            return;
        }
        match self.service.begin(TASK_NAME).await {
            Ok(token) => {
                debug!(token = token.as_str(), "Background task started");
                self.token = Some(token);
            }
            // Buffering continues in the foreground regardless.
            Err(err) => warn!(error = %err, "Background task unavailable"),
        }
    }

    pub async fn end(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        let label = token.as_str().to_string();
        match self.service.end(token).await {
            Ok(()) => debug!(token = %label, "Background task ended"),
            Err(err) => warn!(
                error = %PlaybackError::BackgroundTokenMismatch(err.to_string()),
                token = %label,
                "Platform rejected background token"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTasks {
        begun: AtomicUsize,
        ended: AtomicUsize,
        refuse: bool,
    }

    #[async_trait]
    impl BackgroundTaskService for CountingTasks {
        async fn begin(&self, _name: &str) -> Result<BackgroundTaskToken> {
            if self.refuse {
                return Err(BridgeError::NotAvailable("background".into()));
            }
            let n = self.begun.fetch_add(1, Ordering::SeqCst);
            Ok(BackgroundTaskToken::new(format!("task-{}", n)))
        }

        async fn end(&self, _token: BackgroundTaskToken) -> Result<()> {
            self.ended.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_begin_and_end_are_idempotent() {
        let service = Arc::new(CountingTasks::default());
        let mut guard = BackgroundTaskGuard::new(service.clone());

        guard.end().await;
        guard.begin().await;
        guard.begin().await;
        assert!(guard.is_held());
        guard.end().await;
        guard.end().await;

        assert_eq!(service.begun.load(Ordering::SeqCst), 1);
        assert_eq!(service.ended.load(Ordering::SeqCst), 1);
        assert!(!guard.is_held());
    }

    #[tokio::test]
    async fn test_refused_begin_holds_nothing() {
        let service = Arc::new(CountingTasks {
            refuse: true,
            ..Default::default()
        });
        let mut guard = BackgroundTaskGuard::new(service.clone());
        guard.begin().await;
        assert!(!guard.is_held());
        guard.end().await;
        assert_eq!(service.ended.load(Ordering::SeqCst), 0);
    }
}
