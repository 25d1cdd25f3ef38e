//! Transport surface publishing.
//!
//! Some platforms apply now-playing updates asynchronously and can let a
//! stale update win. After every state change the player therefore
//! republishes a few more times; each follow-up carries the state
//! generation it was scheduled for and is dropped if the state has moved on.

use crate::machine::Input;
use bridge_traits::{NowPlayingCenter, NowPlayingInfo};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

pub struct NowPlayingRefresher {
    center: Arc<dyn NowPlayingCenter>,
    pending: Vec<JoinHandle<()>>,
}

impl NowPlayingRefresher {
    pub fn new(center: Arc<dyn NowPlayingCenter>) -> Self {
        Self {
            center,
            pending: Vec::new(),
        }
    }

    pub async fn publish(&self, info: NowPlayingInfo) {
        trace!(
            position = ?info.position,
            rate = info.rate,
            title = ?info.metadata.title,
            "Publishing now playing"
        );
        if let Err(err) = self.center.publish(info).await {
            warn!(error = %err, "Failed to publish now playing info");
        }
    }

    /// Clear the surface and drop any pending follow-ups.
    pub async fn clear(&mut self) {
        self.cancel();
        if let Err(err) = self.center.clear().await {
            warn!(error = %err, "Failed to clear now playing info");
        }
    }

    /// Replace pending follow-ups with a fresh set for `generation`.
    pub fn schedule(
        &mut self,
        generation: u64,
        delays: &[Duration],
        inputs: &mpsc::UnboundedSender<Input>,
    ) {
        self.cancel();
        for &delay in delays {
            let inputs = inputs.clone();
            self.pending.push(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = inputs.send(Input::RefreshDue { generation });
            }));
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.iter().filter(|task| !task.is_finished()).count()
    }

    fn cancel(&mut self) {
        for task in self.pending.drain(..) {
            task.abort();
        }
    }
}

impl Drop for NowPlayingRefresher {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCenter {
        published: Mutex<Vec<NowPlayingInfo>>,
        clears: Mutex<usize>,
    }

    #[async_trait]
    impl NowPlayingCenter for RecordingCenter {
        async fn publish(&self, info: NowPlayingInfo) -> Result<()> {
            self.published.lock().unwrap().push(info);
            Ok(())
        }

        async fn clear(&self) -> Result<()> {
            *self.clears.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_ups_carry_generation() {
        let center = Arc::new(RecordingCenter::default());
        let mut refresher = NowPlayingRefresher::new(center);
        let (tx, mut rx) = mpsc::unbounded_channel();

        refresher.schedule(
            7,
            &[Duration::from_millis(500), Duration::from_millis(1500)],
            &tx,
        );
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(rx.try_recv().unwrap(), Input::RefreshDue { generation: 7 });
        assert_eq!(rx.try_recv().unwrap(), Input::RefreshDue { generation: 7 });
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_follow_ups() {
        let center = Arc::new(RecordingCenter::default());
        let mut refresher = NowPlayingRefresher::new(center.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        refresher.schedule(1, &[Duration::from_millis(500)], &tx);
        refresher.clear().await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(rx.try_recv().is_err());
        assert_eq!(*center.clears.lock().unwrap(), 1);
        assert_eq!(refresher.pending(), 0);
    }
}
