//! Network Monitoring Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

const DEFAULT_PROBE_TARGET: &str = "1.1.1.1:443";
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Desktop reachability monitor.
///
/// Desktop platforms have no portable reachability callback, so the monitor
/// probes a well-known host with a TCP connect and polls for changes.
/// Platform APIs (netlink, SystemConfiguration, NLM) would report changes
/// faster but need per-OS dependencies.
#[derive(Clone)]
pub struct DesktopNetworkMonitor {
    probe_target: String,
    probe_timeout: Duration,
    poll_interval: Duration,
    last_info: Arc<Mutex<Option<NetworkInfo>>>,
}

impl DesktopNetworkMonitor {
    pub fn new() -> Self {
        Self {
            probe_target: DEFAULT_PROBE_TARGET.to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            last_info: Arc::new(Mutex::new(None)),
        }
    }

    /// Probe `target` (`host:port`) instead of the default resolver.
    pub fn with_probe_target(mut self, target: impl Into<String>) -> Self {
        self.probe_target = target.into();
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Most recent probe result, if any probe has run.
    pub async fn last_info(&self) -> Option<NetworkInfo> {
        self.last_info.lock().await.clone()
    }

    async fn probe(&self) -> NetworkStatus {
        match tokio::time::timeout(self.probe_timeout, TcpStream::connect(&self.probe_target))
            .await
        {
            Ok(Ok(_)) => NetworkStatus::Connected,
            Ok(Err(err)) => {
                debug!(target = %self.probe_target, error = %err, "Reachability probe refused");
                NetworkStatus::Disconnected
            }
            Err(_) => {
                debug!(target = %self.probe_target, "Reachability probe timed out");
                NetworkStatus::Disconnected
            }
        }
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let info = match self.probe().await {
            // Wired and wireless look the same from a socket.
            NetworkStatus::Connected => NetworkInfo::connected(NetworkType::Other),
            _ => NetworkInfo::disconnected(),
        };

        let mut last = self.last_info.lock().await;
        if last.as_ref().map(|previous| previous.status) != Some(info.status) {
            debug!(status = ?info.status, "Network status updated");
        }
        *last = Some(info.clone());

        Ok(info)
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>> {
        let last_status = self.last_info().await.map(|info| info.status);
        Ok(Box::new(PollingChangeStream {
            monitor: self.clone(),
            last_status,
        }))
    }
}

/// Reports a sample whenever the probed status differs from the previous one.
struct PollingChangeStream {
    monitor: DesktopNetworkMonitor,
    last_status: Option<NetworkStatus>,
}

#[async_trait]
impl NetworkChangeStream for PollingChangeStream {
    async fn next(&mut self) -> Option<NetworkInfo> {
        loop {
            tokio::time::sleep(self.monitor.poll_interval).await;

            if let Ok(info) = self.monitor.get_network_info().await {
                if self.last_status != Some(info.status) {
                    self.last_status = Some(info.status);
                    return Some(info);
                }
            }
        }
    }
}
