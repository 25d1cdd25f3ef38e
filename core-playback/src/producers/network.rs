use super::{EventProducer, EventSink, ProducerRun};
use crate::event::{Event, NetworkEvent, ProducedEvent, ProducerKind};
use async_trait::async_trait;
use bridge_traits::network::{NetworkChangeStream, NetworkMonitor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Turns raw reachability samples into `ConnectionLost` /
/// `ConnectionRetrieved`.
///
/// A change is reported only after reachability has held steady for the
/// debounce window, and only when it differs from the last reported value.
///
/// The last reported value starts at the baseline given to [`set_baseline`],
/// which is what the consumer currently believes. When the monitor disagrees
/// with it at start, the current status goes through the same debounce as
/// any other sample.
///
/// [`set_baseline`]: NetworkEventProducer::set_baseline
pub struct NetworkEventProducer {
    monitor: Arc<dyn NetworkMonitor>,
    debounce: Duration,
    baseline: Option<bool>,
    run: ProducerRun,
}

impl NetworkEventProducer {
    pub fn new(
        monitor: Arc<dyn NetworkMonitor>,
        debounce: Duration,
        tx: mpsc::UnboundedSender<ProducedEvent>,
    ) -> Self {
        Self {
            monitor,
            debounce,
            baseline: None,
            run: ProducerRun::new(ProducerKind::Network, tx),
        }
    }

    pub fn set_debounce(&mut self, debounce: Duration) {
        self.debounce = debounce;
    }

    /// Reachability the consumer acted on; applies to the next start.
    pub fn set_baseline(&mut self, reachable: bool) {
        self.baseline = Some(reachable);
    }
}

#[async_trait]
impl EventProducer for NetworkEventProducer {
    fn kind(&self) -> ProducerKind {
        self.run.kind()
    }

    async fn start_producing_events(&mut self) {
        if self.run.is_active() {
            return;
        }

        let current = self.monitor.is_connected().await;
        let baseline = self.baseline.take().unwrap_or(current);
        let stream = match self.monitor.subscribe_changes().await {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "Reachability changes unavailable");
                return;
            }
        };

        let sink = self.run.next_sink();
        debug!(epoch = self.run.epoch(), baseline, current, "Network producer started");
        let pending = (current != baseline).then_some(current);
        self.run
            .spawn(forward_changes(stream, baseline, pending, self.debounce, sink));
    }

    fn stop_producing_events(&mut self) {
        if self.run.stop() {
            debug!(epoch = self.run.epoch(), "Network producer stopped");
        }
    }

    fn is_producing(&self) -> bool {
        self.run.is_active()
    }

    fn epoch(&self) -> u64 {
        self.run.epoch()
    }
}

async fn forward_changes(
    mut stream: Box<dyn NetworkChangeStream>,
    mut last_reported: bool,
    mut pending: Option<bool>,
    debounce: Duration,
    sink: EventSink,
) {
    loop {
        let mut reachable = match pending.take() {
            Some(reachable) => reachable,
            None => match stream.next().await {
                Some(sample) => sample.is_reachable(),
                None => return,
            },
        };

        // Let flapping settle: keep the latest sample until the link has been
        // quiet for a full window.
        loop {
            match tokio::time::timeout(debounce, stream.next()).await {
                Ok(Some(sample)) => reachable = sample.is_reachable(),
                Ok(None) => return,
                Err(_) => break,
            }
        }

        if reachable == last_reported {
            continue;
        }
        last_reported = reachable;

        let event = if reachable {
            info!("Connection retrieved");
            NetworkEvent::ConnectionRetrieved
        } else {
            info!("Connection lost");
            NetworkEvent::ConnectionLost
        };
        if !sink.emit(Event::Network(event)) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{NetworkInfo, NetworkType};
    use std::sync::Mutex;

    struct ScriptedMonitor {
        connected: bool,
        changes: Mutex<Option<mpsc::UnboundedReceiver<NetworkInfo>>>,
    }

    struct ChannelStream(mpsc::UnboundedReceiver<NetworkInfo>);

    #[async_trait]
    impl NetworkChangeStream for ChannelStream {
        async fn next(&mut self) -> Option<NetworkInfo> {
            self.0.recv().await
        }
    }

    #[async_trait]
    impl NetworkMonitor for ScriptedMonitor {
        async fn get_network_info(&self) -> BridgeResult<NetworkInfo> {
            Ok(if self.connected {
                NetworkInfo::connected(NetworkType::WiFi)
            } else {
                NetworkInfo::disconnected()
            })
        }

        async fn subscribe_changes(&self) -> BridgeResult<Box<dyn NetworkChangeStream>> {
            let rx = self.changes.lock().unwrap().take().expect("single subscription");
            Ok(Box::new(ChannelStream(rx)))
        }
    }

    fn producer(
        connected: bool,
    ) -> (
        NetworkEventProducer,
        mpsc::UnboundedSender<NetworkInfo>,
        mpsc::UnboundedReceiver<ProducedEvent>,
    ) {
        let (change_tx, change_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let monitor = Arc::new(ScriptedMonitor {
            connected,
            changes: Mutex::new(Some(change_rx)),
        });
        let producer = NetworkEventProducer::new(monitor, Duration::from_secs(1), event_tx);
        (producer, change_tx, event_rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_flapping_is_debounced_into_one_event() {
        let (mut producer, changes, mut events) = producer(true);
        producer.start_producing_events().await;

        changes.send(NetworkInfo::disconnected()).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        changes.send(NetworkInfo::connected(NetworkType::WiFi)).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        changes.send(NetworkInfo::disconnected()).unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let event = events.recv().await.unwrap();
        assert_eq!(event.event, Event::Network(NetworkEvent::ConnectionLost));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_status_is_suppressed() {
        let (mut producer, changes, mut events) = producer(true);
        producer.start_producing_events().await;

        changes.send(NetworkInfo::connected(NetworkType::Cellular)).unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(events.try_recv().is_err());

        changes.send(NetworkInfo::disconnected()).unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        changes.send(NetworkInfo::disconnected()).unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(
            events.recv().await.unwrap().event,
            Event::Network(NetworkEvent::ConnectionLost)
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_differing_from_baseline_is_reported() {
        let (mut producer, _changes, mut events) = producer(true);
        producer.set_baseline(false);
        producer.start_producing_events().await;

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(events.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(
            events.recv().await.unwrap().event,
            Event::Network(NetworkEvent::ConnectionRetrieved)
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_matching_baseline_stays_quiet() {
        let (mut producer, _changes, mut events) = producer(false);
        producer.set_baseline(false);
        producer.start_producing_events().await;

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_after_stop() {
        let (mut producer, changes, mut events) = producer(false);
        producer.start_producing_events().await;
        producer.start_producing_events().await;
        assert_eq!(producer.epoch(), 1);

        producer.stop_producing_events();
        assert!(!producer.is_producing());

        let _ = changes.send(NetworkInfo::connected(NetworkType::WiFi));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(events.try_recv().is_err());
    }
}
