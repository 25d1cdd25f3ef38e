use super::{EventProducer, EventSink, ProducerRun};
use crate::config::SeekDirection;
use crate::event::{Event, ProducedEvent, ProducerKind, SeekEvent};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Ticks while a seek gesture is held.
pub struct SeekEventProducer {
    direction: SeekDirection,
    every: Duration,
    run: ProducerRun,
}

impl SeekEventProducer {
    pub fn new(tx: mpsc::UnboundedSender<ProducedEvent>) -> Self {
        Self {
            direction: SeekDirection::Forward,
            every: Duration::from_secs(1),
            run: ProducerRun::new(ProducerKind::Seek, tx),
        }
    }

    /// Set direction and period for the next run.
    pub fn configure(&mut self, direction: SeekDirection, every: Duration) {
        self.direction = direction;
        self.every = every;
    }
}

#[async_trait]
impl EventProducer for SeekEventProducer {
    fn kind(&self) -> ProducerKind {
        self.run.kind()
    }

    async fn start_producing_events(&mut self) {
        if self.run.is_active() || self.every.is_zero() {
            return;
        }
        let sink = self.run.next_sink();
        debug!(direction = ?self.direction, every = ?self.every, "Seek producer started");
        self.run.spawn(tick(self.direction, self.every, sink));
    }

    fn stop_producing_events(&mut self) {
        if self.run.stop() {
            debug!("Seek producer stopped");
        }
    }

    fn is_producing(&self) -> bool {
        self.run.is_active()
    }

    fn epoch(&self) -> u64 {
        self.run.epoch()
    }
}

async fn tick(direction: SeekDirection, every: Duration, sink: EventSink) {
    // First tick one period after the gesture starts, not immediately.
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if !sink.emit(Event::Seek(SeekEvent::Tick(direction))) {
            return;
        }
    }
}
