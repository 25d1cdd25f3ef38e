use super::{EventProducer, EventSink, ProducerRun};
use crate::event::{Event, ProducedEvent, ProducerKind, RetryEvent};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Paces session recreation after a stall or load failure.
///
/// Each attempt gets a fixed window: `RetryAvailable { attempt }` fires at
/// the end of windows 1..=max, and `RetryFailed` one window after the last
/// attempt.
pub struct RetryEventProducer {
    maximum_attempts: u32,
    attempt_timeout: Duration,
    run: ProducerRun,
}

impl RetryEventProducer {
    pub fn new(
        maximum_attempts: u32,
        attempt_timeout: Duration,
        tx: mpsc::UnboundedSender<ProducedEvent>,
    ) -> Self {
        Self {
            maximum_attempts,
            attempt_timeout,
            run: ProducerRun::new(ProducerKind::Retry, tx),
        }
    }

    /// Applies to the next run.
    pub fn configure(&mut self, maximum_attempts: u32, attempt_timeout: Duration) {
        self.maximum_attempts = maximum_attempts;
        self.attempt_timeout = attempt_timeout;
    }
}

#[async_trait]
impl EventProducer for RetryEventProducer {
    fn kind(&self) -> ProducerKind {
        self.run.kind()
    }

    async fn start_producing_events(&mut self) {
        if self.run.is_active() {
            return;
        }
        let sink = self.run.next_sink();
        debug!(
            maximum_attempts = self.maximum_attempts,
            attempt_timeout = ?self.attempt_timeout,
            "Retry producer started"
        );
        self.run.spawn(schedule_attempts(
            self.maximum_attempts,
            self.attempt_timeout,
            sink,
        ));
    }

    fn stop_producing_events(&mut self) {
        if self.run.stop() {
            debug!("Retry producer stopped");
        }
    }

    fn is_producing(&self) -> bool {
        self.run.is_active()
    }

    fn epoch(&self) -> u64 {
        self.run.epoch()
    }
}

async fn schedule_attempts(maximum_attempts: u32, attempt_timeout: Duration, sink: EventSink) {
    for attempt in 1..=maximum_attempts {
        tokio::time::sleep(attempt_timeout).await;
        if !sink.emit(Event::Retry(RetryEvent::RetryAvailable { attempt })) {
            return;
        }
    }
    tokio::time::sleep(attempt_timeout).await;
    sink.emit(Event::Retry(RetryEvent::RetryFailed));
}
