use super::{EventProducer, EventSink, ProducerRun};
use crate::event::{AudioItemEvent, Event, ProducedEvent, ProducerKind};
use async_trait::async_trait;
use bridge_traits::playback::{MediaEngine, MediaSessionEvent, MediaSessionEventStream};
use bridge_traits::PlaybackSessionId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Reports duration, progress and metadata of the loaded item.
///
/// Progress is throttled: a report goes out once the playhead has moved at
/// least `progress_interval` since the last one, or moved backwards.
pub struct AudioItemEventProducer {
    engine: Arc<dyn MediaEngine>,
    session: Option<PlaybackSessionId>,
    progress_interval: Duration,
    run: ProducerRun,
}

impl AudioItemEventProducer {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        progress_interval: Duration,
        tx: mpsc::UnboundedSender<ProducedEvent>,
    ) -> Self {
        Self {
            engine,
            session: None,
            progress_interval,
            run: ProducerRun::new(ProducerKind::AudioItem, tx),
        }
    }

    pub fn bind(&mut self, session: Option<PlaybackSessionId>) {
        if self.session != session {
            self.stop_producing_events();
            self.session = session;
        }
    }

    pub fn set_progress_interval(&mut self, interval: Duration) {
        self.progress_interval = interval;
    }
}

#[async_trait]
impl EventProducer for AudioItemEventProducer {
    fn kind(&self) -> ProducerKind {
        self.run.kind()
    }

    async fn start_producing_events(&mut self) {
        if self.run.is_active() {
            return;
        }
        let Some(session) = self.session else {
            return;
        };

        match self.engine.subscribe(session).await {
            Ok(stream) => {
                let sink = self.run.next_sink();
                debug!(%session, epoch = self.run.epoch(), "Audio item producer started");
                self.run
                    .spawn(forward_item_updates(stream, self.progress_interval, sink));
            }
            // The player producer reports the failure; item updates are optional.
            Err(err) => warn!(%session, error = %err, "Item updates unavailable"),
        }
    }

    fn stop_producing_events(&mut self) {
        if self.run.stop() {
            debug!(epoch = self.run.epoch(), "Audio item producer stopped");
        }
    }

    fn is_producing(&self) -> bool {
        self.run.is_active()
    }

    fn epoch(&self) -> u64 {
        self.run.epoch()
    }
}

async fn forward_item_updates(
    mut stream: Box<dyn MediaSessionEventStream>,
    progress_interval: Duration,
    sink: EventSink,
) {
    let mut last_progress: Option<Duration> = None;

    while let Some(event) = stream.next().await {
        let event = match event {
            MediaSessionEvent::DurationLoaded(duration) => AudioItemEvent::DurationChanged(duration),
            MediaSessionEvent::MetadataLoaded(metadata) => AudioItemEvent::MetadataUpdated(metadata),
            MediaSessionEvent::Progressed(position) => {
                if !crosses_threshold(last_progress, position, progress_interval) {
                    continue;
                }
                last_progress = Some(position);
                AudioItemEvent::ProgressChanged(position)
            }
            _ => continue,
        };
        if !sink.emit(Event::AudioItem(event)) {
            return;
        }
    }
}

fn crosses_threshold(last: Option<Duration>, position: Duration, interval: Duration) -> bool {
    match last {
        None => true,
        Some(last) if position < last => true,
        Some(last) => position - last >= interval,
    }
}
