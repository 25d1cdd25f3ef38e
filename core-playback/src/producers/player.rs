use super::{EventProducer, EventSink, ProducerRun};
use crate::event::{Event, PlayerEvent, ProducedEvent, ProducerKind};
use async_trait::async_trait;
use bridge_traits::playback::{MediaEngine, MediaSessionEvent, MediaSessionEventStream};
use bridge_traits::PlaybackSessionId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Forwards readiness, stalls, failures and buffering of the bound session.
pub struct PlayerEventProducer {
    engine: Arc<dyn MediaEngine>,
    session: Option<PlaybackSessionId>,
    run: ProducerRun,
}

impl PlayerEventProducer {
    pub fn new(engine: Arc<dyn MediaEngine>, tx: mpsc::UnboundedSender<ProducedEvent>) -> Self {
        Self {
            engine,
            session: None,
            run: ProducerRun::new(ProducerKind::Player, tx),
        }
    }

    /// Bind to a session. Stops any run bound to the previous one.
    pub fn bind(&mut self, session: Option<PlaybackSessionId>) {
        if self.session != session {
            self.stop_producing_events();
            self.session = session;
        }
    }
}

#[async_trait]
impl EventProducer for PlayerEventProducer {
    fn kind(&self) -> ProducerKind {
        self.run.kind()
    }

    async fn start_producing_events(&mut self) {
        if self.run.is_active() {
            return;
        }
        let Some(session) = self.session else {
            debug!("Player producer has no session to observe");
            return;
        };

        let sink = self.run.next_sink();
        match self.engine.subscribe(session).await {
            Ok(stream) => {
                debug!(%session, epoch = self.run.epoch(), "Player producer started");
                self.run.spawn(forward_session(stream, sink));
            }
            Err(err) => {
                // Surface as a load failure so the retry path takes over.
                warn!(%session, error = %err, "Could not observe media session");
                self.run.spawn(std::future::pending::<()>());
                sink.emit(Event::Player(PlayerEvent::ItemFailedToPlay {
                    message: err.to_string(),
                }));
            }
        }
    }

    fn stop_producing_events(&mut self) {
        if self.run.stop() {
            debug!(epoch = self.run.epoch(), "Player producer stopped");
        }
    }

    fn is_producing(&self) -> bool {
        self.run.is_active()
    }

    fn epoch(&self) -> u64 {
        self.run.epoch()
    }
}

async fn forward_session(mut stream: Box<dyn MediaSessionEventStream>, sink: EventSink) {
    while let Some(event) = stream.next().await {
        let event = match event {
            MediaSessionEvent::ReadyToPlay => PlayerEvent::ItemReady,
            MediaSessionEvent::Stalled => PlayerEvent::ItemPlaybackStalled,
            MediaSessionEvent::PlaybackEnded => PlayerEvent::ItemPlaybackEnded,
            MediaSessionEvent::Failed { message } => PlayerEvent::ItemFailedToPlay { message },
            MediaSessionEvent::LoadedRange(loaded) => PlayerEvent::BufferProgress { loaded },
            MediaSessionEvent::InterruptionBegan => PlayerEvent::InterruptionBegan,
            MediaSessionEvent::InterruptionEnded { should_resume } => {
                PlayerEvent::InterruptionEnded { should_resume }
            }
            MediaSessionEvent::DownloadCompleted { local_path } => {
                PlayerEvent::DownloadFinished { local_path }
            }
            // Item-level updates belong to the audio item producer.
            MediaSessionEvent::DurationLoaded(_)
            | MediaSessionEvent::Progressed(_)
            | MediaSessionEvent::MetadataLoaded(_) => continue,
        };
        if !sink.emit(Event::Player(event)) {
            return;
        }
    }
}
