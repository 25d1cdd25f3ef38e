//! # Audio Player
//!
//! Host-facing handle plus the control loop that owns all playback state.
//!
//! ## Overview
//!
//! [`AudioPlayer`] is a cheap, cloneable handle. Every mutating call is sent
//! to a single control task and answered once the resulting transitions and
//! their side effects have been applied, so a caller that awaits `pause()`
//! observes the paused snapshot immediately afterwards.
//!
//! The control task multiplexes three sources:
//! - host commands (acknowledged through a oneshot),
//! - producer events, dropped unless their producer run is still current,
//! - internal follow-ups: transport refreshes, the connection-loss
//!   deadline, finished offline caching.
//!
//! Each message goes through the pure [`PlaybackMachine`]; the effects it
//! returns are executed here against the bridges, in order.
//!
//! ```text
//!  AudioPlayer ──Request──┐
//!  producers ──Produced───┼──> control loop ──> PlaybackMachine
//!  timers/cache ──Input───┘          │               │ effects
//!                                    ▼               ▼
//!                        watch<PlayerSnapshot>   MediaEngine, NowPlayingCenter,
//!                        EventBus, delegate      BackgroundTaskService, ...
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::{AudioPlayer, PlayableItem, PlayMode};
//! use core_runtime::config::CoreConfig;
//!
//! # async fn example(engine: std::sync::Arc<dyn bridge_traits::MediaEngine>) -> core_playback::Result<()> {
//! let config = CoreConfig::builder().media_engine(engine).build()?;
//! let player = AudioPlayer::builder(config).build()?;
//!
//! player
//!     .play_items(vec![PlayableItem::new("intro", "https://cdn.example.com/intro.m4a")], PlayMode::Normal)
//!     .await?;
//! player.pause().await?;
//! assert!(player.state().is_paused() || player.state().is_buffering());
//! # Ok(())
//! # }
//! ```

use crate::background::BackgroundTaskGuard;
use crate::cache::OfflineCacher;
use crate::config::{PlayMode, PlayerSettings, SeekDirection, SeekingBehavior};
use crate::delegate::{NoopDelegate, PlayerDelegate};
use crate::error::{PlaybackError, Result};
use crate::event::{ProducedEvent, ProducerKind};
use crate::item::PlayableItem;
use crate::machine::{
    clamp_seek, Command, Effect, Input, PlaybackMachine, PlayerSnapshot, SettingsUpdate,
};
use crate::now_playing::NowPlayingRefresher;
use crate::producers::{
    AudioItemEventProducer, NetworkEventProducer, PlayerEventProducer, Producers,
    RetryEventProducer, SeekEventProducer,
};
use crate::queue::ItemQueue;
use crate::state::PlaybackState;
use bridge_traits::{
    MediaEngine, NetworkMonitor, PlaybackOptions, PlaybackRequest, PlaybackSessionId,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use core_runtime::logging::redact_url;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, trace, warn, Instrument};

const REQUEST_BUFFER_SIZE: usize = 64;

enum Request {
    Command {
        command: Command,
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running player.
#[derive(Clone)]
pub struct AudioPlayer {
    requests: mpsc::Sender<Request>,
    snapshot: watch::Receiver<PlayerSnapshot>,
    events: EventBus,
}

/// Configures and starts an [`AudioPlayer`].
pub struct AudioPlayerBuilder {
    config: CoreConfig,
    settings: PlayerSettings,
    delegate: Option<Arc<dyn PlayerDelegate>>,
    shuffle_seed: Option<u64>,
}

impl AudioPlayerBuilder {
    pub fn settings(mut self, settings: PlayerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn delegate(mut self, delegate: Arc<dyn PlayerDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Seed the shuffle order, for reproducible tests.
    pub fn shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    /// Validate settings and spawn the control loop on the current runtime.
    pub fn build(self) -> Result<AudioPlayer> {
        self.settings.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            PlaybackError::InvalidConfig("a tokio runtime is required to start the player".into())
        })?;

        let CoreConfig {
            media_engine,
            network_monitor,
            now_playing,
            background_tasks,
            offline_store,
            http_client,
            clock,
            event_buffer_size,
            features,
        } = self.config;

        let (produced_tx, produced_rx) = mpsc::unbounded_channel();
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        let (requests_tx, requests_rx) = mpsc::channel(REQUEST_BUFFER_SIZE);

        let queue = match self.shuffle_seed {
            Some(seed) => ItemQueue::with_seed(seed),
            None => ItemQueue::new(),
        };
        let machine = PlaybackMachine::new(self.settings.clone(), queue);
        let (snapshot_tx, snapshot_rx) = watch::channel(machine.snapshot());
        let events = EventBus::new(event_buffer_size);

        let producers = Producers {
            network: NetworkEventProducer::new(
                network_monitor.clone(),
                self.settings.network_debounce,
                produced_tx.clone(),
            ),
            player: PlayerEventProducer::new(media_engine.clone(), produced_tx.clone()),
            seek: SeekEventProducer::new(produced_tx.clone()),
            audio_item: AudioItemEventProducer::new(
                media_engine.clone(),
                self.settings.progress_interval,
                produced_tx.clone(),
            ),
            retry: RetryEventProducer::new(
                self.settings.maximum_retry_count,
                self.settings.retry_timeout,
                produced_tx,
            ),
        };

        let cacher = OfflineCacher::new(
            offline_store.filter(|_| features.enable_offline_cache),
            http_client.filter(|_| features.enable_artwork_fetch),
            clock,
            self.settings.cache_artwork,
        );

        let control = ControlLoop {
            machine,
            engine: media_engine,
            network_monitor,
            producers,
            session: None,
            background: BackgroundTaskGuard::new(background_tasks),
            now_playing: NowPlayingRefresher::new(now_playing),
            cacher,
            delegate: self.delegate.unwrap_or_else(|| Arc::new(NoopDelegate)),
            events: events.clone(),
            snapshot: snapshot_tx,
            inputs_tx,
            connection_loss: None,
        };

        runtime.spawn(
            control
                .run(requests_rx, produced_rx, inputs_rx)
                .instrument(info_span!("control_loop")),
        );
        info!("Player started");

        Ok(AudioPlayer {
            requests: requests_tx,
            snapshot: snapshot_rx,
            events,
        })
    }
}

impl AudioPlayer {
    pub fn builder(config: CoreConfig) -> AudioPlayerBuilder {
        AudioPlayerBuilder {
            config,
            settings: PlayerSettings::default(),
            delegate: None,
            shuffle_seed: None,
        }
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    /// Replace the queue with a single item and start it.
    pub async fn play(&self, item: PlayableItem) -> Result<()> {
        self.send(Command::Play {
            items: vec![item],
            mode: None,
            start_index: 0,
        })
        .await
    }

    /// Replace the queue and start its first item. An empty list stops.
    pub async fn play_items(&self, items: Vec<PlayableItem>, mode: PlayMode) -> Result<()> {
        self.send(Command::Play {
            items,
            mode: Some(mode),
            start_index: 0,
        })
        .await
    }

    /// Replace the queue and start at `start_index` (insertion order).
    pub async fn play_items_from(&self, items: Vec<PlayableItem>, start_index: usize) -> Result<()> {
        self.send(Command::Play {
            items,
            mode: None,
            start_index,
        })
        .await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.send(Command::Resume).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(Command::Stop).await
    }

    pub async fn next(&self) -> Result<()> {
        self.send(Command::Next).await
    }

    pub async fn previous(&self) -> Result<()> {
        self.send(Command::Previous).await
    }

    pub async fn seek(&self, position: Duration) -> Result<()> {
        self.send(Command::Seek(position)).await
    }

    pub async fn begin_seeking(&self, direction: SeekDirection) -> Result<()> {
        self.send(Command::BeginSeeking(direction)).await
    }

    pub async fn end_seeking(&self) -> Result<()> {
        self.send(Command::EndSeeking).await
    }

    // ------------------------------------------------------------------
    // Queue
    // ------------------------------------------------------------------

    pub async fn add_item(&self, item: PlayableItem) -> Result<()> {
        self.send(Command::AddItems(vec![item])).await
    }

    pub async fn add_items(&self, items: Vec<PlayableItem>) -> Result<()> {
        self.send(Command::AddItems(items)).await
    }

    pub async fn remove_item(&self, index: usize) -> Result<()> {
        self.send(Command::RemoveItem(index)).await
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Edit settings atomically. Invalid results are rejected unchanged.
    pub async fn update_settings<F>(&self, update: F) -> Result<()>
    where
        F: FnOnce(&mut PlayerSettings) + Send + 'static,
    {
        self.send(Command::UpdateSettings(SettingsUpdate::new(update)))
            .await
    }

    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        self.update_settings(move |settings| settings.volume = volume)
            .await
    }

    pub async fn set_mode(&self, mode: PlayMode) -> Result<()> {
        self.update_settings(move |settings| settings.mode = mode).await
    }

    pub async fn set_seeking_behavior(&self, behavior: SeekingBehavior) -> Result<()> {
        self.update_settings(move |settings| settings.seeking_behavior = behavior)
            .await
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe_snapshot(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshot.clone()
    }

    pub fn state(&self) -> PlaybackState {
        self.snapshot.borrow().state
    }

    pub fn current_item(&self) -> Option<PlayableItem> {
        self.snapshot.borrow().current_item.clone()
    }

    pub fn progress(&self) -> Duration {
        self.snapshot.borrow().progress
    }

    pub fn duration(&self) -> Option<Duration> {
        self.snapshot.borrow().duration
    }

    pub fn queue_items(&self) -> Vec<PlayableItem> {
        self.snapshot.borrow().queue.clone()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.snapshot.borrow().current_index
    }

    pub fn mode(&self) -> PlayMode {
        self.snapshot.borrow().mode
    }

    pub fn volume(&self) -> f32 {
        self.snapshot.borrow().volume
    }

    /// Bus carrying every notification the delegate receives.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe_events(&self) -> Receiver<CoreEvent> {
        self.events.subscribe()
    }

    /// Stop playback and end the control loop.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, done) = oneshot::channel();
        self.requests
            .send(Request::Shutdown { reply })
            .await
            .map_err(|_| PlaybackError::PlayerShutDown)?;
        done.await.map_err(|_| PlaybackError::PlayerShutDown)
    }

    pub fn is_running(&self) -> bool {
        !self.requests.is_closed()
    }

    async fn send(&self, command: Command) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Command { command, reply })
            .await
            .map_err(|_| PlaybackError::PlayerShutDown)?;
        response.await.map_err(|_| PlaybackError::PlayerShutDown)?
    }
}

// ============================================================================
// Control loop
// ============================================================================

struct ControlLoop {
    machine: PlaybackMachine,
    engine: Arc<dyn MediaEngine>,
    network_monitor: Arc<dyn NetworkMonitor>,
    producers: Producers,
    session: Option<PlaybackSessionId>,
    background: BackgroundTaskGuard,
    now_playing: NowPlayingRefresher,
    cacher: OfflineCacher,
    delegate: Arc<dyn PlayerDelegate>,
    events: EventBus,
    snapshot: watch::Sender<PlayerSnapshot>,
    inputs_tx: mpsc::UnboundedSender<Input>,
    connection_loss: Option<JoinHandle<()>>,
}

impl ControlLoop {
    async fn run(
        mut self,
        mut requests: mpsc::Receiver<Request>,
        mut produced: mpsc::UnboundedReceiver<ProducedEvent>,
        mut inputs: mpsc::UnboundedReceiver<Input>,
    ) {
        loop {
            tokio::select! {
                biased;

                request = requests.recv() => match request {
                    Some(Request::Command { command, reply }) => {
                        let result = self.on_command(command).await;
                        let _ = reply.send(result);
                    }
                    Some(Request::Shutdown { reply }) => {
                        self.shutdown().await;
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        debug!("All player handles dropped");
                        self.shutdown().await;
                        break;
                    }
                },

                Some(event) = produced.recv() => {
                    if self.producers.accepts(&event) {
                        self.apply(Input::Event(event.event)).await;
                    } else {
                        trace!(source = event.source.as_str(), epoch = event.epoch, "Dropped stale event");
                    }
                }

                Some(input) = inputs.recv() => self.apply(input).await,
            }
        }
        info!("Player stopped");
    }

    async fn on_command(&mut self, command: Command) -> Result<()> {
        debug!(command = command.label(), "Command received");
        if command.loads_item() {
            let reachable = self.network_monitor.is_connected().await;
            self.machine.handle(Input::Reachability(reachable));
        }
        let effects = self.machine.command(command)?;
        self.execute(effects).await;
        self.publish_snapshot();
        Ok(())
    }

    async fn apply(&mut self, input: Input) {
        let effects = self.machine.handle(input);
        self.execute(effects).await;
        self.publish_snapshot();
    }

    /// Run effects in order; follow-up inputs append their effects.
    async fn execute(&mut self, effects: Vec<Effect>) {
        let mut pending: VecDeque<Effect> = effects.into();
        while let Some(effect) = pending.pop_front() {
            if let Some(follow_up) = self.execute_one(effect).await {
                pending.extend(self.machine.handle(follow_up));
            }
        }
    }

    async fn execute_one(&mut self, effect: Effect) -> Option<Input> {
        match effect {
            Effect::TearDownSession => {
                self.producers.player.bind(None);
                self.producers.audio_item.bind(None);
                if let Some(session) = self.session.take() {
                    if let Err(err) = self.engine.destroy_session(session).await {
                        warn!(%session, error = %err, "Failed to destroy media session");
                    }
                }
            }
            Effect::CreateSession { item, start_at } => {
                return self.create_session(item, start_at).await;
            }
            Effect::SetRate(rate) => {
                if let Some(session) = self.session {
                    if let Err(err) = self.engine.set_rate(session, rate).await {
                        warn!(%session, rate, error = %err, "Failed to set rate");
                    }
                }
            }
            Effect::SetVolume(volume) => {
                if let Some(session) = self.session {
                    if let Err(err) = self.engine.set_volume(session, volume).await {
                        warn!(%session, volume, error = %err, "Failed to set volume");
                    }
                }
            }
            Effect::Seek(target) => return self.seek_engine(target).await,
            Effect::StartProducer(kind) => {
                self.configure_producer(kind);
                self.producers.get_mut(kind).start_producing_events().await;
            }
            Effect::StopProducer(kind) => self.producers.get_mut(kind).stop_producing_events(),
            Effect::BeginBackgroundTask => self.background.begin().await,
            Effect::EndBackgroundTask => self.background.end().await,
            Effect::PublishNowPlaying => {
                if let Some(info) = self.machine.now_playing_info() {
                    self.now_playing.publish(info).await;
                }
            }
            Effect::ClearNowPlaying => self.now_playing.clear().await,
            Effect::ScheduleNowPlayingRefresh { generation } => {
                let delays = self.machine.settings().now_playing_refresh_delays.clone();
                self.now_playing
                    .schedule(generation, &delays, &self.inputs_tx);
            }
            Effect::ScheduleConnectionLossTimeout { after, generation } => {
                self.cancel_connection_loss();
                let inputs = self.inputs_tx.clone();
                self.connection_loss = Some(tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = inputs.send(Input::ConnectionLossExpired { generation });
                }));
            }
            Effect::CancelConnectionLossTimeout => self.cancel_connection_loss(),
            Effect::Notify(notification) => {
                notification.dispatch(self.delegate.as_ref(), self.machine.current_item());
                if self.events.emit(notification.to_event()).is_err() {
                    trace!("No event subscribers");
                }
            }
            Effect::CacheDownloadedItem { item, local_path } => {
                if !self.cacher.is_enabled() {
                    debug!(item_id = %item.id, "Offline caching disabled");
                    return None;
                }
                let cacher = self
                    .cacher
                    .clone()
                    .with_artwork_fetch(self.machine.settings().cache_artwork);
                let inputs = self.inputs_tx.clone();
                tokio::spawn(
                    async move {
                        let outcome = cacher.cache(item, local_path).await;
                        let _ = inputs.send(Input::CacheFinished(outcome));
                    }
                    .in_current_span(),
                );
            }
        }
        None
    }

    async fn create_session(&mut self, item: PlayableItem, start_at: Duration) -> Option<Input> {
        let settings = self.machine.settings();
        let options = PlaybackOptions {
            start_position: start_at,
            initial_volume: settings.volume,
            preferred_buffer_duration: settings.preferred_buffer_duration,
            waits_to_minimize_stalling: matches!(
                settings.buffering_strategy,
                crate::config::BufferingStrategy::Default
            ),
        };
        let request = PlaybackRequest::new(item.source())
            .with_options(options)
            .with_metadata(item.metadata());

        match self.engine.create_session(request).await {
            Ok(session) => {
                debug!(
                    %session,
                    item_id = %item.id,
                    url = redact_url(&item.url),
                    offline = item.is_offline,
                    ?start_at,
                    "Media session created"
                );
                self.session = Some(session);
                self.producers.player.bind(Some(session));
                self.producers.audio_item.bind(Some(session));
                None
            }
            Err(err) => {
                warn!(item_id = %item.id, error = %err, "Media engine refused session");
                Some(Input::SessionFailed {
                    message: err.to_string(),
                })
            }
        }
    }

    async fn seek_engine(&mut self, target: Duration) -> Option<Input> {
        let session = self.session?;
        let seekable = match self.engine.seekable_range(session).await {
            Ok(range) => range,
            Err(err) => {
                warn!(%session, error = %err, "Seekable range unavailable");
                None
            }
        };
        let duration = self.machine.current_item().and_then(|item| item.duration);
        let position = clamp_seek(target, seekable, duration);
        if position != target {
            debug!(error = %PlaybackError::SeekOutOfRange(target), clamped = ?position, "Seek clamped");
        }

        match self.engine.seek(session, position).await {
            Ok(()) => Some(Input::SeekCompleted(position)),
            Err(err) => {
                warn!(%session, ?position, error = %err, "Seek failed");
                None
            }
        }
    }

    fn configure_producer(&mut self, kind: ProducerKind) {
        let settings = self.machine.settings();
        match kind {
            ProducerKind::Network => {
                let reachable = self.machine.is_reachable();
                let network = &mut self.producers.network;
                network.set_debounce(settings.network_debounce);
                network.set_baseline(reachable);
            }
            ProducerKind::AudioItem => self
                .producers
                .audio_item
                .set_progress_interval(settings.progress_interval),
            ProducerKind::Retry => self
                .producers
                .retry
                .configure(settings.maximum_retry_count, settings.retry_timeout),
            ProducerKind::Seek => {
                if let (Some(direction), SeekingBehavior::ChangeTime { every, .. }) =
                    (self.machine.seek_gesture(), settings.seeking_behavior)
                {
                    self.producers.seek.configure(direction, every);
                }
            }
            ProducerKind::Player => {}
        }
    }

    fn cancel_connection_loss(&mut self) {
        if let Some(task) = self.connection_loss.take() {
            task.abort();
        }
    }

    fn publish_snapshot(&self) {
        let next = self.machine.snapshot();
        self.snapshot.send_if_modified(move |current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    async fn shutdown(&mut self) {
        info!("Shutting down player");
        match self.machine.command(Command::Stop) {
            Ok(effects) => self.execute(effects).await,
            Err(err) => warn!(error = %err, "Stop during shutdown failed"),
        }
        self.producers.stop_all();
        self.background.end().await;
        self.cancel_connection_loss();
        self.publish_snapshot();
    }
}
