//! # Playback State Machine
//!
//! Pure, synchronous core of the player. It consumes commands from the host
//! and events from the producers, mutates playback state, and returns the
//! side effects the control loop must carry out, in order. It never awaits
//! and never touches a bridge, so every transition can be unit tested by
//! feeding inputs and inspecting the returned [`Effect`]s.
//!
//! ## States
//!
//! ```text
//!                 item set (reachable)             ready
//!   Stopped ─────────────────────────> Buffering ─────────> Playing <──> Paused
//!      ▲   item set (unreachable)         ▲   │ stall/failure   │
//!      │ ──────────────> WaitingFor ──────┘   └─────────────────┘ retry ticks
//!      │                 Connection  retrieved
//!      └──── stop / queue exhausted / Failed(reason) ─────────────────────────
//! ```
//!
//! `Failed(reason)` is reported and immediately followed by `Stopped`, so
//! outside a single step the current item is `None` exactly when the state
//! is `Stopped`.
//!
//! ## Side effects
//!
//! - A background token is held exactly while the state is `Buffering`.
//! - Every state transition and item change publishes the transport surface
//!   and schedules follow-up refreshes tagged with the state generation.
//! - Replacing the item or stopping stops all producers and tears down the
//!   session before anything new is created.

use crate::cache::CacheOutcome;
use crate::config::{
    BufferingStrategy, PlayMode, PlayerSettings, SeekDirection,
    SeekingBehavior, SEEK_RATE,
};
use crate::error::{PlaybackError, Result};
use crate::event::{
    AudioItemEvent, Event, NetworkEvent, PlayerEvent, ProducerKind, RetryEvent, SeekEvent,
};
use crate::item::{ItemId, PlayableItem};
use crate::queue::ItemQueue;
use crate::state::{FailureReason, PlaybackState};
use bridge_traits::{NowPlayingInfo, TimeRange};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Requests from the host.
#[derive(Debug)]
pub enum Command {
    Play {
        items: Vec<PlayableItem>,
        mode: Option<PlayMode>,
        start_index: usize,
    },
    Pause,
    Resume,
    Stop,
    Next,
    Previous,
    Seek(Duration),
    BeginSeeking(SeekDirection),
    EndSeeking,
    AddItems(Vec<PlayableItem>),
    RemoveItem(usize),
    UpdateSettings(SettingsUpdate),
}

impl Command {
    pub fn label(&self) -> &'static str {
        match self {
            Command::Play { .. } => "play",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Stop => "stop",
            Command::Next => "next",
            Command::Previous => "previous",
            Command::Seek(_) => "seek",
            Command::BeginSeeking(_) => "begin_seeking",
            Command::EndSeeking => "end_seeking",
            Command::AddItems(_) => "add_items",
            Command::RemoveItem(_) => "remove_item",
            Command::UpdateSettings(_) => "update_settings",
        }
    }

    /// Whether the command may hand a new item to the engine.
    pub fn loads_item(&self) -> bool {
        matches!(
            self,
            Command::Play { .. } | Command::Next | Command::Previous
        )
    }
}

/// Deferred edit of [`PlayerSettings`], validated before it is applied.
pub struct SettingsUpdate(Box<dyn FnOnce(&mut PlayerSettings) + Send>);

impl SettingsUpdate {
    pub fn new(update: impl FnOnce(&mut PlayerSettings) + Send + 'static) -> Self {
        Self(Box::new(update))
    }
}

impl fmt::Debug for SettingsUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SettingsUpdate { .. }")
    }
}

/// Everything except host commands that drives the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Event from a producer run that is still current.
    Event(Event),
    /// Fresh reachability sample taken before a command.
    Reachability(bool),
    /// The engine refused to create a session.
    SessionFailed { message: String },
    /// The engine accepted a (clamped) seek.
    SeekCompleted(Duration),
    ConnectionLossExpired { generation: u64 },
    RefreshDue { generation: u64 },
    CacheFinished(CacheOutcome),
}

/// Side effects for the control loop to execute, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Stop the session's producers and destroy the engine session.
    TearDownSession,
    /// Create a session for `item`, starting at `start_at`.
    CreateSession { item: PlayableItem, start_at: Duration },
    SetRate(f32),
    SetVolume(f32),
    /// Seek the engine, clamped to its seekable range.
    Seek(Duration),
    StartProducer(ProducerKind),
    StopProducer(ProducerKind),
    BeginBackgroundTask,
    EndBackgroundTask,
    PublishNowPlaying,
    ClearNowPlaying,
    /// Schedule follow-up refreshes for this state generation.
    ScheduleNowPlayingRefresh { generation: u64 },
    ScheduleConnectionLossTimeout { after: Duration, generation: u64 },
    CancelConnectionLossTimeout,
    Notify(Notification),
    CacheDownloadedItem { item: PlayableItem, local_path: PathBuf },
}

/// What the delegate and the event bus are told.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    WillStartPlaying(PlayableItem),
    StateChanged {
        item_id: Option<ItemId>,
        from: PlaybackState,
        to: PlaybackState,
    },
    Progressed {
        item_id: ItemId,
        position: Duration,
        duration: Option<Duration>,
    },
    DurationUpdated { item_id: ItemId, duration: Duration },
    MetadataUpdated(PlayableItem),
    QueueChanged {
        length: usize,
        current_index: Option<usize>,
    },
    PlaybackError {
        item_id: Option<ItemId>,
        message: String,
        recoverable: bool,
    },
    Cache(CacheOutcome),
}

/// Point-in-time view of the player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub state: PlaybackState,
    pub current_item: Option<PlayableItem>,
    pub progress: Duration,
    pub duration: Option<Duration>,
    pub queue: Vec<PlayableItem>,
    pub current_index: Option<usize>,
    pub mode: PlayMode,
    pub volume: f32,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            state: PlaybackState::Stopped,
            current_item: None,
            progress: Duration::ZERO,
            duration: None,
            queue: Vec::new(),
            current_index: None,
            mode: PlayMode::Normal,
            volume: 1.0,
        }
    }
}

/// Clamp a seek target to the item duration and the seekable range.
pub fn clamp_seek(
    target: Duration,
    seekable: Option<TimeRange>,
    duration: Option<Duration>,
) -> Duration {
    let mut position = match duration {
        Some(duration) => target.min(duration),
        None => target,
    };
    if let Some(range) = seekable {
        position = range.clamp(position);
    }
    position
}

pub struct PlaybackMachine {
    settings: PlayerSettings,
    queue: ItemQueue,
    state: PlaybackState,
    current_item: Option<PlayableItem>,
    reachable: bool,
    progress: Duration,
    has_session: bool,
    session_ready: bool,
    state_before_buffering: Option<PlaybackState>,
    state_when_connection_lost: Option<PlaybackState>,
    paused_for_interruption: bool,
    /// Reissued after reconnection with `resume_after_connection_loss` off.
    hold_after_reconnect: bool,
    retrying: bool,
    retry_attempts: u32,
    /// Position to restore once the session reports ready.
    pending_seek: Option<Duration>,
    seeking: Option<SeekDirection>,
    /// Bumped on every transport-surface publish cycle.
    generation: u64,
    connection_loss_generation: u64,
    connection_loss_armed: bool,
}

impl PlaybackMachine {
    pub fn new(settings: PlayerSettings, queue: ItemQueue) -> Self {
        Self {
            settings,
            queue,
            state: PlaybackState::Stopped,
            current_item: None,
            reachable: true,
            progress: Duration::ZERO,
            has_session: false,
            session_ready: false,
            state_before_buffering: None,
            state_when_connection_lost: None,
            paused_for_interruption: false,
            hold_after_reconnect: false,
            retrying: false,
            retry_attempts: 0,
            pending_seek: None,
            seeking: None,
            generation: 0,
            connection_loss_generation: 0,
            connection_loss_armed: false,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_item(&self) -> Option<&PlayableItem> {
        self.current_item.as_ref()
    }

    pub fn progress(&self) -> Duration {
        self.progress
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    pub fn queue(&self) -> &ItemQueue {
        &self.queue
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    /// Direction of the held seek gesture, if any.
    pub fn seek_gesture(&self) -> Option<SeekDirection> {
        self.seeking
    }

    /// Last known reachability.
    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            state: self.state,
            current_item: self.current_item.clone(),
            progress: self.progress,
            duration: self.current_item.as_ref().and_then(|item| item.duration),
            queue: self.queue.items().to_vec(),
            current_index: self.queue.current_index(),
            mode: self.queue.mode(),
            volume: self.settings.volume,
        }
    }

    /// What the transport surface should show right now.
    pub fn now_playing_info(&self) -> Option<NowPlayingInfo> {
        let item = self.current_item.as_ref()?;
        Some(NowPlayingInfo {
            metadata: item.metadata(),
            duration: item.duration,
            position: self.progress,
            rate: if self.state.is_playing() {
                self.playing_rate()
            } else {
                0.0
            },
        })
    }

    /// Apply a host command.
    pub fn command(&mut self, command: Command) -> Result<Vec<Effect>> {
        let mut fx = Vec::new();
        match command {
            Command::Play {
                items,
                mode,
                start_index,
            } => self.play(items, mode, start_index, &mut fx)?,
            Command::Pause => self.pause(&mut fx),
            Command::Resume => self.resume(&mut fx),
            Command::Stop => self.stop(&mut fx),
            Command::Next => self.advance(true, &mut fx),
            Command::Previous => self.advance(false, &mut fx),
            Command::Seek(target) => self.seek(target, &mut fx),
            Command::BeginSeeking(direction) => self.begin_seeking(direction, &mut fx),
            Command::EndSeeking => self.end_seeking(&mut fx),
            Command::AddItems(items) => {
                items.iter().try_for_each(validate_item)?;
                self.queue.add_items(items);
                self.notify_queue_changed(&mut fx);
            }
            Command::RemoveItem(index) => {
                if self.queue.is_empty() {
                    return Err(PlaybackError::EmptyQueue);
                }
                let removed = self.queue.remove_item(index).ok_or_else(|| {
                    PlaybackError::InvalidItem(format!(
                        "index {} out of range for {} queued items",
                        index,
                        self.queue.len()
                    ))
                })?;
                debug!(item_id = %removed.id, index, "Removed item from queue");
                self.notify_queue_changed(&mut fx);
            }
            Command::UpdateSettings(update) => self.update_settings(update, &mut fx)?,
        }
        Ok(fx)
    }

    /// Apply an event or internal signal.
    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        let mut fx = Vec::new();
        match input {
            Input::Event(Event::Network(event)) => self.on_network(event, &mut fx),
            Input::Event(Event::Player(event)) => self.on_player(event, &mut fx),
            Input::Event(Event::Seek(SeekEvent::Tick(direction))) => {
                self.on_seek_tick(direction, &mut fx)
            }
            Input::Event(Event::AudioItem(event)) => self.on_audio_item(event, &mut fx),
            Input::Event(Event::Retry(event)) => self.on_retry(event, &mut fx),
            Input::Reachability(reachable) => self.reachable = reachable,
            Input::SessionFailed { message } => {
                self.has_session = false;
                self.session_ready = false;
                self.on_recoverable_failure(Some(message), &mut fx);
            }
            Input::SeekCompleted(position) => {
                self.progress = position;
                self.notify_progress(&mut fx);
                if self.current_item.is_some() {
                    fx.push(Effect::PublishNowPlaying);
                }
            }
            Input::ConnectionLossExpired { generation } => {
                if self.connection_loss_armed
                    && generation == self.connection_loss_generation
                    && self.state == PlaybackState::WaitingForConnection
                {
                    warn!(
                        after = ?self.settings.maximum_connection_loss_time,
                        "Connection did not return in time"
                    );
                    self.fail(FailureReason::ConnectionLost, &mut fx);
                }
            }
            Input::RefreshDue { generation } => {
                if generation == self.generation && self.has_display() {
                    fx.push(Effect::PublishNowPlaying);
                }
            }
            Input::CacheFinished(outcome) => self.on_cache_finished(outcome, &mut fx),
        }
        fx
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    fn play(
        &mut self,
        items: Vec<PlayableItem>,
        mode: Option<PlayMode>,
        start_index: usize,
        fx: &mut Vec<Effect>,
    ) -> Result<()> {
        if items.is_empty() {
            self.stop(fx);
            return Ok(());
        }
        items.iter().try_for_each(validate_item)?;
        if start_index >= items.len() {
            return Err(PlaybackError::InvalidItem(format!(
                "start index {} out of range for {} items",
                start_index,
                items.len()
            )));
        }

        if let Some(mode) = mode {
            self.settings.mode = mode;
        }
        let first = self
            .queue
            .replace(items, self.settings.mode, start_index)
            .cloned();
        self.notify_queue_changed(fx);
        if let Some(item) = first {
            self.set_current_item(item, fx);
        }
        Ok(())
    }

    fn pause(&mut self, fx: &mut Vec<Effect>) {
        if self.state.is_playing() {
            self.paused_for_interruption = false;
            self.transition(PlaybackState::Paused, fx);
        }
    }

    fn resume(&mut self, fx: &mut Vec<Effect>) {
        if self.state.is_paused() {
            self.paused_for_interruption = false;
            self.transition(PlaybackState::Playing, fx);
        }
    }

    fn stop(&mut self, fx: &mut Vec<Effect>) {
        if self.current_item.is_none() && self.state.is_stopped() {
            return;
        }
        info!(item_id = ?self.current_item_id(), "Stopping playback");
        self.release_all(fx);
        self.clear_item();
        self.transition(PlaybackState::Stopped, fx);
    }

    fn advance(&mut self, forward: bool, fx: &mut Vec<Effect>) {
        let item = if forward {
            self.queue.next().cloned()
        } else {
            self.queue.previous().cloned()
        };
        match item {
            Some(item) => {
                self.notify_queue_changed(fx);
                self.set_current_item(item, fx);
            }
            None => {
                debug!(error = %PlaybackError::QueueExhausted, forward, "No further item");
                self.stop(fx);
            }
        }
    }

    fn seek(&mut self, target: Duration, fx: &mut Vec<Effect>) {
        let Some(item) = self.current_item.as_ref() else {
            return;
        };
        let target = clamp_seek(target, None, item.duration);
        if self.has_session && self.session_ready {
            fx.push(Effect::Seek(target));
        } else {
            // Applied once the session can seek.
            self.pending_seek = Some(target);
            self.progress = target;
            self.notify_progress(fx);
        }
    }

    fn begin_seeking(&mut self, direction: SeekDirection, fx: &mut Vec<Effect>) {
        if self.current_item.is_none() {
            return;
        }
        self.seeking = Some(direction);
        match self.settings.seeking_behavior {
            SeekingBehavior::Default => {
                if self.has_session && self.state.is_playing() {
                    fx.push(Effect::SetRate(self.playing_rate()));
                }
            }
            SeekingBehavior::ChangeTime { .. } => {
                fx.push(Effect::StartProducer(ProducerKind::Seek));
            }
        }
    }

    fn end_seeking(&mut self, fx: &mut Vec<Effect>) {
        if self.seeking.take().is_none() {
            return;
        }
        fx.push(Effect::StopProducer(ProducerKind::Seek));
        if self.has_session && self.state.is_playing() {
            fx.push(Effect::SetRate(self.playing_rate()));
        }
    }

    fn update_settings(&mut self, update: SettingsUpdate, fx: &mut Vec<Effect>) -> Result<()> {
        let mut next = self.settings.clone();
        (update.0)(&mut next);
        next.validate()?;

        let previous = std::mem::replace(&mut self.settings, next);
        if previous.volume != self.settings.volume && self.has_session {
            fx.push(Effect::SetVolume(self.settings.volume));
        }
        if previous.mode != self.settings.mode {
            self.queue.set_mode(self.settings.mode);
            self.notify_queue_changed(fx);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    fn on_network(&mut self, event: NetworkEvent, fx: &mut Vec<Effect>) {
        match event {
            NetworkEvent::ConnectionLost => {
                self.reachable = false;
                let streaming = self
                    .current_item
                    .as_ref()
                    .map_or(false, PlayableItem::needs_network);
                if streaming
                    && matches!(self.state, PlaybackState::Buffering | PlaybackState::Playing)
                {
                    info!(item_id = ?self.current_item_id(), from = %self.state, "Waiting for connection");
                    self.state_when_connection_lost = Some(self.state);
                    self.stop_retrying(fx);
                    self.enter_waiting_for_connection(fx);
                }
            }
            NetworkEvent::ConnectionRetrieved => {
                self.reachable = true;
                if self.state == PlaybackState::WaitingForConnection && self.current_item.is_some()
                {
                    info!(item_id = ?self.current_item_id(), "Connection back, reissuing item");
                    self.cancel_connection_loss(fx);
                    self.hold_after_reconnect = !self.settings.resume_after_connection_loss;
                    self.reissue_current_item(fx);
                    self.transition(PlaybackState::Buffering, fx);
                }
            }
        }
    }

    fn on_player(&mut self, event: PlayerEvent, fx: &mut Vec<Effect>) {
        match event {
            PlayerEvent::ItemReady => self.on_ready(fx),
            PlayerEvent::BufferProgress { loaded } => {
                if self.state.is_buffering() && self.buffer_satisfies_strategy(loaded) {
                    debug!(?loaded, strategy = ?self.settings.buffering_strategy, "Buffer sufficient");
                    self.on_ready(fx);
                }
            }
            PlayerEvent::ItemPlaybackStalled => {
                debug!(item_id = ?self.current_item_id(), "Playback stalled");
                self.on_recoverable_failure(None, fx);
            }
            PlayerEvent::ItemFailedToPlay { message } => {
                self.session_ready = false;
                self.on_recoverable_failure(Some(message), fx);
            }
            PlayerEvent::ItemPlaybackEnded => {
                if self.current_item.is_some()
                    && matches!(self.state, PlaybackState::Playing | PlaybackState::Buffering)
                {
                    self.advance(true, fx);
                }
            }
            PlayerEvent::InterruptionBegan => {
                if self.state.is_playing() {
                    self.transition(PlaybackState::Paused, fx);
                    self.paused_for_interruption = true;
                }
            }
            PlayerEvent::InterruptionEnded { should_resume } => {
                let interrupted = std::mem::take(&mut self.paused_for_interruption);
                if interrupted
                    && should_resume
                    && self.settings.resume_after_interruption
                    && self.state.is_paused()
                {
                    self.transition(PlaybackState::Playing, fx);
                }
            }
            PlayerEvent::DownloadFinished { local_path } => {
                if let Some(item) = self.current_item.as_ref().filter(|item| !item.is_offline) {
                    fx.push(Effect::CacheDownloadedItem {
                        item: item.clone(),
                        local_path,
                    });
                }
            }
        }
    }

    fn on_seek_tick(&mut self, direction: SeekDirection, fx: &mut Vec<Effect>) {
        if self.seeking.is_none() {
            return;
        }
        if let SeekingBehavior::ChangeTime { delta, .. } = self.settings.seeking_behavior {
            let target = match direction {
                SeekDirection::Forward => self.progress + delta,
                SeekDirection::Backward => self.progress.saturating_sub(delta),
            };
            self.seek(target, fx);
        }
    }

    fn on_audio_item(&mut self, event: AudioItemEvent, fx: &mut Vec<Effect>) {
        let Some(item) = self.current_item.as_mut() else {
            return;
        };
        match event {
            AudioItemEvent::DurationChanged(duration) => {
                if item.duration == Some(duration) {
                    return;
                }
                item.duration = Some(duration);
                let item_id = item.id.clone();
                if let Some(queued) = self.queue.find_mut(&item_id) {
                    queued.duration = Some(duration);
                }
                fx.push(Effect::Notify(Notification::DurationUpdated { item_id, duration }));
                fx.push(Effect::PublishNowPlaying);
            }
            AudioItemEvent::ProgressChanged(position) => {
                self.progress = position;
                self.notify_progress(fx);
            }
            AudioItemEvent::MetadataUpdated(metadata) => {
                if !item.merge_metadata(&metadata) {
                    return;
                }
                let updated = item.clone();
                if let Some(queued) = self.queue.find_mut(&updated.id) {
                    queued.merge_metadata(&metadata);
                }
                fx.push(Effect::Notify(Notification::MetadataUpdated(updated)));
                fx.push(Effect::PublishNowPlaying);
            }
        }
    }

    fn on_retry(&mut self, event: RetryEvent, fx: &mut Vec<Effect>) {
        if !self.retrying || self.current_item.is_none() {
            return;
        }
        match event {
            RetryEvent::RetryAvailable { attempt } => {
                warn!(
                    item_id = ?self.current_item_id(),
                    attempt,
                    maximum = self.settings.maximum_retry_count,
                    "Recreating media session"
                );
                self.retry_attempts = attempt;
                self.reissue_current_item(fx);
            }
            RetryEvent::RetryFailed => {
                let attempts = self.retry_attempts;
                warn!(
                    item_id = ?self.current_item_id(),
                    error = %PlaybackError::RetryExhausted { attempts },
                    "Giving up on item"
                );
                self.fail(FailureReason::RetryExhausted, fx);
            }
        }
    }

    fn on_cache_finished(&mut self, outcome: CacheOutcome, fx: &mut Vec<Effect>) {
        if let CacheOutcome::Cached {
            item_id,
            local_path,
        } = &outcome
        {
            if let Some(queued) = self.queue.find_mut(item_id) {
                queued.mark_offline(local_path.clone());
            }
            if let Some(current) = self
                .current_item
                .as_mut()
                .filter(|current| &current.id == item_id)
            {
                current.mark_offline(local_path.clone());
            }
        }
        fx.push(Effect::Notify(Notification::Cache(outcome)));
    }

    fn on_ready(&mut self, fx: &mut Vec<Effect>) {
        if self.current_item.is_none() {
            return;
        }
        self.session_ready = true;
        if self.retrying {
            info!(attempts = self.retry_attempts, "Item recovered");
            self.stop_retrying(fx);
            self.retry_attempts = 0;
        }
        if let Some(position) = self.pending_seek.take() {
            fx.push(Effect::Seek(position));
        }
        if !self.state.is_buffering() {
            return;
        }

        let resume = self.should_resume_playing() && !self.hold_after_reconnect;
        self.state_before_buffering = None;
        self.state_when_connection_lost = None;
        self.hold_after_reconnect = false;
        self.transition(
            if resume {
                PlaybackState::Playing
            } else {
                PlaybackState::Paused
            },
            fx,
        );
    }

    fn on_recoverable_failure(&mut self, message: Option<String>, fx: &mut Vec<Effect>) {
        if self.current_item.is_none() {
            return;
        }
        match self.state {
            PlaybackState::Playing | PlaybackState::Paused => {
                self.state_before_buffering = Some(self.state);
                self.transition(PlaybackState::Buffering, fx);
            }
            PlaybackState::Buffering => {}
            PlaybackState::Stopped
            | PlaybackState::WaitingForConnection
            | PlaybackState::Failed(_) => return,
        }
        if let Some(message) = message {
            warn!(item_id = ?self.current_item_id(), error = %message, "Item failed to play");
            fx.push(Effect::Notify(Notification::PlaybackError {
                item_id: self.current_item_id(),
                message: PlaybackError::ItemLoadFailed(message).to_string(),
                recoverable: true,
            }));
        }
        self.start_retrying(fx);
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// `false` when buffering or reconnection would override a user pause.
    fn should_resume_playing(&self) -> bool {
        !self.state.is_paused()
            && self.state_before_buffering != Some(PlaybackState::Paused)
            && self.state_when_connection_lost != Some(PlaybackState::Paused)
    }

    fn buffer_satisfies_strategy(&self, loaded: TimeRange) -> bool {
        let ahead = if loaded.start <= self.progress {
            loaded.end.saturating_sub(self.progress)
        } else {
            Duration::ZERO
        };
        match self.settings.buffering_strategy {
            BufferingStrategy::Default => false,
            BufferingStrategy::PlayWhenBufferNotEmpty => !ahead.is_zero(),
            BufferingStrategy::PlayWhenPreferredBufferDurationFull => self
                .settings
                .preferred_buffer_duration
                .map_or(false, |preferred| ahead >= preferred),
        }
    }

    fn playing_rate(&self) -> f32 {
        match (self.seeking, self.settings.seeking_behavior) {
            (Some(SeekDirection::Forward), SeekingBehavior::Default) => SEEK_RATE,
            (Some(SeekDirection::Backward), SeekingBehavior::Default) => -SEEK_RATE,
            _ => 1.0,
        }
    }

    fn set_current_item(&mut self, item: PlayableItem, fx: &mut Vec<Effect>) {
        info!(item_id = %item.id, title = ?item.title, "Setting current item");
        self.release_all(fx);
        self.reset_item_flags();
        self.progress = Duration::ZERO;
        self.current_item = Some(item.clone());
        fx.push(Effect::Notify(Notification::WillStartPlaying(item.clone())));

        self.open_session(Duration::ZERO, fx);
        fx.push(Effect::StartProducer(ProducerKind::Network));

        let changed = if item.needs_network() && !self.reachable {
            self.enter_waiting_for_connection(fx)
        } else {
            self.transition(PlaybackState::Buffering, fx)
        };
        if !changed {
            self.refresh_now_playing(fx);
        }
    }

    fn open_session(&mut self, start_at: Duration, fx: &mut Vec<Effect>) {
        let Some(item) = self.current_item.clone() else {
            return;
        };
        fx.push(Effect::CreateSession { item, start_at });
        self.has_session = true;
        self.session_ready = false;
        if !start_at.is_zero() {
            self.pending_seek = Some(start_at);
        }
        fx.push(Effect::StartProducer(ProducerKind::Player));
        fx.push(Effect::StartProducer(ProducerKind::AudioItem));
    }

    fn close_session(&mut self, fx: &mut Vec<Effect>) {
        fx.push(Effect::StopProducer(ProducerKind::Player));
        fx.push(Effect::StopProducer(ProducerKind::AudioItem));
        if self.has_session {
            fx.push(Effect::TearDownSession);
        }
        self.has_session = false;
        self.session_ready = false;
    }

    /// Recreate the session for the same item at the last known position.
    fn reissue_current_item(&mut self, fx: &mut Vec<Effect>) {
        let position = self.pending_seek.unwrap_or(self.progress);
        self.close_session(fx);
        self.open_session(position, fx);
    }

    /// Stop everything bound to the current item.
    fn release_all(&mut self, fx: &mut Vec<Effect>) {
        for kind in [
            ProducerKind::Network,
            ProducerKind::Seek,
            ProducerKind::Retry,
        ] {
            fx.push(Effect::StopProducer(kind));
        }
        self.close_session(fx);
        self.retrying = false;
        self.seeking = None;
        self.pending_seek = None;
        self.cancel_connection_loss(fx);
    }

    fn clear_item(&mut self) {
        self.current_item = None;
        self.progress = Duration::ZERO;
        self.reset_item_flags();
    }

    fn reset_item_flags(&mut self) {
        self.state_before_buffering = None;
        self.state_when_connection_lost = None;
        self.paused_for_interruption = false;
        self.hold_after_reconnect = false;
        self.retry_attempts = 0;
    }

    fn fail(&mut self, reason: FailureReason, fx: &mut Vec<Effect>) {
        let item_id = self.current_item_id();
        self.release_all(fx);
        let error = match reason {
            FailureReason::RetryExhausted => PlaybackError::RetryExhausted {
                attempts: self.retry_attempts,
            },
            FailureReason::ConnectionLost => PlaybackError::NetworkLost,
        };
        fx.push(Effect::Notify(Notification::PlaybackError {
            item_id,
            message: error.to_string(),
            recoverable: false,
        }));
        self.transition(PlaybackState::Failed(reason), fx);
        self.clear_item();
        self.transition(PlaybackState::Stopped, fx);
    }

    fn start_retrying(&mut self, fx: &mut Vec<Effect>) {
        if !self.retrying {
            self.retrying = true;
            fx.push(Effect::StartProducer(ProducerKind::Retry));
        }
    }

    fn stop_retrying(&mut self, fx: &mut Vec<Effect>) {
        if self.retrying {
            self.retrying = false;
            fx.push(Effect::StopProducer(ProducerKind::Retry));
        }
    }

    fn enter_waiting_for_connection(&mut self, fx: &mut Vec<Effect>) -> bool {
        let changed = self.transition(PlaybackState::WaitingForConnection, fx);
        self.connection_loss_generation += 1;
        self.connection_loss_armed = true;
        fx.push(Effect::ScheduleConnectionLossTimeout {
            after: self.settings.maximum_connection_loss_time,
            generation: self.connection_loss_generation,
        });
        changed
    }

    fn cancel_connection_loss(&mut self, fx: &mut Vec<Effect>) {
        if self.connection_loss_armed {
            self.connection_loss_armed = false;
            fx.push(Effect::CancelConnectionLossTimeout);
        }
    }

    /// Move to `to`; returns `false` when already there.
    fn transition(&mut self, to: PlaybackState, fx: &mut Vec<Effect>) -> bool {
        let from = self.state;
        if from == to {
            return false;
        }
        self.state = to;
        info!(item_id = ?self.current_item_id(), %from, %to, "Playback state changed");

        match (from.is_buffering(), to.is_buffering()) {
            (false, true) => fx.push(Effect::BeginBackgroundTask),
            (true, false) => fx.push(Effect::EndBackgroundTask),
            _ => {}
        }
        if self.has_session {
            match to {
                PlaybackState::Playing => fx.push(Effect::SetRate(self.playing_rate())),
                PlaybackState::Paused => fx.push(Effect::SetRate(0.0)),
                _ => {}
            }
        }

        fx.push(Effect::Notify(Notification::StateChanged {
            item_id: self.current_item_id(),
            from,
            to,
        }));
        self.refresh_now_playing(fx);
        true
    }

    fn refresh_now_playing(&mut self, fx: &mut Vec<Effect>) {
        self.generation += 1;
        if self.has_display() {
            fx.push(Effect::PublishNowPlaying);
            fx.push(Effect::ScheduleNowPlayingRefresh {
                generation: self.generation,
            });
        } else {
            fx.push(Effect::ClearNowPlaying);
        }
    }

    fn has_display(&self) -> bool {
        self.current_item.is_some()
            && !matches!(self.state, PlaybackState::Stopped | PlaybackState::Failed(_))
    }

    fn notify_progress(&self, fx: &mut Vec<Effect>) {
        if let Some(item) = self.current_item.as_ref() {
            fx.push(Effect::Notify(Notification::Progressed {
                item_id: item.id.clone(),
                position: self.progress,
                duration: item.duration,
            }));
        }
    }

    fn notify_queue_changed(&self, fx: &mut Vec<Effect>) {
        fx.push(Effect::Notify(Notification::QueueChanged {
            length: self.queue.len(),
            current_index: self.queue.current_index(),
        }));
    }

    fn current_item_id(&self) -> Option<ItemId> {
        self.current_item.as_ref().map(|item| item.id.clone())
    }
}

fn validate_item(item: &PlayableItem) -> Result<()> {
    if item.id.is_empty() {
        return Err(PlaybackError::InvalidItem("item id is empty".to_string()));
    }
    let has_local_copy = item.is_offline && item.local_path.is_some();
    if item.url.trim().is_empty() && !has_local_copy {
        return Err(PlaybackError::InvalidItem(format!(
            "item {} has neither a url nor a local copy",
            item.id
        )));
    }
    Ok(())
}
