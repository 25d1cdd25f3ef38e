//! Recording fakes of the bridge traits for player scenarios.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::{
    BackgroundTaskService, BackgroundTaskToken, MediaEngine, MediaSessionEvent,
    MediaSessionEventStream, NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkType,
    NowPlayingCenter, NowPlayingInfo, OfflineDocument, OfflineStore, PlaybackRequest,
    PlaybackSessionId, TimeRange,
};
use core_playback::{
    AudioPlayer, PlayableItem, PlaybackState, PlayerDelegate, PlayerSettings,
};
use core_runtime::config::CoreConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// Media engine
// ============================================================================

struct SessionRecord {
    request: PlaybackRequest,
    subscribers: Vec<mpsc::UnboundedSender<MediaSessionEvent>>,
}

#[derive(Default)]
struct EngineState {
    live: HashMap<PlaybackSessionId, SessionRecord>,
    order: Vec<PlaybackSessionId>,
    created: usize,
    destroyed: usize,
    max_live: usize,
    rates: Vec<f32>,
    volumes: Vec<f32>,
    seeks: Vec<Duration>,
}

/// Engine whose sessions emit whatever the test scripts.
#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<EngineState>,
    refuse_sessions: AtomicBool,
    seekable: Mutex<Option<TimeRange>>,
}

struct SessionStream(mpsc::UnboundedReceiver<MediaSessionEvent>);

#[async_trait]
impl MediaSessionEventStream for SessionStream {
    async fn next(&mut self) -> Option<MediaSessionEvent> {
        self.0.recv().await
    }
}

impl FakeEngine {
    /// Send `event` to every subscriber of the newest live session.
    pub fn emit(&self, event: MediaSessionEvent) {
        let state = self.state.lock().unwrap();
        let Some(session) = state.order.iter().rev().find(|id| state.live.contains_key(*id))
        else {
            return;
        };
        for subscriber in &state.live[session].subscribers {
            let _ = subscriber.send(event.clone());
        }
    }

    pub fn refuse_sessions(&self, refuse: bool) {
        self.refuse_sessions.store(refuse, Ordering::SeqCst);
    }

    pub fn set_seekable(&self, range: TimeRange) {
        *self.seekable.lock().unwrap() = Some(range);
    }

    pub fn created(&self) -> usize {
        self.state.lock().unwrap().created
    }

    pub fn destroyed(&self) -> usize {
        self.state.lock().unwrap().destroyed
    }

    pub fn live(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    /// Highest number of sessions that were ever alive together.
    pub fn max_live(&self) -> usize {
        self.state.lock().unwrap().max_live
    }

    pub fn last_request(&self) -> Option<PlaybackRequest> {
        let state = self.state.lock().unwrap();
        state
            .order
            .last()
            .and_then(|id| state.live.get(id))
            .map(|record| record.request.clone())
    }

    pub fn rates(&self) -> Vec<f32> {
        self.state.lock().unwrap().rates.clone()
    }

    pub fn volumes(&self) -> Vec<f32> {
        self.state.lock().unwrap().volumes.clone()
    }

    pub fn seeks(&self) -> Vec<Duration> {
        self.state.lock().unwrap().seeks.clone()
    }

    fn check(&self, session: PlaybackSessionId) -> Result<()> {
        if self.state.lock().unwrap().live.contains_key(&session) {
            Ok(())
        } else {
            Err(BridgeError::UnknownSession(session.to_string()))
        }
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    async fn create_session(&self, request: PlaybackRequest) -> Result<PlaybackSessionId> {
        if self.refuse_sessions.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("decoder unavailable".into()));
        }
        let session = PlaybackSessionId::new();
        let mut state = self.state.lock().unwrap();
        state.created += 1;
        state.order.push(session);
        state.live.insert(
            session,
            SessionRecord {
                request,
                subscribers: Vec::new(),
            },
        );
        state.max_live = state.max_live.max(state.live.len());
        Ok(session)
    }

    async fn subscribe(
        &self,
        session: PlaybackSessionId,
    ) -> Result<Box<dyn MediaSessionEventStream>> {
        let mut state = self.state.lock().unwrap();
        let record = state
            .live
            .get_mut(&session)
            .ok_or_else(|| BridgeError::UnknownSession(session.to_string()))?;
        let (tx, rx) = mpsc::unbounded_channel();
        record.subscribers.push(tx);
        Ok(Box::new(SessionStream(rx)))
    }

    async fn set_rate(&self, session: PlaybackSessionId, rate: f32) -> Result<()> {
        self.check(session)?;
        self.state.lock().unwrap().rates.push(rate);
        Ok(())
    }

    async fn set_volume(&self, session: PlaybackSessionId, volume: f32) -> Result<()> {
        self.check(session)?;
        self.state.lock().unwrap().volumes.push(volume);
        Ok(())
    }

    async fn seek(&self, session: PlaybackSessionId, position: Duration) -> Result<()> {
        self.check(session)?;
        self.state.lock().unwrap().seeks.push(position);
        Ok(())
    }

    async fn seekable_range(&self, session: PlaybackSessionId) -> Result<Option<TimeRange>> {
        self.check(session)?;
        Ok(*self.seekable.lock().unwrap())
    }

    async fn current_time(&self, session: PlaybackSessionId) -> Result<Duration> {
        self.check(session)?;
        Ok(Duration::ZERO)
    }

    async fn destroy_session(&self, session: PlaybackSessionId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.live.remove(&session).is_none() {
            return Err(BridgeError::UnknownSession(session.to_string()));
        }
        state.destroyed += 1;
        Ok(())
    }
}

// ============================================================================
// Network monitor
// ============================================================================

/// Reachability the test flips by hand.
pub struct SwitchableNetwork {
    connected: AtomicBool,
    reconnect_after_read: AtomicBool,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<NetworkInfo>>>,
}

struct NetworkStream(mpsc::UnboundedReceiver<NetworkInfo>);

#[async_trait]
impl NetworkChangeStream for NetworkStream {
    async fn next(&mut self) -> Option<NetworkInfo> {
        self.0.recv().await
    }
}

impl SwitchableNetwork {
    pub fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
            reconnect_after_read: AtomicBool::new(false),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        let info = info(connected);
        self.subscribers
            .lock()
            .unwrap()
            .retain(|subscriber| subscriber.send(info.clone()).is_ok());
    }
}

impl SwitchableNetwork {
    /// The next read reports the current status, then the link comes back
    /// without any change notification.
    pub fn reconnect_silently_after_next_read(&self) {
        self.reconnect_after_read.store(true, Ordering::SeqCst);
    }
}

fn info(connected: bool) -> NetworkInfo {
    if connected {
        NetworkInfo::connected(NetworkType::WiFi)
    } else {
        NetworkInfo::disconnected()
    }
}

#[async_trait]
impl NetworkMonitor for SwitchableNetwork {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let connected = self.connected.load(Ordering::SeqCst);
        if self.reconnect_after_read.swap(false, Ordering::SeqCst) {
            self.connected.store(true, Ordering::SeqCst);
        }
        Ok(info(connected))
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        Ok(Box::new(NetworkStream(rx)))
    }
}

// ============================================================================
// Now playing, background tasks, offline store
// ============================================================================

#[derive(Default)]
pub struct RecordingNowPlaying {
    pub published: Mutex<Vec<NowPlayingInfo>>,
    pub clears: AtomicUsize,
}

#[async_trait]
impl NowPlayingCenter for RecordingNowPlaying {
    async fn publish(&self, info: NowPlayingInfo) -> Result<()> {
        self.published.lock().unwrap().push(info);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl RecordingNowPlaying {
    pub fn publish_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<NowPlayingInfo> {
        self.published.lock().unwrap().last().cloned()
    }
}

#[derive(Default)]
pub struct RecordingBackground {
    next_id: AtomicUsize,
    outstanding: Mutex<Vec<BackgroundTaskToken>>,
    pub begun: AtomicUsize,
    pub ended: AtomicUsize,
    pub max_outstanding: AtomicUsize,
}

impl RecordingBackground {
    pub fn outstanding(&self) -> usize {
        self.outstanding.lock().unwrap().len()
    }
}

#[async_trait]
impl BackgroundTaskService for RecordingBackground {
    async fn begin(&self, name: &str) -> Result<BackgroundTaskToken> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let token = BackgroundTaskToken::new(format!("{}-{}", name, id));
        let mut outstanding = self.outstanding.lock().unwrap();
        outstanding.push(token.clone());
        self.begun.fetch_add(1, Ordering::SeqCst);
        self.max_outstanding
            .fetch_max(outstanding.len(), Ordering::SeqCst);
        Ok(token)
    }

    async fn end(&self, token: BackgroundTaskToken) -> Result<()> {
        let mut outstanding = self.outstanding.lock().unwrap();
        let position = outstanding
            .iter()
            .position(|held| *held == token)
            .ok_or_else(|| BridgeError::OperationFailed("unknown token".into()))?;
        outstanding.remove(position);
        self.ended.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub documents: Mutex<HashMap<String, OfflineDocument>>,
}

#[async_trait]
impl OfflineStore for MemoryStore {
    async fn save(&self, item_id: &str, document: OfflineDocument) -> Result<()> {
        self.documents
            .lock()
            .unwrap()
            .insert(item_id.to_string(), document);
        Ok(())
    }

    async fn load(&self, item_id: &str) -> Result<Option<OfflineDocument>> {
        Ok(self.documents.lock().unwrap().get(item_id).cloned())
    }

    async fn remove(&self, item_id: &str) -> Result<()> {
        self.documents.lock().unwrap().remove(item_id);
        Ok(())
    }
}

// ============================================================================
// Delegate
// ============================================================================

#[derive(Default)]
pub struct RecordingDelegate {
    pub transitions: Mutex<Vec<(PlaybackState, PlaybackState)>>,
    pub started: Mutex<Vec<String>>,
    pub metadata_updates: AtomicUsize,
}

impl RecordingDelegate {
    pub fn transitions(&self) -> Vec<(PlaybackState, PlaybackState)> {
        self.transitions.lock().unwrap().clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

impl PlayerDelegate for RecordingDelegate {
    fn will_start_playing(&self, item: &PlayableItem) {
        self.started.lock().unwrap().push(item.id.to_string());
    }

    fn did_change_state(&self, from: PlaybackState, to: PlaybackState) {
        self.transitions.lock().unwrap().push((from, to));
    }

    fn did_update_metadata(&self, _item: &PlayableItem) {
        self.metadata_updates.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub player: AudioPlayer,
    pub engine: Arc<FakeEngine>,
    pub network: Arc<SwitchableNetwork>,
    pub now_playing: Arc<RecordingNowPlaying>,
    pub background: Arc<RecordingBackground>,
    pub store: Arc<MemoryStore>,
    pub delegate: Arc<RecordingDelegate>,
}

impl Harness {
    pub fn new(settings: PlayerSettings) -> Self {
        Self::with_network(settings, true)
    }

    pub fn with_network(settings: PlayerSettings, connected: bool) -> Self {
        let engine = Arc::new(FakeEngine::default());
        let network = Arc::new(SwitchableNetwork::new(connected));
        let now_playing = Arc::new(RecordingNowPlaying::default());
        let background = Arc::new(RecordingBackground::default());
        let store = Arc::new(MemoryStore::default());
        let delegate = Arc::new(RecordingDelegate::default());

        let config = CoreConfig::builder()
            .media_engine(engine.clone())
            .network_monitor(network.clone())
            .now_playing(now_playing.clone())
            .background_tasks(background.clone())
            .offline_store(store.clone())
            .enable_offline_cache(true)
            .build()
            .expect("valid core config");

        let player = AudioPlayer::builder(config)
            .settings(settings)
            .delegate(delegate.clone())
            .shuffle_seed(7)
            .build()
            .expect("player starts");

        Self {
            player,
            engine,
            network,
            now_playing,
            background,
            store,
            delegate,
        }
    }

    /// Emit an engine event and let the control loop process it.
    pub async fn emit(&self, event: MediaSessionEvent) {
        self.engine.emit(event);
        settle().await;
    }

    /// Playing from the initial item in one step.
    pub async fn start(&self, ids: &[&str]) {
        self.player
            .play_items(items(ids), core_playback::PlayMode::Normal)
            .await
            .expect("play accepted");
        self.emit(MediaSessionEvent::ReadyToPlay).await;
    }
}

pub fn item(id: &str) -> PlayableItem {
    PlayableItem::new(id, format!("https://cdn.example.com/{}.m4a?sig=secret", id))
        .with_title(format!("Track {}", id))
}

pub fn items(ids: &[&str]) -> Vec<PlayableItem> {
    ids.iter().map(|id| item(id)).collect()
}

/// Let spawned tasks run without firing timers further out than 1 ms.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
