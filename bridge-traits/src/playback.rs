//! Media engine bridge traits and supporting types.
//!
//! The playback core never decodes or renders audio itself. It asks the host's
//! native engine (AVPlayer, ExoPlayer, a desktop decoder) to create a session
//! for a source, steers it with rate/volume/seek commands, and listens to the
//! session's event stream to learn about readiness, stalls, and failures.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// High-level audio source descriptor provided to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Local file accessible to the host runtime (offline copy).
    LocalFile { path: PathBuf },
    /// Remote HTTP(S) stream to be fetched by the host.
    RemoteStream {
        url: String,
        headers: HashMap<String, String>,
    },
}

impl AudioSource {
    /// Determine whether the source represents remote content.
    pub fn is_remote(&self) -> bool {
        matches!(self, AudioSource::RemoteStream { .. })
    }
}

/// Options supplied alongside a session request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackOptions {
    /// Position the engine should start loading from.
    pub start_position: Duration,
    /// Initial volume (0.0 = muted, 1.0 = unity gain).
    pub initial_volume: f32,
    /// How much media the engine should try to buffer before reporting ready.
    pub preferred_buffer_duration: Option<Duration>,
    /// Let the engine delay readiness on its own to minimize stalling.
    pub waits_to_minimize_stalling: bool,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            start_position: Duration::ZERO,
            initial_volume: 1.0,
            preferred_buffer_duration: None,
            waits_to_minimize_stalling: true,
        }
    }
}

/// Unique identifier for sessions managed by a media engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackSessionId(Uuid);

impl PlaybackSessionId {
    /// Generate a new session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Construct an identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlaybackSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlaybackSessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Display metadata for an item, used both for session requests and for the
/// transport surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackMetadata {
    /// Optional opaque item identifier.
    pub track_id: Option<String>,
    /// Display title for the track.
    pub title: Option<String>,
    /// Display artist string.
    pub artist: Option<String>,
    /// Album or collection name.
    pub album: Option<String>,
    /// Artwork location (URL or local path).
    pub artwork: Option<String>,
}

/// Request describing the session an engine should provision.
#[derive(Debug, Clone)]
pub struct PlaybackRequest {
    /// Source to feed into the engine.
    pub source: AudioSource,
    /// Options such as initial volume or start position.
    pub options: PlaybackOptions,
    /// Metadata surfaced to the host.
    pub metadata: PlaybackMetadata,
}

impl PlaybackRequest {
    /// Construct a new request for the provided source.
    pub fn new(source: AudioSource) -> Self {
        Self {
            source,
            options: PlaybackOptions::default(),
            metadata: PlaybackMetadata::default(),
        }
    }

    /// Attach playback options to the request.
    pub fn with_options(mut self, options: PlaybackOptions) -> Self {
        self.options = options;
        self
    }

    /// Attach metadata to the request.
    pub fn with_metadata(mut self, metadata: PlaybackMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A contiguous span of media time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Duration,
    pub end: Duration,
}

impl TimeRange {
    pub fn new(start: Duration, end: Duration) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    pub fn contains(&self, position: Duration) -> bool {
        position >= self.start && position <= self.end
    }

    /// Closest position inside the range.
    pub fn clamp(&self, position: Duration) -> Duration {
        position.clamp(self.start, self.end)
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Events reported by a media engine session.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSessionEvent {
    /// Enough media is loaded to start playback.
    ReadyToPlay,
    /// Playback ran out of buffered media.
    Stalled,
    /// The item played through to its end.
    PlaybackEnded,
    /// The item could not be loaded or decoding failed.
    Failed { message: String },
    /// The buffered range grew or changed.
    LoadedRange(TimeRange),
    /// The item's duration became known.
    DurationLoaded(Duration),
    /// Periodic playback position report.
    Progressed(Duration),
    /// Embedded or server-provided metadata was loaded.
    MetadataLoaded(PlaybackMetadata),
    /// Another app or the OS took over audio output.
    InterruptionBegan,
    /// The interruption ended; `should_resume` is the OS hint.
    InterruptionEnded { should_resume: bool },
    /// The engine finished downloading the item to local storage.
    DownloadCompleted { local_path: PathBuf },
}

/// Stream of events for one session.
#[async_trait]
pub trait MediaSessionEventStream: Send {
    /// Returns `None` when the session is destroyed.
    async fn next(&mut self) -> Option<MediaSessionEvent>;
}

/// Trait for platform media engines.
///
/// At most one session is alive per player at any time; the core always
/// destroys the previous session before creating the next one.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Provision a session. The engine starts loading immediately but must not
    /// start rendering until [`set_rate`](Self::set_rate) is called with a
    /// non-zero rate.
    async fn create_session(&self, request: PlaybackRequest) -> Result<PlaybackSessionId>;

    /// Subscribe to the session's events. May be called more than once; each
    /// stream receives every subsequent event.
    async fn subscribe(&self, session: PlaybackSessionId)
        -> Result<Box<dyn MediaSessionEventStream>>;

    /// Set the playback rate. `0.0` pauses, `1.0` is normal speed, negative
    /// values play backwards where supported.
    async fn set_rate(&self, session: PlaybackSessionId, rate: f32) -> Result<()>;

    /// Adjust playback volume. Volume is normalized to `0.0..=1.0`.
    async fn set_volume(&self, session: PlaybackSessionId, volume: f32) -> Result<()>;

    /// Seek to an absolute position within the item.
    async fn seek(&self, session: PlaybackSessionId, position: Duration) -> Result<()>;

    /// Range the engine can currently seek within, if known.
    async fn seekable_range(&self, session: PlaybackSessionId) -> Result<Option<TimeRange>>;

    /// Current playback position.
    async fn current_time(&self, session: PlaybackSessionId) -> Result<Duration>;

    /// Release every resource associated with the session and close its
    /// event streams.
    async fn destroy_session(&self, session: PlaybackSessionId) -> Result<()>;
}
