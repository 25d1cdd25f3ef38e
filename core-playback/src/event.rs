//! Events delivered to the control loop by the producers.
//!
//! One tagged enum per producer category, wrapped in [`Event`]. The state
//! machine dispatches on it with an exhaustive match, so adding a variant
//! is a compile error until every handler decides what to do with it.

use crate::config::SeekDirection;
use bridge_traits::{PlaybackMetadata, TimeRange};
use std::path::PathBuf;
use std::time::Duration;

/// Which producer an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProducerKind {
    Network,
    Player,
    Seek,
    AudioItem,
    Retry,
}

impl ProducerKind {
    pub const ALL: [ProducerKind; 5] = [
        ProducerKind::Network,
        ProducerKind::Player,
        ProducerKind::Seek,
        ProducerKind::AudioItem,
        ProducerKind::Retry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProducerKind::Network => "network",
            ProducerKind::Player => "player",
            ProducerKind::Seek => "seek",
            ProducerKind::AudioItem => "audio_item",
            ProducerKind::Retry => "retry",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    ConnectionLost,
    ConnectionRetrieved,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    ItemReady,
    ItemPlaybackStalled,
    ItemPlaybackEnded,
    ItemFailedToPlay { message: String },
    /// The engine's loaded range changed.
    BufferProgress { loaded: TimeRange },
    InterruptionBegan,
    InterruptionEnded { should_resume: bool },
    DownloadFinished { local_path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekEvent {
    Tick(SeekDirection),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AudioItemEvent {
    DurationChanged(Duration),
    ProgressChanged(Duration),
    MetadataUpdated(PlaybackMetadata),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryEvent {
    /// Time to recreate the session; `attempt` starts at 1.
    RetryAvailable { attempt: u32 },
    /// The last attempt's window elapsed without recovery.
    RetryFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Network(NetworkEvent),
    Player(PlayerEvent),
    Seek(SeekEvent),
    AudioItem(AudioItemEvent),
    Retry(RetryEvent),
}

impl Event {
    pub fn kind(&self) -> ProducerKind {
        match self {
            Event::Network(_) => ProducerKind::Network,
            Event::Player(_) => ProducerKind::Player,
            Event::Seek(_) => ProducerKind::Seek,
            Event::AudioItem(_) => ProducerKind::AudioItem,
            Event::Retry(_) => ProducerKind::Retry,
        }
    }
}

/// An event stamped with the producer run that emitted it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProducedEvent {
    pub source: ProducerKind,
    /// Incremented on every start; stale epochs are discarded.
    pub epoch: u64,
    pub event: Event,
}
