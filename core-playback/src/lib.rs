//! # Playback Orchestration Module
//!
//! Decides when a mobile audio player buffers, plays, pauses, retries,
//! waits for the network, advances the queue, or gives up.
//!
//! ## Overview
//!
//! This module handles:
//! - The playback state machine and its side effects
//! - Queue ordering (normal, repeat one, repeat all, shuffle)
//! - Five event producers (network, player, seek, audio item, retry)
//! - Background-execution tokens while buffering
//! - Transport surface ("now playing") updates
//! - Offline write-through of finished downloads
//!
//! Decoding and rendering stay on the host side of
//! [`MediaEngine`](bridge_traits::MediaEngine).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ AudioPlayer (handle)                         │
//! └───────────────┬──────────────────────────────┘
//!                 │ commands
//! ┌───────────────▼──────────────────────────────┐
//! │ control loop ── PlaybackMachine (pure)       │
//! │   ▲ producer events        │ effects         │
//! └───┼────────────────────────┼─────────────────┘
//!     │                        ▼
//! ┌───┴────────────┐  ┌─────────────────────────┐
//! │ producers      │  │ bridges (engine, now    │
//! │ (epoch-tagged) │  │ playing, background...) │
//! └────────────────┘  └─────────────────────────┘
//! ```

pub mod background;
pub mod cache;
pub mod config;
pub mod delegate;
pub mod error;
pub mod event;
pub mod item;
pub mod machine;
pub mod now_playing;
pub mod player;
pub mod producers;
pub mod queue;
pub mod state;

pub use cache::{CacheOutcome, OfflineCacher};
pub use config::{
    BufferingStrategy, PlayMode, PlayerSettings, SeekDirection, SeekingBehavior, SEEK_RATE,
};
pub use delegate::{NoopDelegate, PlayerDelegate};
pub use error::{PlaybackError, Result};
pub use event::{
    AudioItemEvent, Event, NetworkEvent, PlayerEvent, ProducedEvent, ProducerKind, RetryEvent,
    SeekEvent,
};
pub use item::{ItemId, PlayableItem};
pub use machine::{PlaybackMachine, PlayerSnapshot};
pub use player::{AudioPlayer, AudioPlayerBuilder};
pub use producers::EventProducer;
pub use queue::ItemQueue;
pub use state::{FailureReason, PlaybackState};
