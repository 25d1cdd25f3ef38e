//! Facade crate for the playback core.
//!
//! Re-exports the workspace crates under one name so host applications can
//! depend on `mpc-player` alone. The `desktop-shims` feature (on by default)
//! pulls in the desktop bridge implementations and lets
//! [`CoreConfig`](runtime::config::CoreConfig) fall back to them for every
//! bridge except the media engine.

pub use bridge_traits as bridges;
pub use core_playback as playback;
pub use core_runtime as runtime;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop as desktop;

pub use core_playback::{
    AudioPlayer, AudioPlayerBuilder, PlayMode, PlayableItem, PlaybackError, PlaybackState,
    PlayerDelegate, PlayerSettings,
};
pub use core_runtime::config::CoreConfig;
pub use core_runtime::events::{CoreEvent, EventBus};
