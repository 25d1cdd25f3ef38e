//! Host callbacks.

use crate::item::PlayableItem;
use crate::machine::Notification;
use crate::state::PlaybackState;
use core_runtime::events::{CoreEvent, PlaybackEvent};
use std::time::Duration;

/// Receives player notifications on the control loop.
///
/// Every method has a no-op default. Implementations must return quickly;
/// the loop processes nothing else while a callback runs. Hosts that prefer
/// a stream can subscribe to the event bus instead.
pub trait PlayerDelegate: Send + Sync {
    fn will_start_playing(&self, _item: &PlayableItem) {}

    fn did_change_state(&self, _from: PlaybackState, _to: PlaybackState) {}

    fn did_progress_to(&self, _position: Duration, _duration: Option<Duration>) {}

    fn did_update_duration(&self, _item: &PlayableItem, _duration: Duration) {}

    fn did_update_metadata(&self, _item: &PlayableItem) {}
}

/// Delegate that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelegate;

impl PlayerDelegate for NoopDelegate {}

impl Notification {
    /// Deliver to the delegate. `current` is the item after the step.
    pub(crate) fn dispatch(&self, delegate: &dyn PlayerDelegate, current: Option<&PlayableItem>) {
        match self {
            Notification::WillStartPlaying(item) => delegate.will_start_playing(item),
            Notification::StateChanged { from, to, .. } => delegate.did_change_state(*from, *to),
            Notification::Progressed {
                position, duration, ..
            } => delegate.did_progress_to(*position, *duration),
            Notification::DurationUpdated { item_id, duration } => {
                if let Some(item) = current.filter(|item| &item.id == item_id) {
                    delegate.did_update_duration(item, *duration);
                }
            }
            Notification::MetadataUpdated(item) => delegate.did_update_metadata(item),
            Notification::QueueChanged { .. }
            | Notification::PlaybackError { .. }
            | Notification::Cache(_) => {}
        }
    }

    /// Bus form of the notification.
    pub(crate) fn to_event(&self) -> CoreEvent {
        match self {
            Notification::WillStartPlaying(item) => {
                CoreEvent::Playback(PlaybackEvent::WillStartPlaying {
                    item_id: item.id.to_string(),
                    title: item.title.clone(),
                })
            }
            Notification::StateChanged { item_id, from, to } => {
                CoreEvent::Playback(PlaybackEvent::StateChanged {
                    item_id: item_id.as_ref().map(ToString::to_string),
                    from: from.label(),
                    to: to.label(),
                })
            }
            Notification::Progressed {
                item_id,
                position,
                duration,
            } => CoreEvent::Playback(PlaybackEvent::Progressed {
                item_id: item_id.to_string(),
                position_ms: millis(*position),
                duration_ms: duration.map(millis),
            }),
            Notification::DurationUpdated { item_id, duration } => {
                CoreEvent::Playback(PlaybackEvent::DurationChanged {
                    item_id: item_id.to_string(),
                    duration_ms: millis(*duration),
                })
            }
            Notification::MetadataUpdated(item) => {
                CoreEvent::Playback(PlaybackEvent::MetadataUpdated {
                    item_id: item.id.to_string(),
                    title: item.title.clone(),
                    artist: item.artist.clone(),
                    album: item.album.clone(),
                })
            }
            Notification::QueueChanged {
                length,
                current_index,
            } => CoreEvent::Playback(PlaybackEvent::QueueChanged {
                length: *length,
                current_index: *current_index,
            }),
            Notification::PlaybackError {
                item_id,
                message,
                recoverable,
            } => CoreEvent::Playback(PlaybackEvent::Error {
                item_id: item_id.as_ref().map(ToString::to_string),
                message: message.clone(),
                recoverable: *recoverable,
            }),
            Notification::Cache(outcome) => CoreEvent::Cache(outcome.to_event()),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
