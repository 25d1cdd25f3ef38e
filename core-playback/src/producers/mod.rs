//! # Event Producers
//!
//! Five producers feed the control loop: network, player, seek, audio item
//! and retry. Each one wraps an upstream source (reachability changes, a
//! media session, a timer) and forwards typed [`Event`]s to a single sink.
//!
//! ## Lifecycle
//!
//! A producer is either idle or producing. Starting an active producer or
//! stopping an idle one does nothing. Every start opens a new *epoch*:
//! events are stamped with it, and the control loop drops any event whose
//! producer has since been stopped or restarted. Stopping cancels the
//! forwarding task, so nothing from the old run is accepted once
//! `stop_producing_events` returns, even if it was already queued.
//!
//! ```text
//!  upstream ──> forwarding task ──(kind, epoch, event)──> control loop
//!                    ▲                                        │
//!                    └──────── start / stop (epoch + 1) ──────┘
//! ```

mod audio_item;
mod network;
mod player;
mod retry;
mod seek;

pub use audio_item::AudioItemEventProducer;
pub use network::NetworkEventProducer;
pub use player::PlayerEventProducer;
pub use retry::RetryEventProducer;
pub use seek::SeekEventProducer;

use crate::event::{Event, ProducedEvent, ProducerKind};
use async_trait::async_trait;
use std::future::Future;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Common contract of the five producers.
#[async_trait]
pub trait EventProducer: Send {
    fn kind(&self) -> ProducerKind;

    /// Begin forwarding events. Registers with the upstream source before
    /// returning, so nothing emitted afterwards is missed.
    async fn start_producing_events(&mut self);

    /// Stop forwarding events.
    fn stop_producing_events(&mut self);

    fn is_producing(&self) -> bool;

    /// Epoch of the current (or last) run.
    fn epoch(&self) -> u64;
}

/// Sending half handed to a producer run.
#[derive(Debug, Clone)]
pub struct EventSink {
    source: ProducerKind,
    epoch: u64,
    tx: mpsc::UnboundedSender<ProducedEvent>,
}

impl EventSink {
    /// Forward an event; returns `false` once the control loop is gone.
    pub fn emit(&self, event: Event) -> bool {
        trace!(producer = self.source.as_str(), epoch = self.epoch, ?event, "emit");
        self.tx
            .send(ProducedEvent {
                source: self.source,
                epoch: self.epoch,
                event,
            })
            .is_ok()
    }
}

/// Epoch and cancellation bookkeeping shared by every producer.
#[derive(Debug)]
pub(crate) struct ProducerRun {
    kind: ProducerKind,
    tx: mpsc::UnboundedSender<ProducedEvent>,
    epoch: u64,
    cancel: Option<CancellationToken>,
}

impl ProducerRun {
    pub(crate) fn new(kind: ProducerKind, tx: mpsc::UnboundedSender<ProducedEvent>) -> Self {
        Self {
            kind,
            tx,
            epoch: 0,
            cancel: None,
        }
    }

    pub(crate) fn kind(&self) -> ProducerKind {
        self.kind
    }

    pub(crate) fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Open a new epoch and return the sink for it.
    pub(crate) fn next_sink(&mut self) -> EventSink {
        self.epoch += 1;
        EventSink {
            source: self.kind,
            epoch: self.epoch,
            tx: self.tx.clone(),
        }
    }

    /// Spawn the forwarding task; it is dropped at its next await point
    /// once the run is stopped.
    pub(crate) fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();
        let kind = self.kind;
        tokio::spawn(async move {
            tokio::select! {
                _ = child.cancelled() => {
                    trace!(producer = kind.as_str(), "forwarding task cancelled");
                }
                _ = task => {}
            }
        });
        self.cancel = Some(token);
    }

    /// Cancel the running task. Returns whether anything was running.
    pub(crate) fn stop(&mut self) -> bool {
        match self.cancel.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

impl Drop for ProducerRun {
    fn drop(&mut self) {
        self.stop();
    }
}

/// All five producers owned by one player.
pub struct Producers {
    pub network: NetworkEventProducer,
    pub player: PlayerEventProducer,
    pub seek: SeekEventProducer,
    pub audio_item: AudioItemEventProducer,
    pub retry: RetryEventProducer,
}

impl Producers {
    pub fn get_mut(&mut self, kind: ProducerKind) -> &mut dyn EventProducer {
        match kind {
            ProducerKind::Network => &mut self.network,
            ProducerKind::Player => &mut self.player,
            ProducerKind::Seek => &mut self.seek,
            ProducerKind::AudioItem => &mut self.audio_item,
            ProducerKind::Retry => &mut self.retry,
        }
    }

    fn get(&self, kind: ProducerKind) -> &dyn EventProducer {
        match kind {
            ProducerKind::Network => &self.network,
            ProducerKind::Player => &self.player,
            ProducerKind::Seek => &self.seek,
            ProducerKind::AudioItem => &self.audio_item,
            ProducerKind::Retry => &self.retry,
        }
    }

    /// Whether `event` comes from a run that is still producing.
    pub fn accepts(&self, event: &ProducedEvent) -> bool {
        let producer = self.get(event.source);
        producer.is_producing() && producer.epoch() == event.epoch
    }

    pub fn stop_all(&mut self) {
        for kind in ProducerKind::ALL {
            self.get_mut(kind).stop_producing_events();
        }
    }

    pub fn active(&self) -> Vec<ProducerKind> {
        ProducerKind::ALL
            .into_iter()
            .filter(|kind| self.get(*kind).is_producing())
            .collect()
    }
}
