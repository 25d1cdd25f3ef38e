//! End-to-end scenarios driving `AudioPlayer` through recording fakes.
//!
//! All tests run on a paused clock so retry windows, debounce and deadlines
//! elapse instantly.

mod common;

use bridge_traits::{MediaSessionEvent, PlaybackMetadata, TimeRange};
use common::{item, items, settle, Harness};
use core_playback::{FailureReason, PlayMode, PlaybackError, PlaybackState, PlayerSettings};
use core_runtime::events::{CacheEvent, CoreEvent, PlaybackEvent};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use PlaybackState::*;

fn retry_settings(attempts: u32) -> PlayerSettings {
    PlayerSettings {
        maximum_retry_count: attempts,
        retry_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

fn assert_single_session_and_token(h: &Harness) {
    assert!(h.engine.max_live() <= 1, "two sessions alive at once");
    assert!(
        h.background.max_outstanding.load(Ordering::SeqCst) <= 1,
        "two background tokens held at once"
    );
}

#[tokio::test(start_paused = true)]
async fn test_play_buffers_then_plays() {
    let h = Harness::new(PlayerSettings::default());

    h.player.play(item("a")).await.unwrap();
    assert_eq!(h.player.state(), Buffering);
    assert_eq!(h.background.outstanding(), 1);
    assert_eq!(h.engine.live(), 1);

    h.emit(MediaSessionEvent::ReadyToPlay).await;

    assert_eq!(h.player.state(), Playing);
    assert_eq!(h.background.outstanding(), 0);
    assert_eq!(
        h.delegate.transitions(),
        vec![(Stopped, Buffering), (Buffering, Playing)]
    );
    assert_eq!(h.delegate.started(), vec!["a".to_string()]);
    assert_eq!(h.engine.rates(), vec![1.0]);

    let info = h.now_playing.last().unwrap();
    assert_eq!(info.rate, 1.0);
    assert_eq!(info.metadata.title.as_deref(), Some("Track a"));
    assert_single_session_and_token(&h);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_start_waits_then_reissues() {
    let h = Harness::with_network(PlayerSettings::default(), false);

    h.player.play(item("a")).await.unwrap();
    assert_eq!(h.player.state(), WaitingForConnection);
    assert_eq!(h.background.outstanding(), 0);

    h.network.set_connected(true);
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(h.player.state(), Buffering);

    h.emit(MediaSessionEvent::ReadyToPlay).await;
    assert_eq!(h.player.state(), Playing);
    assert_eq!(
        h.delegate.transitions(),
        vec![
            (Stopped, WaitingForConnection),
            (WaitingForConnection, Buffering),
            (Buffering, Playing)
        ]
    );
    assert_eq!(h.engine.created(), 2);
    assert_eq!(h.engine.live(), 1);
    assert_single_session_and_token(&h);
}

#[tokio::test(start_paused = true)]
async fn test_link_back_before_network_producer_starts() {
    let h = Harness::with_network(PlayerSettings::default(), false);
    h.network.reconnect_silently_after_next_read();

    h.player.play(item("a")).await.unwrap();
    assert_eq!(h.player.state(), WaitingForConnection);

    // No change notification ever arrives; the producer's own start-up read
    // disagrees with what the player acted on.
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(h.player.state(), Buffering);

    h.emit(MediaSessionEvent::ReadyToPlay).await;
    assert_eq!(h.player.state(), Playing);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.player.state(), Playing);
    assert_eq!(h.player.current_item().map(|i| i.id.to_string()), Some("a".into()));
    assert_single_session_and_token(&h);
}

#[tokio::test(start_paused = true)]
async fn test_three_retries_recreate_session_three_times_then_fail() {
    let h = Harness::new(retry_settings(3));

    h.player.play(item("a")).await.unwrap();
    h.emit(MediaSessionEvent::Failed {
        message: "decoder error".into(),
    })
    .await;
    assert_eq!(h.player.state(), Buffering);

    // Attempts at 2s, 4s, 6s; give up at 8s.
    tokio::time::sleep(Duration::from_secs(9)).await;

    assert_eq!(h.player.state(), Stopped);
    assert!(h.player.current_item().is_none());
    // The original session plus three recreations.
    assert_eq!(h.engine.created(), 4);
    assert_eq!(h.engine.live(), 0);

    let transitions = h.delegate.transitions();
    let failed = Failed(FailureReason::RetryExhausted);
    assert_eq!(
        transitions[transitions.len() - 2..],
        [(Buffering, failed), (failed, Stopped)]
    );
    assert_eq!(h.background.begun.load(Ordering::SeqCst), 1);
    assert_eq!(h.background.outstanding(), 0);
    assert_single_session_and_token(&h);
}

#[tokio::test(start_paused = true)]
async fn test_recovery_before_exhaustion_keeps_playing() {
    let h = Harness::new(retry_settings(3));
    h.engine.refuse_sessions(true);

    h.player.play(item("a")).await.unwrap();
    assert_eq!(h.player.state(), Buffering);
    assert_eq!(h.engine.live(), 0);

    h.engine.refuse_sessions(false);
    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert_eq!(h.engine.live(), 1);

    h.emit(MediaSessionEvent::ReadyToPlay).await;
    assert_eq!(h.player.state(), Playing);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.player.state(), Playing);
    assert_eq!(h.engine.created(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connection_loss_deadline_fails_item() {
    let h = Harness::new(PlayerSettings {
        maximum_connection_loss_time: Duration::from_secs(5),
        ..Default::default()
    });
    h.start(&["a"]).await;
    assert_eq!(h.player.state(), Playing);

    h.network.set_connected(false);
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(h.player.state(), WaitingForConnection);
    assert_eq!(h.background.outstanding(), 0);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.player.state(), Stopped);

    let lost = Failed(FailureReason::ConnectionLost);
    let transitions = h.delegate.transitions();
    assert!(transitions.contains(&(WaitingForConnection, lost)));
    assert_eq!(transitions.last(), Some(&(lost, Stopped)));
    assert!(h.now_playing.clears.load(Ordering::SeqCst) >= 1);
    assert_eq!(h.engine.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_without_resume_ends_paused() {
    let h = Harness::new(PlayerSettings {
        resume_after_connection_loss: false,
        maximum_connection_loss_time: Duration::from_secs(5),
        ..Default::default()
    });
    h.start(&["a"]).await;

    h.network.set_connected(false);
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(h.player.state(), WaitingForConnection);

    h.network.set_connected(true);
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(h.player.state(), Buffering);

    h.emit(MediaSessionEvent::ReadyToPlay).await;
    assert_eq!(h.player.state(), Paused);

    // The deadline was cancelled on reconnection.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.player.state(), Paused);
    assert_single_session_and_token(&h);
}

#[tokio::test(start_paused = true)]
async fn test_pause_resume_are_idempotent_and_acknowledged() {
    let h = Harness::new(PlayerSettings::default());
    h.start(&["a"]).await;

    h.player.pause().await.unwrap();
    assert_eq!(h.player.state(), Paused);
    h.player.pause().await.unwrap();
    h.player.resume().await.unwrap();
    assert_eq!(h.player.state(), Playing);
    h.player.resume().await.unwrap();

    assert_eq!(
        h.delegate.transitions(),
        vec![
            (Stopped, Buffering),
            (Buffering, Playing),
            (Playing, Paused),
            (Paused, Playing)
        ]
    );
    assert_eq!(h.engine.rates(), vec![1.0, 0.0, 1.0]);
}

#[tokio::test(start_paused = true)]
async fn test_queue_advances_and_stops_at_end() {
    let h = Harness::new(PlayerSettings::default());
    h.start(&["a", "b"]).await;

    h.emit(MediaSessionEvent::PlaybackEnded).await;
    assert_eq!(h.player.current_item().unwrap().id.as_str(), "b");
    assert_eq!(h.player.current_index(), Some(1));
    assert_eq!(h.player.state(), Buffering);
    assert_eq!(h.engine.destroyed(), 1);

    h.emit(MediaSessionEvent::ReadyToPlay).await;
    h.emit(MediaSessionEvent::PlaybackEnded).await;

    assert_eq!(h.player.state(), Stopped);
    assert!(h.player.current_item().is_none());
    assert_eq!(h.engine.live(), 0);
    assert_eq!(h.background.outstanding(), 0);
    assert_eq!(h.delegate.started(), vec!["a".to_string(), "b".to_string()]);
    assert_single_session_and_token(&h);
}

#[tokio::test(start_paused = true)]
async fn test_next_on_single_item_queue() {
    let h = Harness::new(PlayerSettings::default());
    h.start(&["a"]).await;
    h.player.next().await.unwrap();
    assert_eq!(h.player.state(), Stopped);
    assert_eq!(h.engine.live(), 0);

    h.player
        .play_items(items(&["a"]), PlayMode::RepeatAll)
        .await
        .unwrap();
    h.emit(MediaSessionEvent::ReadyToPlay).await;
    h.player.next().await.unwrap();

    assert_eq!(h.player.state(), Buffering);
    assert_eq!(h.player.current_item().unwrap().id.as_str(), "a");
    assert_eq!(h.engine.live(), 1);
    assert_eq!(h.delegate.started().len(), 3);
    assert_single_session_and_token(&h);
}

#[tokio::test(start_paused = true)]
async fn test_repeat_all_previous_wraps() {
    let h = Harness::new(PlayerSettings::default());
    h.player
        .play_items(items(&["a", "b", "c"]), PlayMode::RepeatAll)
        .await
        .unwrap();

    h.player.previous().await.unwrap();
    assert_eq!(h.player.current_item().unwrap().id.as_str(), "c");
    assert_eq!(h.player.mode(), PlayMode::RepeatAll);
}

#[tokio::test(start_paused = true)]
async fn test_play_items_from_index() {
    let h = Harness::new(PlayerSettings::default());
    h.player
        .play_items_from(items(&["a", "b", "c"]), 2)
        .await
        .unwrap();
    assert_eq!(h.player.current_item().unwrap().id.as_str(), "c");

    let err = h
        .player
        .play_items_from(items(&["a"]), 4)
        .await
        .unwrap_err();
    assert!(matches!(err, PlaybackError::InvalidItem(_)));
    // Rejected commands leave playback untouched.
    assert_eq!(h.player.current_item().unwrap().id.as_str(), "c");
}

#[tokio::test(start_paused = true)]
async fn test_empty_play_stops() {
    let h = Harness::new(PlayerSettings::default());
    h.start(&["a"]).await;

    h.player.play_items(Vec::new(), PlayMode::Normal).await.unwrap();
    assert_eq!(h.player.state(), Stopped);
    assert_eq!(h.engine.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_seek_round_trip_and_clamping() {
    let h = Harness::new(PlayerSettings::default());
    h.engine
        .set_seekable(TimeRange::new(Duration::ZERO, Duration::from_secs(600)));
    h.start(&["a"]).await;

    h.player.seek(Duration::from_secs(30)).await.unwrap();
    assert_eq!(h.player.progress(), Duration::from_secs(30));

    h.player.seek(Duration::from_secs(900)).await.unwrap();
    assert_eq!(h.player.progress(), Duration::from_secs(600));
    assert_eq!(
        h.engine.seeks(),
        vec![Duration::from_secs(30), Duration::from_secs(600)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_interruption_pauses_and_resumes() {
    let h = Harness::new(PlayerSettings::default());
    h.start(&["a"]).await;

    h.emit(MediaSessionEvent::InterruptionBegan).await;
    assert_eq!(h.player.state(), Paused);

    h.emit(MediaSessionEvent::InterruptionEnded {
        should_resume: true,
    })
    .await;
    assert_eq!(h.player.state(), Playing);
}

#[tokio::test(start_paused = true)]
async fn test_download_is_cached_offline() {
    let h = Harness::new(PlayerSettings::default());
    h.start(&["a"]).await;
    let mut events = h.player.subscribe_events();

    h.emit(MediaSessionEvent::DownloadCompleted {
        local_path: PathBuf::from("/downloads/a.m4a"),
    })
    .await;
    settle().await;

    let document = h.store.documents.lock().unwrap().get("a").cloned().unwrap();
    assert_eq!(document.local_path, PathBuf::from("/downloads/a.m4a"));
    assert_eq!(document.metadata["title"], "Track a");

    assert!(h.player.current_item().unwrap().is_offline);
    assert!(h.player.queue_items()[0].is_offline);
    // Caching never changes playback.
    assert_eq!(h.player.state(), Playing);

    let mut cached = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, CoreEvent::Cache(CacheEvent::ItemCached { .. })) {
            cached = true;
        }
    }
    assert!(cached);
}

#[tokio::test(start_paused = true)]
async fn test_item_updates_flow_to_snapshot_and_surface() {
    let h = Harness::new(PlayerSettings::default());
    h.start(&["a"]).await;

    h.emit(MediaSessionEvent::DurationLoaded(Duration::from_secs(200)))
        .await;
    h.emit(MediaSessionEvent::MetadataLoaded(PlaybackMetadata {
        title: Some("Real Title".into()),
        ..Default::default()
    }))
    .await;
    h.emit(MediaSessionEvent::Progressed(Duration::from_secs(12)))
        .await;

    assert_eq!(h.player.duration(), Some(Duration::from_secs(200)));
    assert_eq!(h.player.progress(), Duration::from_secs(12));
    assert_eq!(
        h.player.current_item().unwrap().title.as_deref(),
        Some("Real Title")
    );
    assert_eq!(h.delegate.metadata_updates.load(Ordering::SeqCst), 1);

    let info = h.now_playing.last().unwrap();
    assert_eq!(info.metadata.title.as_deref(), Some("Real Title"));
    assert_eq!(info.duration, Some(Duration::from_secs(200)));
}

#[tokio::test(start_paused = true)]
async fn test_transport_surface_refreshes_after_transition() {
    let h = Harness::new(PlayerSettings::default());
    h.start(&["a"]).await;
    let published = h.now_playing.publish_count();

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.now_playing.publish_count(), published + 2);
}

#[tokio::test(start_paused = true)]
async fn test_volume_validation() {
    let h = Harness::new(PlayerSettings::default());
    h.start(&["a"]).await;

    h.player.set_volume(0.4).await.unwrap();
    assert_eq!(h.player.volume(), 0.4);
    assert_eq!(h.engine.volumes(), vec![0.4]);

    let err = h.player.set_volume(1.5).await.unwrap_err();
    assert!(matches!(err, PlaybackError::InvalidConfig(_)));
    assert_eq!(h.player.volume(), 0.4);
}

#[tokio::test(start_paused = true)]
async fn test_state_changes_are_broadcast() {
    let h = Harness::new(PlayerSettings::default());
    let mut events = h.player.subscribe_events();
    h.start(&["a"]).await;

    let mut labels = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Playback(PlaybackEvent::StateChanged { to, .. }) = event {
            labels.push(to);
        }
    }
    assert_eq!(labels, vec!["buffering".to_string(), "playing".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_releases_everything() {
    let h = Harness::new(PlayerSettings::default());
    h.player.play(item("a")).await.unwrap();
    assert_eq!(h.background.outstanding(), 1);

    h.player.shutdown().await.unwrap();
    settle().await;

    assert_eq!(h.engine.live(), 0);
    assert_eq!(h.background.outstanding(), 0);
    assert_eq!(h.player.state(), Stopped);
    assert!(!h.player.is_running());
    assert!(matches!(
        h.player.play(item("b")).await,
        Err(PlaybackError::PlayerShutDown)
    ));
    assert!(matches!(
        h.player.shutdown().await,
        Err(PlaybackError::PlayerShutDown)
    ));
}
