mod common;

use async_trait::async_trait;
use brspplayer::{
    BackendKind, LoadOutcome, Player, PlayerError, PlayerEvent, PlayerStatus, ReachabilityProbe,
};
use brspplaylist::{Playlist, Track};
use common::{drain, Behavior, MockPlatform, MockVisualizer, Mode};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

fn playlist(urls: &[&str]) -> Playlist {
    urls.iter()
        .enumerate()
        .map(|(i, url)| Track::new(format!("Track {i}"), *url))
        .collect()
}

/// Player without the blob backend, so no test touches the network
fn player(platform: &Arc<MockPlatform>, visualizer: &Arc<MockVisualizer>) -> Arc<Player> {
    Player::builder(platform.clone())
        .visualizer(visualizer.clone())
        .backends(&[BackendKind::Buffered, BackendKind::Streaming])
        .attempt_timeout(Duration::from_secs(5))
        .seed(42)
        .build()
        .unwrap()
}

struct RejectingProbe {
    unreachable: HashSet<String>,
}

#[async_trait]
impl ReachabilityProbe for RejectingProbe {
    async fn probe(&self, url: &str) -> bool {
        !self.unreachable.contains(url)
    }
}

#[tokio::test]
async fn test_playlist_prepares_first_track_without_playing() {
    let platform = MockPlatform::new();
    let visualizer = MockVisualizer::new();
    let player = player(&platform, &visualizer);

    let outcome = player.set_playlist(playlist(&["u1", "u2"])).await.unwrap();

    assert_eq!(
        outcome,
        LoadOutcome::Ready {
            index: 0,
            backend: BackendKind::Buffered,
            playing: false
        }
    );
    assert!(!player.is_playing().await);
    assert_eq!(platform.count_prefix("play:"), 0);
}

#[tokio::test]
async fn test_visualizer_connected_once_per_session() {
    let platform = MockPlatform::new();
    let visualizer = MockVisualizer::new();
    let player = player(&platform, &visualizer);
    player.set_playlist(playlist(&["u1", "u2"])).await.unwrap();

    for _ in 0..3 {
        player.play().await.unwrap();
    }
    player.pause().await.unwrap();
    player.play().await.unwrap();

    assert_eq!(visualizer.connects(), 1);
    assert_eq!(platform.count("play:buffered:u1"), 2);

    player.next().await.unwrap();
    assert_eq!(visualizer.connects(), 2);
    assert_eq!(visualizer.disconnects(), 1);
}

#[tokio::test]
async fn test_previous_session_released_before_next_is_opened() {
    let platform = MockPlatform::new();
    let visualizer = MockVisualizer::new();
    let player = player(&platform, &visualizer);
    player.set_playlist(playlist(&["u1", "u2"])).await.unwrap();

    player.load_and_play(1).await.unwrap();

    let released = platform.position("release:buffered:u1").unwrap();
    let opened = platform.position("open:buffered:u2").unwrap();
    assert!(released < opened);
    assert_eq!(player.current_index().await, 1);
}

#[tokio::test]
async fn test_superseded_load_never_overwrites_newer_session() {
    let gate = Arc::new(Notify::new());
    let platform = MockPlatform::new();
    platform.set(Mode::Buffered, "u1", Behavior::Gate(gate.clone()));
    let visualizer = MockVisualizer::new();
    let player = player(&platform, &visualizer);

    let first = {
        let player = player.clone();
        tokio::spawn(async move { player.set_playlist(playlist(&["u1", "u2"])).await })
    };
    platform.wait_for("open:buffered:u1").await;

    let second = player.load_and_play(1).await.unwrap();
    // Trop tard : la tentative sur u1 a déjà été abandonnée
    gate.notify_one();

    assert_eq!(first.await.unwrap().unwrap(), LoadOutcome::Superseded);
    assert_eq!(
        second,
        LoadOutcome::Ready {
            index: 1,
            backend: BackendKind::Buffered,
            playing: true
        }
    );
    assert_eq!(player.current_index().await, 1);
    assert!(player.is_playing().await);
    assert_eq!(platform.count("release:buffered:u1"), 1);
    assert_eq!(platform.count_prefix("play:"), 1);
    assert_eq!(visualizer.connects(), 1);
}

#[tokio::test]
async fn test_empty_playlist_is_a_no_op() {
    let platform = MockPlatform::new();
    let visualizer = MockVisualizer::new();
    let player = player(&platform, &visualizer);
    let mut status = player.subscribe();

    assert_eq!(
        player.set_playlist(Playlist::empty()).await.unwrap(),
        LoadOutcome::Empty
    );
    assert_eq!(player.load_and_play(0).await.unwrap(), LoadOutcome::Empty);
    assert_eq!(player.next().await.unwrap(), LoadOutcome::Empty);
    assert_eq!(player.random().await.unwrap(), LoadOutcome::Empty);
    player.play().await.unwrap();
    player.pause().await.unwrap();

    assert!(platform.log().is_empty());
    assert_eq!(player.current_backend().await, None);
    assert!(drain(&mut status)
        .iter()
        .all(|s| *s == PlayerStatus::EmptyPlaylist));
}

#[tokio::test]
async fn test_unplayable_track_is_skipped_and_wraps() {
    let platform = MockPlatform::new();
    platform.fail_everywhere("u2");
    let visualizer = MockVisualizer::new();
    let player = player(&platform, &visualizer);
    player.set_playlist(playlist(&["u1", "u2"])).await.unwrap();
    let mut status = player.subscribe();

    let outcome = player.next().await.unwrap();

    assert_eq!(
        outcome,
        LoadOutcome::Ready {
            index: 0,
            backend: BackendKind::Buffered,
            playing: true
        }
    );
    let statuses = drain(&mut status);
    assert!(statuses.contains(&PlayerStatus::Skipped {
        index: 1,
        title: "Track 1".to_string()
    }));
    assert!(matches!(
        statuses.last(),
        Some(PlayerStatus::Playing { index: 0, .. })
    ));
}

#[tokio::test]
async fn test_all_tracks_failing_stops_after_one_cycle() {
    let platform = MockPlatform::new();
    for url in ["u1", "u2", "u3"] {
        platform.fail_everywhere(url);
    }
    let visualizer = MockVisualizer::new();
    let player = player(&platform, &visualizer);
    let mut status = player.subscribe();

    let outcome = player
        .set_playlist(playlist(&["u1", "u2", "u3"]))
        .await
        .unwrap();

    assert_eq!(outcome, LoadOutcome::AllUnplayable);
    // Une tentative par backend et par piste, pas une de plus
    assert_eq!(platform.count_prefix("open:"), 6);
    assert_eq!(player.current_backend().await, None);
    assert!(drain(&mut status).contains(&PlayerStatus::AllUnplayable { attempts: 3 }));
    assert_eq!(visualizer.connects(), 0);
}

#[tokio::test]
async fn test_random_skips_reach_playable_track_across_rounds() {
    for seed in 0..20 {
        let platform = MockPlatform::new();
        platform.fail_everywhere("u2");
        platform.fail_everywhere("u3");
        let player = Player::builder(platform.clone())
            .visualizer(MockVisualizer::new())
            .backends(&[BackendKind::Buffered, BackendKind::Streaming])
            .seed(seed)
            .build()
            .unwrap();
        player
            .set_playlist(playlist(&["u1", "u2", "u3"]))
            .await
            .unwrap();

        // Plusieurs tours complets : l'historique est remis à zéro en cours de skip
        for press in 0..8 {
            let outcome = player.random().await.unwrap();
            assert!(
                matches!(outcome, LoadOutcome::Ready { index: 0, .. }),
                "seed={seed} press={press}: {outcome:?}"
            );
        }
    }
}

#[tokio::test]
async fn test_random_all_failing_stops_after_each_track_once() {
    let platform = MockPlatform::new();
    for url in ["u1", "u2", "u3"] {
        platform.fail_everywhere(url);
    }
    let player = player(&platform, &MockVisualizer::new());
    player.set_playlist(playlist(&["u1", "u2", "u3"])).await.unwrap();
    let opens = platform.count_prefix("open:");

    assert_eq!(player.random().await.unwrap(), LoadOutcome::AllUnplayable);
    assert_eq!(platform.count_prefix("open:") - opens, 6);
    for url in ["u1", "u2", "u3"] {
        assert_eq!(platform.count(&format!("open:buffered:{url}")), 2);
    }
}

#[tokio::test]
async fn test_unreachable_track_skipped_without_backend_attempt() {
    let platform = MockPlatform::new();
    let visualizer = MockVisualizer::new();
    let player = Player::builder(platform.clone())
        .visualizer(visualizer.clone())
        .backends(&[BackendKind::Buffered, BackendKind::Streaming])
        .probe(Arc::new(RejectingProbe {
            unreachable: HashSet::from(["u2".to_string()]),
        }))
        .build()
        .unwrap();
    player.set_playlist(playlist(&["u1", "u2", "u3"])).await.unwrap();
    let mut status = player.subscribe();

    let outcome = player.next().await.unwrap();

    assert!(matches!(outcome, LoadOutcome::Ready { index: 2, .. }));
    assert_eq!(platform.count_prefix("open:buffered:u2"), 0);
    assert!(drain(&mut status).contains(&PlayerStatus::Unreachable {
        index: 1,
        title: "Track 1".to_string()
    }));
}

#[tokio::test]
async fn test_previous_skips_backward() {
    let platform = MockPlatform::new();
    platform.fail_everywhere("u3");
    let visualizer = MockVisualizer::new();
    let player = player(&platform, &visualizer);
    player.set_playlist(playlist(&["u1", "u2", "u3"])).await.unwrap();

    let outcome = player.previous().await.unwrap();

    assert!(matches!(outcome, LoadOutcome::Ready { index: 1, .. }));
}

#[tokio::test]
async fn test_ended_event_advances_to_next_track() {
    let platform = MockPlatform::new();
    let visualizer = MockVisualizer::new();
    let player = player(&platform, &visualizer);
    let events = player.spawn_event_loop();

    player.set_playlist(playlist(&["u1", "u2"])).await.unwrap();
    player.play().await.unwrap();
    platform.last_ended().fire();

    platform.wait_for("play:buffered:u2").await;
    assert_eq!(player.current_index().await, 1);

    player.close().await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), events)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_ended_event_waits_for_event_loop() {
    let platform = MockPlatform::new();
    let player = player(&platform, &MockVisualizer::new());
    player.set_playlist(playlist(&["u1", "u2"])).await.unwrap();
    player.play().await.unwrap();
    platform.last_ended().fire();

    tokio::task::yield_now().await;
    assert_eq!(player.current_index().await, 0);

    let events = player.spawn_event_loop();
    platform.wait_for("play:buffered:u2").await;
    assert_eq!(player.current_index().await, 1);

    player.close().await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), events)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_stale_ended_event_is_ignored() {
    let platform = MockPlatform::new();
    let visualizer = MockVisualizer::new();
    let player = player(&platform, &visualizer);
    player.set_playlist(playlist(&["u1", "u2", "u3"])).await.unwrap();
    let stale = platform.last_ended();

    player.next().await.unwrap();
    let outcome = player
        .handle_event(PlayerEvent::Ended {
            generation: stale.generation(),
        })
        .await
        .unwrap();

    assert_eq!(outcome, None);
    assert_eq!(player.current_index().await, 1);
}

#[tokio::test]
async fn test_random_round_covers_every_track() {
    let platform = MockPlatform::new();
    let visualizer = MockVisualizer::new();
    let player = player(&platform, &visualizer);
    player.set_playlist(playlist(&["u1", "u2", "u3", "u4"])).await.unwrap();

    let mut seen = HashSet::new();
    for _ in 0..4 {
        match player.random().await.unwrap() {
            LoadOutcome::Ready { index, .. } => assert!(seen.insert(index)),
            other => panic!("Expected Ready, got {other:?}"),
        }
    }
    assert_eq!(seen.len(), 4);
}

#[tokio::test]
async fn test_pause_stop_and_replay() {
    let platform = MockPlatform::new();
    let visualizer = MockVisualizer::new();
    let player = player(&platform, &visualizer);
    player.set_playlist(playlist(&["u1", "u2"])).await.unwrap();

    player.toggle_play().await.unwrap();
    assert!(player.is_playing().await);
    player.toggle_play().await.unwrap();
    assert!(!player.is_playing().await);
    assert_eq!(platform.count("pause:buffered:u1"), 1);

    player.stop().await.unwrap();
    assert_eq!(player.current_backend().await, None);
    assert_eq!(platform.count("release:buffered:u1"), 1);

    // Sans session, play() recharge la piste courante
    player.play().await.unwrap();
    assert_eq!(platform.count("open:buffered:u1"), 2);
    assert!(player.is_playing().await);
}

#[tokio::test]
async fn test_play_resumes_suspended_output() {
    let platform = MockPlatform::new();
    platform.set_suspended(true);
    let visualizer = MockVisualizer::new();
    let player = player(&platform, &visualizer);
    player.set_playlist(playlist(&["u1"])).await.unwrap();

    player.play().await.unwrap();
    player.play().await.unwrap();

    assert_eq!(platform.resumes(), 1);
    assert!(player.is_playing().await);
}

#[tokio::test]
async fn test_close_releases_and_rejects_commands() {
    let platform = MockPlatform::new();
    let visualizer = MockVisualizer::new();
    let player = player(&platform, &visualizer);
    player.set_playlist(playlist(&["u1"])).await.unwrap();
    player.play().await.unwrap();
    let mut status = player.subscribe();

    player.close().await.unwrap();
    player.close().await.unwrap();

    assert_eq!(platform.count("release:buffered:u1"), 1);
    assert!(matches!(player.play().await, Err(PlayerError::Closed)));
    assert!(matches!(player.next().await, Err(PlayerError::Closed)));
    assert_eq!(drain(&mut status), vec![PlayerStatus::Closed]);
}

#[tokio::test]
async fn test_out_of_range_index_is_rejected() {
    let platform = MockPlatform::new();
    let visualizer = MockVisualizer::new();
    let player = player(&platform, &visualizer);
    player.set_playlist(playlist(&["u1"])).await.unwrap();

    let err = player.load_and_play(3).await.unwrap_err();
    assert!(matches!(err, PlayerError::IndexOutOfRange { index: 3, len: 1 }));
}
