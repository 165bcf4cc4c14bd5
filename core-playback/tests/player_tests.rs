//! End-to-end tests of the player facade over the simulated native player.
//!
//! This test suite verifies:
//! - Queue reconciliation and automatic advance
//! - Seek coalescing, clamping and blocked ranges
//! - Navigation (smart return, unavailable items, restart after stop)
//! - Resolution, trackers, idle timer leases and shutdown

use bridge_traits::{
    MediaCharacteristic, MediaOption, MediaTime, NativeError, NativeQueuePlayer,
    NativeSelectionGroup, Resource, ResourceMetadata, TimeRange,
};
use core_playback::simulation::{SeekMode, SimulatedMedia, SimulatedPlayer};
use core_playback::{
    resource_channel, ItemId, ItemState, MediaSelectionOption, PlaybackError, PlaybackState,
    Player, PlayerConfiguration, PlayerItem, PlayerProperties, SeekPosition, StreamType,
    TrackerAdapter,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, QueueEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Fixtures
// ============================================================================

fn secs(value: f64) -> MediaTime {
    MediaTime::from_seconds(value)
}

fn url(name: &str) -> String {
    format!("https://cdn.example.com/{name}.m3u8")
}

fn item(name: &str) -> PlayerItem {
    PlayerItem::from_url(name, url(name))
}

fn native(media: &[(&str, SimulatedMedia)]) -> Arc<SimulatedPlayer> {
    let native = Arc::new(SimulatedPlayer::new());
    for (name, media) in media {
        native.register_media(url(name), media.clone());
    }
    native
}

fn player(native: &Arc<SimulatedPlayer>) -> Player {
    player_with(native, PlayerConfiguration::default())
}

fn player_with(native: &Arc<SimulatedPlayer>, configuration: PlayerConfiguration) -> Player {
    let core = CoreConfig::builder()
        .native_player(native.clone())
        .build()
        .expect("core config");
    Player::new(core, configuration).expect("player")
}

async fn wait_until(player: &Player, predicate: impl Fn(&PlayerProperties) -> bool) -> PlayerProperties {
    let mut properties = player.watch();
    let matched = tokio::time::timeout(Duration::from_secs(5), properties.wait_for(|p| predicate(p)))
        .await
        .expect("timed out waiting for properties")
        .expect("player closed")
        .clone();
    matched
}

fn current(properties: &PlayerProperties) -> Option<&str> {
    properties.current_item.as_ref().map(ItemId::as_str)
}

#[derive(Default)]
struct RecordingTracker {
    calls: Mutex<Vec<&'static str>>,
}

impl RecordingTracker {
    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }
}

impl TrackerAdapter for RecordingTracker {
    fn enable(&self, _properties: &PlayerProperties) {
        self.calls.lock().push("enable");
    }

    fn update(&self, _properties: &PlayerProperties) {
        self.calls.lock().push("update");
    }

    fn disable(&self, _properties: &PlayerProperties) {
        self.calls.lock().push("disable");
    }
}

// ============================================================================
// Queue
// ============================================================================

#[tokio::test]
async fn test_first_item_becomes_current() {
    let native = native(&[("a", SimulatedMedia::on_demand(60.0)), ("b", SimulatedMedia::on_demand(60.0))]);
    let player = player(&native);

    player.set_items(vec![item("a"), item("b")]).await.unwrap();

    let properties = player.properties();
    assert_eq!(current(&properties), Some("a"));
    assert_eq!(properties.current_index, Some(0));
    assert_eq!(properties.next_items, vec![ItemId::new("b")]);
    assert_eq!(properties.item_state, ItemState::ReadyToPlay);
    assert_eq!(properties.stream_type, StreamType::OnDemand);
    assert_eq!(properties.playback_state, PlaybackState::Paused);
    assert_eq!(native.items().len(), 2);
}

#[tokio::test]
async fn test_current_item_survives_list_updates() {
    let names = ["a", "b", "c", "d"];
    let media: Vec<_> = names.iter().map(|n| (*n, SimulatedMedia::on_demand(60.0))).collect();
    let native = native(&media);
    let player = player(&native);
    player.set_items(names.iter().map(|n| item(n)).collect()).await.unwrap();
    player.set_current_item(ItemId::new("c")).await.unwrap();
    let playing = native.current_item();

    player
        .set_items(vec![item("d"), item("c"), item("a")])
        .await
        .unwrap();

    assert_eq!(native.current_item(), playing);
    let properties = player.properties();
    assert_eq!(current(&properties), Some("c"));
    assert_eq!(properties.current_index, Some(1));
    assert_eq!(properties.previous_items, vec![ItemId::new("d")]);
    assert_eq!(properties.next_items, vec![ItemId::new("a")]);
}

#[tokio::test]
async fn test_automatic_advance() {
    let native = native(&[("a", SimulatedMedia::on_demand(1.0)), ("b", SimulatedMedia::on_demand(60.0))]);
    let player = player(&native);
    player.set_items(vec![item("a"), item("b")]).await.unwrap();
    player.play().await.unwrap();

    native.play_to_end();

    let properties = wait_until(&player, |p| current(p) == Some("b")).await;
    assert_eq!(properties.current_index, Some(1));
    assert_eq!(properties.playback_state, PlaybackState::Playing);
    assert!(!matches!(properties.item_state, ItemState::Failed(_)));
}

#[tokio::test]
async fn test_end_of_last_item_stops_and_play_restarts() {
    let native = native(&[("a", SimulatedMedia::on_demand(10.0))]);
    let player = player(&native);
    let mut events = player.subscribe();
    player.set_items(vec![item("a")]).await.unwrap();
    player.play().await.unwrap();

    native.play_to_end();

    let properties = wait_until(&player, |p| p.playback_state == PlaybackState::Ended).await;
    assert_eq!(current(&properties), Some("a"));
    assert!(native.current_item().is_none());

    let mut stopped = false;
    while let Ok(event) = events.try_recv() {
        stopped |= matches!(
            event,
            CoreEvent::Queue(QueueEvent::Stopped { ref item_id }) if item_id == "a"
        );
    }
    assert!(stopped, "stop notification expected");

    player.play().await.unwrap();

    let properties = player.properties();
    assert_eq!(properties.playback_state, PlaybackState::Playing);
    assert_eq!(current(&properties), Some("a"));
    assert!(native.current_item().is_some());
}

#[tokio::test]
async fn test_unavailable_item_is_reached_and_left() {
    let native = native(&[
        ("a", SimulatedMedia::on_demand(5.0)),
        ("b", SimulatedMedia::on_demand(5.0)),
        ("d", SimulatedMedia::on_demand(5.0)),
    ]);
    let player = player(&native);
    let unavailable = PlayerItem::unavailable("c", NativeError::new("ContentDomain", 404));
    player
        .set_items(vec![item("a"), item("b"), unavailable])
        .await
        .unwrap();
    player.play().await.unwrap();

    native.play_to_end();
    wait_until(&player, |p| current(p) == Some("b")).await;
    native.play_to_end();

    let properties = wait_until(&player, |p| current(p) == Some("c")).await;
    match &properties.item_state {
        ItemState::Failed(error) => assert_eq!(error.code, 404),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(matches!(properties.playback_state, PlaybackState::Failed(_)));

    assert!(player.append(item("d")).await.unwrap());
    assert!(player.advance_to_next_item().await.unwrap());

    let properties = wait_until(&player, |p| current(p) == Some("d")).await;
    assert_eq!(properties.item_state, ItemState::ReadyToPlay);
    assert_eq!(properties.current_index, Some(3));
}

#[tokio::test]
async fn test_list_edits() {
    let native = native(&[("a", SimulatedMedia::on_demand(5.0)), ("b", SimulatedMedia::on_demand(5.0))]);
    let player = player(&native);
    player.set_items(vec![item("a")]).await.unwrap();

    assert!(!player.append(item("a")).await.unwrap());
    assert!(player
        .insert(item("b"), core_playback::InsertPosition::Before(Some(ItemId::new("a"))))
        .await
        .unwrap());
    assert_eq!(player.properties().items, vec![ItemId::new("b"), ItemId::new("a")]);
    assert_eq!(current(&player.properties()), Some("a"));

    assert!(player.remove(ItemId::new("a")).await.unwrap());
    assert_eq!(current(&player.properties()), Some("b"));

    player.remove_all_items().await.unwrap();
    let properties = player.properties();
    assert!(properties.items.is_empty());
    assert_eq!(properties.playback_state, PlaybackState::Idle);
    assert!(native.items().is_empty());
}

// ============================================================================
// Seeking
// ============================================================================

#[tokio::test]
async fn test_seek_beyond_end_is_clamped() {
    let native = native(&[("a", SimulatedMedia::on_demand(120.0))]);
    let player = player(&native);
    player.set_items(vec![item("a")]).await.unwrap();

    let finished = player.seek(SeekPosition::to(secs(600.0)), false).await.unwrap();

    assert!(finished);
    assert_eq!(native.current_time(), secs(120.0));
}

#[tokio::test]
async fn test_invalid_seek_is_rejected() {
    let native = native(&[("a", SimulatedMedia::on_demand(120.0))]);
    let player = player(&native);
    player.set_items(vec![item("a")]).await.unwrap();

    let result = player.seek(SeekPosition::to(MediaTime::INVALID), false).await;

    assert!(matches!(result, Err(PlaybackError::InvalidArgument(_))));
    assert!(native.issued_seeks().is_empty());
}

#[tokio::test]
async fn test_overlapping_seeks_coalesce() {
    let native = native(&[("a", SimulatedMedia::on_demand(120.0))]);
    native.set_seek_mode(SeekMode::Manual);
    let player = player(&native);
    player.set_items(vec![item("a")]).await.unwrap();

    let results = Arc::new(Mutex::new(Vec::new()));
    for (tag, target) in [(1, 10.0), (2, 20.0), (3, 30.0)] {
        let results = results.clone();
        player
            .seek_with_completion(SeekPosition::to(secs(target)), false, move |finished| {
                results.lock().push((tag, finished));
            })
            .unwrap();
    }
    let properties = wait_until(&player, |p| p.seek_target == Some(secs(30.0))).await;
    assert!(properties.is_seeking);
    assert_eq!(properties.displayed_time(), secs(30.0));

    native.complete_pending_seek(true);

    wait_until(&player, |p| !p.is_seeking).await;
    assert_eq!(*results.lock(), vec![(1, false), (2, false), (3, true)]);
    assert_eq!(native.current_time(), secs(30.0));
}

#[tokio::test]
async fn test_seek_skips_blocked_range() {
    let native = native(&[("a", SimulatedMedia::on_demand(120.0))]);
    let player = player(&native);
    let resource = Resource::new(url("a")).with_metadata(ResourceMetadata {
        blocked_time_ranges: vec![TimeRange::from_bounds(secs(10.0), secs(20.0))],
        ..Default::default()
    });
    player
        .set_items(vec![PlayerItem::from_resource("a", resource)])
        .await
        .unwrap();

    assert!(player.seek(SeekPosition::near(secs(15.0)), false).await.unwrap());

    let issued = native.issued_seeks();
    assert_eq!(issued[0].target, secs(20.0));
    assert_eq!(issued[0].tolerance_before, MediaTime::ZERO);
    assert_eq!(native.current_time(), secs(20.0));
}

#[tokio::test]
async fn test_seeks_cancelled_when_current_item_changes() {
    let native = native(&[("a", SimulatedMedia::on_demand(60.0)), ("b", SimulatedMedia::on_demand(60.0))]);
    native.set_seek_mode(SeekMode::Manual);
    let player = player(&native);
    player.set_items(vec![item("a"), item("b")]).await.unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel();
    player
        .seek_with_completion(SeekPosition::to(secs(30.0)), false, move |finished| {
            let _ = tx.send(finished);
        })
        .unwrap();
    wait_until(&player, |p| p.is_seeking).await;

    assert!(player.advance_to_next_item().await.unwrap());

    let finished = tokio::time::timeout(Duration::from_secs(5), rx).await.unwrap().unwrap();
    assert!(!finished);
    let properties = wait_until(&player, |p| !p.is_seeking).await;
    assert_eq!(current(&properties), Some("b"));
}

// ============================================================================
// Navigation
// ============================================================================

#[tokio::test]
async fn test_smart_return_restarts_or_goes_back() {
    let native = native(&[("a", SimulatedMedia::on_demand(60.0)), ("b", SimulatedMedia::on_demand(60.0))]);
    let player = player(&native);
    player.set_items(vec![item("a"), item("b")]).await.unwrap();
    assert!(player.advance_to_next_item().await.unwrap());

    native.set_position(secs(5.0));
    assert!(player.return_to_previous_item().await.unwrap());
    assert_eq!(current(&player.properties()), Some("b"));
    assert_eq!(native.current_time(), MediaTime::ZERO);

    native.set_position(secs(1.0));
    assert!(player.return_to_previous_item().await.unwrap());
    assert_eq!(current(&player.properties()), Some("a"));
}

#[tokio::test]
async fn test_immediate_return_goes_back() {
    let native = native(&[("a", SimulatedMedia::on_demand(60.0)), ("b", SimulatedMedia::on_demand(60.0))]);
    let player = player_with(&native, PlayerConfiguration::immediate_navigation());
    player.set_items(vec![item("a"), item("b")]).await.unwrap();
    player.set_current_item(ItemId::new("b")).await.unwrap();
    native.set_position(secs(30.0));

    assert!(player.can_return_to_previous_item());
    assert!(player.return_to_previous_item().await.unwrap());

    assert_eq!(current(&player.properties()), Some("a"));
}

#[tokio::test]
async fn test_live_stream_navigation() {
    let native = native(&[("live", SimulatedMedia::live())]);
    let player = player(&native);
    player.set_items(vec![item("live")]).await.unwrap();

    assert_eq!(player.properties().stream_type, StreamType::Live);
    assert!(!player.can_skip_forward());
    assert!(!player.can_restart());
    assert!(!player.can_return_to_previous_item());
    assert!(!player.skip_forward().await.unwrap());
    assert!(!player.return_to_previous_item().await.unwrap());
}

#[tokio::test]
async fn test_skip_moves_by_interval() {
    let native = native(&[("a", SimulatedMedia::on_demand(60.0))]);
    let player = player(&native);
    player.set_items(vec![item("a")]).await.unwrap();
    native.set_position(secs(30.0));

    assert!(player.skip_forward().await.unwrap());
    let properties = wait_until(&player, |p| !p.is_seeking).await;
    assert_eq!(properties.time, secs(40.0));

    assert!(player.skip_backward().await.unwrap());
    wait_until(&player, |p| !p.is_seeking).await;
    assert_eq!(native.current_time(), secs(30.0));
}

// ============================================================================
// Resolution, trackers & lifecycle
// ============================================================================

#[tokio::test]
async fn test_late_resolution_replaces_placeholder() {
    let native = native(&[("a", SimulatedMedia::on_demand(60.0))]);
    let player = player(&native);
    let (sender, resolver) = resource_channel();
    player
        .set_items(vec![PlayerItem::new("a", Arc::new(resolver))])
        .await
        .unwrap();

    let properties = player.properties();
    assert_eq!(current(&properties), Some("a"));
    assert_eq!(properties.item_state, ItemState::Unknown);

    sender.send(Ok(Resource::new(url("a"))));

    let properties = wait_until(&player, |p| p.item_state == ItemState::ReadyToPlay).await;
    assert_eq!(properties.stream_type, StreamType::OnDemand);
}

#[tokio::test]
async fn test_trackers_follow_current_item() {
    let native = native(&[("a", SimulatedMedia::on_demand(60.0)), ("b", SimulatedMedia::on_demand(60.0))]);
    let player = player(&native);
    let tracker = Arc::new(RecordingTracker::default());
    player
        .set_items(vec![item("a").with_tracker(tracker.clone()), item("b")])
        .await
        .unwrap();
    player.play().await.unwrap();

    assert!(player.advance_to_next_item().await.unwrap());

    let calls = tracker.calls();
    assert_eq!(calls.first(), Some(&"enable"));
    assert_eq!(calls.last(), Some(&"disable"));
    assert_eq!(calls.iter().filter(|call| **call == "enable").count(), 1);
    assert_eq!(calls.iter().filter(|call| **call == "disable").count(), 1);
}

#[tokio::test]
async fn test_idle_timer_lease_while_playing() {
    let native = native(&[("a", SimulatedMedia::on_demand(60.0))]);
    let player = player(&native);
    player.set_items(vec![item("a")]).await.unwrap();

    player.play().await.unwrap();
    assert!(player.idle_timer().is_idle_timer_disabled());

    player.toggle_play_pause().await.unwrap();
    assert_eq!(player.properties().playback_state, PlaybackState::Paused);
    assert!(!player.idle_timer().is_idle_timer_disabled());
}

#[tokio::test]
async fn test_media_selection() {
    let english = MediaOption {
        id: "en".to_string(),
        display_name: "English".to_string(),
        language: Some("en".to_string()),
    };
    let media = SimulatedMedia::on_demand(60.0).with_media_selection(vec![NativeSelectionGroup {
        characteristic: MediaCharacteristic::Legible,
        options: vec![english.clone()],
        selected: None,
        allows_empty_selection: true,
    }]);
    let native = native(&[("a", media)]);
    let player = player(&native);
    player.set_items(vec![item("a")]).await.unwrap();
    assert_eq!(
        player.selected_media_option(MediaCharacteristic::Legible),
        Some(MediaSelectionOption::Off)
    );

    player
        .select_media_option(MediaCharacteristic::Legible, MediaSelectionOption::Automatic)
        .await
        .unwrap();
    assert_eq!(
        player.selected_media_option(MediaCharacteristic::Legible),
        Some(MediaSelectionOption::Automatic)
    );

    player
        .select_media_option(MediaCharacteristic::Legible, MediaSelectionOption::On(english.clone()))
        .await
        .unwrap();
    assert_eq!(
        player.selected_media_option(MediaCharacteristic::Legible),
        Some(MediaSelectionOption::On(english))
    );

    let result = player
        .select_media_option(MediaCharacteristic::Audible, MediaSelectionOption::Off)
        .await;
    assert!(matches!(result, Err(PlaybackError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_shutdown_closes_player() {
    let native = native(&[("a", SimulatedMedia::on_demand(60.0))]);
    let player = player(&native);
    player.set_items(vec![item("a")]).await.unwrap();
    player.play().await.unwrap();

    player.shutdown().await.unwrap();

    assert!(native.items().is_empty());
    assert_eq!(native.rate(), 0.0);
    assert!(!player.idle_timer().is_idle_timer_disabled());
    assert!(matches!(player.play().await, Err(PlaybackError::PlayerClosed)));
}
