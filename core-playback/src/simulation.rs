//! # Simulated Native Player
//!
//! A deterministic [`NativeQueuePlayer`] for headless hosts and tests.
//!
//! Queue semantics follow the platform queue players: the first queued item
//! is current, removing or advancing past it makes the next one current, and
//! an item that plays to its end leaves the queue. A new seek preempts the
//! one in flight, which completes with `finished = false`.
//!
//! Media is registered by URL. Items whose URL was registered become ready
//! as soon as they are created; unregistered URLs and placeholders stay in
//! the unknown state. Playback time does not advance on its own; use
//! [`SimulatedPlayer::set_position`] and [`SimulatedPlayer::play_to_end`].

use crate::time::clamp_to_range;
use bridge_traits::{
    error::Result as BridgeResult, BridgeError, ErrorLogEvent, MediaCharacteristic, MediaTime,
    NativeAsset, NativeError, NativeEvent, NativeItemId, NativeItemSnapshot, NativeItemStatus,
    NativeQueuePlayer, NativeSeek, NativeSeekId, NativeSelectionGroup, TimeRange,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::trace;

const EVENT_CAPACITY: usize = 1024;

/// How issued seeks complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekMode {
    /// Seeks complete as soon as they are issued.
    #[default]
    Automatic,
    /// Seeks stay in flight until [`SimulatedPlayer::complete_pending_seek`].
    Manual,
}

/// Description of a playable resource.
#[derive(Debug, Clone)]
pub struct SimulatedMedia {
    duration: MediaTime,
    seekable: Vec<TimeRange>,
    failure: Option<NativeError>,
    media_selection: Vec<NativeSelectionGroup>,
}

impl SimulatedMedia {
    /// On-demand media of the given length.
    pub fn on_demand(seconds: f64) -> Self {
        let duration = MediaTime::from_seconds(seconds);
        Self {
            duration,
            seekable: vec![TimeRange::new(MediaTime::ZERO, duration)],
            failure: None,
            media_selection: Vec::new(),
        }
    }

    /// Live stream without a seekable window.
    pub fn live() -> Self {
        Self {
            duration: MediaTime::INDEFINITE,
            seekable: Vec::new(),
            failure: None,
            media_selection: Vec::new(),
        }
    }

    /// Live stream with a seekable window of `window_seconds`.
    pub fn dvr(window_seconds: f64) -> Self {
        Self {
            duration: MediaTime::INDEFINITE,
            seekable: vec![TimeRange::new(
                MediaTime::ZERO,
                MediaTime::from_seconds(window_seconds),
            )],
            failure: None,
            media_selection: Vec::new(),
        }
    }

    /// Media that fails to load with `error`.
    pub fn failing(error: NativeError) -> Self {
        Self {
            duration: MediaTime::INVALID,
            seekable: Vec::new(),
            failure: Some(error),
            media_selection: Vec::new(),
        }
    }

    pub fn with_media_selection(mut self, groups: Vec<NativeSelectionGroup>) -> Self {
        self.media_selection = groups;
        self
    }
}

struct SimulatedItem {
    asset: NativeAsset,
    snapshot: NativeItemSnapshot,
    position: MediaTime,
}

#[derive(Default)]
struct State {
    media: HashMap<String, SimulatedMedia>,
    items: HashMap<NativeItemId, SimulatedItem>,
    created: Vec<NativeItemId>,
    queue: Vec<NativeItemId>,
    rate: f32,
    muted: bool,
    allows_external_playback: bool,
    external_playback_active: bool,
    seek_mode: SeekMode,
    pending_seek: Option<NativeSeek>,
    issued_seeks: Vec<NativeSeek>,
    failing_seeks: u32,
    next_item: u64,
}

impl State {
    fn current(&self) -> Option<NativeItemId> {
        self.queue.first().copied()
    }

    fn is_known(&self, item: NativeItemId) -> BridgeResult<()> {
        if self.items.contains_key(&item) {
            Ok(())
        } else {
            Err(BridgeError::UnknownItem(item))
        }
    }

    fn is_queued(&self, item: NativeItemId) -> BridgeResult<usize> {
        self.queue
            .iter()
            .position(|queued| *queued == item)
            .ok_or(BridgeError::UnknownItem(item))
    }

    /// Completes the seek in flight as interrupted.
    fn interrupt_seek(&mut self, events: &mut Vec<NativeEvent>) {
        if let Some(seek) = self.pending_seek.take() {
            events.push(NativeEvent::SeekCompleted {
                seek: seek.id,
                finished: false,
            });
        }
    }

    /// Records a change of the current item.
    fn current_changed(&mut self, events: &mut Vec<NativeEvent>) {
        self.interrupt_seek(events);
        if self.queue.is_empty() {
            self.rate = 0.0;
        }
        events.push(NativeEvent::CurrentItemChanged {
            item: self.current(),
        });
    }

    fn land_seek(&mut self, seek: &NativeSeek) {
        let Some(current) = self.current() else {
            return;
        };
        if let Some(item) = self.items.get_mut(&current) {
            let seekable = TimeRange::union(&item.snapshot.seekable_time_ranges);
            item.position = clamp_to_range(seek.target, &seekable);
            item.snapshot.played_to_end = false;
        }
    }

    fn snapshot_for(&self, asset: &NativeAsset) -> NativeItemSnapshot {
        let Some(resource) = asset.resource() else {
            return NativeItemSnapshot::default();
        };
        let Some(media) = self.media.get(&resource.url) else {
            return NativeItemSnapshot::default();
        };
        match &media.failure {
            Some(error) => NativeItemSnapshot {
                status: NativeItemStatus::Failed,
                error: Some(error.clone()),
                ..Default::default()
            },
            None => NativeItemSnapshot {
                status: NativeItemStatus::ReadyToPlay,
                duration: media.duration,
                seekable_time_ranges: media.seekable.clone(),
                loaded_time_ranges: media.seekable.clone(),
                is_playback_likely_to_keep_up: true,
                media_selection: media.media_selection.clone(),
                ..Default::default()
            },
        }
    }
}

/// In-memory native queue player.
pub struct SimulatedPlayer {
    state: Mutex<State>,
    events: broadcast::Sender<NativeEvent>,
}

impl SimulatedPlayer {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(State {
                allows_external_playback: true,
                ..Default::default()
            }),
            events,
        }
    }

    /// Runs `change` under the lock and publishes the events it produced
    /// once the lock is released.
    fn mutate<R>(&self, change: impl FnOnce(&mut State, &mut Vec<NativeEvent>) -> R) -> R {
        let mut events = Vec::new();
        let result = {
            let mut state = self.state.lock();
            change(&mut state, &mut events)
        };
        for event in events {
            trace!(?event, "Simulated native event");
            // Nobody listening is fine.
            let _ = self.events.send(event);
        }
        result
    }

    // ------------------------------------------------------------------------
    // Setup
    // ------------------------------------------------------------------------

    /// Makes `url` playable as `media` for items created from now on.
    pub fn register_media(&self, url: impl Into<String>, media: SimulatedMedia) {
        self.state.lock().media.insert(url.into(), media);
    }

    pub fn set_seek_mode(&self, mode: SeekMode) {
        self.state.lock().seek_mode = mode;
    }

    /// The next `count` seeks complete as not finished.
    pub fn fail_next_seeks(&self, count: u32) {
        self.state.lock().failing_seeks = count;
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    /// Every item ever created, in creation order.
    pub fn created_items(&self) -> Vec<NativeItemId> {
        self.state.lock().created.clone()
    }

    /// Every seek issued so far, in order.
    pub fn issued_seeks(&self) -> Vec<NativeSeek> {
        self.state.lock().issued_seeks.clone()
    }

    pub fn pending_seek(&self) -> Option<NativeSeek> {
        self.state.lock().pending_seek
    }

    pub fn asset(&self, item: NativeItemId) -> Option<NativeAsset> {
        self.state.lock().items.get(&item).map(|item| item.asset.clone())
    }

    // ------------------------------------------------------------------------
    // Driving playback
    // ------------------------------------------------------------------------

    /// Completes the seek in flight. Returns its identifier.
    pub fn complete_pending_seek(&self, finished: bool) -> Option<NativeSeekId> {
        self.mutate(|state, events| -> Option<NativeSeekId> {
            let seek = state.pending_seek.take()?;
            if finished {
                state.land_seek(&seek);
            }
            events.push(NativeEvent::SeekCompleted {
                seek: seek.id,
                finished,
            });
            Some(seek.id)
        })
    }

    /// Plays the current item to its end, then advances the queue.
    pub fn play_to_end(&self) -> Option<NativeItemId> {
        self.mutate(|state, events| -> Option<NativeItemId> {
            let current = state.current()?;
            if let Some(item) = state.items.get_mut(&current) {
                item.snapshot.played_to_end = true;
                if item.snapshot.duration.is_numeric() {
                    item.position = item.snapshot.duration;
                }
            }
            events.push(NativeEvent::ItemDidPlayToEnd { item: current });
            state.queue.remove(0);
            state.current_changed(events);
            Some(current)
        })
    }

    /// Moves the play head of the current item.
    pub fn set_position(&self, time: MediaTime) {
        let mut state = self.state.lock();
        if let Some(current) = state.current() {
            if let Some(item) = state.items.get_mut(&current) {
                item.position = time;
            }
        }
    }

    pub fn set_item_status(&self, item: NativeItemId, status: NativeItemStatus) {
        self.mutate(|state, events| {
            if let Some(entry) = state.items.get_mut(&item) {
                entry.snapshot.status = status;
                events.push(NativeEvent::ItemStatusChanged { item, status });
            }
        });
    }

    /// Fails `item` with `error` reported through the item itself.
    pub fn fail_item(&self, item: NativeItemId, error: NativeError) {
        self.mutate(|state, events| {
            if let Some(entry) = state.items.get_mut(&item) {
                entry.snapshot.status = NativeItemStatus::Failed;
                entry.snapshot.error = Some(error.clone());
                events.push(NativeEvent::ItemStatusChanged {
                    item,
                    status: NativeItemStatus::Failed,
                });
                events.push(NativeEvent::ItemFailedToPlayToEnd { item, error });
            }
        });
    }

    pub fn add_error_log(&self, item: NativeItemId, event: ErrorLogEvent) {
        self.mutate(|state, events| {
            if let Some(entry) = state.items.get_mut(&item) {
                entry.snapshot.error_log.push(event.clone());
                events.push(NativeEvent::ErrorLogEntryAdded { item, event });
            }
        });
    }

    /// Reports `error` through the resource-loading path.
    pub fn report_resource_loading_error(&self, item: NativeItemId, error: NativeError) {
        self.mutate(|_, events| {
            events.push(NativeEvent::ResourceLoadingFailed { item, error });
        });
    }

    pub fn set_buffering(&self, item: NativeItemId, likely_to_keep_up: bool, buffer_empty: bool) {
        self.mutate(|state, events| {
            if let Some(entry) = state.items.get_mut(&item) {
                entry.snapshot.is_playback_likely_to_keep_up = likely_to_keep_up;
                entry.snapshot.is_playback_buffer_empty = buffer_empty;
                events.push(NativeEvent::BufferingChanged { item });
            }
        });
    }

    pub fn set_seekable_time_ranges(&self, item: NativeItemId, ranges: Vec<TimeRange>) {
        self.mutate(|state, events| {
            if let Some(entry) = state.items.get_mut(&item) {
                entry.snapshot.seekable_time_ranges = ranges.clone();
                entry.snapshot.loaded_time_ranges = ranges;
                events.push(NativeEvent::TimeRangesChanged { item });
            }
        });
    }

    pub fn set_media_selection(&self, item: NativeItemId, groups: Vec<NativeSelectionGroup>) {
        self.mutate(|state, events| {
            if let Some(entry) = state.items.get_mut(&item) {
                entry.snapshot.media_selection = groups;
                events.push(NativeEvent::MediaSelectionChanged { item });
            }
        });
    }

    pub fn set_external_playback_active(&self, active: bool) {
        self.mutate(|state, events| {
            state.external_playback_active = active && state.allows_external_playback;
            events.push(NativeEvent::ExternalPlaybackChanged {
                active: state.external_playback_active,
            });
        });
    }
}

impl Default for SimulatedPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimulatedPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SimulatedPlayer")
            .field("queue", &state.queue)
            .field("rate", &state.rate)
            .field("pending_seek", &state.pending_seek)
            .finish()
    }
}

impl NativeQueuePlayer for SimulatedPlayer {
    fn create_item(&self, asset: NativeAsset) -> NativeItemId {
        let mut state = self.state.lock();
        state.next_item += 1;
        let id = NativeItemId::new(state.next_item);
        let snapshot = state.snapshot_for(&asset);
        let position = asset
            .resource()
            .and_then(|resource| resource.configuration.start_time)
            .unwrap_or(MediaTime::ZERO);
        state.items.insert(
            id,
            SimulatedItem {
                asset,
                snapshot,
                position,
            },
        );
        state.created.push(id);
        id
    }

    fn items(&self) -> Vec<NativeItemId> {
        self.state.lock().queue.clone()
    }

    fn current_item(&self) -> Option<NativeItemId> {
        self.state.lock().current()
    }

    fn insert(&self, item: NativeItemId, after: Option<NativeItemId>) -> BridgeResult<()> {
        self.mutate(|state, events| -> BridgeResult<()> {
            state.is_known(item)?;
            if state.queue.contains(&item) {
                return Err(BridgeError::AlreadyEnqueued(item));
            }
            let index = match after {
                Some(after) => state.is_queued(after)? + 1,
                None => state.queue.len(),
            };
            state.queue.insert(index, item);
            events.push(NativeEvent::ItemsChanged);
            if index == 0 {
                state.current_changed(events);
            }
            Ok(())
        })
    }

    fn remove(&self, item: NativeItemId) -> BridgeResult<()> {
        self.mutate(|state, events| -> BridgeResult<()> {
            let index = state.is_queued(item)?;
            state.queue.remove(index);
            events.push(NativeEvent::ItemsChanged);
            if index == 0 {
                state.current_changed(events);
            }
            Ok(())
        })
    }

    fn remove_all_items(&self) {
        self.mutate(|state, events| {
            if state.queue.is_empty() {
                return;
            }
            state.queue.clear();
            events.push(NativeEvent::ItemsChanged);
            state.current_changed(events);
        });
    }

    fn replace_item(&self, old: NativeItemId, new: NativeItemId) -> BridgeResult<()> {
        self.mutate(|state, events| -> BridgeResult<()> {
            state.is_known(new)?;
            if state.queue.contains(&new) {
                return Err(BridgeError::AlreadyEnqueued(new));
            }
            let index = state.is_queued(old)?;
            state.queue[index] = new;
            events.push(NativeEvent::ItemsChanged);
            if index == 0 {
                state.current_changed(events);
            }
            Ok(())
        })
    }

    fn advance_to_next_item(&self) {
        self.mutate(|state, events| {
            if state.queue.is_empty() {
                return;
            }
            state.queue.remove(0);
            events.push(NativeEvent::ItemsChanged);
            state.current_changed(events);
        });
    }

    fn seek(&self, seek: NativeSeek) {
        self.mutate(|state, events| {
            state.issued_seeks.push(seek);
            state.interrupt_seek(events);
            if state.current().is_none() {
                events.push(NativeEvent::SeekCompleted {
                    seek: seek.id,
                    finished: false,
                });
                return;
            }
            match state.seek_mode {
                SeekMode::Manual => state.pending_seek = Some(seek),
                SeekMode::Automatic => {
                    let finished = if state.failing_seeks > 0 {
                        state.failing_seeks -= 1;
                        false
                    } else {
                        state.land_seek(&seek);
                        true
                    };
                    events.push(NativeEvent::SeekCompleted {
                        seek: seek.id,
                        finished,
                    });
                }
            }
        });
    }

    fn current_time(&self) -> MediaTime {
        let state = self.state.lock();
        state
            .current()
            .and_then(|current| state.items.get(&current))
            .map(|item| item.position)
            .unwrap_or(MediaTime::INVALID)
    }

    fn item_snapshot(&self, item: NativeItemId) -> Option<NativeItemSnapshot> {
        self.state
            .lock()
            .items
            .get(&item)
            .map(|item| item.snapshot.clone())
    }

    fn play(&self) {
        self.set_rate(1.0);
    }

    fn pause(&self) {
        self.set_rate(0.0);
    }

    fn rate(&self) -> f32 {
        self.state.lock().rate
    }

    fn set_rate(&self, rate: f32) {
        self.mutate(|state, events| {
            if state.rate != rate {
                state.rate = rate;
                events.push(NativeEvent::RateChanged { rate });
            }
        });
    }

    fn set_muted(&self, muted: bool) {
        self.mutate(|state, events| {
            if state.muted != muted {
                state.muted = muted;
                events.push(NativeEvent::MuteChanged { muted });
            }
        });
    }

    fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    fn set_allows_external_playback(&self, allowed: bool) {
        self.mutate(|state, events| {
            state.allows_external_playback = allowed;
            if !allowed && state.external_playback_active {
                state.external_playback_active = false;
                events.push(NativeEvent::ExternalPlaybackChanged { active: false });
            }
        });
    }

    fn is_external_playback_active(&self) -> bool {
        self.state.lock().external_playback_active
    }

    fn select_media_option(
        &self,
        item: NativeItemId,
        characteristic: MediaCharacteristic,
        option: Option<String>,
    ) -> BridgeResult<()> {
        self.mutate(|state, events| -> BridgeResult<()> {
            let entry = state
                .items
                .get_mut(&item)
                .ok_or(BridgeError::UnknownItem(item))?;
            let group = entry
                .snapshot
                .media_selection
                .iter_mut()
                .find(|group| group.characteristic == characteristic)
                .ok_or_else(|| {
                    BridgeError::OperationFailed(format!("no {characteristic:?} options"))
                })?;
            if let Some(id) = &option {
                if !group.options.iter().any(|candidate| &candidate.id == id) {
                    return Err(BridgeError::OperationFailed(format!("unknown option {id}")));
                }
            } else if !group.allows_empty_selection && characteristic == MediaCharacteristic::Audible {
                return Err(BridgeError::OperationFailed(
                    "selection cannot be cleared".to_string(),
                ));
            }
            group.selected = option;
            events.push(NativeEvent::MediaSelectionChanged { item });
            Ok(())
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<NativeEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::Resource;

    fn secs(value: f64) -> MediaTime {
        MediaTime::from_seconds(value)
    }

    fn player() -> SimulatedPlayer {
        let player = SimulatedPlayer::new();
        player.register_media("https://cdn/a.mp4", SimulatedMedia::on_demand(60.0));
        player.register_media("https://cdn/b.mp4", SimulatedMedia::on_demand(30.0));
        player
    }

    fn item(player: &SimulatedPlayer, url: &str) -> NativeItemId {
        player.create_item(NativeAsset::Resource(Resource::new(url)))
    }

    fn drain(receiver: &mut broadcast::Receiver<NativeEvent>) -> Vec<NativeEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_queue_semantics() {
        let player = player();
        let mut receiver = player.subscribe();
        let a = item(&player, "https://cdn/a.mp4");
        let b = item(&player, "https://cdn/b.mp4");

        player.insert(a, None).unwrap();
        player.insert(b, Some(a)).unwrap();
        assert_eq!(player.current_item(), Some(a));
        assert!(matches!(player.insert(a, None), Err(BridgeError::AlreadyEnqueued(_))));
        assert!(matches!(
            player.insert(NativeItemId::new(99), None),
            Err(BridgeError::UnknownItem(_))
        ));

        let events = drain(&mut receiver);
        assert!(events
            .iter()
            .any(|event| matches!(event, NativeEvent::CurrentItemChanged { item: Some(item) } if *item == a)));

        player.advance_to_next_item();
        assert_eq!(player.items(), vec![b]);
    }

    #[test]
    fn test_item_status_from_registration() {
        let player = player();
        let ready = item(&player, "https://cdn/a.mp4");
        let unknown = item(&player, "https://cdn/unregistered.mp4");
        let placeholder = player.create_item(NativeAsset::Loading);

        assert_eq!(
            player.item_snapshot(ready).map(|s| s.status),
            Some(NativeItemStatus::ReadyToPlay)
        );
        assert_eq!(
            player.item_snapshot(unknown).map(|s| s.status),
            Some(NativeItemStatus::Unknown)
        );
        let snapshot = player.item_snapshot(placeholder).unwrap();
        assert!(!snapshot.duration.is_valid());
        assert!(snapshot.seekable_time_ranges.is_empty());
    }

    #[test]
    fn test_seek_preemption_in_manual_mode() {
        let player = player();
        player.set_seek_mode(SeekMode::Manual);
        let a = item(&player, "https://cdn/a.mp4");
        player.insert(a, None).unwrap();
        let mut receiver = player.subscribe();

        let seek = |id: u64, target: f64| NativeSeek {
            id: NativeSeekId::new(id),
            target: secs(target),
            tolerance_before: MediaTime::ZERO,
            tolerance_after: MediaTime::ZERO,
        };
        player.seek(seek(1, 10.0));
        player.seek(seek(2, 90.0));
        assert_eq!(player.complete_pending_seek(true), Some(NativeSeekId::new(2)));

        let completions: Vec<(u64, bool)> = drain(&mut receiver)
            .into_iter()
            .filter_map(|event| match event {
                NativeEvent::SeekCompleted { seek, finished } => Some((seek.raw(), finished)),
                _ => None,
            })
            .collect();
        assert_eq!(completions, vec![(1, false), (2, true)]);
        assert_eq!(player.current_time(), secs(60.0));
    }

    #[test]
    fn test_play_to_end_of_last_item_stops() {
        let player = player();
        let a = item(&player, "https://cdn/a.mp4");
        player.insert(a, None).unwrap();
        player.play();

        assert_eq!(player.play_to_end(), Some(a));

        assert!(player.current_item().is_none());
        assert_eq!(player.rate(), 0.0);
        assert!(player.item_snapshot(a).is_some_and(|s| s.played_to_end));
    }

    #[test]
    fn test_replace_current_reloads() {
        let player = player();
        let a = item(&player, "https://cdn/a.mp4");
        let b = item(&player, "https://cdn/b.mp4");
        player.insert(a, None).unwrap();
        let mut receiver = player.subscribe();

        player.replace_item(a, b).unwrap();

        assert_eq!(player.current_item(), Some(b));
        assert!(drain(&mut receiver)
            .iter()
            .any(|event| matches!(event, NativeEvent::CurrentItemChanged { .. })));
    }

    #[test]
    fn test_media_selection() {
        let player = SimulatedPlayer::new();
        player.register_media(
            "https://cdn/a.mp4",
            SimulatedMedia::on_demand(10.0).with_media_selection(vec![NativeSelectionGroup {
                characteristic: MediaCharacteristic::Legible,
                options: vec![bridge_traits::MediaOption {
                    id: "en".to_string(),
                    display_name: "English".to_string(),
                    language: Some("en".to_string()),
                }],
                selected: None,
                allows_empty_selection: true,
            }]),
        );
        let a = item(&player, "https://cdn/a.mp4");

        player
            .select_media_option(a, MediaCharacteristic::Legible, Some("en".to_string()))
            .unwrap();
        assert!(player
            .select_media_option(a, MediaCharacteristic::Legible, Some("xx".to_string()))
            .is_err());
        assert!(player
            .select_media_option(a, MediaCharacteristic::Audible, None)
            .is_err());

        let selected = player.item_snapshot(a).unwrap().media_selection[0].selected.clone();
        assert_eq!(selected.as_deref(), Some("en"));
    }
}
