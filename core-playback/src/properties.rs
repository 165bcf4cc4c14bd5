//! Observable player properties.
//!
//! [`PlayerProperties`] is an immutable snapshot recomputed by the player
//! actor after every command and native notification.

use crate::asset::ItemId;
use crate::item_state::{ItemError, ItemState};
use crate::media_selection::MediaSelection;
use crate::stream::StreamType;
use bridge_traits::{MediaTime, NativeItemSnapshot, TimeRange};
use serde::{Deserialize, Serialize};

/// Overall playback condition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum PlaybackState {
    /// No current item.
    #[default]
    Idle,
    Playing,
    Paused,
    Ended,
    Failed(ItemError),
}

impl PlaybackState {
    /// Derives the playback state from the current item state and rate.
    pub fn derive(has_current: bool, item_state: &ItemState, rate: f32) -> Self {
        if !has_current {
            return PlaybackState::Idle;
        }
        match item_state {
            ItemState::Failed(error) => PlaybackState::Failed(error.clone()),
            ItemState::Ended => PlaybackState::Ended,
            _ if rate > 0.0 => PlaybackState::Playing,
            _ => PlaybackState::Paused,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Ended => "ended",
            PlaybackState::Failed(_) => "failed",
        }
    }
}

/// Whether the current item is stalled waiting for data.
pub fn is_buffering(rate: f32, item_state: &ItemState, snapshot: Option<&NativeItemSnapshot>) -> bool {
    if rate <= 0.0 {
        return false;
    }
    match (item_state, snapshot) {
        (ItemState::Unknown, _) => true,
        (ItemState::ReadyToPlay, Some(snapshot)) => {
            snapshot.is_playback_buffer_empty || !snapshot.is_playback_likely_to_keep_up
        }
        _ => false,
    }
}

/// Snapshot of everything observers can know about a player.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerProperties {
    pub items: Vec<ItemId>,
    pub current_index: Option<usize>,
    pub current_item: Option<ItemId>,
    pub previous_items: Vec<ItemId>,
    pub next_items: Vec<ItemId>,
    pub item_state: ItemState,
    pub playback_state: PlaybackState,
    pub stream_type: StreamType,
    pub seekable_time_range: TimeRange,
    pub duration: MediaTime,
    pub time: MediaTime,
    pub rate: f32,
    pub is_buffering: bool,
    pub is_seeking: bool,
    pub seek_target: Option<MediaTime>,
    pub is_muted: bool,
    pub is_external_playback_active: bool,
    pub allows_external_playback: bool,
    pub media_selection: MediaSelection,
}

impl PlayerProperties {
    /// Position to show in a progress bar: the seek target while seeking,
    /// the playback time otherwise.
    pub fn displayed_time(&self) -> MediaTime {
        self.seek_target.unwrap_or(self.time)
    }

    pub fn has_previous_item(&self) -> bool {
        !self.previous_items.is_empty()
    }

    pub fn has_next_item(&self) -> bool {
        !self.next_items.is_empty()
    }
}
