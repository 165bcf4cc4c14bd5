//! Native queue player bridge.
//!
//! [`NativeQueuePlayer`] is the contract between the playback core and the
//! platform's multi-item player primitive (AVQueuePlayer on Apple platforms,
//! a playlist-backed ExoPlayer on Android). The core owns all queue and seek
//! decisions; implementations only execute them and report what happened
//! through [`NativeEvent`]s.

use crate::{
    error::Result,
    media_time::{MediaTime, TimeRange},
    platform::PlatformSendSync,
    resource::Resource,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::broadcast;

// ============================================================================
// Identifiers
// ============================================================================

/// Handle to a native playable item created by [`NativeQueuePlayer::create_item`].
///
/// Two handles are equal only if they refer to the same native object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NativeItemId(u64);

impl NativeItemId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NativeItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "native-item-{}", self.0)
    }
}

/// Identity of one physical seek issued to the native player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NativeSeekId(u64);

impl NativeSeekId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NativeSeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seek-{}", self.0)
    }
}

// ============================================================================
// Items
// ============================================================================

/// What a native item plays.
#[derive(Debug, Clone)]
pub enum NativeAsset {
    /// A resolved resource.
    Resource(Resource),
    /// Placeholder holding a queue position while the resource is resolved.
    /// Never becomes ready to play.
    Loading,
    /// Placeholder for content that could not be resolved. Never becomes
    /// ready to play and never fails on its own.
    Unavailable,
}

impl NativeAsset {
    pub fn is_placeholder(&self) -> bool {
        !matches!(self, NativeAsset::Resource(_))
    }

    pub fn resource(&self) -> Option<&Resource> {
        match self {
            NativeAsset::Resource(resource) => Some(resource),
            _ => None,
        }
    }
}

/// Load status reported by the native item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NativeItemStatus {
    #[default]
    Unknown,
    ReadyToPlay,
    Failed,
}

/// Error object produced by the native media stack.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NativeError {
    pub domain: String,
    pub code: i64,
    pub user_info: HashMap<String, String>,
}

impl NativeError {
    /// Standard key for the human readable description.
    pub const LOCALIZED_DESCRIPTION_KEY: &'static str = "NSLocalizedDescription";
    /// Key some resource loaders wrongly use instead of the localized key.
    pub const DESCRIPTION_KEY: &'static str = "NSDescription";

    pub fn new(domain: impl Into<String>, code: i64) -> Self {
        Self {
            domain: domain.into(),
            code,
            user_info: HashMap::new(),
        }
    }

    pub fn with_user_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_info.insert(key.into(), value.into());
        self
    }

    pub fn localized_description(&self) -> Option<&str> {
        self.user_info
            .get(Self::LOCALIZED_DESCRIPTION_KEY)
            .map(String::as_str)
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.localized_description() {
            Some(description) => write!(f, "{} ({}:{})", description, self.domain, self.code),
            None => write!(f, "{}:{}", self.domain, self.code),
        }
    }
}

impl std::error::Error for NativeError {}

/// One entry of a native item's error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogEvent {
    pub domain: String,
    pub status_code: i64,
    /// Free-form diagnostic text, often of the form `"Summary (detail)"`.
    pub comment: Option<String>,
    pub uri: Option<String>,
}

/// Characteristic a group of alternative media options is selected by.
/// Audible sorts before legible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MediaCharacteristic {
    Audible,
    Legible,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaOption {
    pub id: String,
    pub display_name: String,
    pub language: Option<String>,
}

/// Alternative renditions of one characteristic offered by the current item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeSelectionGroup {
    pub characteristic: MediaCharacteristic,
    pub options: Vec<MediaOption>,
    pub selected: Option<String>,
    pub allows_empty_selection: bool,
}

/// Point-in-time view of a native item's observable properties.
#[derive(Debug, Clone, Default)]
pub struct NativeItemSnapshot {
    pub status: NativeItemStatus,
    pub played_to_end: bool,
    pub error: Option<NativeError>,
    pub error_log: Vec<ErrorLogEvent>,
    pub duration: MediaTime,
    pub seekable_time_ranges: Vec<TimeRange>,
    pub loaded_time_ranges: Vec<TimeRange>,
    pub is_playback_likely_to_keep_up: bool,
    pub is_playback_buffer_empty: bool,
    pub media_selection: Vec<NativeSelectionGroup>,
}

// ============================================================================
// Seeks & events
// ============================================================================

/// A physical seek request issued to the native player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeSeek {
    pub id: NativeSeekId,
    pub target: MediaTime,
    pub tolerance_before: MediaTime,
    pub tolerance_after: MediaTime,
}

/// Notifications published by a native player.
///
/// Events may be debounced or coalesced by the platform; consumers should
/// re-read the relevant snapshot rather than trust event payloads alone.
#[derive(Debug, Clone)]
pub enum NativeEvent {
    CurrentItemChanged { item: Option<NativeItemId> },
    ItemsChanged,
    ItemStatusChanged { item: NativeItemId, status: NativeItemStatus },
    ItemDidPlayToEnd { item: NativeItemId },
    ItemFailedToPlayToEnd { item: NativeItemId, error: NativeError },
    /// Error reported by the resource-loading path rather than the item itself.
    ResourceLoadingFailed { item: NativeItemId, error: NativeError },
    ErrorLogEntryAdded { item: NativeItemId, event: ErrorLogEvent },
    TimeRangesChanged { item: NativeItemId },
    BufferingChanged { item: NativeItemId },
    RateChanged { rate: f32 },
    SeekCompleted { seek: NativeSeekId, finished: bool },
    MediaSelectionChanged { item: NativeItemId },
    ExternalPlaybackChanged { active: bool },
    MuteChanged { muted: bool },
}

// ============================================================================
// Player
// ============================================================================

/// Platform multi-item player.
///
/// The queue holds the current item followed by the upcoming ones; items
/// behind the current one are not retained. When the current item plays to
/// its end the player advances to the next item on its own.
///
/// # Seeking
///
/// Only one seek is in flight at a time. Issuing a new seek preempts the one
/// in flight, which then completes with `finished = false`. Every issued seek
/// produces exactly one [`NativeEvent::SeekCompleted`].
///
/// # Threading
///
/// Calls are made from a single coordination task. Implementations that wrap
/// main-thread-bound platform objects are responsible for hopping threads.
pub trait NativeQueuePlayer: PlatformSendSync {
    /// Instantiate a native item for an asset without enqueuing it.
    fn create_item(&self, asset: NativeAsset) -> NativeItemId;

    /// Items in the queue, current first.
    fn items(&self) -> Vec<NativeItemId>;

    fn current_item(&self) -> Option<NativeItemId>;

    /// Insert `item` after `after`, or append it when `after` is `None`.
    /// Inserting into an empty queue makes the item current.
    fn insert(&self, item: NativeItemId, after: Option<NativeItemId>) -> Result<()>;

    fn remove(&self, item: NativeItemId) -> Result<()>;

    fn remove_all_items(&self);

    /// Swap `old` for `new` at the same queue position. Replacing the current
    /// item reloads playback with the new item.
    fn replace_item(&self, old: NativeItemId, new: NativeItemId) -> Result<()>;

    fn advance_to_next_item(&self);

    /// Seek the current item. See the trait documentation for preemption.
    fn seek(&self, seek: NativeSeek);

    fn current_time(&self) -> MediaTime;

    fn item_snapshot(&self, item: NativeItemId) -> Option<NativeItemSnapshot>;

    fn play(&self);

    fn pause(&self);

    fn rate(&self) -> f32;

    fn set_rate(&self, rate: f32);

    fn set_muted(&self, muted: bool);

    fn is_muted(&self) -> bool;

    fn set_allows_external_playback(&self, allowed: bool);

    fn is_external_playback_active(&self) -> bool;

    /// Select `option` (or clear the selection with `None`) for the given
    /// characteristic of `item`.
    fn select_media_option(
        &self,
        item: NativeItemId,
        characteristic: MediaCharacteristic,
        option: Option<String>,
    ) -> Result<()>;

    fn subscribe(&self) -> broadcast::Receiver<NativeEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_error_description() {
        let error = NativeError::new("CoreMediaErrorDomain", -12938)
            .with_user_info(NativeError::LOCALIZED_DESCRIPTION_KEY, "Not found");

        assert_eq!(error.localized_description(), Some("Not found"));
        assert_eq!(error.to_string(), "Not found (CoreMediaErrorDomain:-12938)");
        assert_eq!(NativeError::new("X", 1).to_string(), "X:1");
    }

    #[test]
    fn test_placeholder_assets() {
        assert!(NativeAsset::Loading.is_placeholder());
        assert!(NativeAsset::Unavailable.resource().is_none());
        assert!(!NativeAsset::Resource(Resource::new("https://cdn/a.m3u8")).is_placeholder());
    }

    #[test]
    fn test_media_characteristics_sort_audible_first() {
        let mut characteristics = vec![MediaCharacteristic::Legible, MediaCharacteristic::Audible];
        characteristics.sort();
        assert_eq!(
            characteristics,
            vec![MediaCharacteristic::Audible, MediaCharacteristic::Legible]
        );
    }

    #[test]
    fn test_ids_display() {
        assert_eq!(NativeItemId::new(4).to_string(), "native-item-4");
        assert_eq!(NativeSeekId::new(2).raw(), 2);
    }
}
