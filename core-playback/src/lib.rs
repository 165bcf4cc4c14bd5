//! # Playback Engine Core
//!
//! Queue, seek and state reconciliation on top of a native multi-item player.
//!
//! ## Overview
//!
//! A [`Player`] owns an ordered list of [`PlayerItem`]s. Each item resolves
//! its content asynchronously into a [`Resource`](bridge_traits::Resource);
//! the player keeps the platform queue behind a
//! [`NativeQueuePlayer`](bridge_traits::NativeQueuePlayer) in step with that
//! list while never recreating the item that is currently playing.
//!
//! This module handles:
//! - Item list edits and navigation (advance, smart return, jumps)
//! - Seek coalescing, smooth seeking and blocked time ranges
//! - Derived observable state ([`PlayerProperties`]) and [`CoreEvent`]s
//! - Tracker lifecycle, media selection and display sleep suppression
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{Player, PlayerConfiguration, PlayerItem};
//!
//! let player = Player::new(core_config, PlayerConfiguration::default())?;
//! player.set_items(vec![PlayerItem::from_url("a", "https://cdn/a.m3u8")]).await?;
//! player.play().await?;
//! ```
//!
//! [`CoreEvent`]: core_runtime::events::CoreEvent

pub mod asset;
pub mod config;
pub mod error;
pub mod idle_timer;
pub mod item_state;
pub mod media_selection;
pub mod navigation;
pub mod player;
pub mod properties;
pub mod queue;
pub mod seek;
pub mod simulation;
pub mod stream;
pub mod time;
pub mod tracking;

pub use asset::{
    resource_channel, ChannelResolver, FailingResolver, ItemId, PlayerItem, ResourceSender,
    StaticResolver,
};
pub use config::{NavigationMode, PlayerConfiguration};
pub use error::{PlaybackError, Result};
pub use idle_timer::{IdleTimerLease, IdleTimerService};
pub use item_state::{ItemError, ItemState};
pub use media_selection::{MediaSelection, MediaSelectionGroup, MediaSelectionOption};
pub use navigation::InsertPosition;
pub use player::Player;
pub use properties::{PlaybackState, PlayerProperties};
pub use seek::{SeekCompletion, SeekPosition};
pub use stream::StreamType;
pub use tracking::TrackerAdapter;
