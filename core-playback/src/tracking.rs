//! Tracker adapters and their lifecycle.
//!
//! Trackers (analytics, heartbeat reporting) are attached to items. The core
//! tells them when their item starts being relevant and feeds them property
//! snapshots; it never looks at what they do with them.

use crate::asset::{ItemId, PlayerItem};
use crate::item_state::ItemState;
use crate::properties::{PlaybackState, PlayerProperties};
use std::sync::Arc;
use tracing::debug;

/// Receives player properties while its item is current.
#[cfg_attr(test, mockall::automock)]
pub trait TrackerAdapter: Send + Sync {
    /// The item became current and can play.
    fn enable(&self, properties: &PlayerProperties);

    /// Properties changed while the item is current.
    fn update(&self, properties: &PlayerProperties);

    /// The item stopped being current or the player shut down.
    fn disable(&self, properties: &PlayerProperties);
}

/// Drives enable / update / disable calls for the trackers of the current
/// item.
#[derive(Default)]
pub struct TrackerLifecycle {
    active: Option<(ItemId, Vec<Arc<dyn TrackerAdapter>>)>,
}

impl TrackerLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_item(&self) -> Option<&ItemId> {
        self.active.as_ref().map(|(id, _)| id)
    }

    /// Reacts to a new properties snapshot. `current` is the current item,
    /// if any.
    pub fn on_properties(&mut self, current: Option<&PlayerItem>, properties: &PlayerProperties) {
        let current_id = current.map(PlayerItem::id);
        if let Some((active_id, trackers)) = &self.active {
            if Some(active_id) == current_id {
                for tracker in trackers {
                    tracker.update(properties);
                }
                return;
            }
            debug!(item_id = %active_id, "Disabling trackers");
            for tracker in trackers {
                tracker.disable(properties);
            }
            self.active = None;
        }

        let Some(item) = current else {
            return;
        };
        if item.trackers().is_empty() || !is_playable(properties) {
            return;
        }
        debug!(item_id = %item.id(), trackers = item.trackers().len(), "Enabling trackers");
        for tracker in item.trackers() {
            tracker.enable(properties);
        }
        self.active = Some((item.id().clone(), item.trackers().to_vec()));
    }

    /// Disables the active trackers, if any.
    pub fn shutdown(&mut self, properties: &PlayerProperties) {
        if let Some((id, trackers)) = self.active.take() {
            debug!(item_id = %id, "Disabling trackers on shutdown");
            for tracker in trackers {
                tracker.disable(properties);
            }
        }
    }
}

fn is_playable(properties: &PlayerProperties) -> bool {
    properties.item_state == ItemState::ReadyToPlay
        || properties.playback_state == PlaybackState::Playing
}
