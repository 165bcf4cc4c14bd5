//! # Queue Reconciler
//!
//! Keeps the native player's queue in line with the caller's item list.
//!
//! The native queue only holds the current item and the items after it. Every
//! list update is turned into native removals and insertions that leave the
//! current native item alone when it is still listed, so changing the list
//! never interrupts what is playing. Items listed before the current one are
//! dropped from the native queue but stay visible as previous items, which
//! are derived from the list order alone.

use crate::asset::{AssetStore, ItemId};
use bridge_traits::{NativeAsset, NativeItemId, NativeQueuePlayer};
use std::collections::HashSet;
use tracing::{debug, warn};

/// A listed item paired with the native item playing it.
#[derive(Debug, Clone)]
pub struct NativeQueueEntry {
    pub item_id: ItemId,
    pub native: NativeItemId,
    pub content: NativeAsset,
}

/// Change of the current item as seen by observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemTransition {
    /// Playback moved to another item, or to no item at all.
    Advance(Option<ItemId>),
    /// The last item played to its end and playback stopped on it.
    Stop(ItemId),
}

/// What happened when an item's resolved content changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetUpdate {
    /// The item is not in the native queue.
    NotQueued,
    /// Same playable content; nothing was touched.
    Unchanged,
    /// An upcoming native item was swapped in place.
    Replaced,
    /// The current native item was reloaded.
    Reloaded { was_placeholder: bool },
}

/// Whether two native assets play the same thing.
pub fn is_equivalent_content(lhs: &NativeAsset, rhs: &NativeAsset) -> bool {
    match (lhs, rhs) {
        (NativeAsset::Resource(lhs), NativeAsset::Resource(rhs)) => lhs.is_playback_equivalent(rhs),
        (NativeAsset::Loading, NativeAsset::Loading) => true,
        (NativeAsset::Unavailable, NativeAsset::Unavailable) => true,
        _ => false,
    }
}

/// Owns the mapping between listed items and native items.
#[derive(Debug, Default)]
pub struct QueueReconciler {
    entries: Vec<NativeQueueEntry>,
    desired: Vec<ItemId>,
    last_current: Option<(ItemId, NativeItemId)>,
    ended: Option<NativeItemId>,
    stopped_at: Option<ItemId>,
}

impl QueueReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last applied item list.
    pub fn desired(&self) -> &[ItemId] {
        &self.desired
    }

    /// Entries in native queue order.
    pub fn entries(&self) -> &[NativeQueueEntry] {
        &self.entries
    }

    pub fn entry(&self, id: &ItemId) -> Option<&NativeQueueEntry> {
        self.entries.iter().find(|entry| &entry.item_id == id)
    }

    pub fn entry_for_native(&self, native: NativeItemId) -> Option<&NativeQueueEntry> {
        self.entries.iter().find(|entry| entry.native == native)
    }

    /// The item playing stopped on after the list ran out, if any.
    pub fn stopped_at(&self) -> Option<&ItemId> {
        self.stopped_at.as_ref()
    }

    /// Identifier of the native player's current item.
    pub fn native_current_id(&self, player: &dyn NativeQueuePlayer) -> Option<ItemId> {
        let native = player.current_item()?;
        self.entry_for_native(native).map(|entry| entry.item_id.clone())
    }

    /// The item observers see as current: the native current item, or the
    /// item playback stopped on.
    pub fn current_item_id(&self, player: &dyn NativeQueuePlayer) -> Option<ItemId> {
        self.native_current_id(player)
            .or_else(|| self.stopped_at.clone())
    }

    /// Position of the current item in the list.
    pub fn current_index(&self, player: &dyn NativeQueuePlayer) -> Option<usize> {
        let current = self.current_item_id(player)?;
        self.desired.iter().position(|id| *id == current)
    }

    /// Items listed before the current one.
    pub fn previous_ids(&self, player: &dyn NativeQueuePlayer) -> Vec<ItemId> {
        match self.current_index(player) {
            Some(index) => self.desired[..index].to_vec(),
            None => Vec::new(),
        }
    }

    /// Items listed after the current one.
    pub fn next_ids(&self, player: &dyn NativeQueuePlayer) -> Vec<ItemId> {
        match self.current_index(player) {
            Some(index) => self.desired[index + 1..].to_vec(),
            None => Vec::new(),
        }
    }

    /// Forgets entries whose native item left the queue and restores native
    /// order.
    pub fn sync(&mut self, player: &dyn NativeQueuePlayer) {
        let natives = player.items();
        self.entries.retain(|entry| natives.contains(&entry.native));
        self.entries.sort_by_key(|entry| {
            natives
                .iter()
                .position(|native| *native == entry.native)
                .unwrap_or(usize::MAX)
        });
    }

    /// Records that a native item played to its end.
    pub fn mark_ended(&mut self, native: NativeItemId) {
        self.ended = Some(native);
    }

    /// Detects a change of the current item since the last call.
    pub fn observe_current(&mut self, player: &dyn NativeQueuePlayer) -> Option<ItemTransition> {
        let native = player.current_item();
        let current = native.and_then(|native| {
            self.entry_for_native(native)
                .map(|entry| (entry.item_id.clone(), native))
        });
        if current == self.last_current {
            return None;
        }

        let previous = std::mem::replace(&mut self.last_current, current.clone());
        match current {
            Some((id, _)) => {
                self.stopped_at = None;
                Some(ItemTransition::Advance(Some(id)))
            }
            None => match previous {
                Some((id, native))
                    if self.has_ended(player, native)
                        && player.items().is_empty()
                        && self.desired.contains(&id) =>
                {
                    debug!(item_id = %id, "Playback stopped after the last item");
                    self.stopped_at = Some(id.clone());
                    Some(ItemTransition::Stop(id))
                }
                _ => {
                    if self.stopped_at.is_some() {
                        return None;
                    }
                    Some(ItemTransition::Advance(None))
                }
            },
        }
    }

    /// Either notification or snapshot may be observed first.
    fn has_ended(&self, player: &dyn NativeQueuePlayer, native: NativeItemId) -> bool {
        self.ended == Some(native)
            || player
                .item_snapshot(native)
                .is_some_and(|snapshot| snapshot.played_to_end)
    }

    /// Applies a new item list to the native queue.
    ///
    /// `desired` must not contain duplicates.
    pub fn reconcile(&mut self, player: &dyn NativeQueuePlayer, desired: &[ItemId], assets: &AssetStore) {
        self.sync(player);
        let previous_desired = std::mem::replace(&mut self.desired, desired.to_vec());

        let current = player.current_item().and_then(|native| {
            self.entry_for_native(native)
                .map(|entry| (entry.item_id.clone(), native))
        });

        match current {
            Some((id, native)) => match desired.iter().position(|listed| *listed == id) {
                Some(index) => self.apply_pinned(player, native, index, assets),
                None => {
                    let successor = previous_desired
                        .iter()
                        .skip_while(|listed| **listed != id)
                        .skip(1)
                        .find_map(|listed| desired.iter().position(|candidate| candidate == listed));
                    debug!(
                        item_id = %id,
                        successor = ?successor.map(|index| &desired[index]),
                        "Current item removed from list"
                    );
                    self.rebuild(player, successor.unwrap_or(0), assets);
                }
            },
            None => {
                if let Some(stopped) = &self.stopped_at {
                    if desired.contains(stopped) {
                        return;
                    }
                    self.stopped_at = None;
                }
                self.rebuild(player, 0, assets);
            }
        }
    }

    /// Restarts the native queue at the listed item `id`.
    pub fn jump(&mut self, player: &dyn NativeQueuePlayer, id: &ItemId, assets: &AssetStore) -> bool {
        let Some(index) = self.desired.iter().position(|listed| listed == id) else {
            return false;
        };
        if self.native_current_id(player).as_ref() == Some(id) {
            return false;
        }
        self.sync(player);
        self.stopped_at = None;
        self.rebuild(player, index, assets);
        true
    }

    /// Brings the native item of `id` in line with its latest resolution.
    pub fn update_asset(
        &mut self,
        player: &dyn NativeQueuePlayer,
        id: &ItemId,
        assets: &AssetStore,
    ) -> AssetUpdate {
        self.sync(player);
        let content = assets.native_asset(id);
        let is_current = |native: NativeItemId| player.current_item() == Some(native);

        let Some(entry) = self.entries.iter_mut().find(|entry| &entry.item_id == id) else {
            return AssetUpdate::NotQueued;
        };

        if is_equivalent_content(&entry.content, &content) {
            // Metadata may still have changed.
            entry.content = content;
            return AssetUpdate::Unchanged;
        }

        let was_current = is_current(entry.native);
        let was_placeholder = entry.content.is_placeholder();
        let replacement = player.create_item(content.clone());
        if let Err(error) = player.replace_item(entry.native, replacement) {
            warn!(item_id = %id, error = %error, "Failed to replace native item");
            return AssetUpdate::Unchanged;
        }
        debug!(item_id = %id, native = %replacement, was_current, "Native item replaced");
        entry.native = replacement;
        entry.content = content;

        if was_current {
            self.last_current = Some((id.clone(), replacement));
            AssetUpdate::Reloaded { was_placeholder }
        } else {
            AssetUpdate::Replaced
        }
    }

    /// Empties the native queue.
    pub fn clear(&mut self, player: &dyn NativeQueuePlayer) {
        player.remove_all_items();
        self.entries.clear();
        self.stopped_at = None;
    }

    /// Keeps the current native item and makes the listed items after
    /// `index` follow it.
    fn apply_pinned(
        &mut self,
        player: &dyn NativeQueuePlayer,
        current: NativeItemId,
        index: usize,
        assets: &AssetStore,
    ) {
        let mut target = Vec::with_capacity(self.desired.len() - index);
        if let Some(entry) = self.entry_for_native(current) {
            target.push(entry.clone());
        }
        for id in &self.desired[index + 1..] {
            target.push(self.reuse_or_create(player, id, assets));
        }

        let keep: HashSet<NativeItemId> = target.iter().map(|entry| entry.native).collect();
        for native in player.items() {
            if native != current && !keep.contains(&native) {
                if let Err(error) = player.remove(native) {
                    warn!(native = %native, error = %error, "Failed to remove native item");
                }
            }
        }

        let mut predecessor = current;
        for entry in target.iter().skip(1) {
            let natives = player.items();
            let in_place = natives
                .iter()
                .position(|native| *native == predecessor)
                .and_then(|position| natives.get(position + 1))
                == Some(&entry.native);
            if !in_place {
                if natives.contains(&entry.native) {
                    if let Err(error) = player.remove(entry.native) {
                        warn!(native = %entry.native, error = %error, "Failed to move native item");
                    }
                }
                if let Err(error) = player.insert(entry.native, Some(predecessor)) {
                    warn!(item_id = %entry.item_id, error = %error, "Failed to insert native item");
                }
            }
            predecessor = entry.native;
        }

        self.entries = target;
    }

    /// Replaces the whole native queue with the listed items from `index`
    /// onwards, reusing native items whose content is unchanged.
    fn rebuild(&mut self, player: &dyn NativeQueuePlayer, index: usize, assets: &AssetStore) {
        let target: Vec<NativeQueueEntry> = self
            .desired
            .iter()
            .skip(index)
            .map(|id| self.reuse_or_create(player, id, assets))
            .collect();

        debug!(items = target.len(), start = index, "Rebuilding native queue");
        player.remove_all_items();
        for entry in &target {
            if let Err(error) = player.insert(entry.native, None) {
                warn!(item_id = %entry.item_id, error = %error, "Failed to insert native item");
            }
        }
        self.entries = target;
    }

    fn reuse_or_create(
        &self,
        player: &dyn NativeQueuePlayer,
        id: &ItemId,
        assets: &AssetStore,
    ) -> NativeQueueEntry {
        let content = assets.native_asset(id);
        if let Some(entry) = self
            .entries
            .iter()
            .find(|entry| &entry.item_id == id && is_equivalent_content(&entry.content, &content))
        {
            return NativeQueueEntry {
                content,
                ..entry.clone()
            };
        }
        NativeQueueEntry {
            item_id: id.clone(),
            native: player.create_item(content.clone()),
            content,
        }
    }
}
