//! # Navigation
//!
//! List editing and the rules deciding where advance, return and skip
//! commands lead. Everything here is pure; the player facade applies the
//! outcome.

use crate::asset::{ItemId, PlayerItem};
use crate::config::NavigationMode;
use crate::stream::StreamType;
use crate::time::{clamp_to_range, is_away_from_start};
use bridge_traits::{MediaTime, TimeRange};
use std::time::Duration;

/// Where to put an item relative to another listed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertPosition {
    /// Before the given item, or at the start when `None`.
    Before(Option<ItemId>),
    /// After the given item, or at the end when `None`.
    After(Option<ItemId>),
}

impl InsertPosition {
    fn reference(&self) -> Option<&ItemId> {
        match self {
            InsertPosition::Before(reference) | InsertPosition::After(reference) => {
                reference.as_ref()
            }
        }
    }

    /// Index `items` would be inserted at, or `None` for a foreign reference.
    fn index_in(&self, items: &[PlayerItem]) -> Option<usize> {
        let position_of = |id: &ItemId| items.iter().position(|item| item.id() == id);
        match self {
            InsertPosition::Before(None) => Some(0),
            InsertPosition::After(None) => Some(items.len()),
            InsertPosition::Before(Some(id)) => position_of(id),
            InsertPosition::After(Some(id)) => position_of(id).map(|index| index + 1),
        }
    }
}

/// Inserts `item` into `items`. Returns `false` when the item is already
/// listed or the reference item is not.
pub fn insert(items: &mut Vec<PlayerItem>, item: PlayerItem, position: &InsertPosition) -> bool {
    if items.iter().any(|listed| listed.id() == item.id()) {
        return false;
    }
    match position.index_in(items) {
        Some(index) => {
            items.insert(index, item);
            true
        }
        None => false,
    }
}

/// Moves the listed item `id`. Returns `false` for unknown items, moves
/// relative to the item itself, and moves that leave the list unchanged.
pub fn move_item(items: &mut Vec<PlayerItem>, id: &ItemId, position: &InsertPosition) -> bool {
    if position.reference() == Some(id) {
        return false;
    }
    let Some(from) = items.iter().position(|item| item.id() == id) else {
        return false;
    };
    let Some(to) = position.index_in(items) else {
        return false;
    };

    let to = if to > from { to - 1 } else { to };
    if to == from {
        return false;
    }
    let item = items.remove(from);
    items.insert(to, item);
    true
}

/// Removes the listed item `id`. Returns `false` when it is not listed.
pub fn remove(items: &mut Vec<PlayerItem>, id: &ItemId) -> bool {
    let before = items.len();
    items.retain(|item| item.id() != id);
    items.len() != before
}

/// Outcome of a return command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnAction {
    PreviousItem(ItemId),
    RestartCurrent,
    Disallowed,
}

/// Playback facts navigation decisions are based on.
#[derive(Debug, Clone)]
pub struct NavigationContext<'a> {
    pub previous: Option<&'a ItemId>,
    pub next: Option<&'a ItemId>,
    pub stream_type: StreamType,
    pub time: MediaTime,
    pub seekable: TimeRange,
}

/// Decides what returning to the previous item does.
///
/// In smart mode an item played for less than the threshold gives way to the
/// previous item; one played longer restarts. Without a previous item the
/// current one restarts when it can be sought.
pub fn return_action(mode: NavigationMode, context: &NavigationContext<'_>) -> ReturnAction {
    match mode {
        NavigationMode::Immediate => match context.previous {
            Some(previous) => ReturnAction::PreviousItem(previous.clone()),
            None => ReturnAction::Disallowed,
        },
        NavigationMode::Smart { threshold } => {
            let away = context.stream_type.is_seekable()
                && is_away_from_start(context.time, &context.seekable, threshold);
            match context.previous {
                Some(previous) if !away => ReturnAction::PreviousItem(previous.clone()),
                _ if context.stream_type.is_seekable() => ReturnAction::RestartCurrent,
                Some(previous) => ReturnAction::PreviousItem(previous.clone()),
                None => ReturnAction::Disallowed,
            }
        }
    }
}

pub fn can_advance(context: &NavigationContext<'_>) -> bool {
    context.next.is_some()
}

pub fn can_restart(stream_type: StreamType) -> bool {
    stream_type.is_seekable()
}

/// Target of a backward skip, or `None` when the stream cannot be sought.
pub fn skip_backward_target(context: &NavigationContext<'_>, interval: Duration) -> Option<MediaTime> {
    if !context.stream_type.is_seekable() || !context.time.is_numeric() {
        return None;
    }
    let target = context.time - MediaTime::from_duration(interval);
    Some(clamp_to_range(target, &context.seekable))
}

/// Target of a forward skip, or `None` when the stream cannot be sought or,
/// for DVR streams, when the skip would reach the live edge.
pub fn skip_forward_target(context: &NavigationContext<'_>, interval: Duration) -> Option<MediaTime> {
    if !context.stream_type.is_seekable() || !context.time.is_numeric() {
        return None;
    }
    let target = context.time + MediaTime::from_duration(interval);
    if context.stream_type == StreamType::Dvr && target >= context.seekable.end() {
        return None;
    }
    Some(clamp_to_range(target, &context.seekable))
}
