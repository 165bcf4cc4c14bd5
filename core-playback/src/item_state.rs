//! Item state reduction.
//!
//! Native items report their condition through several loosely coupled
//! channels: a load status, a "played to end" notification, a direct error and
//! an append-only error log. This module folds them into one [`ItemState`].

use bridge_traits::{ErrorLogEvent, NativeError, NativeItemSnapshot, NativeItemStatus};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Captures the trailing balanced clause of `"Summary (detail)"`, allowing
/// two levels of nesting inside it.
static PARENTHESIZED_COMMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(((?:[^()]|\((?:[^()]|\([^()]*\))*\))*)\)\s*$")
        .expect("parenthesized comment regex should compile")
});

/// Domain used for errors produced by the core itself.
pub const CORE_ERROR_DOMAIN: &str = "core_playback";

/// User-presentable description of an item failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub domain: String,
    pub code: i64,
    pub message: String,
}

impl ItemError {
    pub fn new(domain: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            code,
            message: message.into(),
        }
    }

    /// Sentinel used when an item failed without saying why.
    pub fn unknown() -> Self {
        Self::new(CORE_ERROR_DOMAIN, -1, "An unknown playback error occurred")
    }

    fn from_log_event(event: &ErrorLogEvent) -> Self {
        let message = event
            .comment
            .as_deref()
            .map(friendly_comment)
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| format!("Playback failed ({})", event.status_code));
        Self::new(event.domain.clone(), event.status_code, message)
    }
}

impl From<&NativeError> for ItemError {
    fn from(error: &NativeError) -> Self {
        let message = error
            .localized_description()
            .map(str::to_string)
            .unwrap_or_else(|| ItemError::unknown().message);
        Self::new(error.domain.clone(), error.code, message)
    }
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.message, self.domain, self.code)
    }
}

impl std::error::Error for ItemError {}

/// Condition of a single item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum ItemState {
    #[default]
    Unknown,
    ReadyToPlay,
    Ended,
    Failed(ItemError),
}

impl ItemState {
    pub fn is_failed(&self) -> bool {
        matches!(self, ItemState::Failed(_))
    }

    pub fn error(&self) -> Option<&ItemError> {
        match self {
            ItemState::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemState::Unknown => "unknown",
            ItemState::ReadyToPlay => "ready_to_play",
            ItemState::Ended => "ended",
            ItemState::Failed(_) => "failed",
        }
    }

    /// Folds raw native signals into an item state.
    ///
    /// A failure takes precedence over playing to the end. The failure's
    /// error prefers the latest error-log entry, then the item's own error,
    /// then [`ItemError::unknown`].
    pub fn reduce(
        status: NativeItemStatus,
        played_to_end: bool,
        item_error: Option<&NativeError>,
        error_log: &[ErrorLogEvent],
    ) -> ItemState {
        if status == NativeItemStatus::Failed {
            let error = error_log
                .last()
                .map(ItemError::from_log_event)
                .or_else(|| item_error.map(ItemError::from))
                .unwrap_or_else(ItemError::unknown);
            return ItemState::Failed(error);
        }
        if played_to_end {
            return ItemState::Ended;
        }
        match status {
            NativeItemStatus::ReadyToPlay => ItemState::ReadyToPlay,
            _ => ItemState::Unknown,
        }
    }

    /// [`ItemState::reduce`] over a snapshot, with an optional error reported
    /// through the resource-loading path taking the place of the item error.
    pub fn from_snapshot(snapshot: &NativeItemSnapshot, loading_error: Option<&NativeError>) -> Self {
        Self::reduce(
            snapshot.status,
            snapshot.played_to_end,
            loading_error.or(snapshot.error.as_ref()),
            &snapshot.error_log,
        )
    }
}

/// Extracts the human readable part of an error-log comment.
///
/// Comments look like `"Segment exceeds specified bandwidth (HTTP 404: File
/// Not Found)"`; the innermost clause of the trailing parenthesised group is
/// the useful part.
/// Comments without a clause are returned trimmed.
pub fn friendly_comment(comment: &str) -> String {
    let mut current = comment.trim();
    while let Some(inner) = PARENTHESIZED_COMMENT
        .captures(current)
        .and_then(|captures| captures.get(1))
    {
        let inner = inner.as_str().trim();
        if inner.is_empty() || inner == current {
            break;
        }
        current = inner;
    }
    current.to_string()
}

/// Corrects errors reported by the resource-loading path, which put the
/// description under `NSDescription` instead of the localized key.
pub fn localized_resource_loading_error(mut error: NativeError) -> NativeError {
    if error.localized_description().is_none() {
        if let Some(description) = error.user_info.remove(NativeError::DESCRIPTION_KEY) {
            error
                .user_info
                .insert(NativeError::LOCALIZED_DESCRIPTION_KEY.to_string(), description);
        }
    }
    error
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_event(comment: Option<&str>) -> ErrorLogEvent {
        ErrorLogEvent {
            domain: "CoreMediaErrorDomain".to_string(),
            status_code: -12938,
            comment: comment.map(str::to_string),
            uri: None,
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ItemState::reduce(NativeItemStatus::Unknown, false, None, &[]),
            ItemState::Unknown
        );
        assert_eq!(
            ItemState::reduce(NativeItemStatus::ReadyToPlay, false, None, &[]),
            ItemState::ReadyToPlay
        );
        assert_eq!(
            ItemState::reduce(NativeItemStatus::ReadyToPlay, true, None, &[]),
            ItemState::Ended
        );
    }

    #[test]
    fn test_failure_prefers_latest_log_event() {
        let item_error = NativeError::new("AVFoundationErrorDomain", -11800)
            .with_user_info(NativeError::LOCALIZED_DESCRIPTION_KEY, "Cannot complete");
        let log = vec![
            log_event(Some("first")),
            log_event(Some("Segment unavailable (HTTP 404: Not Found)")),
        ];

        let state = ItemState::reduce(NativeItemStatus::Failed, true, Some(&item_error), &log);

        assert_eq!(
            state,
            ItemState::Failed(ItemError::new(
                "CoreMediaErrorDomain",
                -12938,
                "HTTP 404: Not Found"
            ))
        );
    }

    #[test]
    fn test_failure_falls_back_to_item_error_then_sentinel() {
        let item_error = NativeError::new("AVFoundationErrorDomain", -11800)
            .with_user_info(NativeError::LOCALIZED_DESCRIPTION_KEY, "Cannot complete");

        let state = ItemState::reduce(NativeItemStatus::Failed, false, Some(&item_error), &[]);
        assert_eq!(state.error().map(|e| e.code), Some(-11800));
        assert_eq!(state.error().map(|e| e.message.as_str()), Some("Cannot complete"));

        let state = ItemState::reduce(NativeItemStatus::Failed, false, None, &[]);
        assert_eq!(state, ItemState::Failed(ItemError::unknown()));
    }

    #[test]
    fn test_log_event_without_comment() {
        let state = ItemState::reduce(NativeItemStatus::Failed, false, None, &[log_event(None)]);
        assert_eq!(
            state.error().map(|e| e.message.as_str()),
            Some("Playback failed (-12938)")
        );
    }

    #[test]
    fn test_friendly_comment() {
        assert_eq!(friendly_comment("  Plain message "), "Plain message");
        assert_eq!(friendly_comment("Outer (Inner)"), "Inner");
        assert_eq!(friendly_comment("Outer (Middle (Inner))"), "Inner");
        assert_eq!(friendly_comment("Outer ()"), "Outer ()");
        assert_eq!(friendly_comment("Not (closed"), "Not (closed");
    }

    #[test]
    fn test_friendly_comment_picks_last_sibling_clause() {
        assert_eq!(friendly_comment("Segment failed (HTTP 404) (Not Found)"), "Not Found");
        assert_eq!(
            friendly_comment("Segment failed (HTTP 404) (Not Found (code 7))"),
            "code 7"
        );
        assert_eq!(friendly_comment("Stalled (retrying) after timeout"), "Stalled (retrying) after timeout");
        assert!(PARENTHESIZED_COMMENT.is_match("Outer (A (B (C)))"));
    }

    #[test]
    fn test_resource_loading_error_is_relocalized() {
        let error = NativeError::new("DrmErrorDomain", 42)
            .with_user_info(NativeError::DESCRIPTION_KEY, "License expired");

        let fixed = localized_resource_loading_error(error);

        assert_eq!(fixed.localized_description(), Some("License expired"));
        assert!(!fixed.user_info.contains_key(NativeError::DESCRIPTION_KEY));

        let snapshot = NativeItemSnapshot {
            status: NativeItemStatus::Failed,
            ..Default::default()
        };
        let state = ItemState::from_snapshot(&snapshot, Some(&fixed));
        assert_eq!(state.error().map(|e| e.message.as_str()), Some("License expired"));
    }

    #[test]
    fn test_existing_localized_description_is_kept() {
        let error = NativeError::new("DrmErrorDomain", 42)
            .with_user_info(NativeError::LOCALIZED_DESCRIPTION_KEY, "Keep me")
            .with_user_info(NativeError::DESCRIPTION_KEY, "Other");

        let fixed = localized_resource_loading_error(error);
        assert_eq!(fixed.localized_description(), Some("Keep me"));
    }
}
