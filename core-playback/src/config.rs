//! # Player Configuration
//!
//! Behavioural settings of a player instance: navigation policy, skip
//! intervals and the seek tuning knobs.

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How `return_to_previous_item` decides between restarting and going back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum NavigationMode {
    /// Always move one position in the list.
    Immediate,
    /// Go to the previous item only while playback is within `threshold` of
    /// the current item's start; otherwise restart the current item.
    Smart { threshold: Duration },
}

impl Default for NavigationMode {
    fn default() -> Self {
        NavigationMode::Smart {
            threshold: default_smart_threshold(),
        }
    }
}

/// Player configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfiguration {
    /// Default: smart navigation with a 3 second threshold.
    #[serde(default)]
    pub navigation_mode: NavigationMode,

    /// Default: 10 seconds.
    #[serde(default = "default_skip_interval")]
    pub backward_skip_interval: Duration,

    /// Default: 10 seconds.
    #[serde(default = "default_skip_interval")]
    pub forward_skip_interval: Duration,

    /// Trailing window of the seekable range in which seeks are always
    /// issued with zero tolerances.
    ///
    /// Default: 18 seconds.
    #[serde(default = "default_end_tolerance_window")]
    pub end_tolerance_window: Duration,

    /// How many times a seek the native player reports as not finished is
    /// re-issued before it is given up. `None` retries indefinitely.
    ///
    /// Default: 16.
    #[serde(default = "default_seek_retry_limit")]
    pub seek_retry_limit: Option<u32>,

    /// Default: true.
    #[serde(default = "default_true")]
    pub allows_external_playback: bool,

    /// Default: false.
    #[serde(default)]
    pub is_muted: bool,

    /// When disabled, smooth seek requests are treated as precise ones.
    ///
    /// Default: true.
    #[serde(default = "default_true")]
    pub smooth_seeking_enabled: bool,
}

impl Default for PlayerConfiguration {
    fn default() -> Self {
        Self {
            navigation_mode: NavigationMode::default(),
            backward_skip_interval: default_skip_interval(),
            forward_skip_interval: default_skip_interval(),
            end_tolerance_window: default_end_tolerance_window(),
            seek_retry_limit: default_seek_retry_limit(),
            allows_external_playback: default_true(),
            is_muted: false,
            smooth_seeking_enabled: default_true(),
        }
    }
}

impl PlayerConfiguration {
    /// Configuration whose navigation always moves one position in the list.
    pub fn immediate_navigation() -> Self {
        Self {
            navigation_mode: NavigationMode::Immediate,
            ..Default::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.backward_skip_interval.is_zero() || self.forward_skip_interval.is_zero() {
            return Err(PlaybackError::Configuration(
                "skip intervals must be > 0".to_string(),
            ));
        }

        if let NavigationMode::Smart { threshold } = self.navigation_mode {
            if threshold.is_zero() {
                return Err(PlaybackError::Configuration(
                    "smart navigation threshold must be > 0".to_string(),
                ));
            }
        }

        if self.seek_retry_limit == Some(0) {
            return Err(PlaybackError::Configuration(
                "seek_retry_limit must be > 0 (use None for unbounded retries)".to_string(),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_smart_threshold() -> Duration {
    Duration::from_secs(3)
}

fn default_skip_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_end_tolerance_window() -> Duration {
    Duration::from_secs(18)
}

fn default_seek_retry_limit() -> Option<u32> {
    Some(16)
}

fn default_true() -> bool {
    true
}
