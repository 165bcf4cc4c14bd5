//! # Playback Error Types
//!
//! Errors returned by player commands. Media failures of individual items are
//! not errors at this level: they are observed as [`ItemState::Failed`] and
//! [`PlaybackState::Failed`].
//!
//! [`ItemState::Failed`]: crate::item_state::ItemState::Failed
//! [`PlaybackState::Failed`]: crate::properties::PlaybackState::Failed

use crate::item_state::ItemError;
use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during player operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// A command argument is malformed (for example a non-numeric seek time).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The referenced item is not part of the player's item list.
    #[error("Unknown item: {0}")]
    UnknownItem(String),

    /// The player has been shut down.
    #[error("Player is closed")]
    PlayerClosed,

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An item's resource could not be resolved.
    #[error("Resolution failed: {0}")]
    Resolution(ItemError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl PlaybackError {
    /// Returns `true` for errors caused by the caller passing bad input.
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::InvalidArgument(_)
                | PlaybackError::UnknownItem(_)
                | PlaybackError::Configuration(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
