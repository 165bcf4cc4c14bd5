//! # Core Configuration Module
//!
//! Provides configuration management for the playback core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the platform bridges and runtime settings a player
//! needs. It enforces fail-fast validation so that a missing bridge is
//! reported when the host wires things up, not when the first item plays.
//!
//! ## Required Dependencies
//!
//! - `NativeQueuePlayer` - The platform's multi-item player
//!
//! ## Optional Dependencies
//!
//! - `IdleTimerControl` - Keeps the display awake during playback
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .native_player(Arc::new(MyAvQueuePlayer::new()))
//!     .idle_timer(Arc::new(MyIdleTimer))
//!     .event_buffer_size(256)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Fails with an actionable CapabilityMissing error
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing native player");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{IdleTimerControl, NativeQueuePlayer};
use std::sync::Arc;

/// Largest accepted event bus buffer.
pub const MAX_EVENT_BUFFER_SIZE: usize = 10_000;

/// Core configuration for a player instance.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Native multi-item player driven by the core (required)
    pub native_player: Arc<dyn NativeQueuePlayer>,

    /// Display sleep switch (optional)
    pub idle_timer: Option<Arc<dyn IdleTimerControl>>,

    /// Capacity of the event bus channel
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("native_player", &"NativeQueuePlayer { ... }")
            .field(
                "idle_timer",
                &self.idle_timer.as_ref().map(|_| "IdleTimerControl { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size exceeds maximum of {}",
                MAX_EVENT_BUFFER_SIZE
            )));
        }

        Ok(())
    }
}

fn native_player_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "NativeQueuePlayer".to_string(),
        message: "A NativeQueuePlayer implementation is required to play anything. \
                 Apple: wrap AVQueuePlayer. \
                 Android: wrap a playlist-backed ExoPlayer. \
                 Headless/tests: use core_playback::simulation::SimulatedPlayer."
            .to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    native_player: Option<Arc<dyn NativeQueuePlayer>>,
    idle_timer: Option<Arc<dyn IdleTimerControl>>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the native player implementation (required).
    pub fn native_player(mut self, player: Arc<dyn NativeQueuePlayer>) -> Self {
        self.native_player = Some(player);
        self
    }

    /// Sets the idle timer control (optional).
    ///
    /// Without one, playback never prevents the display from sleeping.
    pub fn idle_timer(mut self, control: Arc<dyn IdleTimerControl>) -> Self {
        self.idle_timer = Some(control);
        self
    }

    /// Sets the event bus capacity (default 100, accepted range `1..=10_000`).
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when no native player was provided
    /// - [`Error::Config`] when a value is out of range
    pub fn build(self) -> Result<CoreConfig> {
        let native_player = self
            .native_player
            .ok_or_else(native_player_missing_error)?;

        let config = CoreConfig {
            native_player,
            idle_timer: self.idle_timer,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
