//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback core and the platform's
//! native media stack. The core never talks to AVFoundation, ExoPlayer or a
//! GStreamer pipeline directly; it drives a [`NativeQueuePlayer`] and consumes
//! the [`NativeEvent`] stream that implementation publishes.
//!
//! ## Traits
//!
//! ### Native playback
//! - [`NativeQueuePlayer`](player::NativeQueuePlayer) - Multi-item queue player primitive
//!
//! ### Content resolution
//! - [`ResourceResolver`](resource::ResourceResolver) - Turns an abstract item into a playable resource
//! - [`ResourceLoaderDelegate`](resource::ResourceLoaderDelegate) - Opaque DRM/resource-loading hook
//!
//! ### Platform integration
//! - [`IdleTimerControl`](display::IdleTimerControl) - Display sleep suppression
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ### Values
//! - [`MediaTime`](media_time::MediaTime) / [`TimeRange`](media_time::TimeRange) -
//!   rational media time with invalid, indefinite and infinite states
//!
//! ## Platform Requirements
//!
//! | Platform | Native player | Status |
//! |----------|---------------|--------|
//! | Headless | `core_playback::simulation::SimulatedPlayer` | ✅ Available |
//! | Apple    | AVQueuePlayer adapter | 📋 Planned |
//! | Android  | ExoPlayer adapter     | 📋 Planned |
//!
//! ## Error Handling
//!
//! Bridge calls that can be rejected return [`BridgeError`](error::BridgeError).
//! Media failures are not bridge errors: they surface as item status, error-log
//! entries and [`NativeError`](player::NativeError) values attached to events.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` on native targets so that a single
//! implementation can be shared between the player actor and resolver tasks.

pub mod display;
pub mod error;
pub mod logging;
pub mod media_time;
pub mod platform;
pub mod player;
pub mod resource;

pub use error::BridgeError;

// Re-export commonly used types
pub use display::IdleTimerControl;
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use media_time::{MediaTime, TimeRange};
pub use player::{
    ErrorLogEvent, MediaCharacteristic, MediaOption, NativeAsset, NativeError, NativeEvent,
    NativeItemId, NativeItemSnapshot, NativeItemStatus, NativeQueuePlayer, NativeSeek,
    NativeSeekId, NativeSelectionGroup,
};
pub use resource::{
    ItemConfiguration, Resource, ResourceLoaderDelegate, ResourceMetadata, ResourceResolver,
    ResourceStream,
};
