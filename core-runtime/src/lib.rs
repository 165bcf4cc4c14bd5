//! # Core Runtime
//!
//! Process-level plumbing shared by every player instance:
//!
//! - [`config`]: [`CoreConfig`](config::CoreConfig), which carries the host
//!   bridges (native queue player, idle timer) into the engine and rejects
//!   missing ones up front.
//! - [`events`]: the broadcast [`EventBus`](events::EventBus) for seek, queue,
//!   item and playback notifications.
//! - [`logging`]: subscriber installation, host log forwarding and URL
//!   redaction.
//!
//! Nothing here knows how a queue or a seek works; `core-playback` builds on
//! top of these pieces.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
