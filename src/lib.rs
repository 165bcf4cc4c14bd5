//! Workspace placeholder crate.
//!
//! Exposes the playback engine crates behind a single dependency so host
//! applications can enable the documented features without wiring
//! `bridge-traits`, `core-runtime` and `core-playback` individually.

#[cfg(feature = "playback")]
pub use bridge_traits;
#[cfg(feature = "playback")]
pub use core_playback;
#[cfg(feature = "playback")]
pub use core_runtime;
