//! Display Integration
//!
//! Hosts keep the screen awake while video is playing. The core decides when
//! that is needed; the host only flips the platform switch.

use crate::platform::PlatformSendSync;

/// Platform switch that prevents the display from sleeping.
///
/// The core calls this with `true` when the first player starts playing and
/// with `false` once no player needs the display any longer. Calls are never
/// repeated with the same value.
#[cfg_attr(test, mockall::automock)]
pub trait IdleTimerControl: PlatformSendSync {
    fn set_idle_timer_disabled(&self, disabled: bool);
}
