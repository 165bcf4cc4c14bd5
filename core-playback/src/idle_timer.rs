//! Display sleep suppression.
//!
//! Any number of players may want the display to stay awake at once. The
//! [`IdleTimerService`] counts outstanding [`IdleTimerLease`]s and disables
//! the platform idle timer while at least one is held.

use bridge_traits::IdleTimerControl;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

struct Inner {
    leases: usize,
    control: Option<Arc<dyn IdleTimerControl>>,
}

/// Shared lease counter. Clones share the count.
#[derive(Clone)]
pub struct IdleTimerService {
    inner: Arc<Mutex<Inner>>,
}

impl IdleTimerService {
    pub fn new(control: Option<Arc<dyn IdleTimerControl>>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner { leases: 0, control })),
        }
    }

    /// Takes a lease; the idle timer stays disabled until it is dropped.
    pub fn acquire(&self) -> IdleTimerLease {
        let mut inner = self.inner.lock();
        inner.leases += 1;
        if inner.leases == 1 {
            debug!("Disabling idle timer");
            if let Some(control) = &inner.control {
                control.set_idle_timer_disabled(true);
            }
        }
        IdleTimerLease {
            service: self.clone(),
        }
    }

    pub fn lease_count(&self) -> usize {
        self.inner.lock().leases
    }

    pub fn is_idle_timer_disabled(&self) -> bool {
        self.lease_count() > 0
    }

    fn release(&self) {
        let mut inner = self.inner.lock();
        inner.leases = inner.leases.saturating_sub(1);
        if inner.leases == 0 {
            debug!("Re-enabling idle timer");
            if let Some(control) = &inner.control {
                control.set_idle_timer_disabled(false);
            }
        }
    }
}

impl Default for IdleTimerService {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for IdleTimerService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleTimerService")
            .field("leases", &self.lease_count())
            .finish()
    }
}

/// Keeps the idle timer disabled while alive.
#[must_use = "the idle timer is re-enabled as soon as the lease is dropped"]
#[derive(Debug)]
pub struct IdleTimerLease {
    service: IdleTimerService,
}

impl Drop for IdleTimerLease {
    fn drop(&mut self) {
        self.service.release();
    }
}
