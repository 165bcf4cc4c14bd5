//! # Seek Coordinator
//!
//! The native player runs one seek at a time and preempts the running one
//! when a new seek is issued. The coordinator lets callers submit overlapping
//! requests anyway: requests are queued in FIFO order, only the tail is ever
//! the target, and superseded requests complete with `finished = false`.
//!
//! ## Sequencing
//!
//! - A precise request is issued right away, preempting whatever is in flight.
//! - A smooth request submitted while another request is pending waits for
//!   the in-flight native seek to complete; the tail at that moment is issued.
//! - When the tail's own native seek finishes, every pending request is
//!   satisfied and the queue drains.
//! - When the tail's native seek reports not finished without being
//!   superseded, it is re-issued up to the configured retry limit.
//!
//! Seek started / ended notifications go out once per burst of coalesced
//! requests, not once per native seek.

use crate::error::{PlaybackError, Result};
use crate::time::{clamp_to_range, is_near_end, unblocked_position};
use bridge_traits::{MediaTime, NativeQueuePlayer, NativeSeek, NativeSeekId, TimeRange};
use core_runtime::events::{CoreEvent, EventBus, SeekEvent};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Target position of a seek with its tolerances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekPosition {
    pub time: MediaTime,
    pub tolerance_before: MediaTime,
    pub tolerance_after: MediaTime,
}

impl SeekPosition {
    /// Exactly `time`.
    pub fn to(time: MediaTime) -> Self {
        Self::with_tolerances(time, MediaTime::ZERO, MediaTime::ZERO)
    }

    /// Anywhere around `time`; the fastest seek.
    pub fn near(time: MediaTime) -> Self {
        Self::with_tolerances(time, MediaTime::POSITIVE_INFINITY, MediaTime::POSITIVE_INFINITY)
    }

    /// At or before `time`.
    pub fn before(time: MediaTime) -> Self {
        Self::with_tolerances(time, MediaTime::POSITIVE_INFINITY, MediaTime::ZERO)
    }

    /// At or after `time`.
    pub fn after(time: MediaTime) -> Self {
        Self::with_tolerances(time, MediaTime::ZERO, MediaTime::POSITIVE_INFINITY)
    }

    pub fn with_tolerances(
        time: MediaTime,
        tolerance_before: MediaTime,
        tolerance_after: MediaTime,
    ) -> Self {
        Self {
            time,
            tolerance_before,
            tolerance_after,
        }
    }

    /// Rejects targets that are not finite, well-formed times.
    pub fn validate(&self) -> Result<()> {
        if !self.time.is_numeric() {
            return Err(PlaybackError::InvalidArgument(format!(
                "seek target must be a finite time, got {}",
                self.time
            )));
        }
        Ok(())
    }
}

/// Callback receiving whether a seek request reached its target.
pub type SeekCompletion = Box<dyn FnOnce(bool) + Send>;

struct SeekRequest {
    id: u64,
    position: SeekPosition,
    smooth: bool,
    completion: Option<SeekCompletion>,
}

impl SeekRequest {
    fn resolve(mut self, finished: bool) {
        debug!(request = self.id, finished, "Seek request resolved");
        if let Some(completion) = self.completion.take() {
            completion(finished);
        }
    }
}

impl fmt::Debug for SeekRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeekRequest")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("smooth", &self.smooth)
            .finish()
    }
}

/// Facts about the current item a seek is clamped against.
#[derive(Debug, Clone, Default)]
pub struct SeekContext {
    pub seekable: TimeRange,
    pub blocked: Vec<TimeRange>,
}

/// Serialises seek requests onto the native player.
pub struct SeekCoordinator {
    pending: VecDeque<SeekRequest>,
    issued: HashMap<NativeSeekId, u64>,
    in_flight: Option<(NativeSeekId, u64)>,
    retries: u32,
    retry_limit: Option<u32>,
    end_tolerance_window: Duration,
    smooth_enabled: bool,
    next_request_id: u64,
    next_seek_id: u64,
    events: EventBus,
}

impl SeekCoordinator {
    pub fn new(
        events: EventBus,
        retry_limit: Option<u32>,
        end_tolerance_window: Duration,
        smooth_enabled: bool,
    ) -> Self {
        Self {
            pending: VecDeque::new(),
            issued: HashMap::new(),
            in_flight: None,
            retries: 0,
            retry_limit,
            end_tolerance_window,
            smooth_enabled,
            next_request_id: 0,
            next_seek_id: 0,
            events,
        }
    }

    pub fn is_seeking(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Target of the request that will eventually win.
    pub fn seek_target(&self) -> Option<MediaTime> {
        self.pending.back().map(|request| request.position.time)
    }

    /// Queues a request.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::InvalidArgument`] when the target is not a finite time;
    /// the completion is dropped without being called.
    pub fn submit(
        &mut self,
        player: &dyn NativeQueuePlayer,
        context: &SeekContext,
        position: SeekPosition,
        smooth: bool,
        completion: Option<SeekCompletion>,
    ) -> Result<()> {
        position.validate()?;

        self.next_request_id += 1;
        let request = SeekRequest {
            id: self.next_request_id,
            position,
            smooth: smooth && self.smooth_enabled,
            completion,
        };

        if player.items().is_empty() {
            debug!(request = request.id, "Native queue empty, seek is a no-op");
            request.resolve(true);
            return Ok(());
        }

        if self.pending.is_empty() {
            self.emit(SeekEvent::Started {
                target: position.time,
            });
        }

        let defer = request.smooth && !self.pending.is_empty() && self.in_flight.is_some();
        self.pending.push_back(request);

        if defer {
            debug!(pending = self.pending.len(), "Smooth seek deferred");
        } else {
            self.retries = 0;
            self.issue_tail(player, context);
        }
        Ok(())
    }

    /// Handles completion of a native seek.
    pub fn on_completed(
        &mut self,
        player: &dyn NativeQueuePlayer,
        context: &SeekContext,
        seek_id: NativeSeekId,
        finished: bool,
    ) {
        let Some(executed) = self.issued.remove(&seek_id) else {
            debug!(seek_id = %seek_id, "Ignoring completion of an unknown seek");
            return;
        };
        let Some(tail) = self.pending.back().map(|request| request.id) else {
            return;
        };
        let tail_in_flight = matches!(self.in_flight, Some((_, request)) if request == tail);
        let is_current_flight = matches!(self.in_flight, Some((id, _)) if id == seek_id);
        if is_current_flight {
            self.in_flight = None;
        }

        if executed != tail {
            self.resolve_superseded();
            if !tail_in_flight {
                self.retries = 0;
                self.issue_tail(player, context);
            }
            return;
        }

        if !is_current_flight {
            // A newer native seek for the same request is still running.
            return;
        }

        if finished {
            self.drain(true);
            return;
        }

        self.retries += 1;
        if self.retry_limit.is_some_and(|limit| self.retries > limit) {
            warn!(
                retries = self.retries - 1,
                "Seek did not finish, giving up after retry limit"
            );
            self.drain(false);
            return;
        }
        debug!(attempt = self.retries, "Seek did not finish, re-issuing");
        self.issue_tail(player, context);
    }

    /// Resolves every pending request as not finished, for example when the
    /// item being sought changed.
    pub fn cancel_all(&mut self) {
        self.issued.clear();
        self.in_flight = None;
        if self.pending.is_empty() {
            return;
        }
        debug!(pending = self.pending.len(), "Cancelling pending seeks");
        self.drain(false);
    }

    /// Resolves everything in front of the tail as superseded.
    fn resolve_superseded(&mut self) {
        while self.pending.len() > 1 {
            if let Some(request) = self.pending.pop_front() {
                request.resolve(false);
            }
        }
    }

    /// Resolves the tail with `finished` and everything else as superseded,
    /// then publishes the end of the seek.
    fn drain(&mut self, finished: bool) {
        let tail = self.pending.pop_back();
        for request in self.pending.drain(..) {
            request.resolve(false);
        }
        if let Some(tail) = tail {
            tail.resolve(finished);
        }
        self.retries = 0;
        self.issued.clear();
        self.in_flight = None;
        self.emit(SeekEvent::Ended);
    }

    fn issue_tail(&mut self, player: &dyn NativeQueuePlayer, context: &SeekContext) {
        let Some(request) = self.pending.back() else {
            return;
        };
        let request_id = request.id;
        let position = request.position;
        self.next_seek_id += 1;
        let seek = self.native_seek(NativeSeekId::new(self.next_seek_id), &position, context);

        self.issued.insert(seek.id, request_id);
        self.in_flight = Some((seek.id, request_id));
        debug!(
            seek_id = %seek.id,
            request = request_id,
            target_secs = seek.target.seconds(),
            "Issuing native seek"
        );
        player.seek(seek);
    }

    fn native_seek(&self, id: NativeSeekId, position: &SeekPosition, context: &SeekContext) -> NativeSeek {
        let mut target = clamp_to_range(position.time, &context.seekable);
        let mut tolerance_before = position.tolerance_before;
        let mut tolerance_after = position.tolerance_after;

        if let Some(unblocked) = unblocked_position(target, &context.blocked) {
            debug!(
                requested_secs = target.seconds(),
                target_secs = unblocked.seconds(),
                "Seek target moved out of blocked range"
            );
            target = clamp_to_range(unblocked, &context.seekable);
            tolerance_before = MediaTime::ZERO;
            tolerance_after = MediaTime::ZERO;
        }

        if is_near_end(target, &context.seekable, self.end_tolerance_window) {
            tolerance_before = MediaTime::ZERO;
            tolerance_after = MediaTime::ZERO;
        }

        NativeSeek {
            id,
            target,
            tolerance_before,
            tolerance_after,
        }
    }

    fn emit(&self, event: SeekEvent) {
        // No subscribers is fine.
        let _ = self.events.emit(CoreEvent::Seek(event));
    }
}

impl fmt::Debug for SeekCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeekCoordinator")
            .field("pending", &self.pending)
            .field("in_flight", &self.in_flight)
            .field("retries", &self.retries)
            .finish()
    }
}

impl Drop for SeekCoordinator {
    fn drop(&mut self) {
        for request in self.pending.drain(..) {
            request.resolve(false);
        }
    }
}
