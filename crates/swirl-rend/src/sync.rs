//! Handoff and back-pressure protocol between the producer and render execution.
//!
//! The shared state is deliberately tiny:
//! - `pending`: a render was dispatched and has not been acknowledged yet;
//! - `render_start`: raised after a job is queued, used by hosts that pump render execution from
//!   their own loop;
//! - `render_end`: raised when the pending render is acknowledged.
//!
//! Protocol:
//! 1) The producer waits until nothing is pending ([`RenderSync::wait_idle`]).
//! 2) [`RenderSync::begin`] clears any stale `render_end`, sets `pending` and hands out an
//!    [`AckToken`]. The token travels with the queued job.
//! 3) Render execution fires the token exactly once. Firing clears `pending` and raises
//!    `render_end`. Dropping an unfired token fires it, so abandoned jobs never strand the
//!    producer.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Binary auto-reset event: `set` latches, a successful wait consumes the latch.
#[derive(Debug, Default)]
pub struct RenderEvent {
    signaled: Mutex<bool>,
    cv: Condvar,
}

impl RenderEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        let mut signaled = self.signaled.lock().unwrap_or_else(PoisonError::into_inner);
        *signaled = true;
        self.cv.notify_all();
    }

    pub fn reset(&self) {
        *self.signaled.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }

    pub fn is_set(&self) -> bool {
        *self.signaled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the event is set, then reset it.
    pub fn wait(&self) {
        let mut signaled = self.signaled.lock().unwrap_or_else(PoisonError::into_inner);
        while !*signaled {
            signaled = self.cv.wait(signaled).unwrap_or_else(PoisonError::into_inner);
        }
        *signaled = false;
    }

    /// Like [`RenderEvent::wait`] but gives up after `timeout`. Returns whether the event fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut signaled = self.signaled.lock().unwrap_or_else(PoisonError::into_inner);
        while !*signaled {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .cv
                .wait_timeout(signaled, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            signaled = guard;
        }
        *signaled = false;
        true
    }
}

/// Shared pending flag plus the two events.
#[derive(Debug, Default)]
pub struct RenderSync {
    pending: AtomicBool,
    render_start: RenderEvent,
    render_end: RenderEvent,
    acks: AtomicU64,
}

impl RenderSync {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Number of acknowledgments fired so far.
    pub fn acks(&self) -> u64 {
        self.acks.load(Ordering::SeqCst)
    }

    /// Mark a new render as pending and return the token that will acknowledge it.
    ///
    /// The caller must have observed the previous render's acknowledgment first.
    pub fn begin(self: &Arc<Self>) -> AckToken {
        debug_assert!(!self.is_pending(), "render dispatched while one is pending");
        // A latched `render_end` from an earlier, never-awaited acknowledgment must not satisfy
        // the wait for this render.
        self.render_end.reset();
        self.pending.store(true, Ordering::SeqCst);
        AckToken {
            sync: Arc::clone(self),
            armed: true,
        }
    }

    /// Raise `render_start` once a job is visible to render execution.
    pub fn signal_start(&self) {
        self.render_start.set();
    }

    pub fn wait_start_timeout(&self, timeout: Duration) -> bool {
        self.render_start.wait_timeout(timeout)
    }

    fn acknowledge(&self) {
        self.pending.store(false, Ordering::SeqCst);
        self.acks.fetch_add(1, Ordering::SeqCst);
        self.render_end.set();
    }

    /// Block until no render is pending. Returns immediately if nothing was dispatched.
    ///
    /// `pending` is the source of truth; `render_end` only wakes the waiter. A latch left behind by
    /// an acknowledgment that raced an earlier early return is consumed and the flag rechecked.
    pub fn wait_idle(&self) {
        while self.is_pending() {
            self.render_end.wait();
        }
    }

    /// Bounded variant of [`RenderSync::wait_idle`]. Returns `false` if the render is still
    /// pending after `timeout`.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.is_pending() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !self.render_end.wait_timeout(remaining) {
                return !self.is_pending();
            }
        }
        true
    }
}

/// One-shot acknowledgment for a pending render.
#[derive(Debug)]
#[must_use = "dropping an AckToken acknowledges the render immediately"]
pub struct AckToken {
    sync: Arc<RenderSync>,
    armed: bool,
}

impl AckToken {
    pub fn acknowledge(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if std::mem::take(&mut self.armed) {
            self.sync.acknowledge();
        }
    }
}

impl Drop for AckToken {
    fn drop(&mut self) {
        self.fire();
    }
}

/// When a frame's acknowledgment is allowed to fire.
#[derive(Debug)]
pub enum Acknowledgement {
    /// Normal frames: as soon as `process` has consumed the command list, before any swap work.
    /// The producer may then run one frame ahead of the GPU.
    OnConsume(AckToken),
    /// Render-to-texture frames: only after the frame is fully rendered, because the producer may
    /// read the result back. A failed `process` still acknowledges right away.
    OnCompletion(AckToken),
}

impl Acknowledgement {
    pub fn for_frame(token: AckToken, is_rtt: bool) -> Self {
        if is_rtt {
            Acknowledgement::OnCompletion(token)
        } else {
            Acknowledgement::OnConsume(token)
        }
    }

    /// Called once `process` returned. Yields the token if it must be held until the frame is
    /// rendered.
    pub(crate) fn after_process(self, processed: bool) -> Option<AckToken> {
        match self {
            Acknowledgement::OnCompletion(token) if processed => Some(token),
            Acknowledgement::OnConsume(token) | Acknowledgement::OnCompletion(token) => {
                token.acknowledge();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn event_wait_consumes_the_latch() {
        let event = RenderEvent::new();
        event.set();
        assert!(event.is_set());
        event.wait();
        assert!(!event.is_set());
        assert!(!event.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn event_wakes_a_blocked_waiter() {
        let event = Arc::new(RenderEvent::new());
        let waiter = {
            let event = event.clone();
            thread::spawn(move || event.wait_timeout(Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(10));
        event.set();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn wait_idle_returns_immediately_when_nothing_is_pending() {
        let sync = RenderSync::new();
        sync.wait_idle();
        assert!(sync.wait_idle_timeout(Duration::ZERO));
        assert_eq!(sync.acks(), 0);
    }

    #[test]
    fn token_fires_exactly_once() {
        let sync = RenderSync::new();
        let token = sync.begin();
        assert!(sync.is_pending());
        token.acknowledge();
        assert!(!sync.is_pending());
        assert_eq!(sync.acks(), 1);
    }

    #[test]
    fn dropping_a_token_acknowledges() {
        let sync = RenderSync::new();
        drop(sync.begin());
        assert!(!sync.is_pending());
        assert_eq!(sync.acks(), 1);
        sync.wait_idle();
    }

    #[test]
    fn stale_render_end_does_not_satisfy_the_next_wait() {
        let sync = RenderSync::new();
        // Acknowledged without the producer ever waiting: `render_end` stays latched.
        sync.begin().acknowledge();

        let _token = sync.begin();
        assert!(!sync.wait_idle_timeout(Duration::from_millis(5)));
        assert!(sync.is_pending());
    }

    #[test]
    fn late_render_end_from_previous_frame_is_ignored() {
        let sync = RenderSync::new();
        let _token = sync.begin();
        // The previous frame's acknowledgment raises `render_end` after `begin` reset it.
        sync.render_end.set();

        assert!(!sync.wait_idle_timeout(Duration::from_millis(5)));
        assert!(sync.is_pending());
        assert!(!sync.render_end.is_set());
    }

    #[test]
    fn blocking_wait_survives_a_late_render_end() {
        let sync = RenderSync::new();
        let token = sync.begin();
        sync.render_end.set();

        let render = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            token.acknowledge();
        });
        sync.wait_idle();
        // Only the real acknowledgment may release the producer.
        assert_eq!(sync.acks(), 1);
        assert!(!sync.is_pending());
        render.join().unwrap();
    }

    #[test]
    fn bounded_wait_times_out_while_pending() {
        let sync = RenderSync::new();
        let token = sync.begin();
        assert!(!sync.wait_idle_timeout(Duration::from_millis(5)));
        token.acknowledge();
        assert!(sync.wait_idle_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn producer_unblocks_when_render_side_acknowledges() {
        let sync = RenderSync::new();
        let token = sync.begin();
        let render = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            token.acknowledge();
        });
        sync.wait_idle();
        assert!(!sync.is_pending());
        render.join().unwrap();
    }

    #[test]
    fn completion_ack_is_held_only_for_successful_processing() {
        let sync = RenderSync::new();

        let held = Acknowledgement::for_frame(sync.begin(), true).after_process(true);
        assert!(held.is_some());
        assert!(sync.is_pending());
        drop(held);
        assert!(!sync.is_pending());

        let held = Acknowledgement::for_frame(sync.begin(), true).after_process(false);
        assert!(held.is_none());
        assert!(!sync.is_pending());

        let held = Acknowledgement::for_frame(sync.begin(), false).after_process(true);
        assert!(held.is_none());
        assert!(!sync.is_pending());
        assert_eq!(sync.acks(), 3);
    }
}
