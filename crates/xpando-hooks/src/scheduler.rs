#![forbid(unsafe_code)]

//! Timer host seam: timeouts, intervals, and frame callbacks.
//!
//! Mirrors the browser primitives (`setTimeout`, `setInterval`,
//! `requestAnimationFrame`) behind one object-safe trait so the core can be
//! driven by a virtual clock in tests.
//!
//! # Invariants
//!
//! 1. A callback never runs synchronously inside the call that registered it.
//! 2. After [`Scheduler::cancel`] returns, the cancelled callback does not run,
//!    including an interval cancelled from inside its own tick.
//! 3. Frame callbacks receive the host timestamp in milliseconds.

use web_time::Duration;

/// Handle for a scheduled timeout, interval, or frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

pub trait Scheduler {
    /// Host clock in milliseconds (same timebase as frame timestamps).
    fn now_ms(&self) -> f64;

    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId;

    fn set_interval(&self, period: Duration, callback: Box<dyn FnMut()>) -> TimerId;

    /// Run `callback` before the next repaint.
    fn request_frame(&self, callback: Box<dyn FnOnce(f64)>) -> TimerId;

    /// Cancel any kind of handle. Unknown or already-fired ids are ignored.
    fn cancel(&self, id: TimerId);
}
