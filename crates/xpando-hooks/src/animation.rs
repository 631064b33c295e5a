#![forbid(unsafe_code)]

//! Frame-driven value animation and time-boxed CSS class markers.
//!
//! An [`AnimationRun`] interpolates one scalar from `start` to `end` over a
//! fixed duration. Its start time is captured on the first frame, not at
//! construction, so a run queued during a busy frame does not skip ahead.
//!
//! The [`Animator`] drives runs through a [`TimerScope`], keyed by a target
//! name (e.g. `"window-scroll"`). Starting a run on a target that is already
//! animating cancels the previous run's frame chain; two runs never write the
//! same target in the same frame.
//!
//! [`TransientClass`] adds a class and removes it after a window. Triggering it
//! again inside the window keeps the class and restarts the window with a
//! single timer.
//!
//! # Invariants
//!
//! 1. `sample()` is monotone in time for monotone easings and returns exactly
//!    `end` once elapsed ≥ duration.
//! 2. At most one frame callback is pending per animator target.
//! 3. Releasing the owning scope stops every chain; the chain itself never
//!    polls a "still mounted" flag.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use web_time::Duration;

use crate::dom::Dom;
use crate::scheduler::TimerId;
use crate::scope::TimerScope;

// ---------------------------------------------------------------------------
// Easing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Easing {
    Linear,
    /// Quadratic ease-in-out.
    #[default]
    EaseInOutQuad,
}

impl Easing {
    /// Map normalized time `t ∈ [0, 1]` to progress `∈ [0, 1]`.
    #[must_use]
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseInOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// AnimationRun
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationRun {
    start: f64,
    end: f64,
    duration: Duration,
    easing: Easing,
    started_at: Option<f64>,
}

impl AnimationRun {
    #[must_use]
    pub fn new(start: f64, end: f64, duration: Duration) -> Self {
        Self {
            start,
            end,
            duration,
            easing: Easing::default(),
            started_at: None,
        }
    }

    #[must_use]
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    #[must_use]
    pub fn started_at(&self) -> Option<f64> {
        self.started_at
    }

    /// Value at host time `now_ms` and whether the run is finished.
    pub fn sample(&mut self, now_ms: f64) -> (f64, bool) {
        let started = *self.started_at.get_or_insert(now_ms);
        let elapsed = (now_ms - started).max(0.0);
        let duration = self.duration.as_secs_f64() * 1000.0;
        if duration <= 0.0 || elapsed >= duration {
            return (self.end, true);
        }
        let progress = self.easing.apply(elapsed / duration);
        (self.start + (self.end - self.start) * progress, false)
    }
}

// ---------------------------------------------------------------------------
// Animator
// ---------------------------------------------------------------------------

struct ActiveRun {
    generation: u64,
    frame: Option<TimerId>,
}

struct Driver {
    target: String,
    generation: u64,
    run: AnimationRun,
    on_frame: Box<dyn FnMut(f64)>,
    on_done: Option<Box<dyn FnOnce()>>,
}

/// Per-target frame-chain driver.
pub struct Animator {
    timers: TimerScope,
    active: Rc<RefCell<HashMap<String, ActiveRun>>>,
    next_generation: Cell<u64>,
}

impl fmt::Debug for Animator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Animator")
            .field("active", &self.active.borrow().len())
            .finish()
    }
}

impl Animator {
    #[must_use]
    pub fn new(timers: TimerScope) -> Self {
        Self {
            timers,
            active: Rc::new(RefCell::new(HashMap::new())),
            next_generation: Cell::new(1),
        }
    }

    /// Start `run` on `target`, superseding any run already there.
    pub fn start(
        &self,
        target: &str,
        run: AnimationRun,
        on_frame: impl FnMut(f64) + 'static,
        on_done: impl FnOnce() + 'static,
    ) {
        self.cancel(target);
        let generation = self.next_generation.get();
        self.next_generation.set(generation + 1);
        self.active.borrow_mut().insert(
            target.to_string(),
            ActiveRun {
                generation,
                frame: None,
            },
        );
        schedule(
            self.timers.clone(),
            Rc::downgrade(&self.active),
            Driver {
                target: target.to_string(),
                generation,
                run,
                on_frame: Box::new(on_frame),
                on_done: Some(Box::new(on_done)),
            },
        );
    }

    /// Stop the run on `target`, if any. Its completion callback never runs.
    pub fn cancel(&self, target: &str) {
        let previous = self.active.borrow_mut().remove(target);
        if let Some(ActiveRun {
            frame: Some(frame), ..
        }) = previous
        {
            self.timers.cancel(frame);
        }
    }

    #[must_use]
    pub fn is_running(&self, target: &str) -> bool {
        self.active.borrow().contains_key(target)
    }
}

fn schedule(
    timers: TimerScope,
    active: Weak<RefCell<HashMap<String, ActiveRun>>>,
    mut driver: Driver,
) {
    let target = driver.target.clone();
    let generation = driver.generation;
    let next_timers = timers.clone();
    let next_active = active.clone();
    let frame = timers.request_frame(move |now| {
        let Some(map) = next_active.upgrade() else {
            return;
        };
        let current = map
            .borrow()
            .get(&driver.target)
            .map(|run| run.generation);
        if current != Some(driver.generation) {
            return;
        }
        let (value, done) = driver.run.sample(now);
        (driver.on_frame)(value);
        if done {
            let still_ours = map
                .borrow()
                .get(&driver.target)
                .is_some_and(|run| run.generation == driver.generation);
            if still_ours {
                map.borrow_mut().remove(&driver.target);
            }
            drop(map);
            if let Some(on_done) = driver.on_done.take() {
                on_done();
            }
        } else {
            drop(map);
            schedule(next_timers, next_active, driver);
        }
    });
    if let Some(map) = active.upgrade() {
        if let Some(run) = map.borrow_mut().get_mut(&target) {
            if run.generation == generation {
                run.frame = frame;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TransientClass
// ---------------------------------------------------------------------------

/// A class that stays on a node for a fixed window after the last trigger.
#[derive(Debug)]
pub struct TransientClass {
    class: &'static str,
    window: Duration,
    pending: Rc<Cell<Option<TimerId>>>,
}

impl TransientClass {
    #[must_use]
    pub fn new(class: &'static str, window: Duration) -> Self {
        Self {
            class,
            window,
            pending: Rc::new(Cell::new(None)),
        }
    }

    #[must_use]
    pub fn class(&self) -> &'static str {
        self.class
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.get().is_some()
    }

    /// Add the class (if absent) and (re)start the removal window.
    pub fn trigger<D: Dom>(&self, timers: &TimerScope, dom: &Rc<D>, node: &D::Node) {
        if let Some(previous) = self.pending.take() {
            timers.cancel(previous);
        }
        if !dom.has_class(node, self.class) {
            dom.add_class(node, self.class);
        }
        let dom = Rc::clone(dom);
        let node = node.clone();
        let class = self.class;
        let pending = Rc::clone(&self.pending);
        let id = timers.set_timeout(self.window, move || {
            pending.set(None);
            dom.remove_class(&node, class);
        });
        self.pending.set(id);
    }

    /// Remove the class now and drop the pending timer.
    pub fn clear<D: Dom>(&self, timers: &TimerScope, dom: &D, node: &D::Node) {
        if let Some(previous) = self.pending.take() {
            timers.cancel(previous);
            dom.remove_class(node, self.class);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::{LabDom, LabScheduler};
    use proptest::prelude::*;

    fn timers() -> (TimerScope, Rc<LabScheduler>) {
        let sched = Rc::new(LabScheduler::new());
        (TimerScope::new(sched.clone()), sched)
    }

    #[test]
    fn start_time_is_captured_on_first_sample() {
        let mut run = AnimationRun::new(0.0, 100.0, Duration::from_millis(100))
            .with_easing(Easing::Linear);
        assert_eq!(run.started_at(), None);
        assert_eq!(run.sample(1000.0), (0.0, false));
        assert_eq!(run.started_at(), Some(1000.0));
        assert_eq!(run.sample(1050.0), (50.0, false));
        assert_eq!(run.sample(1100.0), (100.0, true));
    }

    #[test]
    fn zero_duration_finishes_immediately() {
        let mut run = AnimationRun::new(10.0, 20.0, Duration::ZERO);
        assert_eq!(run.sample(5.0), (20.0, true));
    }

    #[test]
    fn ease_in_out_is_symmetric_around_midpoint() {
        let e = Easing::EaseInOutQuad;
        assert_eq!(e.apply(0.0), 0.0);
        assert_eq!(e.apply(0.5), 0.5);
        assert_eq!(e.apply(1.0), 1.0);
        assert!((e.apply(0.25) + e.apply(0.75) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn animator_runs_to_end_and_calls_done_once() {
        let (timers, sched) = timers();
        let animator = Animator::new(timers);
        let values = Rc::new(RefCell::new(Vec::new()));
        let done = Rc::new(Cell::new(0));
        let (v, d) = (Rc::clone(&values), Rc::clone(&done));
        animator.start(
            "scroll",
            AnimationRun::new(0.0, 160.0, Duration::from_millis(160)).with_easing(Easing::Linear),
            move |x| v.borrow_mut().push(x),
            move || d.set(d.get() + 1),
        );
        assert!(animator.is_running("scroll"));
        sched.advance(Duration::from_millis(1000));
        assert_eq!(done.get(), 1);
        assert!(!animator.is_running("scroll"));
        let values = values.borrow();
        assert_eq!(values.first(), Some(&0.0));
        assert_eq!(values.last(), Some(&160.0));
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn newer_run_supersedes_older_on_same_target() {
        let (timers, sched) = timers();
        let animator = Animator::new(timers);
        let writes = Rc::new(RefCell::new(Vec::new()));
        let old_done = Rc::new(Cell::new(false));

        let (w, d) = (Rc::clone(&writes), Rc::clone(&old_done));
        animator.start(
            "scroll",
            AnimationRun::new(0.0, 1000.0, Duration::from_millis(500)),
            move |x| w.borrow_mut().push(("old", x)),
            move || d.set(true),
        );
        sched.advance(Duration::from_millis(48));
        let w = Rc::clone(&writes);
        animator.start(
            "scroll",
            AnimationRun::new(500.0, 0.0, Duration::from_millis(100)),
            move |x| w.borrow_mut().push(("new", x)),
            || {},
        );
        let switch_at = writes.borrow().len();
        sched.advance(Duration::from_millis(1000));

        assert!(!old_done.get());
        let writes = writes.borrow();
        assert!(writes[switch_at..].iter().all(|(who, _)| *who == "new"));
        assert_eq!(writes.last(), Some(&("new", 0.0)));
    }

    #[test]
    fn released_scope_stops_chain() {
        let (timers, sched) = timers();
        let animator = Animator::new(timers.clone());
        let frames = Rc::new(Cell::new(0));
        let f = Rc::clone(&frames);
        animator.start(
            "x",
            AnimationRun::new(0.0, 1.0, Duration::from_secs(10)),
            move |_| f.set(f.get() + 1),
            || {},
        );
        sched.advance(Duration::from_millis(64));
        let seen = frames.get();
        timers.release();
        sched.advance(Duration::from_secs(1));
        assert_eq!(frames.get(), seen);
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn transient_class_restarts_window_without_churn() {
        let (timers, sched) = timers();
        let dom = Rc::new(LabDom::new());
        let root = dom.document_element();
        let marker = TransientClass::new("theme-transition", Duration::from_millis(300));

        marker.trigger(&timers, &dom, &root);
        sched.advance(Duration::from_millis(200));
        marker.trigger(&timers, &dom, &root);
        assert_eq!(dom.class_additions(&root, "theme-transition"), 1);

        sched.advance(Duration::from_millis(299));
        assert!(dom.has_class(&root, "theme-transition"));
        sched.advance(Duration::from_millis(1));
        assert!(!dom.has_class(&root, "theme-transition"));
        assert!(!marker.is_pending());
        assert_eq!(timers.live_count(), 0);
    }

    proptest! {
        #[test]
        fn sample_stays_between_endpoints(
            start in -5000.0f64..5000.0,
            end in -5000.0f64..5000.0,
            duration_ms in 1u64..2000,
            offsets in proptest::collection::vec(0.0f64..3000.0, 1..20),
        ) {
            let mut sorted = offsets;
            sorted.sort_by(f64::total_cmp);
            let mut run = AnimationRun::new(start, end, Duration::from_millis(duration_ms));
            let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
            let mut previous = run.sample(0.0).0;
            for t in sorted {
                let (value, done) = run.sample(t);
                prop_assert!(value >= lo - 1e-9 && value <= hi + 1e-9);
                if start <= end {
                    prop_assert!(value >= previous - 1e-9);
                } else {
                    prop_assert!(value <= previous + 1e-9);
                }
                if done {
                    prop_assert_eq!(value, end);
                }
                previous = value;
            }
        }
    }
}
