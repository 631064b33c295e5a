#![forbid(unsafe_code)]

//! Virtual-clock [`Scheduler`].
//!
//! Time only moves when a test calls [`LabScheduler::advance`]. Callbacks
//! due within the advanced window run in `(due, registration)` order, and
//! each runs with the clock set to its own due time. Frame callbacks are due
//! one frame interval after they were requested.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

use web_time::Duration;

use crate::scheduler::{Scheduler, TimerId};

/// Frame cadence of the lab host (≈60 Hz).
pub const LAB_FRAME_MS: u64 = 16;

enum Task {
    Timeout(Box<dyn FnOnce()>),
    Interval {
        period: u64,
        callback: Box<dyn FnMut()>,
    },
    Frame(Box<dyn FnOnce(f64)>),
}

pub struct LabScheduler {
    now: Cell<u64>,
    next_id: Cell<u64>,
    frame_ms: u64,
    queue: RefCell<BTreeMap<(u64, u64), TimerId>>,
    tasks: RefCell<HashMap<TimerId, Task>>,
    running: Cell<Option<TimerId>>,
    running_cancelled: Cell<bool>,
}

impl std::fmt::Debug for LabScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabScheduler")
            .field("now", &self.now.get())
            .field("pending", &self.pending())
            .finish()
    }
}

impl Default for LabScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl LabScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::with_frame_interval(Duration::from_millis(LAB_FRAME_MS))
    }

    #[must_use]
    pub fn with_frame_interval(frame: Duration) -> Self {
        Self {
            now: Cell::new(0),
            next_id: Cell::new(1),
            frame_ms: millis(frame).max(1),
            queue: RefCell::new(BTreeMap::new()),
            tasks: RefCell::new(HashMap::new()),
            running: Cell::new(None),
            running_cancelled: Cell::new(false),
        }
    }

    /// Virtual time since creation.
    #[must_use]
    pub fn now(&self) -> Duration {
        Duration::from_millis(self.now.get())
    }

    /// Registered callbacks that have neither fired (one-shots) nor been
    /// cancelled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Move the clock forward by `by`, running everything that falls due.
    pub fn advance(&self, by: Duration) {
        let target = self.now.get().saturating_add(millis(by));
        while let Some((due, id)) = self.pop_due(target) {
            let Some(task) = self.tasks.borrow_mut().remove(&id) else {
                continue;
            };
            self.now.set(due);
            match task {
                Task::Timeout(callback) => callback(),
                Task::Frame(callback) => callback(due as f64),
                Task::Interval {
                    period,
                    mut callback,
                } => {
                    self.running.set(Some(id));
                    self.running_cancelled.set(false);
                    callback();
                    self.running.set(None);
                    if !self.running_cancelled.get() {
                        self.tasks
                            .borrow_mut()
                            .insert(id, Task::Interval { period, callback });
                        self.queue
                            .borrow_mut()
                            .insert((due + period, self.bump()), id);
                    }
                }
            }
        }
        self.now.set(target);
    }

    fn pop_due(&self, target: u64) -> Option<(u64, TimerId)> {
        let mut queue = self.queue.borrow_mut();
        let (&(due, seq), _) = queue.iter().next()?;
        if due > target {
            return None;
        }
        queue.remove(&(due, seq)).map(|id| (due, id))
    }

    fn bump(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn insert(&self, delay_ms: u64, task: Task) -> TimerId {
        let seq = self.bump();
        let id = TimerId(seq);
        self.tasks.borrow_mut().insert(id, task);
        self.queue
            .borrow_mut()
            .insert((self.now.get().saturating_add(delay_ms), seq), id);
        id
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl Scheduler for LabScheduler {
    fn now_ms(&self) -> f64 {
        self.now.get() as f64
    }

    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        self.insert(millis(delay), Task::Timeout(callback))
    }

    fn set_interval(&self, period: Duration, callback: Box<dyn FnMut()>) -> TimerId {
        let period = millis(period).max(1);
        self.insert(period, Task::Interval { period, callback })
    }

    fn request_frame(&self, callback: Box<dyn FnOnce(f64)>) -> TimerId {
        self.insert(self.frame_ms, Task::Frame(callback))
    }

    fn cancel(&self, id: TimerId) {
        if self.running.get() == Some(id) {
            self.running_cancelled.set(true);
        }
        self.tasks.borrow_mut().remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn timeouts_run_in_due_order_at_their_due_time() {
        let sched = Rc::new(LabScheduler::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        for (delay, tag) in [(30, "c"), (10, "a"), (10, "b")] {
            let (l, s) = (Rc::clone(&log), Rc::clone(&sched));
            sched.set_timeout(
                Duration::from_millis(delay),
                Box::new(move || l.borrow_mut().push((tag, s.now_ms()))),
            );
        }
        sched.advance(Duration::from_millis(100));
        assert_eq!(*log.borrow(), vec![("a", 10.0), ("b", 10.0), ("c", 30.0)]);
        assert_eq!(sched.now(), Duration::from_millis(100));
    }

    #[test]
    fn nested_registration_inside_window_runs() {
        let sched = Rc::new(LabScheduler::new());
        let hits = Rc::new(Cell::new(0));
        let (h, s) = (Rc::clone(&hits), Rc::clone(&sched));
        sched.set_timeout(
            Duration::from_millis(5),
            Box::new(move || {
                let h = Rc::clone(&h);
                s.set_timeout(Duration::from_millis(5), Box::new(move || h.set(h.get() + 1)));
            }),
        );
        sched.advance(Duration::from_millis(10));
        assert_eq!(hits.get(), 1);
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn cancelled_interval_stays_cancelled() {
        let sched = LabScheduler::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let id = sched.set_interval(Duration::from_millis(10), Box::new(move || h.set(h.get() + 1)));
        sched.advance(Duration::from_millis(25));
        sched.cancel(id);
        sched.advance(Duration::from_millis(100));
        assert_eq!(hits.get(), 2);
        assert_eq!(sched.pending(), 0);
    }
}
