#![forbid(unsafe_code)]

//! `Scheduler` over `setTimeout`, `setInterval`, and `requestAnimationFrame`.
//!
//! # Closure lifetime
//!
//! Every registration owns a `Closure` that must outlive the JS handle. A
//! closure that has fired (timeouts, frames) or been cancelled moves to a
//! graveyard instead of being dropped on the spot, since it may be the
//! closure currently executing. The graveyard is swept at the start of the
//! next callback, which by then cannot be any retired closure.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{Performance, Window};
use web_time::Duration;
use xpando_hooks::scheduler::{Scheduler, TimerId};

use super::js_message;

enum JsCallback {
    Task(Closure<dyn FnMut()>),
    Frame(Closure<dyn FnMut(f64)>),
}

#[derive(Clone, Copy)]
enum Handle {
    Timeout(i32),
    Interval(i32),
    Frame(i32),
}

struct Registration {
    handle: Handle,
    callback: JsCallback,
}

#[derive(Default)]
struct State {
    next_id: u64,
    live: HashMap<u64, Registration>,
    graveyard: Vec<JsCallback>,
}

impl State {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Entry bookkeeping for a firing callback: sweep the graveyard and report
/// whether `id` is still live.
fn enter(state: &Weak<RefCell<State>>, id: u64, one_shot: bool) -> bool {
    let Some(state) = state.upgrade() else {
        return false;
    };
    let swept = {
        let mut s = state.borrow_mut();
        let swept = std::mem::take(&mut s.graveyard);
        if one_shot {
            match s.live.remove(&id) {
                Some(registration) => s.graveyard.push(registration.callback),
                None => return false,
            }
        } else if !s.live.contains_key(&id) {
            return false;
        }
        swept
    };
    // Dropped outside the borrow: captured state may cancel timers on drop.
    drop(swept);
    true
}

pub(crate) struct WebScheduler {
    window: Window,
    performance: Option<Performance>,
    state: Rc<RefCell<State>>,
}

impl WebScheduler {
    pub(crate) fn new(window: Window) -> Self {
        let performance = window.performance();
        Self {
            window,
            performance,
            state: Rc::new(RefCell::new(State::default())),
        }
    }

    fn register(&self, id: u64, handle: Result<Handle, wasm_bindgen::JsValue>, callback: JsCallback) {
        match handle {
            Ok(handle) => {
                self.state
                    .borrow_mut()
                    .live
                    .insert(id, Registration { handle, callback });
            }
            Err(err) => {
                tracing::warn!(message = "scheduler.register_failed", error = %js_message(&err));
            }
        }
    }
}

fn millis(duration: Duration) -> i32 {
    i32::try_from(duration.as_millis()).unwrap_or(i32::MAX)
}

impl Scheduler for WebScheduler {
    fn now_ms(&self) -> f64 {
        self.performance
            .as_ref()
            .map_or_else(js_sys::Date::now, Performance::now)
    }

    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        let id = self.state.borrow_mut().allocate();
        let weak = Rc::downgrade(&self.state);
        let mut callback = Some(callback);
        let closure = Closure::<dyn FnMut()>::new(move || {
            if enter(&weak, id, true) {
                if let Some(callback) = callback.take() {
                    callback();
                }
            }
        });
        let handle = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                millis(delay),
            )
            .map(Handle::Timeout);
        self.register(id, handle, JsCallback::Task(closure));
        TimerId(id)
    }

    fn set_interval(&self, period: Duration, mut callback: Box<dyn FnMut()>) -> TimerId {
        let id = self.state.borrow_mut().allocate();
        let weak = Rc::downgrade(&self.state);
        let closure = Closure::<dyn FnMut()>::new(move || {
            if enter(&weak, id, false) {
                callback();
            }
        });
        let handle = self
            .window
            .set_interval_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                millis(period),
            )
            .map(Handle::Interval);
        self.register(id, handle, JsCallback::Task(closure));
        TimerId(id)
    }

    fn request_frame(&self, callback: Box<dyn FnOnce(f64)>) -> TimerId {
        let id = self.state.borrow_mut().allocate();
        let weak = Rc::downgrade(&self.state);
        let mut callback = Some(callback);
        let closure = Closure::<dyn FnMut(f64)>::new(move |timestamp: f64| {
            if enter(&weak, id, true) {
                if let Some(callback) = callback.take() {
                    callback(timestamp);
                }
            }
        });
        let handle = self
            .window
            .request_animation_frame(closure.as_ref().unchecked_ref())
            .map(Handle::Frame);
        self.register(id, handle, JsCallback::Frame(closure));
        TimerId(id)
    }

    fn cancel(&self, id: TimerId) {
        let mut state = self.state.borrow_mut();
        let Some(registration) = state.live.remove(&id.0) else {
            return;
        };
        match registration.handle {
            Handle::Timeout(handle) => self.window.clear_timeout_with_handle(handle),
            Handle::Interval(handle) => self.window.clear_interval_with_handle(handle),
            Handle::Frame(handle) => {
                if let Err(err) = self.window.cancel_animation_frame(handle) {
                    tracing::debug!(message = "scheduler.cancel_frame_failed", error = %js_message(&err));
                }
            }
        }
        state.graveyard.push(registration.callback);
    }
}

impl Drop for WebScheduler {
    fn drop(&mut self) {
        let live: Vec<u64> = self.state.borrow().live.keys().copied().collect();
        for id in live {
            self.cancel(TimerId(id));
        }
    }
}
