#![forbid(unsafe_code)]

//! Handle ownership for one hook instance.
//!
//! Every timer, DOM listener, channel handler, and preference subscription a
//! hook registers goes through its scope. [`HookScope::release`] tears all of
//! them down synchronously, which is what makes `destroyed()` total.
//!
//! # Invariants
//!
//! 1. After `release()`, no callback registered through the scope runs, even
//!    one the host already queued (each wrapper checks the released flag).
//! 2. After `release()`, registration calls return `None` and outbound pushes
//!    are dropped.
//! 3. `release()` is idempotent.
//! 4. One-shot timers forget their id when they fire, so a long-lived scope
//!    does not accumulate dead handles.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::{Rc, Weak};

use web_time::Duration;

use crate::channel::{ChannelRef, ClientEvent, ServerChannel, ServerEvent, ServerEventKind};
use crate::dom::{Dom, DomEvent, DomEventKind, EventTarget, ListenerId};
use crate::prefs::{PreferenceChange, PreferenceStore, SubscriptionId};
use crate::scheduler::{Scheduler, TimerId};

// ---------------------------------------------------------------------------
// TimerScope
// ---------------------------------------------------------------------------

struct TimerScopeInner {
    scheduler: Rc<dyn Scheduler>,
    live: RefCell<BTreeSet<TimerId>>,
    released: Cell<bool>,
}

/// Cancellable set of timers sharing one released flag.
///
/// Cloning yields another handle to the same set.
#[derive(Clone)]
pub struct TimerScope {
    inner: Rc<TimerScopeInner>,
}

impl fmt::Debug for TimerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerScope")
            .field("live", &self.inner.live.borrow().len())
            .field("released", &self.inner.released.get())
            .finish()
    }
}

impl TimerScope {
    #[must_use]
    pub fn new(scheduler: Rc<dyn Scheduler>) -> Self {
        Self {
            inner: Rc::new(TimerScopeInner {
                scheduler,
                live: RefCell::new(BTreeSet::new()),
                released: Cell::new(false),
            }),
        }
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.inner.released.get()
    }

    /// Timers registered and not yet fired or cancelled.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.inner.live.borrow().len()
    }

    #[must_use]
    pub fn now_ms(&self) -> f64 {
        self.inner.scheduler.now_ms()
    }

    pub fn set_timeout(&self, delay: Duration, callback: impl FnOnce() + 'static) -> Option<TimerId> {
        if self.is_released() {
            return None;
        }
        let weak = Rc::downgrade(&self.inner);
        let slot = Rc::new(Cell::new(None::<TimerId>));
        let own_id = Rc::clone(&slot);
        let id = self.inner.scheduler.set_timeout(
            delay,
            Box::new(move || {
                let Some(inner) = live_inner(&weak) else {
                    return;
                };
                if let Some(id) = own_id.get() {
                    inner.live.borrow_mut().remove(&id);
                }
                drop(inner);
                callback();
            }),
        );
        slot.set(Some(id));
        self.inner.live.borrow_mut().insert(id);
        Some(id)
    }

    pub fn set_interval(
        &self,
        period: Duration,
        mut callback: impl FnMut() + 'static,
    ) -> Option<TimerId> {
        if self.is_released() {
            return None;
        }
        let weak = Rc::downgrade(&self.inner);
        let id = self.inner.scheduler.set_interval(
            period,
            Box::new(move || {
                if live_inner(&weak).is_some() {
                    callback();
                }
            }),
        );
        self.inner.live.borrow_mut().insert(id);
        Some(id)
    }

    pub fn request_frame(&self, callback: impl FnOnce(f64) + 'static) -> Option<TimerId> {
        if self.is_released() {
            return None;
        }
        let weak = Rc::downgrade(&self.inner);
        let slot = Rc::new(Cell::new(None::<TimerId>));
        let own_id = Rc::clone(&slot);
        let id = self.inner.scheduler.request_frame(Box::new(move |ts| {
            let Some(inner) = live_inner(&weak) else {
                return;
            };
            if let Some(id) = own_id.get() {
                inner.live.borrow_mut().remove(&id);
            }
            drop(inner);
            callback(ts);
        }));
        slot.set(Some(id));
        self.inner.live.borrow_mut().insert(id);
        Some(id)
    }

    pub fn cancel(&self, id: TimerId) {
        if self.inner.live.borrow_mut().remove(&id) {
            self.inner.scheduler.cancel(id);
        }
    }

    pub fn release(&self) {
        if self.inner.released.replace(true) {
            return;
        }
        let live = std::mem::take(&mut *self.inner.live.borrow_mut());
        for id in live {
            self.inner.scheduler.cancel(id);
        }
    }
}

fn live_inner(weak: &Weak<TimerScopeInner>) -> Option<Rc<TimerScopeInner>> {
    weak.upgrade().filter(|inner| !inner.released.get())
}

// ---------------------------------------------------------------------------
// HookScope
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Registrations {
    listeners: Vec<ListenerId>,
    channel: Vec<ChannelRef>,
    preferences: Vec<SubscriptionId>,
}

/// Everything one hook instance may register, released as a unit.
pub struct HookScope<D: Dom> {
    timers: TimerScope,
    dom: Rc<D>,
    channel: Option<Rc<dyn ServerChannel>>,
    prefs: PreferenceStore,
    registrations: Rc<RefCell<Registrations>>,
}

impl<D: Dom> Clone for HookScope<D> {
    fn clone(&self) -> Self {
        Self {
            timers: self.timers.clone(),
            dom: Rc::clone(&self.dom),
            channel: self.channel.clone(),
            prefs: self.prefs.clone(),
            registrations: Rc::clone(&self.registrations),
        }
    }
}

impl<D: Dom> fmt::Debug for HookScope<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let regs = self.registrations.borrow();
        f.debug_struct("HookScope")
            .field("timers", &self.timers)
            .field("listeners", &regs.listeners.len())
            .field("channel_handlers", &regs.channel.len())
            .field("preference_subscriptions", &regs.preferences.len())
            .field("has_channel", &self.channel.is_some())
            .finish()
    }
}

impl<D: Dom> HookScope<D> {
    #[must_use]
    pub fn new(
        dom: Rc<D>,
        scheduler: Rc<dyn Scheduler>,
        prefs: PreferenceStore,
        channel: Option<Rc<dyn ServerChannel>>,
    ) -> Self {
        Self {
            timers: TimerScope::new(scheduler),
            dom,
            channel,
            prefs,
            registrations: Rc::new(RefCell::new(Registrations::default())),
        }
    }

    #[must_use]
    pub fn timers(&self) -> &TimerScope {
        &self.timers
    }

    #[must_use]
    pub fn dom(&self) -> &Rc<D> {
        &self.dom
    }

    #[must_use]
    pub fn prefs(&self) -> &PreferenceStore {
        &self.prefs
    }

    #[must_use]
    pub fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.timers.is_released()
    }

    /// Total handles currently owned (timers, listeners, channel handlers,
    /// preference subscriptions).
    #[must_use]
    pub fn handle_count(&self) -> usize {
        let regs = self.registrations.borrow();
        self.timers.live_count() + regs.listeners.len() + regs.channel.len() + regs.preferences.len()
    }

    pub fn listen(
        &self,
        target: EventTarget<D::Node>,
        kind: DomEventKind,
        listener: impl Fn(&DomEvent<D::Node>) + 'static,
    ) -> Option<ListenerId> {
        if self.is_released() {
            return None;
        }
        let timers = self.timers.clone();
        let id = self.dom.add_listener(
            &target,
            kind,
            Rc::new(move |event: &DomEvent<D::Node>| {
                if !timers.is_released() {
                    listener(event);
                }
            }),
        );
        self.registrations.borrow_mut().listeners.push(id);
        Some(id)
    }

    pub fn unlisten(&self, id: ListenerId) {
        let mut regs = self.registrations.borrow_mut();
        if let Some(pos) = regs.listeners.iter().position(|l| *l == id) {
            regs.listeners.swap_remove(pos);
            drop(regs);
            self.dom.remove_listener(id);
        }
    }

    /// Register an inbound handler. A payload that does not decode is logged
    /// and dropped. Without a channel this is a no-op.
    pub fn on_server_event(
        &self,
        kind: ServerEventKind,
        handler: impl Fn(ServerEvent) + 'static,
    ) -> Option<ChannelRef> {
        if self.is_released() {
            return None;
        }
        let channel = self.channel.as_ref()?;
        let timers = self.timers.clone();
        let handle = channel.handle_event(
            kind.event_name(),
            Rc::new(move |payload| {
                if timers.is_released() {
                    return;
                }
                match ServerEvent::decode(kind, payload) {
                    Ok(event) => handler(event),
                    Err(err) => {
                        tracing::warn!(
                            message = "channel.decode_failed",
                            event = kind.event_name(),
                            error = %err
                        );
                    }
                }
            }),
        );
        self.registrations.borrow_mut().channel.push(handle);
        Some(handle)
    }

    /// Send an outbound event. Dropped when there is no channel or the scope
    /// has been released.
    pub fn push(&self, event: ClientEvent) {
        if self.is_released() {
            return;
        }
        let Some(channel) = self.channel.as_ref() else {
            tracing::trace!(message = "channel.push_skipped", event = event.name());
            return;
        };
        tracing::debug!(message = "channel.push", event = event.name());
        channel.push(event.name(), event.payload());
    }

    /// Observe preference writes made by other tabs.
    pub fn on_external_preference_change(
        &self,
        listener: impl Fn(&PreferenceChange) + 'static,
    ) -> Option<SubscriptionId> {
        if self.is_released() {
            return None;
        }
        let timers = self.timers.clone();
        let id = self.prefs.subscribe(Rc::new(move |change: &PreferenceChange| {
            if !timers.is_released() {
                listener(change);
            }
        }));
        self.registrations.borrow_mut().preferences.push(id);
        Some(id)
    }

    /// Cancel and unregister everything. Idempotent.
    pub fn release(&self) {
        if self.is_released() {
            return;
        }
        self.timers.release();
        let regs = std::mem::take(&mut *self.registrations.borrow_mut());
        for id in regs.listeners {
            self.dom.remove_listener(id);
        }
        if let Some(channel) = self.channel.as_ref() {
            for handle in regs.channel {
                channel.remove_handler(handle);
            }
        }
        for id in regs.preferences {
            self.prefs.unsubscribe(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::{LabChannel, LabDom, LabScheduler, LabStorage};
    use serde_json::json;

    fn scope() -> (HookScope<LabDom>, Rc<LabDom>, Rc<LabScheduler>, Rc<LabChannel>) {
        let dom = Rc::new(LabDom::new());
        let sched = Rc::new(LabScheduler::new());
        let channel = Rc::new(LabChannel::new());
        let prefs = PreferenceStore::new(Rc::new(LabStorage::new().tab()));
        let scope = HookScope::new(
            Rc::clone(&dom),
            sched.clone(),
            prefs,
            Some(channel.clone() as Rc<dyn ServerChannel>),
        );
        (scope, dom, sched, channel)
    }

    #[test]
    fn fired_timeout_forgets_its_handle() {
        let (scope, _dom, sched, _ch) = scope();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        scope.timers().set_timeout(Duration::from_millis(10), move || h.set(h.get() + 1));
        assert_eq!(scope.handle_count(), 1);
        sched.advance(Duration::from_millis(10));
        assert_eq!(hits.get(), 1);
        assert_eq!(scope.handle_count(), 0);
    }

    #[test]
    fn release_cancels_every_kind_of_handle() {
        let (scope, dom, sched, channel) = scope();
        let hits = Rc::new(Cell::new(0));

        let h = Rc::clone(&hits);
        scope.timers().set_interval(Duration::from_millis(5), move || h.set(h.get() + 1));
        let h = Rc::clone(&hits);
        scope.timers().request_frame(move |_| h.set(h.get() + 1));
        let h = Rc::clone(&hits);
        scope.listen(EventTarget::Node(dom.body()), DomEventKind::Click, move |_| {
            h.set(h.get() + 1)
        });
        let h = Rc::clone(&hits);
        scope.on_server_event(ServerEventKind::ShowToast, move |_| h.set(h.get() + 1));
        assert_eq!(scope.handle_count(), 4);

        scope.release();
        scope.release();

        sched.advance(Duration::from_millis(100));
        dom.click(&dom.body());
        assert_eq!(channel.deliver("show_toast", json!({"message": "x"})), 0);
        assert_eq!(hits.get(), 0);
        assert_eq!(scope.handle_count(), 0);
        assert_eq!(dom.listener_count(), 0);
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn registration_after_release_is_refused() {
        let (scope, dom, _sched, channel) = scope();
        scope.release();
        assert!(scope.timers().set_timeout(Duration::ZERO, || {}).is_none());
        assert!(
            scope
                .listen(EventTarget::Window, DomEventKind::Scroll, |_| {})
                .is_none()
        );
        scope.push(ClientEvent::ClearSelection);
        assert!(channel.pushed().is_empty());
        assert_eq!(dom.listener_count(), 0);
    }

    #[test]
    fn interval_cancelled_inside_its_own_tick_stops() {
        let (scope, _dom, sched, _ch) = scope();
        let hits = Rc::new(Cell::new(0));
        let slot = Rc::new(Cell::new(None));
        let (h, s, timers) = (Rc::clone(&hits), Rc::clone(&slot), scope.timers().clone());
        let id = scope.timers().set_interval(Duration::from_millis(10), move || {
            h.set(h.get() + 1);
            if let Some(id) = s.get() {
                timers.cancel(id);
            }
        });
        slot.set(id);
        sched.advance(Duration::from_millis(50));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn undecodable_payload_is_dropped() {
        let (scope, _dom, _sched, channel) = scope();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        scope.on_server_event(ServerEventKind::ThemeChanged, move |_| h.set(h.get() + 1));
        assert_eq!(channel.deliver("theme_changed", json!({"nope": 1})), 1);
        assert_eq!(hits.get(), 0);
        channel.deliver("theme_changed", json!({"theme": "light"}));
        assert_eq!(hits.get(), 1);
    }
}
