#![forbid(unsafe_code)]

//! Smooth in-page scrolling and back-to-top visibility.
//!
//! Clicks on same-page anchors (`a[href^="#"]`) and on scroll-to-top
//! controls (`[data-scroll-top]`, `[data-back-to-top]`) inside the bound
//! element are replaced by an eased window scroll. Anchor runs rewrite the
//! current history entry's fragment when they finish.
//!
//! Back-to-top visibility follows `scrollY > innerHeight`:
//!
//! ```text
//!            scrollY > vh                      exit window elapsed
//!  ┌────────┐ ───────────▶ ┌─────────┐ ──────▶ ┌─────────┐ ──────▶ ┌────────┐
//!  │ Hidden │              │ Visible │ scrollY │ Leaving ├────────▶│ Hidden │
//!  └────────┘              └─────────┘  <= vh  └────┬────┘         └────────┘
//!                               ▲                   │ scrollY > vh
//!                               └───────────────────┘ (exit cancelled)
//! ```
//!
//! Scroll events are debounced: each one cancels and reschedules the pending
//! recompute.

use std::cell::Cell;
use std::marker::PhantomData;
use std::rc::Rc;

use web_time::Duration;

use crate::animation::{AnimationRun, Animator, Easing};
use crate::config::ElementConfig;
use crate::dom::{Dom, DomEventKind, EventTarget};
use crate::error::Result;
use crate::hook::{Hook, HookContext};
use crate::hooks::HIDDEN_CLASS;
use crate::scheduler::TimerId;
use crate::scope::TimerScope;

pub const VISIBLE_CLASS: &str = "back-to-top-visible";
pub const BACK_TO_TOP_SELECTOR: &str = "[data-back-to-top]";

/// Animator target for the window scroll position.
const WINDOW_SCROLL: &str = "window-scroll";

struct Scroller<D: Dom> {
    el: D::Node,
    dom: Rc<D>,
    timers: TimerScope,
    animator: Animator,
    duration: Duration,
    debounce: Duration,
    exit: Duration,
    visible: Cell<Option<bool>>,
    debounce_timer: Cell<Option<TimerId>>,
    exit_timer: Cell<Option<TimerId>>,
}

impl<D: Dom> Scroller<D> {
    fn scroll_to(&self, y: f64, hash: Option<String>) {
        let from = self.dom.scroll_y();
        tracing::debug!(message = "scroll.start", from, to = y);
        let dom = Rc::clone(&self.dom);
        let done_dom = Rc::clone(&self.dom);
        self.animator.start(
            WINDOW_SCROLL,
            AnimationRun::new(from, y, self.duration).with_easing(Easing::EaseInOutQuad),
            move |value| dom.scroll_to(value),
            move || {
                if let Some(hash) = hash {
                    done_dom.replace_hash(&hash);
                }
            },
        );
    }

    fn on_click(&self, target: &D::Node) -> bool {
        if let Some(anchor) = self.dom.closest(target, "a[href^=\"#\"]") {
            let Some(href) = self.dom.attribute(&anchor, "href") else {
                return false;
            };
            let id = href.strip_prefix('#').unwrap_or(&href);
            if id.is_empty() {
                self.scroll_to(0.0, None);
                return true;
            }
            return match self.dom.element_by_id(id) {
                Some(destination) => {
                    let y = self.dom.offset_top(&destination);
                    self.scroll_to(y, Some(href));
                    true
                }
                None => {
                    tracing::debug!(message = "scroll.missing_target", href = href.as_str());
                    false
                }
            };
        }
        let to_top = self.dom.closest(target, "[data-scroll-top]").is_some()
            || self.dom.closest(target, BACK_TO_TOP_SELECTOR).is_some();
        if to_top {
            self.scroll_to(0.0, None);
        }
        to_top
    }

    fn schedule_recompute(self: &Rc<Self>) {
        if let Some(pending) = self.debounce_timer.take() {
            self.timers.cancel(pending);
        }
        let this = Rc::clone(self);
        let id = self.timers.set_timeout(self.debounce, move || {
            this.debounce_timer.set(None);
            this.recompute();
        });
        self.debounce_timer.set(id);
    }

    fn recompute(self: &Rc<Self>) {
        let visible = self.dom.scroll_y() > self.dom.viewport_height();
        self.set_visible(visible, false);
    }

    fn set_visible(self: &Rc<Self>, visible: bool, immediate: bool) {
        if self.visible.get() == Some(visible) {
            return;
        }
        self.visible.set(Some(visible));
        tracing::debug!(message = "scroll.back_to_top", visible);

        if let Some(pending) = self.exit_timer.take() {
            self.timers.cancel(pending);
        }
        let controls = self.dom.query_all(&self.el, BACK_TO_TOP_SELECTOR);
        if visible {
            for control in &controls {
                self.dom.remove_class(control, HIDDEN_CLASS);
                self.dom.add_class(control, VISIBLE_CLASS);
            }
            return;
        }
        for control in &controls {
            self.dom.remove_class(control, VISIBLE_CLASS);
        }
        if immediate {
            for control in &controls {
                self.dom.add_class(control, HIDDEN_CLASS);
            }
            return;
        }
        let dom = Rc::clone(&self.dom);
        let this = Rc::downgrade(self);
        let id = self.timers.set_timeout(self.exit, move || {
            if let Some(this) = this.upgrade() {
                this.exit_timer.set(None);
            }
            for control in &controls {
                dom.add_class(control, HIDDEN_CLASS);
            }
        });
        self.exit_timer.set(id);
    }
}

/// `SmoothScrollHook`.
pub struct SmoothScrollHook<D: Dom> {
    scroller: Option<Rc<Scroller<D>>>,
    _dom: PhantomData<D>,
}

impl<D: Dom> Default for SmoothScrollHook<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Dom> SmoothScrollHook<D> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scroller: None,
            _dom: PhantomData,
        }
    }
}

impl<D: Dom> Hook<D> for SmoothScrollHook<D> {
    fn name(&self) -> &'static str {
        "SmoothScrollHook"
    }

    fn mounted(&mut self, cx: &HookContext<D>) -> Result<()> {
        let attrs = ElementConfig::new(&*cx.dom, &cx.el);
        let scroller = Rc::new(Scroller {
            el: cx.el.clone(),
            dom: Rc::clone(&cx.dom),
            timers: cx.scope.timers().clone(),
            animator: Animator::new(cx.scope.timers().clone()),
            duration: attrs.millis("data-scroll-duration", cx.config.scroll_duration()),
            debounce: cx.config.scroll_debounce(),
            exit: cx.config.back_to_top_exit(),
            visible: Cell::new(None),
            debounce_timer: Cell::new(None),
            exit_timer: Cell::new(None),
        });
        self.scroller = Some(Rc::clone(&scroller));

        let initial = cx.dom.scroll_y() > cx.dom.viewport_height();
        scroller.set_visible(initial, true);

        let s = Rc::clone(&scroller);
        cx.scope.listen(
            EventTarget::Node(cx.el.clone()),
            DomEventKind::Click,
            move |event| {
                if let Some(target) = event.target.as_ref() {
                    if s.on_click(target) {
                        event.prevent_default();
                    }
                }
            },
        );

        let s = Rc::clone(&scroller);
        cx.scope
            .listen(EventTarget::Window, DomEventKind::Scroll, move |_| {
                s.schedule_recompute();
            });
        Ok(())
    }

    fn destroyed(&mut self, _cx: &HookContext<D>) {
        if let Some(scroller) = self.scroller.take() {
            scroller.animator.cancel(WINDOW_SCROLL);
        }
    }
}
