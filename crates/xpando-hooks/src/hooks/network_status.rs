#![forbid(unsafe_code)]

//! Network status behavior: online pulses and transient activity indicators.
//!
//! Indicators are appended to `<body>`, not to the bound element, so they
//! outlive a patch of the status panel. They are therefore tracked here and
//! removed in `destroyed()`.
//!
//! # Invariants
//!
//! 1. At most `max_indicators` indicators are live; past that the oldest is
//!    removed immediately.
//! 2. Each live indicator owns exactly one pending timer (visible phase, then
//!    exit phase).

use std::cell::RefCell;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::rc::Rc;

use v_htmlescape::escape;
use web_time::Duration;

use crate::channel::{ServerEvent, ServerEventKind};
use crate::config::ElementConfig;
use crate::dom::Dom;
use crate::error::Result;
use crate::hook::{Hook, HookContext};
use crate::hooks::PULSE_CLASS;
use crate::scheduler::TimerId;
use crate::scope::TimerScope;

pub const INDICATOR_CLASS: &str =
    "fixed top-4 right-4 alert alert-info alert-sm z-[60] animate-slide-in-right";
pub const FADE_OUT_CLASS: &str = "animate-fade-out";

const SHARE_ICON: &str = r#"<svg class="h-4 w-4" fill="currentColor" viewBox="0 0 24 24"><path d="M8.684 13.342C8.886 12.938 9 12.482 9 12c0-.482-.114-.938-.316-1.342m0 2.684a3 3 0 110-2.684m0 2.684l6.632 3.316m-6.632-6l6.632-3.316m0 0a3 3 0 105.367-2.684 3 3 0 00-5.367 2.684zm0 9.316a3 3 0 105.367 2.684 3 3 0 00-5.367-2.684z"/></svg>"#;

struct Indicator<N> {
    seq: u64,
    node: N,
    timer: Option<TimerId>,
}

struct Indicators<D: Dom> {
    dom: Rc<D>,
    timers: TimerScope,
    visible: Duration,
    exit: Duration,
    cap: usize,
    live: RefCell<VecDeque<Indicator<D::Node>>>,
    next_seq: std::cell::Cell<u64>,
}

impl<D: Dom> Indicators<D> {
    fn show(self: &Rc<Self>, activity_type: &str, node_id: Option<&str>) {
        while self.live.borrow().len() >= self.cap.max(1) {
            let Some(oldest) = self.live.borrow_mut().pop_front() else {
                break;
            };
            tracing::debug!(message = "network.indicator_evicted", seq = oldest.seq);
            self.discard(oldest);
        }

        let Some(node) = self.dom.create_element("div", INDICATOR_CLASS) else {
            tracing::warn!(message = "network.indicator_create_failed", activity_type);
            return;
        };
        self.dom.set_attribute(&node, "data-activity-type", activity_type);
        if let Some(id) = node_id {
            self.dom.set_attribute(&node, "data-node-id", id);
        }
        self.dom.set_inner_html(
            &node,
            &format!(
                "{SHARE_ICON}<span>Network activity: {}</span>",
                escape(activity_type)
            ),
        );
        self.dom.append_child(&self.dom.body(), &node);

        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        let this = Rc::clone(self);
        let timer = self
            .timers
            .set_timeout(self.visible, move || this.begin_exit(seq));
        self.live.borrow_mut().push_back(Indicator { seq, node, timer });
        tracing::debug!(message = "network.indicator_shown", seq, activity_type);
    }

    fn begin_exit(self: &Rc<Self>, seq: u64) {
        let node = {
            let live = self.live.borrow();
            let Some(indicator) = live.iter().find(|i| i.seq == seq) else {
                return;
            };
            indicator.node.clone()
        };
        self.dom.add_class(&node, FADE_OUT_CLASS);
        let this = Rc::clone(self);
        let timer = self.timers.set_timeout(self.exit, move || this.finish(seq));
        if let Some(indicator) = self.live.borrow_mut().iter_mut().find(|i| i.seq == seq) {
            indicator.timer = timer;
        }
    }

    fn finish(&self, seq: u64) {
        let removed = {
            let mut live = self.live.borrow_mut();
            live.iter()
                .position(|i| i.seq == seq)
                .and_then(|pos| live.remove(pos))
        };
        if let Some(indicator) = removed {
            self.dom.remove(&indicator.node);
        }
    }

    fn discard(&self, indicator: Indicator<D::Node>) {
        if let Some(timer) = indicator.timer {
            self.timers.cancel(timer);
        }
        self.dom.remove(&indicator.node);
    }

    fn clear(&self) {
        let drained: Vec<_> = self.live.borrow_mut().drain(..).collect();
        for indicator in drained {
            self.discard(indicator);
        }
    }
}

/// `NetworkStatusHook`.
pub struct NetworkStatusHook<D: Dom> {
    indicators: Option<Rc<Indicators<D>>>,
    _dom: PhantomData<D>,
}

impl<D: Dom> Default for NetworkStatusHook<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Dom> NetworkStatusHook<D> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            indicators: None,
            _dom: PhantomData,
        }
    }
}

impl<D: Dom> Hook<D> for NetworkStatusHook<D> {
    fn name(&self) -> &'static str {
        "NetworkStatusHook"
    }

    fn mounted(&mut self, cx: &HookContext<D>) -> Result<()> {
        for node in cx.dom.query_all(&cx.el, "[data-status=\"online\"]") {
            cx.dom.add_class(&node, PULSE_CLASS);
        }

        let attrs = ElementConfig::new(&*cx.dom, &cx.el);
        let indicators = Rc::new(Indicators {
            dom: Rc::clone(&cx.dom),
            timers: cx.scope.timers().clone(),
            visible: cx.config.indicator_visible(),
            exit: cx.config.indicator_exit(),
            cap: attrs.parse("data-max-indicators", cx.config.max_indicators),
            live: RefCell::new(VecDeque::new()),
            next_seq: std::cell::Cell::new(0),
        });
        self.indicators = Some(Rc::clone(&indicators));

        cx.scope
            .on_server_event(ServerEventKind::NetworkActivity, move |event| {
                if let ServerEvent::NetworkActivity {
                    activity_type,
                    node_id,
                } = event
                {
                    indicators.show(&activity_type, node_id.as_deref());
                }
            });
        Ok(())
    }

    fn destroyed(&mut self, _cx: &HookContext<D>) {
        if let Some(indicators) = self.indicators.take() {
            indicators.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::LabHarness;
    use serde_json::json;

    #[test]
    fn online_nodes_pulse_on_mount() {
        let mut h = LabHarness::new();
        let el = h.dom.append(&h.dom.body(), "div");
        let online = h.dom.append(&el, "div");
        h.dom.set_attribute(&online, "data-status", "online");
        let offline = h.dom.append(&el, "div");
        h.dom.set_attribute(&offline, "data-status", "offline");

        h.host.mount("NetworkStatusHook", el, None).expect("mount");
        assert!(h.dom.has_class(&online, PULSE_CLASS));
        assert!(!h.dom.has_class(&offline, PULSE_CLASS));
    }

    #[test]
    fn indicator_lifecycle_is_3000_plus_300() {
        let mut h = LabHarness::new();
        let el = h.dom.append(&h.dom.body(), "div");
        h.host
            .mount("NetworkStatusHook", el, Some(h.channel()))
            .expect("mount");

        h.lab_channel.deliver(
            "network_activity",
            json!({"type": "<b>sync</b>", "node_id": "n7"}),
        );
        let indicator = h
            .dom
            .query(&h.dom.body(), "[data-node-id=\"n7\"]")
            .expect("indicator appended to body");
        let html = h.dom.inner_html(&indicator).unwrap_or_default();
        assert!(!html.contains("<b>"));
        assert!(html.contains("Network activity: &lt;b&gt;sync&lt;"));

        h.scheduler.advance(Duration::from_millis(2999));
        assert!(!h.dom.has_class(&indicator, FADE_OUT_CLASS));
        h.scheduler.advance(Duration::from_millis(1));
        assert!(h.dom.has_class(&indicator, FADE_OUT_CLASS));
        assert!(h.dom.is_connected(&indicator));
        h.scheduler.advance(Duration::from_millis(300));
        assert!(!h.dom.is_connected(&indicator));
        assert_eq!(h.dom.removal_count(&indicator), 1);
    }

    #[test]
    fn indicators_are_capped_oldest_first() {
        let mut h = LabHarness::new();
        let el = h.dom.append(&h.dom.body(), "div");
        h.dom.set_attribute(&el, "data-max-indicators", "2");
        h.host
            .mount("NetworkStatusHook", el, Some(h.channel()))
            .expect("mount");

        for i in 0..3 {
            h.lab_channel.deliver(
                "network_activity",
                json!({"type": "ping", "node_id": format!("n{i}")}),
            );
        }
        let body = h.dom.body();
        assert!(h.dom.query(&body, "[data-node-id=\"n0\"]").is_none());
        assert!(h.dom.query(&body, "[data-node-id=\"n1\"]").is_some());
        assert!(h.dom.query(&body, "[data-node-id=\"n2\"]").is_some());
        // One pending timer per live indicator.
        assert_eq!(h.scheduler.pending(), 2);
    }

    #[test]
    fn destroy_removes_live_indicators() {
        let mut h = LabHarness::new();
        let el = h.dom.append(&h.dom.body(), "div");
        let id = h
            .host
            .mount("NetworkStatusHook", el, Some(h.channel()))
            .expect("mount");
        h.lab_channel
            .deliver("network_activity", json!({"type": "ping"}));
        assert_eq!(
            h.dom.query_all(&h.dom.body(), "[data-activity-type]").len(),
            1
        );
        h.host.destroy(id).expect("destroy");
        assert!(h.dom.query_all(&h.dom.body(), "[data-activity-type]").is_empty());
        assert_eq!(h.scheduler.pending(), 0);
        assert_eq!(h.lab_channel.handler_count(), 0);
    }
}
