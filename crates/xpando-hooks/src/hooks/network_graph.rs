#![forbid(unsafe_code)]

//! Network graph interaction: wheel zoom, connection pulses, selection
//! requests, and graph update relay.
//!
//! # Invariants
//!
//! 1. [`ZoomState::scale`] stays within `[min, max]` for any wheel sequence.
//! 2. The svg transform is written only when the clamped scale changed.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::channel::{ClientEvent, ServerEvent, ServerEventKind};
use crate::config::RuntimeConfig;
use crate::dom::{Dom, DomEventKind, EventTarget};
use crate::error::Result;
use crate::hook::{Hook, HookContext};
use crate::hooks::PULSE_CLASS;

/// Multiplicative wheel zoom, clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomState {
    scale: f64,
    min: f64,
    max: f64,
    step: f64,
}

impl ZoomState {
    #[must_use]
    pub fn new(min: f64, max: f64, step: f64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            scale: 1.0_f64.clamp(min, max),
            min,
            max,
            step,
        }
    }

    #[must_use]
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.zoom_min, config.zoom_max, config.zoom_step)
    }

    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Apply one wheel notch. Returns the new scale if it changed.
    ///
    /// Positive `delta_y` (scrolling down) zooms out.
    pub fn wheel(&mut self, delta_y: f64) -> Option<f64> {
        let factor = if delta_y > 0.0 {
            1.0 - self.step
        } else {
            1.0 + self.step
        };
        let next = (self.scale * factor).clamp(self.min, self.max);
        if next == self.scale {
            return None;
        }
        self.scale = next;
        Some(next)
    }
}

/// Render a number for CSS without float noise (`0.6000000000000001` → `0.6`).
fn css_number(value: f64) -> String {
    let rounded = (value * 10_000.0).round() / 10_000.0;
    format!("{rounded}")
}

/// `NetworkGraphHook`.
pub struct NetworkGraphHook<D: Dom> {
    _dom: PhantomData<D>,
}

impl<D: Dom> Default for NetworkGraphHook<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Dom> NetworkGraphHook<D> {
    #[must_use]
    pub fn new() -> Self {
        Self { _dom: PhantomData }
    }

    /// Zoom state lives in the wheel listener and goes away with it.
    fn wire_zoom(cx: &HookContext<D>, svg: &D::Node) {
        let zoom = RefCell::new(ZoomState::from_config(&cx.config));
        let dom = Rc::clone(&cx.dom);
        let target = svg.clone();
        cx.scope.listen(
            EventTarget::Node(svg.clone()),
            DomEventKind::Wheel,
            move |event| {
                event.prevent_default();
                let changed = zoom.borrow_mut().wheel(event.delta_y);
                if let Some(scale) = changed {
                    tracing::trace!(message = "graph.zoom", scale);
                    dom.set_style(&target, "transform", &format!("scale({})", css_number(scale)));
                    dom.set_style(&target, "transform-origin", "center");
                }
            },
        );
    }

    fn start_pulses(cx: &HookContext<D>) {
        let lines = cx.dom.query_all(&cx.el, "line[data-status=\"active\"]");
        for (index, line) in lines.iter().enumerate() {
            let delay = index as f64 * cx.config.pulse_stagger_s;
            cx.dom
                .set_style(line, "animation-delay", &format!("{}s", css_number(delay)));
            cx.dom.add_class(line, PULSE_CLASS);
        }
        tracing::debug!(message = "graph.pulses_started", lines = lines.len());
    }
}

impl<D: Dom> Hook<D> for NetworkGraphHook<D> {
    fn name(&self) -> &'static str {
        "NetworkGraphHook"
    }

    fn mounted(&mut self, cx: &HookContext<D>) -> Result<()> {
        if let Some(svg) = cx.dom.query(&cx.el, "svg") {
            Self::wire_zoom(cx, &svg);
            Self::start_pulses(cx);
        } else {
            tracing::debug!(message = "graph.no_svg", instance = cx.instance.0);
        }

        let scope = cx.scope.clone();
        cx.scope.listen(
            EventTarget::Node(cx.el.clone()),
            DomEventKind::KeyDown,
            move |event| {
                if event.key.as_deref() == Some("Escape") {
                    scope.push(ClientEvent::ClearSelection);
                }
            },
        );

        let scope = cx.scope.clone();
        let dom = Rc::clone(&cx.dom);
        cx.scope.listen(
            EventTarget::Node(cx.el.clone()),
            DomEventKind::DoubleClick,
            move |event| {
                let node_id = event
                    .target
                    .as_ref()
                    .and_then(|target| dom.closest(target, "[data-node-id]"))
                    .and_then(|node| dom.attribute(&node, "data-node-id"));
                if let Some(node_id) = node_id {
                    scope.push(ClientEvent::FocusNode { node_id });
                }
            },
        );

        let scope = cx.scope.clone();
        cx.scope.on_server_event(ServerEventKind::GraphUpdate, move |event| {
            if let ServerEvent::GraphUpdate(data) = event {
                scope.push(ClientEvent::GraphDataUpdated(data));
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::{LabDom, LabHarness, LabNode};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn graph(dom: &LabDom) -> (LabNode, LabNode) {
        let el = dom.append(&dom.body(), "div");
        let svg = dom.append(&el, "svg");
        for status in ["active", "idle", "active", "active"] {
            let line = dom.append(&svg, "line");
            dom.set_attribute(&line, "data-status", status);
        }
        let node = dom.append(&svg, "g");
        dom.set_attribute(&node, "data-node-id", "peer-3");
        dom.append(&node, "circle");
        (el, svg)
    }

    #[test]
    fn zoom_clamps_and_skips_unchanged_writes() {
        let mut zoom = ZoomState::new(0.5, 3.0, 0.1);
        assert_eq!(zoom.wheel(1.0), Some(0.9));
        for _ in 0..50 {
            zoom.wheel(1.0);
        }
        assert_eq!(zoom.scale(), 0.5);
        assert_eq!(zoom.wheel(1.0), None);
        for _ in 0..50 {
            zoom.wheel(-1.0);
        }
        assert_eq!(zoom.scale(), 3.0);
        assert_eq!(zoom.wheel(-1.0), None);
    }

    #[test]
    fn wheel_sets_transform_and_prevents_default() {
        let mut h = LabHarness::new();
        let (el, svg) = graph(&h.dom);
        h.host.mount("NetworkGraphHook", el, None).expect("mount");

        assert!(h.dom.wheel(&svg, 120.0));
        assert_eq!(h.dom.style(&svg, "transform").as_deref(), Some("scale(0.9)"));
        assert_eq!(h.dom.style(&svg, "transform-origin").as_deref(), Some("center"));
    }

    #[test]
    fn active_lines_pulse_with_stagger() {
        let mut h = LabHarness::new();
        let (el, svg) = graph(&h.dom);
        h.host.mount("NetworkGraphHook", el, None).expect("mount");

        let active = h.dom.query_all(&svg, "line[data-status=\"active\"]");
        let delays: Vec<_> = active
            .iter()
            .map(|line| h.dom.style(line, "animation-delay").unwrap_or_default())
            .collect();
        assert_eq!(delays, vec!["0s", "0.2s", "0.4s"]);
        assert!(active.iter().all(|line| h.dom.has_class(line, PULSE_CLASS)));
        let idle = h.dom.query(&svg, "line[data-status=\"idle\"]").expect("idle");
        assert!(!h.dom.has_class(&idle, PULSE_CLASS));
    }

    #[test]
    fn escape_and_double_click_request_selection_changes() {
        let mut h = LabHarness::new();
        let (el, svg) = graph(&h.dom);
        h.host
            .mount("NetworkGraphHook", el, Some(h.channel()))
            .expect("mount");

        h.dom.key_down(&svg, "Enter");
        h.dom.key_down(&svg, "Escape");
        let circle = h.dom.query(&svg, "circle").expect("circle");
        h.dom.double_click(&circle);
        h.dom.double_click(&svg);

        assert_eq!(
            h.lab_channel.pushed(),
            vec![
                ClientEvent::ClearSelection,
                ClientEvent::FocusNode {
                    node_id: "peer-3".into()
                },
            ]
        );
    }

    #[test]
    fn graph_update_is_relayed_verbatim() {
        let mut h = LabHarness::new();
        let (el, _svg) = graph(&h.dom);
        h.host
            .mount("NetworkGraphHook", el, Some(h.channel()))
            .expect("mount");
        let data = json!({"nodes": [{"id": "a"}], "edges": [["a", "b"]]});
        h.lab_channel.deliver("graph_update", data.clone());
        assert_eq!(
            h.lab_channel.pushed(),
            vec![ClientEvent::GraphDataUpdated(data)]
        );
    }

    #[test]
    fn missing_svg_still_wires_interactions() {
        let mut h = LabHarness::new();
        let el = h.dom.append(&h.dom.body(), "div");
        h.host
            .mount("NetworkGraphHook", el, Some(h.channel()))
            .expect("mount");
        h.dom.key_down(&el, "Escape");
        assert_eq!(h.lab_channel.pushed(), vec![ClientEvent::ClearSelection]);
    }
}
