#![forbid(unsafe_code)]

//! Toast behavior: server-pushed, auto-dismissing notifications.
//!
//! A toast is appended to the bound element and removed after the TTL, but
//! only if something else has not removed it first. Messages are escaped;
//! only the icon markup is trusted.

use std::marker::PhantomData;
use std::rc::Rc;

use v_htmlescape::escape;
use web_time::Duration;

use crate::channel::{ServerEvent, ServerEventKind};
use crate::config::ElementConfig;
use crate::dom::Dom;
use crate::error::Result;
use crate::hook::{Hook, HookContext};
use crate::scope::TimerScope;

/// Severity of a toast. Anything unrecognized renders as [`ToastKind::Info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ToastKind {
    Success,
    Warning,
    Error,
    #[default]
    Info,
}

impl ToastKind {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "success" => Self::Success,
            "warning" => Self::Warning,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Info => "info",
        }
    }

    /// SVG path data for the icon.
    #[must_use]
    pub const fn icon_path(self) -> &'static str {
        match self {
            Self::Success => "M9 12l2 2 4-4m6 2a9 9 0 11-18 0 9 9 0 0118 0z",
            Self::Warning => {
                "M12 9v2m0 4h.01m-6.938 4h13.856c1.54 0 2.502-1.667 1.732-2.5L13.732 4c-.77-.833-1.996-.833-2.732 0L3.732 16.5c-.77.833.192 2.5 1.732 2.5z"
            }
            Self::Error => {
                "M10 14l2-2m0 0l2-2m-2 2l-2-2m2 2l2 2m7-2a9 9 0 11-18 0 9 9 0 0118 0z"
            }
            Self::Info => "M13 16h-1v-4h-1m1-4h.01M21 12a9 9 0 11-18 0 9 9 0 0118 0z",
        }
    }

    /// Class list of the toast element.
    #[must_use]
    pub fn class_name(self) -> String {
        format!("alert alert-{}", self.as_str())
    }
}

/// Inner markup for a toast: icon plus escaped message.
#[must_use]
pub fn toast_markup(kind: ToastKind, message: &str) -> String {
    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" class="stroke-current flex-shrink-0 h-6 w-6" fill="none" viewBox="0 0 24 24">"#,
            r#"<path stroke-linecap="round" stroke-linejoin="round" stroke-width="2" d="{}"/></svg>"#,
            "<span>{}</span>"
        ),
        kind.icon_path(),
        escape(message)
    )
}

struct Toaster<D: Dom> {
    el: D::Node,
    dom: Rc<D>,
    timers: TimerScope,
    ttl: Duration,
}

impl<D: Dom> Toaster<D> {
    fn show(&self, kind: ToastKind, message: &str) {
        let Some(toast) = self.dom.create_element("div", &kind.class_name()) else {
            tracing::warn!(message = "toast.create_failed", kind = kind.as_str());
            return;
        };
        self.dom.set_inner_html(&toast, &toast_markup(kind, message));
        self.dom.append_child(&self.el, &toast);
        tracing::debug!(message = "toast.shown", kind = kind.as_str());

        let dom = Rc::clone(&self.dom);
        self.timers.set_timeout(self.ttl, move || {
            if dom.is_connected(&toast) {
                dom.remove(&toast);
            }
        });
    }
}

/// `ToastHook`.
pub struct ToastHook<D: Dom> {
    _dom: PhantomData<D>,
}

impl<D: Dom> Default for ToastHook<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Dom> ToastHook<D> {
    #[must_use]
    pub fn new() -> Self {
        Self { _dom: PhantomData }
    }
}

impl<D: Dom> Hook<D> for ToastHook<D> {
    fn name(&self) -> &'static str {
        "ToastHook"
    }

    fn mounted(&mut self, cx: &HookContext<D>) -> Result<()> {
        let ttl =
            ElementConfig::new(&*cx.dom, &cx.el).millis("data-toast-ttl", cx.config.toast_ttl());
        let toaster = Toaster {
            el: cx.el.clone(),
            dom: Rc::clone(&cx.dom),
            timers: cx.scope.timers().clone(),
            ttl,
        };
        cx.scope.on_server_event(ServerEventKind::ShowToast, move |event| {
            if let ServerEvent::ShowToast { kind, message } = event {
                toaster.show(kind, &message);
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::LabHarness;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn error_toast_renders_and_expires_once() {
        let mut h = LabHarness::new();
        let el = h.dom.append(&h.dom.body(), "div");
        h.host.mount("ToastHook", el, Some(h.channel())).expect("mount");

        h.lab_channel
            .deliver("show_toast", json!({"type": "error", "message": "disk full"}));
        let toasts = h.dom.children(&el);
        assert_eq!(toasts.len(), 1);
        let toast = toasts[0];
        assert!(h.dom.has_class(&toast, "alert"));
        assert!(h.dom.has_class(&toast, "alert-error"));
        let html = h.dom.inner_html(&toast).unwrap_or_default();
        assert!(html.contains("<span>disk full</span>"));
        assert!(html.contains(ToastKind::Error.icon_path()));

        h.scheduler.advance(Duration::from_millis(3999));
        assert!(h.dom.is_connected(&toast));
        h.scheduler.advance(Duration::from_millis(1));
        assert!(!h.dom.is_connected(&toast));
        h.scheduler.advance(Duration::from_millis(10_000));
        assert_eq!(h.dom.removal_count(&toast), 1);
    }

    #[test]
    fn every_kind_expires_after_the_stock_ttl_exactly_once() {
        for kind in ["success", "warning", "error", "info"] {
            let mut h = LabHarness::new();
            let el = h.dom.append(&h.dom.body(), "div");
            h.host.mount("ToastHook", el, Some(h.channel())).expect("mount");
            h.lab_channel
                .deliver("show_toast", json!({"type": kind, "message": kind}));
            let toast = h.dom.children(&el)[0];
            assert!(h.dom.has_class(&toast, &format!("alert-{kind}")));

            h.scheduler.advance(Duration::from_millis(3999));
            assert!(h.dom.is_connected(&toast), "{kind} gone early");
            h.scheduler.advance(Duration::from_millis(1));
            assert!(!h.dom.is_connected(&toast), "{kind} outlived its ttl");
            h.scheduler.advance(Duration::from_millis(4000));
            assert_eq!(h.dom.removal_count(&toast), 1, "{kind}");
        }
    }

    #[test]
    fn toast_removed_early_is_not_removed_again() {
        let mut h = LabHarness::new();
        let el = h.dom.append(&h.dom.body(), "div");
        h.host.mount("ToastHook", el, Some(h.channel())).expect("mount");
        h.lab_channel
            .deliver("show_toast", json!({"type": "success", "message": "saved"}));
        let toast = h.dom.children(&el)[0];
        h.dom.remove(&toast);
        h.scheduler.advance(Duration::from_millis(4000));
        assert_eq!(h.dom.removal_count(&toast), 1);
    }

    #[test]
    fn unknown_kind_renders_as_info_and_message_is_escaped() {
        let mut h = LabHarness::new();
        let el = h.dom.append(&h.dom.body(), "div");
        h.host.mount("ToastHook", el, Some(h.channel())).expect("mount");
        h.lab_channel.deliver(
            "show_toast",
            json!({"type": "party", "message": "<img src=x onerror=alert(1)>"}),
        );
        let toast = h.dom.children(&el)[0];
        assert!(h.dom.has_class(&toast, "alert-info"));
        let html = h.dom.inner_html(&toast).unwrap_or_default();
        assert!(!html.contains("<img"));
        assert!(html.contains("&lt;img"));
    }

    #[test]
    fn ttl_attribute_overrides_default() {
        let mut h = LabHarness::new();
        let el = h.dom.append(&h.dom.body(), "div");
        h.dom.set_attribute(&el, "data-toast-ttl", "100");
        h.host.mount("ToastHook", el, Some(h.channel())).expect("mount");
        h.lab_channel.deliver("show_toast", json!({"message": "quick"}));
        let toast = h.dom.children(&el)[0];
        h.scheduler.advance(Duration::from_millis(100));
        assert!(!h.dom.is_connected(&toast));
    }

    #[test]
    fn parse_round_trips_known_kinds() {
        for kind in [
            ToastKind::Success,
            ToastKind::Warning,
            ToastKind::Error,
            ToastKind::Info,
        ] {
            assert_eq!(ToastKind::parse(kind.as_str()), kind);
        }
        assert_eq!(ToastKind::parse(""), ToastKind::Info);
    }
}
