#![forbid(unsafe_code)]

//! Theme behavior.
//!
//! Keeps `data-theme` on the document root in step with the preference store,
//! the server, and other tabs.
//!
//! | source | persist | apply | outbound |
//! |--------|---------|-------|----------|
//! | mount | – | yes | `sync_theme` |
//! | server `theme_changed` | yes | yes | – |
//! | local click / `xpando:theme-change` | yes | yes | `theme_changed` |
//! | other tab | – | yes | – |
//!
//! Every apply sets the attribute, (re)starts the `theme-transition` window,
//! and re-derives the icon / checkmark / active-option state from the theme
//! it just applied, even when persisting that theme failed. Missing
//! reflection elements are skipped. A server push also blurs the
//! `[tabindex="0"]` trigger of every `.dropdown` and then the focused element.

use std::marker::PhantomData;
use std::rc::Rc;

use crate::animation::TransientClass;
use crate::channel::{ClientEvent, ServerEvent, ServerEventKind};
use crate::config::ElementConfig;
use crate::dom::{Dom, DomEventKind, EventTarget, Signal};
use crate::error::Result;
use crate::hook::{Hook, HookContext};
use crate::hooks::HIDDEN_CLASS;
use crate::reconciler::CrossTabReconciler;
use crate::scope::HookScope;

pub const THEME_ATTRIBUTE: &str = "data-theme";
pub const TRANSITION_CLASS: &str = "theme-transition";
pub const ACTIVE_CLASS: &str = "active";
const DROPDOWN_SELECTOR: &str = ".dropdown";
const DROPDOWN_TRIGGER_SELECTOR: &str = "[tabindex=\"0\"]";

/// Themes that show the light-mode icon.
pub const LIGHT_THEMES: [&str; 3] = ["light", "cupcake", "bumblebee"];

#[must_use]
pub fn is_light_theme(theme: &str) -> bool {
    LIGHT_THEMES.contains(&theme)
}

struct ThemeState<D: Dom> {
    el: D::Node,
    root: D::Node,
    dom: Rc<D>,
    scope: HookScope<D>,
    storage_key: String,
    default_theme: String,
    transition: TransientClass,
}

impl<D: Dom> ThemeState<D> {
    fn apply(&self, theme: &str) {
        tracing::debug!(message = "theme.apply", theme);
        self.dom.set_attribute(&self.root, THEME_ATTRIBUTE, theme);
        self.transition
            .trigger(self.scope.timers(), &self.dom, &self.root);
        self.reflect(theme);
    }

    fn persist(&self, theme: &str) {
        if let Err(err) = self.scope.prefs().set(&self.storage_key, theme) {
            tracing::warn!(message = "theme.persist_failed", theme, error = %err);
        }
    }

    /// Local user choice.
    fn change(&self, theme: &str) {
        self.persist(theme);
        self.apply(theme);
        self.scope.push(ClientEvent::ThemeChanged {
            theme: theme.to_string(),
        });
        self.dom
            .dispatch_signal(&EventTarget::Window, Signal::ThemeApplied, theme);
    }

    /// Server-authoritative push.
    fn server_changed(&self, theme: &str) {
        self.apply(theme);
        self.persist(theme);
        self.close_dropdowns();
    }

    /// Drops focus from open dropdown triggers and whatever else holds it,
    /// which collapses focus-driven menus.
    fn close_dropdowns(&self) {
        let document = self.dom.document_element();
        for dropdown in self.dom.query_all(&document, DROPDOWN_SELECTOR) {
            if let Some(trigger) = self.dom.query(&dropdown, DROPDOWN_TRIGGER_SELECTOR) {
                self.dom.blur(&trigger);
            }
        }
        if let Some(focused) = self.dom.active_element() {
            self.dom.blur(&focused);
        }
    }

    /// Icon, checkmark and active option follow `theme`, the value just
    /// written to the root.
    fn reflect(&self, theme: &str) {
        let dom = &*self.dom;

        if let (Some(dark), Some(light)) = (
            dom.query(&self.el, ".theme-icon-dark"),
            dom.query(&self.el, ".theme-icon-light"),
        ) {
            if is_light_theme(theme) {
                dom.add_class(&dark, HIDDEN_CLASS);
                dom.remove_class(&light, HIDDEN_CLASS);
            } else {
                dom.remove_class(&dark, HIDDEN_CLASS);
                dom.add_class(&light, HIDDEN_CLASS);
            }
        }

        for check in dom.query_all(&self.el, ".theme-check") {
            dom.add_class(&check, HIDDEN_CLASS);
        }
        if let Some(active) = dom.query(&self.el, &format!(".theme-check-{theme}")) {
            dom.remove_class(&active, HIDDEN_CLASS);
        }

        for option in dom.query_all(&self.el, ".theme-option") {
            if dom.attribute(&option, "data-theme-value").as_deref() == Some(theme) {
                dom.add_class(&option, ACTIVE_CLASS);
            } else {
                dom.remove_class(&option, ACTIVE_CLASS);
            }
        }
    }
}

/// `UniversalTheme` / `ThemeHook`.
pub struct ThemeHook<D: Dom> {
    state: Option<Rc<ThemeState<D>>>,
    _dom: PhantomData<D>,
}

impl<D: Dom> Default for ThemeHook<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Dom> ThemeHook<D> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: None,
            _dom: PhantomData,
        }
    }
}

impl<D: Dom> Hook<D> for ThemeHook<D> {
    fn name(&self) -> &'static str {
        "ThemeHook"
    }

    fn mounted(&mut self, cx: &HookContext<D>) -> Result<()> {
        let attrs = ElementConfig::new(&*cx.dom, &cx.el);
        let state = Rc::new(ThemeState {
            el: cx.el.clone(),
            root: cx.dom.document_element(),
            dom: Rc::clone(&cx.dom),
            scope: cx.scope.clone(),
            storage_key: attrs.string("data-storage-key", &cx.config.storage_key),
            default_theme: attrs.string("data-default-theme", &cx.config.default_theme),
            transition: TransientClass::new(TRANSITION_CLASS, cx.config.theme_transition()),
        });
        self.state = Some(Rc::clone(&state));

        let initial = cx
            .prefs()
            .get_or(&state.storage_key, &state.default_theme);
        state.apply(&initial);
        cx.scope.push(ClientEvent::SyncTheme { theme: initial });

        let s = Rc::clone(&state);
        cx.scope.listen(
            EventTarget::Node(cx.el.clone()),
            DomEventKind::Click,
            move |event| {
                let Some(target) = event.target.as_ref() else {
                    return;
                };
                let Some(control) = s.dom.closest(target, "[data-theme-value]") else {
                    return;
                };
                if let Some(theme) = s
                    .dom
                    .attribute(&control, "data-theme-value")
                    .filter(|t| !t.is_empty())
                {
                    event.prevent_default();
                    s.change(&theme);
                }
            },
        );

        let s = Rc::clone(&state);
        cx.scope.listen(
            EventTarget::Node(cx.el.clone()),
            DomEventKind::Signal(Signal::ThemeChange),
            move |event| {
                if let Some(theme) = event.detail.as_deref().filter(|t| !t.is_empty()) {
                    s.change(theme);
                }
            },
        );

        let s = Rc::clone(&state);
        cx.scope
            .on_server_event(ServerEventKind::ThemeChanged, move |event| {
                if let ServerEvent::ThemeChanged { theme } = event {
                    s.server_changed(&theme);
                }
            });

        let s = Rc::clone(&state);
        CrossTabReconciler::new(state.storage_key.clone())
            .attach(&cx.scope, move |theme| s.apply(theme));

        Ok(())
    }

    fn destroyed(&mut self, cx: &HookContext<D>) {
        if let Some(state) = self.state.take() {
            state
                .transition
                .clear(cx.scope.timers(), &*cx.dom, &state.root);
        }
    }
}
