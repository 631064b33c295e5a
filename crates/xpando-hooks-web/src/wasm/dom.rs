#![forbid(unsafe_code)]

//! `Dom` over `web_sys::Element`.
//!
//! # Invariants
//!
//! 1. Every registered listener owns its `Closure` in `listeners` until
//!    [`Dom::remove_listener`] or drop.
//! 2. Removed closures go to a graveyard swept when the outermost dispatch
//!    begins, never while any of our listeners is on the stack.
//! 3. Only `scroll` listeners are passive; the rest may `preventDefault`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use js_sys::Reflect;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    AddEventListenerOptions, CssStyleDeclaration, CustomEvent, CustomEventInit, Document, Element,
    Event, HtmlElement, KeyboardEvent, WheelEvent, Window,
};
use xpando_hooks::HookError;
use xpando_hooks::dom::{
    Dom, DomEvent, DomEventKind, EventTarget, Listener, ListenerId, Signal,
};

use super::js_message;

type JsListener = Closure<dyn FnMut(Event)>;

struct Registered {
    target: web_sys::EventTarget,
    event_type: &'static str,
    closure: JsListener,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    live: HashMap<u64, Registered>,
    graveyard: Vec<JsListener>,
    depth: usize,
}

fn enter(state: &Weak<RefCell<Listeners>>) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let swept = {
        let mut s = state.borrow_mut();
        s.depth += 1;
        if s.depth == 1 {
            std::mem::take(&mut s.graveyard)
        } else {
            Vec::new()
        }
    };
    drop(swept);
}

fn leave(state: &Weak<RefCell<Listeners>>) {
    if let Some(state) = state.upgrade() {
        let mut s = state.borrow_mut();
        s.depth = s.depth.saturating_sub(1);
    }
}

fn convert(kind: DomEventKind, event: &Event) -> DomEvent<Element> {
    let target = event.target().and_then(|t| t.dyn_into::<Element>().ok());
    let mut converted = DomEvent::new(kind, target);
    if let Some(keyboard) = event.dyn_ref::<KeyboardEvent>() {
        converted = converted.with_key(keyboard.key());
    }
    if let Some(wheel) = event.dyn_ref::<WheelEvent>() {
        converted = converted.with_delta_y(wheel.delta_y());
    }
    if let Some(custom) = event.dyn_ref::<CustomEvent>() {
        if let Some(detail) = custom.detail().as_string() {
            converted = converted.with_detail(detail);
        }
    }
    converted
}

pub(crate) struct WebDom {
    window: Window,
    document: Document,
    root: Element,
    body: Element,
    listeners: Rc<RefCell<Listeners>>,
}

impl WebDom {
    pub(crate) fn new() -> Result<Self, HookError> {
        let window = web_sys::window().ok_or_else(|| HookError::host("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| HookError::host("no document"))?;
        let root = document
            .document_element()
            .ok_or_else(|| HookError::host("no document element"))?;
        let body: Element = document
            .body()
            .ok_or_else(|| HookError::host("no document body"))?
            .into();
        Ok(Self {
            window,
            document,
            root,
            body,
            listeners: Rc::new(RefCell::new(Listeners::default())),
        })
    }

    pub(crate) fn window(&self) -> &Window {
        &self.window
    }

    fn js_target(&self, target: &EventTarget<Element>) -> web_sys::EventTarget {
        match target {
            EventTarget::Window => self.window.clone().into(),
            EventTarget::Node(el) => el.clone().into(),
        }
    }
}

impl Dom for WebDom {
    type Node = Element;

    fn document_element(&self) -> Element {
        self.root.clone()
    }

    fn body(&self) -> Element {
        self.body.clone()
    }

    fn element_by_id(&self, id: &str) -> Option<Element> {
        self.document.get_element_by_id(id)
    }

    fn attribute(&self, node: &Element, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn set_attribute(&self, node: &Element, name: &str, value: &str) {
        if let Err(err) = node.set_attribute(name, value) {
            tracing::debug!(message = "dom.set_attribute_failed", name, error = %js_message(&err));
        }
    }

    fn has_class(&self, node: &Element, class: &str) -> bool {
        node.class_list().contains(class)
    }

    fn add_class(&self, node: &Element, class: &str) {
        let _ = node.class_list().add_1(class);
    }

    fn remove_class(&self, node: &Element, class: &str) {
        let _ = node.class_list().remove_1(class);
    }

    fn set_style(&self, node: &Element, property: &str, value: &str) {
        // `style` lives on both HTMLElement and SVGElement.
        let style = Reflect::get(node, &JsValue::from_str("style"))
            .ok()
            .and_then(|s| s.dyn_into::<CssStyleDeclaration>().ok());
        match style {
            Some(style) => {
                let _ = style.set_property(property, value);
            }
            None => tracing::debug!(message = "dom.no_style", property),
        }
    }

    fn query_all(&self, scope: &Element, selector: &str) -> Vec<Element> {
        let list = match scope.query_selector_all(selector) {
            Ok(list) => list,
            Err(err) => {
                tracing::debug!(message = "dom.bad_selector", selector, error = %js_message(&err));
                return Vec::new();
            }
        };
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }

    fn query(&self, scope: &Element, selector: &str) -> Option<Element> {
        scope.query_selector(selector).ok().flatten()
    }

    fn closest(&self, node: &Element, selector: &str) -> Option<Element> {
        node.closest(selector).ok().flatten()
    }

    fn create_element(&self, tag: &str, class_name: &str) -> Option<Element> {
        let el = self.document.create_element(tag).ok()?;
        el.set_class_name(class_name);
        Some(el)
    }

    fn set_inner_html(&self, node: &Element, html: &str) {
        node.set_inner_html(html);
    }

    fn append_child(&self, parent: &Element, child: &Element) {
        if let Err(err) = parent.append_child(child) {
            tracing::debug!(message = "dom.append_failed", error = %js_message(&err));
        }
    }

    fn remove(&self, node: &Element) {
        node.remove();
    }

    fn is_connected(&self, node: &Element) -> bool {
        node.is_connected()
    }

    fn blur(&self, node: &Element) {
        if let Some(el) = node.dyn_ref::<HtmlElement>() {
            let _ = el.blur();
        }
    }

    fn active_element(&self) -> Option<Element> {
        self.document.active_element()
    }

    fn add_listener(
        &self,
        target: &EventTarget<Element>,
        kind: DomEventKind,
        listener: Listener<Element>,
    ) -> ListenerId {
        let id = {
            let mut listeners = self.listeners.borrow_mut();
            listeners.next_id += 1;
            listeners.next_id
        };
        let state = Rc::downgrade(&self.listeners);
        let closure = JsListener::new(move |event: Event| {
            enter(&state);
            let converted = convert(kind, &event);
            listener(&converted);
            if converted.default_prevented() {
                event.prevent_default();
            }
            leave(&state);
        });

        let options = AddEventListenerOptions::new();
        options.set_passive(matches!(kind, DomEventKind::Scroll));
        let js_target = self.js_target(target);
        let event_type = kind.event_type();
        if let Err(err) = js_target.add_event_listener_with_callback_and_add_event_listener_options(
            event_type,
            closure.as_ref().unchecked_ref(),
            &options,
        ) {
            tracing::warn!(message = "dom.listen_failed", event_type, error = %js_message(&err));
            return ListenerId(id);
        }
        self.listeners.borrow_mut().live.insert(
            id,
            Registered {
                target: js_target,
                event_type,
                closure,
            },
        );
        ListenerId(id)
    }

    fn remove_listener(&self, id: ListenerId) {
        let mut listeners = self.listeners.borrow_mut();
        let Some(registered) = listeners.live.remove(&id.0) else {
            return;
        };
        let _ = registered.target.remove_event_listener_with_callback(
            registered.event_type,
            registered.closure.as_ref().unchecked_ref(),
        );
        listeners.graveyard.push(registered.closure);
    }

    fn dispatch_signal(&self, target: &EventTarget<Element>, signal: Signal, detail: &str) {
        let init = CustomEventInit::new();
        init.set_bubbles(true);
        init.set_detail(&JsValue::from_str(detail));
        let event = match CustomEvent::new_with_event_init_dict(signal.event_type(), &init) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(message = "dom.signal_failed", signal = signal.event_type(), error = %js_message(&err));
                return;
            }
        };
        if let Err(err) = self.js_target(target).dispatch_event(&event) {
            tracing::warn!(message = "dom.signal_failed", signal = signal.event_type(), error = %js_message(&err));
        }
    }

    fn scroll_y(&self) -> f64 {
        self.window.scroll_y().unwrap_or(0.0)
    }

    fn viewport_height(&self) -> f64 {
        self.window
            .inner_height()
            .ok()
            .and_then(|h| h.as_f64())
            .unwrap_or(0.0)
    }

    fn scroll_to(&self, y: f64) {
        let x = self.window.scroll_x().unwrap_or(0.0);
        self.window.scroll_to_with_x_and_y(x, y);
    }

    fn offset_top(&self, node: &Element) -> f64 {
        node.get_bounding_client_rect().top() + self.scroll_y()
    }

    fn replace_hash(&self, hash: &str) {
        let Ok(history) = self.window.history() else {
            return;
        };
        if let Err(err) = history.replace_state_with_url(&JsValue::NULL, "", Some(hash)) {
            tracing::debug!(message = "dom.replace_hash_failed", error = %js_message(&err));
        }
    }
}

impl Drop for WebDom {
    fn drop(&mut self) {
        let ids: Vec<u64> = self.listeners.borrow().live.keys().copied().collect();
        for id in ids {
            self.remove_listener(ListenerId(id));
        }
    }
}
