#![forbid(unsafe_code)]

//! `ServerChannel` over a LiveView hook object.
//!
//! Payloads cross the boundary as JSON text (`JSON.parse` / `JSON.stringify`)
//! so the core only ever sees `serde_json::Value`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use js_sys::{Function, JSON, Reflect};
use serde_json::Value;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use xpando_hooks::channel::{ChannelRef, RawHandler, ServerChannel};

use super::js_message;

struct Handler {
    /// Opaque ref returned by `handleEvent`.
    js_ref: JsValue,
    closure: Closure<dyn FnMut(JsValue)>,
}

#[derive(Default)]
struct Handlers {
    live: HashMap<u64, Handler>,
    /// Removed closures, freed on the next inbound event.
    retired: Vec<Closure<dyn FnMut(JsValue)>>,
}

pub(crate) struct LiveViewChannel {
    hook: JsValue,
    handlers: Rc<RefCell<Handlers>>,
    next_id: Cell<u64>,
}

impl LiveViewChannel {
    pub(crate) fn new(hook: JsValue) -> Self {
        Self {
            hook,
            handlers: Rc::new(RefCell::new(Handlers::default())),
            next_id: Cell::new(0),
        }
    }

    fn method(&self, name: &str) -> Option<Function> {
        Reflect::get(&self.hook, &JsValue::from_str(name))
            .ok()
            .and_then(|f| f.dyn_into::<Function>().ok())
    }
}

fn to_js(payload: &Value) -> JsValue {
    serde_json::to_string(payload)
        .ok()
        .and_then(|text| JSON::parse(&text).ok())
        .unwrap_or(JsValue::NULL)
}

fn from_js(payload: &JsValue) -> Value {
    if payload.is_undefined() {
        return Value::Null;
    }
    JSON::stringify(payload)
        .ok()
        .and_then(|text| text.as_string())
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or(Value::Null)
}

impl ServerChannel for LiveViewChannel {
    fn push(&self, event: &str, payload: Value) {
        let Some(push) = self.method("pushEvent") else {
            tracing::warn!(message = "channel.push_unavailable", event);
            return;
        };
        if let Err(err) = push.call2(&self.hook, &JsValue::from_str(event), &to_js(&payload)) {
            tracing::warn!(message = "channel.push_failed", event, error = %js_message(&err));
        }
    }

    fn handle_event(&self, event: &str, handler: RawHandler) -> ChannelRef {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let Some(handle_event) = self.method("handleEvent") else {
            tracing::warn!(message = "channel.handle_unavailable", event);
            return ChannelRef(id);
        };

        let handlers = Rc::downgrade(&self.handlers);
        let closure = Closure::<dyn FnMut(JsValue)>::new(move |payload: JsValue| {
            if let Some(handlers) = handlers.upgrade() {
                let retired = std::mem::take(&mut handlers.borrow_mut().retired);
                drop(retired);
            }
            handler(from_js(&payload));
        });
        match handle_event.call2(&self.hook, &JsValue::from_str(event), closure.as_ref()) {
            Ok(js_ref) => {
                self.handlers
                    .borrow_mut()
                    .live
                    .insert(id, Handler { js_ref, closure });
            }
            Err(err) => {
                tracing::warn!(message = "channel.handle_failed", event, error = %js_message(&err));
            }
        }
        ChannelRef(id)
    }

    fn remove_handler(&self, handler: ChannelRef) {
        let Some(entry) = self.handlers.borrow_mut().live.remove(&handler.0) else {
            return;
        };
        if let Some(remove) = self.method("removeHandleEvent") {
            if let Err(err) = remove.call1(&self.hook, &entry.js_ref) {
                tracing::debug!(message = "channel.remove_failed", error = %js_message(&err));
            }
        }
        self.handlers.borrow_mut().retired.push(entry.closure);
    }
}

impl Drop for LiveViewChannel {
    fn drop(&mut self) {
        let refs: Vec<u64> = self.handlers.borrow().live.keys().copied().collect();
        for id in refs {
            self.remove_handler(ChannelRef(id));
        }
    }
}
