#![forbid(unsafe_code)]

//! `web-sys` implementations of the host seams.

mod channel;
mod console;
mod dom;
mod runtime;
mod scheduler;
mod storage;

pub use runtime::HookRuntime;

pub(crate) use channel::LiveViewChannel;
pub(crate) use dom::WebDom;
pub(crate) use scheduler::WebScheduler;
pub(crate) use storage::LocalStorageBackend;

use wasm_bindgen::JsValue;

/// Render a thrown JS value for an error message.
pub(crate) fn js_message(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            js_sys::Reflect::get(value, &JsValue::from_str("message"))
                .ok()
                .and_then(|m| m.as_string())
        })
        .unwrap_or_else(|| format!("{value:?}"))
}
