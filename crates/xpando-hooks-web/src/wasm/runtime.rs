#![forbid(unsafe_code)]

//! `wasm-bindgen` export wrapping [`HookBridge`] over the web host.

use std::rc::Rc;

use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::wasm_bindgen;
use web_sys::Element;
use xpando_hooks::channel::ServerChannel;
use xpando_hooks::{HookEnv, HookError, PreferenceStore};

use super::{LiveViewChannel, LocalStorageBackend, WebDom, WebScheduler, console};
use crate::bridge::{HookBridge, parse_options};

fn to_js_error(err: HookError) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

/// Page-wide hook runtime driven by the LiveView hook callbacks.
#[wasm_bindgen]
pub struct HookRuntime {
    bridge: HookBridge<WebDom>,
}

#[wasm_bindgen]
impl HookRuntime {
    /// Create the runtime. `config_json` is an optional JSON object of
    /// runtime settings plus `log_level`.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<HookRuntime, JsValue> {
        let (config, options) = parse_options(config_json.as_deref()).map_err(to_js_error)?;
        console::init(options.level_filter());

        let dom = Rc::new(WebDom::new().map_err(to_js_error)?);
        let window = dom.window().clone();
        let env = HookEnv {
            dom,
            scheduler: Rc::new(WebScheduler::new(window.clone())),
            prefs: PreferenceStore::new(Rc::new(LocalStorageBackend::new(window))),
            config: Rc::new(config),
        };
        let bridge = HookBridge::new(env);
        tracing::info!(
            message = "runtime.started",
            hooks = bridge.hook_names().len()
        );
        Ok(Self { bridge })
    }

    /// Mount `name` on `el`. `hook` is the LiveView hook object (`this`);
    /// anything other than an object mounts without a server channel.
    pub fn mount(&mut self, name: &str, el: Element, hook: JsValue) -> Result<u32, JsValue> {
        let channel: Option<Rc<dyn ServerChannel>> = if hook.is_object() {
            Some(Rc::new(LiveViewChannel::new(hook)))
        } else {
            None
        };
        self.bridge.mount(name, el, channel).map_err(to_js_error)
    }

    pub fn updated(&mut self, id: u32) -> Result<(), JsValue> {
        self.bridge.updated(id).map_err(to_js_error)
    }

    pub fn destroy(&mut self, id: u32) -> Result<(), JsValue> {
        self.bridge.destroy(id).map_err(to_js_error)
    }

    /// Tear down every live instance (page unload).
    #[wasm_bindgen(js_name = destroyAll)]
    pub fn destroy_all(&mut self) {
        self.bridge.destroy_all();
    }

    #[wasm_bindgen(js_name = hookNames)]
    pub fn hook_names(&self) -> Vec<String> {
        self.bridge.hook_names()
    }

    #[wasm_bindgen(js_name = liveInstances)]
    pub fn live_instances(&self) -> u32 {
        u32::try_from(self.bridge.live_instances()).unwrap_or(u32::MAX)
    }
}
