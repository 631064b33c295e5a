#![forbid(unsafe_code)]

//! Browser host for the xPando dashboard hooks.
//!
//! This crate provides [`HookRuntime`], a `wasm-bindgen`-exported struct that
//! wraps [`xpando_hooks::HookHost`] over `web-sys` implementations of every
//! host seam:
//!
//! | seam | browser primitive |
//! |------|-------------------|
//! | `Dom` | `document`, `Element`, `addEventListener`, `CustomEvent` |
//! | `Scheduler` | `setTimeout`, `setInterval`, `requestAnimationFrame` |
//! | `PreferenceBackend` | `localStorage` plus the window `storage` event |
//! | `ServerChannel` | the LiveView hook object (`pushEvent`, `handleEvent`) |
//!
//! The LiveView glue forwards each hook callback to the runtime:
//!
//! ```js
//! const runtime = new HookRuntime(JSON.stringify({ log_level: "info" }));
//! const Hooks = Object.fromEntries(runtime.hookNames().map((name) => [name, {
//!   mounted() { this.xid = runtime.mount(name, this.el, this); },
//!   updated() { runtime.updated(this.xid); },
//!   destroyed() { runtime.destroy(this.xid); },
//! }]));
//! ```

// Bridge core is used by the wasm module and by native tests.
pub mod bridge;

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::HookRuntime;
