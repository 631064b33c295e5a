#![forbid(unsafe_code)]

//! Hook lifecycle and cross-surface sync runtime for the xPando dashboard.
//!
//! Page elements carry a behavior name; the page-patching transport asks a
//! [`HookHost`] to mount that behavior when the element appears and to
//! destroy it when the element leaves. Each behavior gets a [`HookScope`]
//! that owns every timer, listener, channel handler, and preference
//! subscription it registers, so teardown is total.
//!
//! The core never touches a browser API. It reaches its host through four
//! seams: [`dom::Dom`], [`scheduler::Scheduler`],
//! [`prefs::PreferenceBackend`], and [`channel::ServerChannel`]. The
//! [`lab`] module implements all four deterministically for native tests;
//! `xpando-hooks-web` implements them over `web-sys`.
//!
//! Shipped behaviors (see [`hooks`]): theme switching with cross-tab
//! reconciliation, network activity indicators, graph zoom and selection,
//! metrics refresh pulses, toasts, and smooth scrolling.

pub mod animation;
pub mod channel;
pub mod config;
pub mod dom;
pub mod error;
pub mod hook;
pub mod hooks;
pub mod lab;
pub mod prefs;
pub mod reconciler;
pub mod registry;
pub mod scheduler;
pub mod scope;

pub use config::RuntimeConfig;
pub use error::{HookError, Result};
pub use hook::{Hook, HookContext, HookPhase, InstanceId};
pub use prefs::PreferenceStore;
pub use reconciler::CrossTabReconciler;
pub use registry::{HookEnv, HookHost, HookRegistry};
pub use scope::{HookScope, TimerScope};
