#![forbid(unsafe_code)]

//! Deterministic in-memory host.
//!
//! Every host seam has a lab implementation so behaviors run natively under
//! `cargo test`: an arena DOM, a virtual clock, a multi-tab storage medium,
//! and a recording server channel. [`LabHarness`] wires one tab of each.
//!
//! ```
//! use web_time::Duration;
//! use xpando_hooks::dom::Dom;
//! use xpando_hooks::lab::LabHarness;
//!
//! let mut tab = LabHarness::new();
//! let el = tab.dom.append(&tab.dom.body(), "div");
//! tab.host.mount("MetricsHook", el, None).unwrap();
//! tab.scheduler.advance(Duration::from_secs(5));
//! // The interval plus the pending pulse removal.
//! assert_eq!(tab.scheduler.pending(), 2);
//! ```

mod channel;
mod dom;
mod harness;
mod scheduler;
mod storage;

pub use channel::LabChannel;
pub use dom::{LabDom, LabNode};
pub use harness::LabHarness;
pub use scheduler::{LAB_FRAME_MS, LabScheduler};
pub use storage::{LabStorage, LabStorageTab};
