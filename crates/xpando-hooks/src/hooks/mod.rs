#![forbid(unsafe_code)]

//! The dashboard behaviors.

pub mod metrics;
pub mod network_graph;
pub mod network_status;
pub mod smooth_scroll;
pub mod theme;
pub mod toast;

pub use metrics::MetricsHook;
pub use network_graph::{NetworkGraphHook, ZoomState};
pub use network_status::NetworkStatusHook;
pub use smooth_scroll::SmoothScrollHook;
pub use theme::ThemeHook;
pub use toast::{ToastHook, ToastKind};

/// Class toggled for pulsing visual cues.
pub const PULSE_CLASS: &str = "animate-pulse";

/// Class that hides an element.
pub const HIDDEN_CLASS: &str = "hidden";
