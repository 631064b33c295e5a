#![forbid(unsafe_code)]

//! Runtime configuration and per-element data-attribute overrides.
//!
//! [`RuntimeConfig`] carries every timing constant and default the behaviors
//! use. It deserializes from JSON with every field optional, so a host can
//! pass `{}` (or nothing) and get the stock dashboard behavior.
//!
//! [`ElementConfig`] reads `data-*` attributes off a hook's bound element.
//! Absent or malformed attributes fall back to the runtime default; they are
//! never an error.

use std::str::FromStr;

use serde::Deserialize;
use web_time::Duration;

use crate::dom::Dom;
use crate::error::{HookError, Result};

/// Storage key used for the theme preference unless overridden.
pub const DEFAULT_STORAGE_KEY: &str = "xpando-theme-preference";

/// Theme applied when nothing is stored.
pub const DEFAULT_THEME: &str = "dark";

/// Timing constants, defaults, and caps for every behavior.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub storage_key: String,
    pub default_theme: String,
    /// Lifetime of the `theme-transition` marker class.
    pub theme_transition_ms: u64,
    pub toast_ttl_ms: u64,
    pub indicator_visible_ms: u64,
    pub indicator_exit_ms: u64,
    /// Live activity indicators allowed at once; the oldest is evicted past this.
    pub max_indicators: usize,
    pub metrics_interval_ms: u64,
    pub metrics_pulse_ms: u64,
    pub zoom_min: f64,
    pub zoom_max: f64,
    /// Multiplicative step per wheel notch (0.1 = ±10%).
    pub zoom_step: f64,
    /// Seconds of animation delay added per active connection line.
    pub pulse_stagger_s: f64,
    pub scroll_duration_ms: u64,
    pub scroll_debounce_ms: u64,
    pub back_to_top_exit_ms: u64,
    /// Cadence of frame callbacks on hosts without a display-synced clock.
    pub frame_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            default_theme: DEFAULT_THEME.to_string(),
            theme_transition_ms: 300,
            toast_ttl_ms: 4000,
            indicator_visible_ms: 3000,
            indicator_exit_ms: 300,
            max_indicators: 16,
            metrics_interval_ms: 5000,
            metrics_pulse_ms: 500,
            zoom_min: 0.5,
            zoom_max: 3.0,
            zoom_step: 0.1,
            pulse_stagger_s: 0.2,
            scroll_duration_ms: 500,
            scroll_debounce_ms: 10,
            back_to_top_exit_ms: 300,
            frame_interval_ms: 16,
        }
    }
}

impl RuntimeConfig {
    /// Parse a JSON object; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(HookError::Config)?;
        Ok(config.sanitized())
    }

    /// Parse an optional JSON string, treating `None` or blank input as defaults.
    pub fn from_optional_json(json: Option<&str>) -> Result<Self> {
        match json.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(json) => Self::from_json(json),
        }
    }

    /// Repair values that would break an invariant (inverted zoom bounds,
    /// zero-length periodic timers).
    #[must_use]
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.zoom_min.is_finite() && self.zoom_max.is_finite())
            || self.zoom_min <= 0.0
            || self.zoom_min > self.zoom_max
        {
            self.zoom_min = defaults.zoom_min;
            self.zoom_max = defaults.zoom_max;
        }
        if !(self.zoom_step.is_finite() && self.zoom_step > 0.0 && self.zoom_step < 1.0) {
            self.zoom_step = defaults.zoom_step;
        }
        if self.metrics_interval_ms == 0 {
            self.metrics_interval_ms = defaults.metrics_interval_ms;
        }
        if self.frame_interval_ms == 0 {
            self.frame_interval_ms = defaults.frame_interval_ms;
        }
        if self.storage_key.is_empty() {
            self.storage_key = defaults.storage_key;
        }
        if self.default_theme.is_empty() {
            self.default_theme = defaults.default_theme;
        }
        self
    }

    #[must_use]
    pub fn theme_transition(&self) -> Duration {
        Duration::from_millis(self.theme_transition_ms)
    }

    #[must_use]
    pub fn toast_ttl(&self) -> Duration {
        Duration::from_millis(self.toast_ttl_ms)
    }

    #[must_use]
    pub fn indicator_visible(&self) -> Duration {
        Duration::from_millis(self.indicator_visible_ms)
    }

    #[must_use]
    pub fn indicator_exit(&self) -> Duration {
        Duration::from_millis(self.indicator_exit_ms)
    }

    #[must_use]
    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms)
    }

    #[must_use]
    pub fn metrics_pulse(&self) -> Duration {
        Duration::from_millis(self.metrics_pulse_ms)
    }

    #[must_use]
    pub fn scroll_duration(&self) -> Duration {
        Duration::from_millis(self.scroll_duration_ms)
    }

    #[must_use]
    pub fn scroll_debounce(&self) -> Duration {
        Duration::from_millis(self.scroll_debounce_ms)
    }

    #[must_use]
    pub fn back_to_top_exit(&self) -> Duration {
        Duration::from_millis(self.back_to_top_exit_ms)
    }

    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// Typed view over a bound element's `data-*` attributes.
pub struct ElementConfig<'a, D: Dom> {
    dom: &'a D,
    node: &'a D::Node,
}

impl<'a, D: Dom> ElementConfig<'a, D> {
    #[must_use]
    pub fn new(dom: &'a D, node: &'a D::Node) -> Self {
        Self { dom, node }
    }

    /// Non-empty string attribute, or `default`.
    #[must_use]
    pub fn string(&self, attribute: &str, default: &str) -> String {
        self.dom
            .attribute(self.node, attribute)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    /// Parsed attribute, or `default` when absent or malformed.
    #[must_use]
    pub fn parse<T: FromStr>(&self, attribute: &str, default: T) -> T {
        let Some(raw) = self.dom.attribute(self.node, attribute) else {
            return default;
        };
        match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::debug!(
                    message = "config.attribute_fallback",
                    attribute,
                    raw = raw.as_str()
                );
                default
            }
        }
    }

    /// Millisecond attribute as a [`Duration`].
    #[must_use]
    pub fn millis(&self, attribute: &str, default: Duration) -> Duration {
        let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(self.parse(attribute, default_ms))
    }
}
