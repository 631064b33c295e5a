#![forbid(unsafe_code)]

//! Host-independent half of the browser runtime.
//!
//! JavaScript sees instances as plain `u32` ids and configuration as one
//! optional JSON string. This module owns those conversions so they can be
//! tested natively against the lab host.

use std::rc::Rc;

use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use xpando_hooks::channel::ServerChannel;
use xpando_hooks::dom::Dom;
use xpando_hooks::{HookEnv, HookError, HookHost, HookRegistry, InstanceId, Result, RuntimeConfig};

/// Adapter-only options read from the same JSON object as [`RuntimeConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WebOptions {
    /// `off`, `error`, `warn`, `info`, `debug`, or `trace`.
    pub log_level: String,
}

impl Default for WebOptions {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl WebOptions {
    /// Parsed level; anything unrecognized means `info`.
    #[must_use]
    pub fn level_filter(&self) -> LevelFilter {
        self.log_level.trim().parse().unwrap_or(LevelFilter::INFO)
    }
}

/// Split one optional JSON object into core and adapter settings.
pub fn parse_options(json: Option<&str>) -> Result<(RuntimeConfig, WebOptions)> {
    let config = RuntimeConfig::from_optional_json(json)?;
    let options = match json.map(str::trim).filter(|j| !j.is_empty()) {
        Some(json) => serde_json::from_str(json).map_err(HookError::Config)?,
        None => WebOptions::default(),
    };
    Ok((config, options))
}

/// [`HookHost`] behind `u32` instance ids.
pub struct HookBridge<D: Dom> {
    host: HookHost<D>,
}

impl<D: Dom> std::fmt::Debug for HookBridge<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookBridge").field("host", &self.host).finish()
    }
}

impl<D: Dom> HookBridge<D> {
    #[must_use]
    pub fn new(env: HookEnv<D>) -> Self {
        Self {
            host: HookHost::new(env, HookRegistry::with_dashboard_hooks()),
        }
    }

    #[must_use]
    pub fn host(&self) -> &HookHost<D> {
        &self.host
    }

    pub fn mount(
        &mut self,
        name: &str,
        el: D::Node,
        channel: Option<Rc<dyn ServerChannel>>,
    ) -> Result<u32> {
        let id = self.host.mount(name, el, channel)?;
        u32::try_from(id.0).map_err(|_| HookError::host("instance id space exhausted"))
    }

    pub fn updated(&mut self, id: u32) -> Result<()> {
        self.host.updated(InstanceId(u64::from(id)))
    }

    pub fn destroy(&mut self, id: u32) -> Result<()> {
        self.host.destroy(InstanceId(u64::from(id)))
    }

    pub fn destroy_all(&mut self) {
        self.host.destroy_all();
    }

    #[must_use]
    pub fn hook_names(&self) -> Vec<String> {
        self.host.registry().names().map(str::to_string).collect()
    }

    #[must_use]
    pub fn live_instances(&self) -> usize {
        self.host.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use xpando_hooks::PreferenceStore;
    use xpando_hooks::lab::{LabChannel, LabDom, LabScheduler, LabStorage};

    fn bridge() -> (HookBridge<LabDom>, Rc<LabDom>, Rc<LabScheduler>) {
        let dom = Rc::new(LabDom::new());
        let scheduler = Rc::new(LabScheduler::new());
        let env = HookEnv {
            dom: Rc::clone(&dom),
            scheduler: scheduler.clone(),
            prefs: PreferenceStore::new(Rc::new(LabStorage::new().tab())),
            config: Rc::new(RuntimeConfig::default()),
        };
        (HookBridge::new(env), dom, scheduler)
    }

    #[test]
    fn options_share_one_json_object() {
        let (config, options) =
            parse_options(Some(r#"{"toast_ttl_ms": 900, "log_level": "debug"}"#)).expect("parse");
        assert_eq!(config.toast_ttl_ms, 900);
        assert_eq!(options.level_filter(), LevelFilter::DEBUG);
    }

    #[test]
    fn missing_or_bogus_level_is_info() {
        let (_, options) = parse_options(None).expect("parse");
        assert_eq!(options.level_filter(), LevelFilter::INFO);
        let (_, options) = parse_options(Some(r#"{"log_level": "chatty"}"#)).expect("parse");
        assert_eq!(options.level_filter(), LevelFilter::INFO);
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(parse_options(Some("{")), Err(HookError::Config(_))));
    }

    #[test]
    fn ids_round_trip_through_u32() {
        let (mut bridge, dom, scheduler) = bridge();
        let el = dom.append(&dom.body(), "div");
        let channel: Rc<dyn ServerChannel> = Rc::new(LabChannel::new());
        let id = bridge
            .mount("ToastHook", el, Some(channel))
            .expect("mount");
        let metrics = bridge.mount("MetricsHook", el, None).expect("mount");
        assert_ne!(id, metrics);
        assert_eq!(bridge.live_instances(), 2);

        bridge.updated(metrics).expect("update");
        bridge.destroy(metrics).expect("destroy");
        assert!(matches!(
            bridge.destroy(metrics),
            Err(HookError::UnknownInstance { .. })
        ));
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(bridge.live_instances(), 1);
    }

    #[test]
    fn destroy_all_releases_every_instance() {
        let (mut bridge, dom, scheduler) = bridge();
        let el = dom.append(&dom.body(), "div");
        bridge.mount("MetricsHook", el, None).expect("mount");
        bridge.mount("SmoothScrollHook", el, None).expect("mount");
        bridge.destroy_all();
        assert_eq!(bridge.live_instances(), 0);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(dom.listener_count(), 0);
    }

    #[test]
    fn hook_names_list_every_behavior() {
        let (bridge, _, _) = bridge();
        let names = bridge.hook_names();
        assert_eq!(names.len(), 7);
        assert!(names.iter().any(|n| n == "UniversalTheme"));
    }
}
