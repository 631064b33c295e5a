#![forbid(unsafe_code)]

//! One simulated browser tab: DOM, clock, storage view, channel, and host.

use std::rc::Rc;

use crate::channel::ServerChannel;
use crate::config::RuntimeConfig;
use crate::dom::Dom;
use crate::hooks::theme::THEME_ATTRIBUTE;
use crate::lab::{LabChannel, LabDom, LabScheduler, LabStorage};
use crate::prefs::PreferenceStore;
use crate::registry::{HookEnv, HookHost, HookRegistry};

#[derive(Debug)]
pub struct LabHarness {
    pub dom: Rc<LabDom>,
    pub scheduler: Rc<LabScheduler>,
    /// Medium shared with any sibling tabs.
    pub storage: LabStorage,
    pub lab_channel: Rc<LabChannel>,
    pub host: HookHost<LabDom>,
}

impl Default for LabHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl LabHarness {
    /// A lone tab with fresh storage and the stock configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::on_storage(&LabStorage::new())
    }

    /// Another tab over an existing storage medium.
    #[must_use]
    pub fn on_storage(storage: &LabStorage) -> Self {
        Self::with_config(storage, RuntimeConfig::default())
    }

    /// A tab whose frame cadence is `config.frame_interval_ms`.
    #[must_use]
    pub fn with_config(storage: &LabStorage, config: RuntimeConfig) -> Self {
        let dom = Rc::new(LabDom::new());
        let scheduler = Rc::new(LabScheduler::with_frame_interval(config.frame_interval()));
        let env = HookEnv {
            dom: Rc::clone(&dom),
            scheduler: scheduler.clone(),
            prefs: PreferenceStore::new(Rc::new(storage.tab())),
            config: Rc::new(config),
        };
        Self {
            dom,
            scheduler,
            storage: storage.clone(),
            lab_channel: Rc::new(LabChannel::new()),
            host: HookHost::new(env, HookRegistry::with_dashboard_hooks()),
        }
    }

    /// This tab's channel, as handed to a mount.
    #[must_use]
    pub fn channel(&self) -> Rc<dyn ServerChannel> {
        self.lab_channel.clone()
    }

    /// This tab's preference store.
    #[must_use]
    pub fn prefs(&self) -> PreferenceStore {
        self.host.env().prefs.clone()
    }

    /// `data-theme` on the document root.
    #[must_use]
    pub fn root_theme(&self) -> Option<String> {
        self.dom
            .attribute(&self.dom.document_element(), THEME_ATTRIBUTE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use std::cell::Cell;
    use web_time::Duration;

    #[test]
    fn frames_follow_the_configured_interval() {
        let config = RuntimeConfig::from_json(r#"{"frame_interval_ms": 40}"#).expect("config");
        let h = LabHarness::with_config(&LabStorage::new(), config);
        let fired = Rc::new(Cell::new(None));
        let seen = Rc::clone(&fired);
        h.scheduler
            .request_frame(Box::new(move |ts| seen.set(Some(ts))));

        h.scheduler.advance(Duration::from_millis(39));
        assert_eq!(fired.get(), None);
        h.scheduler.advance(Duration::from_millis(1));
        assert_eq!(fired.get(), Some(40.0));
    }

    #[test]
    fn zero_frame_interval_falls_back_to_the_stock_cadence() {
        let config = RuntimeConfig::from_json(r#"{"frame_interval_ms": 0}"#).expect("config");
        let h = LabHarness::with_config(&LabStorage::new(), config);
        let fired = Rc::new(Cell::new(false));
        let seen = Rc::clone(&fired);
        h.scheduler.request_frame(Box::new(move |_| seen.set(true)));
        h.scheduler.advance(Duration::from_millis(16));
        assert!(fired.get());
    }
}
