#![forbid(unsafe_code)]

//! Hook registry and the host that owns live instances.
//!
//! The page-patching transport calls [`HookHost::mount`] when a marked
//! element appears and [`HookHost::destroy`] when it leaves. Each mount gets
//! a fresh [`HookScope`]; a failing mount is logged, rolled back, and reported
//! to the caller without touching any other instance.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::channel::ServerChannel;
use crate::config::RuntimeConfig;
use crate::dom::Dom;
use crate::error::{HookError, Result};
use crate::hook::{Hook, HookContext, HookInstance, HookPhase, InstanceId};
use crate::hooks::{
    MetricsHook, NetworkGraphHook, NetworkStatusHook, SmoothScrollHook, ThemeHook, ToastHook,
};
use crate::prefs::PreferenceStore;
use crate::scheduler::Scheduler;
use crate::scope::HookScope;

pub type HookFactory<D> = Box<dyn Fn() -> Box<dyn Hook<D>>>;

/// Behavior name → factory.
pub struct HookRegistry<D: Dom> {
    factories: BTreeMap<String, HookFactory<D>>,
}

impl<D: Dom> fmt::Debug for HookRegistry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("names", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<D: Dom> Default for HookRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Dom> HookRegistry<D> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with every dashboard behavior under its page-facing name.
    #[must_use]
    pub fn with_dashboard_hooks() -> Self {
        let mut registry = Self::new();
        registry.register("UniversalTheme", || Box::new(ThemeHook::<D>::new()));
        registry.register("ThemeHook", || Box::new(ThemeHook::<D>::new()));
        registry.register("NetworkStatusHook", || Box::new(NetworkStatusHook::<D>::new()));
        registry.register("NetworkGraphHook", || Box::new(NetworkGraphHook::<D>::new()));
        registry.register("MetricsHook", || Box::new(MetricsHook::<D>::new()));
        registry.register("ToastHook", || Box::new(ToastHook::<D>::new()));
        registry.register("SmoothScrollHook", || Box::new(SmoothScrollHook::<D>::new()));
        registry
    }

    /// Register a factory. An existing name is replaced.
    pub fn register(&mut self, name: &str, factory: impl Fn() -> Box<dyn Hook<D>> + 'static) {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn Hook<D>>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| HookError::unknown_hook(name))
    }
}

/// Host facilities shared by every instance on a page.
pub struct HookEnv<D: Dom> {
    pub dom: Rc<D>,
    pub scheduler: Rc<dyn Scheduler>,
    pub prefs: PreferenceStore,
    pub config: Rc<RuntimeConfig>,
}

impl<D: Dom> Clone for HookEnv<D> {
    fn clone(&self) -> Self {
        Self {
            dom: Rc::clone(&self.dom),
            scheduler: Rc::clone(&self.scheduler),
            prefs: self.prefs.clone(),
            config: Rc::clone(&self.config),
        }
    }
}

/// Owns every live hook instance on a page.
pub struct HookHost<D: Dom> {
    env: HookEnv<D>,
    registry: HookRegistry<D>,
    instances: BTreeMap<InstanceId, HookInstance<D>>,
    next_id: u64,
}

impl<D: Dom> fmt::Debug for HookHost<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookHost")
            .field("registry", &self.registry)
            .field("instances", &self.instances.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl<D: Dom> HookHost<D> {
    #[must_use]
    pub fn new(env: HookEnv<D>, registry: HookRegistry<D>) -> Self {
        Self {
            env,
            registry,
            instances: BTreeMap::new(),
            next_id: 1,
        }
    }

    #[must_use]
    pub fn env(&self) -> &HookEnv<D> {
        &self.env
    }

    #[must_use]
    pub fn registry(&self) -> &HookRegistry<D> {
        &self.registry
    }

    /// Live (mounted) instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    #[must_use]
    pub fn phase(&self, id: InstanceId) -> Option<HookPhase> {
        self.instances.get(&id).map(HookInstance::phase)
    }

    #[must_use]
    pub fn instance(&self, id: InstanceId) -> Option<&HookInstance<D>> {
        self.instances.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.instances.keys().copied()
    }

    /// Instantiate `name` on `el` and run its mount.
    pub fn mount(
        &mut self,
        name: &str,
        el: D::Node,
        channel: Option<Rc<dyn ServerChannel>>,
    ) -> Result<InstanceId> {
        let hook = self.registry.create(name).inspect_err(|err| {
            tracing::warn!(message = "hook.unknown", hook = name, error = %err);
        })?;
        let id = InstanceId(self.next_id);
        self.next_id += 1;

        let scope = HookScope::new(
            Rc::clone(&self.env.dom),
            Rc::clone(&self.env.scheduler),
            self.env.prefs.clone(),
            channel,
        );
        let cx = HookContext {
            instance: id,
            el,
            dom: Rc::clone(&self.env.dom),
            scope,
            config: Rc::clone(&self.env.config),
        };
        let mut instance = HookInstance::new(hook, cx);
        match instance.mount() {
            Ok(()) => {
                self.instances.insert(id, instance);
                Ok(id)
            }
            Err(err) => {
                tracing::warn!(
                    message = "hook.mount_failed",
                    hook = name,
                    instance = id.0,
                    error = %err
                );
                Err(err)
            }
        }
    }

    /// Re-entry after the transport patched the element.
    pub fn updated(&mut self, id: InstanceId) -> Result<()> {
        self.instances
            .get_mut(&id)
            .ok_or(HookError::UnknownInstance { id: id.0 })?
            .update()
    }

    /// Tear down and forget `id`.
    pub fn destroy(&mut self, id: InstanceId) -> Result<()> {
        let mut instance = self
            .instances
            .remove(&id)
            .ok_or(HookError::UnknownInstance { id: id.0 })?;
        instance.destroy();
        Ok(())
    }

    /// Tear down every instance (page unload).
    pub fn destroy_all(&mut self) {
        for (_, mut instance) in std::mem::take(&mut self.instances) {
            instance.destroy();
        }
    }
}

impl<D: Dom> Drop for HookHost<D> {
    fn drop(&mut self) {
        self.destroy_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::{LabDom, LabHarness};
    use std::cell::Cell;
    use std::sync::{Arc, Mutex};
    use tracing::Subscriber;
    use tracing_subscriber::Layer;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use web_time::Duration;

    struct Failing;

    impl Hook<LabDom> for Failing {
        fn name(&self) -> &'static str {
            "Failing"
        }

        fn mounted(&mut self, cx: &HookContext<LabDom>) -> Result<()> {
            cx.scope
                .timers()
                .set_interval(Duration::from_millis(10), || panic!("must never fire"));
            Err(HookError::host("bound element is not an svg host"))
        }
    }

    struct Counting {
        updates: Rc<Cell<u32>>,
    }

    impl Hook<LabDom> for Counting {
        fn name(&self) -> &'static str {
            "Counting"
        }

        fn mounted(&mut self, cx: &HookContext<LabDom>) -> Result<()> {
            let updates = Rc::clone(&self.updates);
            cx.scope.listen(
                crate::dom::EventTarget::Node(cx.el),
                crate::dom::DomEventKind::Click,
                move |_| updates.set(updates.get() + 100),
            );
            Ok(())
        }

        fn updated(&mut self, _cx: &HookContext<LabDom>) {
            self.updates.set(self.updates.get() + 1);
        }
    }

    #[derive(Default)]
    struct Captured {
        messages: Vec<String>,
    }

    struct CaptureLayer {
        state: Arc<Mutex<Captured>>,
    }

    impl<S: Subscriber> Layer<S> for CaptureLayer {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            struct Msg(Option<String>);
            impl tracing::field::Visit for Msg {
                fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                    if field.name() == "message" {
                        self.0 = Some(value.to_string());
                    }
                }

                fn record_debug(
                    &mut self,
                    field: &tracing::field::Field,
                    value: &dyn std::fmt::Debug,
                ) {
                    if field.name() == "message" {
                        self.0 = Some(format!("{value:?}").trim_matches('"').to_string());
                    }
                }
            }
            let mut msg = Msg(None);
            event.record(&mut msg);
            if let Some(m) = msg.0 {
                self.state.lock().expect("capture lock").messages.push(m);
            }
        }
    }

    #[test]
    fn dashboard_registry_names() {
        let registry = HookRegistry::<LabDom>::with_dashboard_hooks();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(
            names,
            vec![
                "MetricsHook",
                "NetworkGraphHook",
                "NetworkStatusHook",
                "SmoothScrollHook",
                "ThemeHook",
                "ToastHook",
                "UniversalTheme",
            ]
        );
    }

    #[test]
    fn unknown_hook_is_reported() {
        let mut harness = LabHarness::new();
        let el = harness.dom.append(&harness.dom.body(), "div");
        let err = harness.host.mount("Nope", el, None).unwrap_err();
        assert!(matches!(err, HookError::UnknownHook { ref name } if name == "Nope"));
        assert!(harness.host.is_empty());
    }

    #[test]
    fn failed_mount_is_isolated_and_rolled_back() {
        let state = Arc::new(Mutex::new(Captured::default()));
        let subscriber = tracing_subscriber::registry().with(CaptureLayer {
            state: Arc::clone(&state),
        });
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut harness = LabHarness::new();
        harness.host.registry.register("Failing", || Box::new(Failing));
        let body = harness.dom.body();
        let metrics_el = harness.dom.append(&body, "div");
        let failing_el = harness.dom.append(&body, "div");

        let metrics = harness
            .host
            .mount("MetricsHook", metrics_el, None)
            .expect("metrics mounts");
        assert!(harness.host.mount("Failing", failing_el, None).is_err());

        assert_eq!(harness.host.len(), 1);
        assert_eq!(harness.host.phase(metrics), Some(HookPhase::Mounted));
        // Only the metrics interval survives.
        assert_eq!(harness.scheduler.pending(), 1);
        harness.scheduler.advance(Duration::from_millis(100));

        let captured = state.lock().expect("capture lock");
        assert!(
            captured.messages.iter().any(|m| m == "hook.mount_failed"),
            "expected hook.mount_failed, got {:?}",
            captured.messages
        );
    }

    #[test]
    fn updated_is_idempotent_and_does_not_reregister() {
        let mut harness = LabHarness::new();
        let updates = Rc::new(Cell::new(0));
        let counter = Rc::clone(&updates);
        harness.host.registry.register("Counting", move || {
            Box::new(Counting {
                updates: Rc::clone(&counter),
            })
        });
        let el = harness.dom.append(&harness.dom.body(), "div");
        let id = harness.host.mount("Counting", el, None).expect("mount");
        harness.host.updated(id).expect("update");
        harness.host.updated(id).expect("update");
        assert_eq!(harness.dom.listener_count(), 1);

        harness.dom.click(&el);
        assert_eq!(updates.get(), 102);
    }

    #[test]
    fn destroy_twice_reports_unknown_instance() {
        let mut harness = LabHarness::new();
        let el = harness.dom.append(&harness.dom.body(), "div");
        let id = harness.host.mount("MetricsHook", el, None).expect("mount");
        harness.host.destroy(id).expect("first destroy");
        assert!(matches!(
            harness.host.destroy(id),
            Err(HookError::UnknownInstance { .. })
        ));
        assert!(matches!(
            harness.host.updated(id),
            Err(HookError::UnknownInstance { .. })
        ));
        assert_eq!(harness.scheduler.pending(), 0);
    }
}
