#![forbid(unsafe_code)]

//! Metrics refresh cue: a periodic pulse over every `.stat-value`.

use std::marker::PhantomData;
use std::rc::Rc;

use crate::dom::Dom;
use crate::error::Result;
use crate::hook::{Hook, HookContext};
use crate::hooks::PULSE_CLASS;

/// `MetricsHook`.
pub struct MetricsHook<D: Dom> {
    _dom: PhantomData<D>,
}

impl<D: Dom> Default for MetricsHook<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Dom> MetricsHook<D> {
    #[must_use]
    pub fn new() -> Self {
        Self { _dom: PhantomData }
    }
}

impl<D: Dom> Hook<D> for MetricsHook<D> {
    fn name(&self) -> &'static str {
        "MetricsHook"
    }

    fn mounted(&mut self, cx: &HookContext<D>) -> Result<()> {
        let dom = Rc::clone(&cx.dom);
        let el = cx.el.clone();
        let timers = cx.scope.timers().clone();
        let pulse = cx.config.metrics_pulse();

        timers.clone().set_interval(cx.config.metrics_interval(), move || {
            let stats = dom.query_all(&el, ".stat-value");
            tracing::trace!(message = "metrics.tick", stats = stats.len());
            for stat in &stats {
                dom.add_class(stat, PULSE_CLASS);
            }
            let dom = Rc::clone(&dom);
            timers.set_timeout(pulse, move || {
                for stat in &stats {
                    dom.remove_class(stat, PULSE_CLASS);
                }
            });
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::LabHarness;
    use web_time::Duration;

    #[test]
    fn tick_pulses_stats_for_500ms() {
        let mut h = LabHarness::new();
        let el = h.dom.append(&h.dom.body(), "div");
        let stats: Vec<_> = (0..3)
            .map(|_| {
                let s = h.dom.append(&el, "span");
                h.dom.add_class(&s, "stat-value");
                s
            })
            .collect();
        let other = h.dom.append(&el, "span");
        h.host.mount("MetricsHook", el, None).expect("mount");

        h.scheduler.advance(Duration::from_millis(4999));
        assert!(!h.dom.has_class(&stats[0], PULSE_CLASS));
        h.scheduler.advance(Duration::from_millis(1));
        assert!(stats.iter().all(|s| h.dom.has_class(s, PULSE_CLASS)));
        assert!(!h.dom.has_class(&other, PULSE_CLASS));
        h.scheduler.advance(Duration::from_millis(500));
        assert!(stats.iter().all(|s| !h.dom.has_class(s, PULSE_CLASS)));

        h.scheduler.advance(Duration::from_millis(4500));
        assert_eq!(h.dom.class_additions(&stats[1], PULSE_CLASS), 2);
    }

    #[test]
    fn no_tick_after_destroy() {
        let mut h = LabHarness::new();
        let el = h.dom.append(&h.dom.body(), "div");
        let stat = h.dom.append(&el, "span");
        h.dom.add_class(&stat, "stat-value");
        let id = h.host.mount("MetricsHook", el, None).expect("mount");

        h.scheduler.advance(Duration::from_millis(5200));
        assert!(h.dom.has_class(&stat, PULSE_CLASS));
        h.host.destroy(id).expect("destroy");
        assert_eq!(h.scheduler.pending(), 0);

        h.scheduler.advance(Duration::from_secs(60));
        assert_eq!(h.dom.class_additions(&stat, PULSE_CLASS), 1);
    }
}
