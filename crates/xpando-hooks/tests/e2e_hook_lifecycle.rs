//! E2E: every dashboard behavior mounted on one page, exercised, and torn
//! down.
//!
//! Validates:
//! 1. All registered names mount on plain markup.
//! 2. Teardown is total: no timer, listener, or channel handler survives.
//! 3. Nothing fires after teardown, however far the clock moves.

#![forbid(unsafe_code)]

use pretty_assertions::assert_eq;
use serde_json::json;
use web_time::Duration;
use xpando_hooks::dom::Dom;
use xpando_hooks::lab::LabHarness;
use xpando_hooks::HookPhase;

const NAMES: [&str; 7] = [
    "UniversalTheme",
    "ThemeHook",
    "NetworkStatusHook",
    "NetworkGraphHook",
    "MetricsHook",
    "ToastHook",
    "SmoothScrollHook",
];

#[test]
fn full_page_mounts_and_tears_down_cleanly() {
    let mut page = LabHarness::new();
    let body = page.dom.body();

    let mut ids = Vec::new();
    for name in NAMES {
        let el = page.dom.append(&body, "section");
        let svg = page.dom.append(&el, "svg");
        let line = page.dom.append(&svg, "line");
        page.dom.set_attribute(&line, "data-status", "active");
        let stat = page.dom.append(&el, "span");
        page.dom.add_class(&stat, "stat-value");
        let id = page
            .host
            .mount(name, el, Some(page.channel()))
            .unwrap_or_else(|err| panic!("{name} failed to mount: {err}"));
        assert_eq!(page.host.phase(id), Some(HookPhase::Mounted));
        ids.push(id);
    }
    assert_eq!(page.host.len(), NAMES.len());

    page.lab_channel
        .deliver("show_toast", json!({"type": "success", "message": "ok"}));
    page.lab_channel
        .deliver("network_activity", json!({"type": "gossip", "node_id": 9}));
    page.dom.set_scroll(2000.0);
    page.scheduler.advance(Duration::from_millis(5100));
    assert!(page.scheduler.pending() > 0);

    for id in ids {
        page.host.updated(id).expect("update");
    }
    page.host.destroy_all();

    assert!(page.host.is_empty());
    assert_eq!(page.scheduler.pending(), 0);
    assert_eq!(page.dom.listener_count(), 0);
    assert_eq!(page.lab_channel.handler_count(), 0);
    assert!(
        page.dom
            .query_all(&page.dom.body(), "[data-activity-type]")
            .is_empty()
    );

    let before = page.lab_channel.pushed_raw().len();
    page.scheduler.advance(Duration::from_secs(60));
    page.lab_channel
        .deliver("graph_update", json!({"nodes": []}));
    assert_eq!(page.lab_channel.pushed_raw().len(), before);
}

#[test]
fn one_failing_mount_leaves_siblings_alone() {
    let mut page = LabHarness::new();
    let body = page.dom.body();
    let ok = page.dom.append(&body, "div");
    let bad = page.dom.append(&body, "div");

    page.host.mount("MetricsHook", ok, None).expect("mount");
    assert!(page.host.mount("NoSuchHook", bad, None).is_err());
    assert_eq!(page.host.len(), 1);
    assert_eq!(page.scheduler.pending(), 1);
}

#[test]
fn dropping_the_host_releases_everything() {
    let page = LabHarness::new();
    let shared = page.channel();
    let (dom, scheduler, channel) = (
        page.dom.clone(),
        page.scheduler.clone(),
        page.lab_channel.clone(),
    );
    let mut host = page.host;
    let el = dom.append(&dom.body(), "div");
    host.mount("ToastHook", el, Some(shared)).expect("mount");
    host.mount("MetricsHook", el, None).expect("mount");
    drop(host);
    assert_eq!(scheduler.pending(), 0);
    assert_eq!(channel.handler_count(), 0);
}
