#![forbid(unsafe_code)]

//! Persistent preference store.
//!
//! One string-keyed slot per key, shared by every tab of the origin. The
//! backend (`localStorage` in the browser) is reached only through
//! [`PreferenceBackend`]; hooks hold a cloneable [`PreferenceStore`].
//!
//! # Invariants
//!
//! 1. Last write wins; there is no read-modify-write transaction.
//! 2. Subscribers see only changes written by *other* tabs. A tab never
//!    receives a notification for its own write.
//! 3. Absence is a valid state; callers supply the fallback.

use std::fmt;
use std::rc::Rc;

use crate::error::Result;

/// Handle for an external-change subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// A write observed from another tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceChange {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

pub type ChangeListener = Rc<dyn Fn(&PreferenceChange)>;

pub trait PreferenceBackend {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Observe writes made by other tabs.
    fn subscribe(&self, listener: ChangeListener) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);
}

/// Shared handle over a [`PreferenceBackend`].
#[derive(Clone)]
pub struct PreferenceStore {
    backend: Rc<dyn PreferenceBackend>,
}

impl fmt::Debug for PreferenceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreferenceStore").finish_non_exhaustive()
    }
}

impl PreferenceStore {
    #[must_use]
    pub fn new(backend: Rc<dyn PreferenceBackend>) -> Self {
        Self { backend }
    }

    /// Stored value; empty strings count as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.backend.get(key).filter(|v| !v.is_empty())
    }

    #[must_use]
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.backend.set(key, value)
    }

    pub fn subscribe(&self, listener: ChangeListener) -> SubscriptionId {
        self.backend.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.backend.unsubscribe(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::LabStorage;
    use std::cell::RefCell;

    #[test]
    fn absent_and_empty_values_fall_back() {
        let medium = LabStorage::new();
        let store = PreferenceStore::new(Rc::new(medium.tab()));
        assert_eq!(store.get_or("theme", "dark"), "dark");
        store.set("theme", "").expect("write");
        assert_eq!(store.get("theme"), None);
        store.set("theme", "light").expect("write");
        assert_eq!(store.get_or("theme", "dark"), "light");
    }

    #[test]
    fn writer_tab_is_not_notified_but_peers_are() {
        let medium = LabStorage::new();
        let a = PreferenceStore::new(Rc::new(medium.tab()));
        let b = PreferenceStore::new(Rc::new(medium.tab()));

        let seen_a = Rc::new(RefCell::new(Vec::new()));
        let seen_b = Rc::new(RefCell::new(Vec::new()));
        let sink_a = Rc::clone(&seen_a);
        let sink_b = Rc::clone(&seen_b);
        a.subscribe(Rc::new(move |c: &PreferenceChange| {
            sink_a.borrow_mut().push(c.clone());
        }));
        b.subscribe(Rc::new(move |c: &PreferenceChange| {
            sink_b.borrow_mut().push(c.clone());
        }));

        a.set("theme", "light").expect("write");

        assert!(seen_a.borrow().is_empty());
        assert_eq!(
            seen_b.borrow().as_slice(),
            &[PreferenceChange {
                key: "theme".into(),
                old_value: None,
                new_value: Some("light".into()),
            }]
        );
        assert_eq!(b.get("theme").as_deref(), Some("light"));
    }

    #[test]
    fn unsubscribed_listener_is_silent() {
        let medium = LabStorage::new();
        let a = PreferenceStore::new(Rc::new(medium.tab()));
        let b = PreferenceStore::new(Rc::new(medium.tab()));
        let hits = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&hits);
        let id = b.subscribe(Rc::new(move |_: &PreferenceChange| {
            *sink.borrow_mut() += 1;
        }));
        b.unsubscribe(id);
        a.set("theme", "light").expect("write");
        assert_eq!(*hits.borrow(), 0);
    }
}
