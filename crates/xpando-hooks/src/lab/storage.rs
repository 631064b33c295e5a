#![forbid(unsafe_code)]

//! Shared storage medium with per-tab views.
//!
//! [`LabStorage`] plays the origin's `localStorage`; each [`LabStorage::tab`]
//! is one browsing context over it. A write from one tab notifies every
//! other tab's subscribers synchronously, never the writer's own.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::{HookError, Result};
use crate::prefs::{ChangeListener, PreferenceBackend, PreferenceChange, SubscriptionId};

#[derive(Default)]
struct Medium {
    values: BTreeMap<String, String>,
    subscribers: Vec<(u64, SubscriptionId, ChangeListener)>,
    next_tab: u64,
    next_subscription: u64,
    fail_writes: bool,
}

/// The storage medium. Cloning yields another handle to the same medium.
#[derive(Clone, Default)]
pub struct LabStorage {
    medium: Rc<RefCell<Medium>>,
}

impl std::fmt::Debug for LabStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let medium = self.medium.borrow();
        f.debug_struct("LabStorage")
            .field("values", &medium.values)
            .field("subscribers", &medium.subscribers.len())
            .finish()
    }
}

impl LabStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A new tab over this medium.
    #[must_use]
    pub fn tab(&self) -> LabStorageTab {
        let mut medium = self.medium.borrow_mut();
        medium.next_tab += 1;
        LabStorageTab {
            storage: self.clone(),
            tab: medium.next_tab,
        }
    }

    /// Make every write fail (quota exceeded, private mode).
    pub fn set_fail_writes(&self, fail: bool) {
        self.medium.borrow_mut().fail_writes = fail;
    }

    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        self.medium.borrow().values.get(key).cloned()
    }
}

/// One tab's view of a [`LabStorage`].
#[derive(Debug, Clone)]
pub struct LabStorageTab {
    storage: LabStorage,
    tab: u64,
}

impl PreferenceBackend for LabStorageTab {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.value(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let (change, peers) = {
            let mut medium = self.storage.medium.borrow_mut();
            if medium.fail_writes {
                return Err(HookError::storage("quota exceeded"));
            }
            let old_value = medium.values.insert(key.to_string(), value.to_string());
            let peers: Vec<ChangeListener> = medium
                .subscribers
                .iter()
                .filter(|(tab, _, _)| *tab != self.tab)
                .map(|(_, _, listener)| Rc::clone(listener))
                .collect();
            let change = PreferenceChange {
                key: key.to_string(),
                old_value,
                new_value: Some(value.to_string()),
            };
            (change, peers)
        };
        for listener in peers {
            listener(&change);
        }
        Ok(())
    }

    fn subscribe(&self, listener: ChangeListener) -> SubscriptionId {
        let mut medium = self.storage.medium.borrow_mut();
        medium.next_subscription += 1;
        let id = SubscriptionId(medium.next_subscription);
        medium.subscribers.push((self.tab, id, listener));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.storage
            .medium
            .borrow_mut()
            .subscribers
            .retain(|(_, sub, _)| *sub != id);
    }
}
