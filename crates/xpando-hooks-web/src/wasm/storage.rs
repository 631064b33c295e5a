#![forbid(unsafe_code)]

//! `localStorage` preference backend.
//!
//! Browsers fire the window `storage` event only in tabs other than the
//! writer, which is exactly the notification contract of
//! [`PreferenceBackend`]. One window listener is installed on first
//! subscription and fans out to every subscriber.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{Storage, StorageEvent, Window};
use xpando_hooks::prefs::{ChangeListener, PreferenceBackend, PreferenceChange, SubscriptionId};
use xpando_hooks::{HookError, Result};

use super::js_message;

type Subscribers = Rc<RefCell<Vec<(SubscriptionId, ChangeListener)>>>;

pub(crate) struct LocalStorageBackend {
    window: Window,
    storage: Option<Storage>,
    subscribers: Subscribers,
    next_id: Cell<u64>,
    listener: RefCell<Option<Closure<dyn FnMut(StorageEvent)>>>,
}

impl LocalStorageBackend {
    pub(crate) fn new(window: Window) -> Self {
        // Throws in sandboxed frames and some privacy modes.
        let storage = match window.local_storage() {
            Ok(storage) => storage,
            Err(err) => {
                tracing::warn!(
                    message = "prefs.local_storage_unavailable",
                    error = %js_message(&err)
                );
                None
            }
        };
        Self {
            window,
            storage,
            subscribers: Rc::new(RefCell::new(Vec::new())),
            next_id: Cell::new(0),
            listener: RefCell::new(None),
        }
    }

    fn ensure_listener(&self) {
        if self.listener.borrow().is_some() {
            return;
        }
        let subscribers = Rc::clone(&self.subscribers);
        let closure = Closure::<dyn FnMut(StorageEvent)>::new(move |event: StorageEvent| {
            // `key` is null when another tab called `clear()`.
            let Some(key) = event.key() else {
                return;
            };
            let change = PreferenceChange {
                key,
                old_value: event.old_value(),
                new_value: event.new_value(),
            };
            let listeners: Vec<ChangeListener> = subscribers
                .borrow()
                .iter()
                .map(|(_, listener)| Rc::clone(listener))
                .collect();
            for listener in listeners {
                listener(&change);
            }
        });
        if let Err(err) = self
            .window
            .add_event_listener_with_callback("storage", closure.as_ref().unchecked_ref())
        {
            tracing::warn!(
                message = "prefs.storage_listener_failed",
                error = %js_message(&err)
            );
            return;
        }
        *self.listener.borrow_mut() = Some(closure);
    }
}

impl PreferenceBackend for LocalStorageBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.as_ref()?.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let storage = self
            .storage
            .as_ref()
            .ok_or_else(|| HookError::storage("localStorage unavailable"))?;
        storage
            .set_item(key, value)
            .map_err(|err| HookError::storage(format!("setItem: {}", js_message(&err))))
    }

    fn subscribe(&self, listener: ChangeListener) -> SubscriptionId {
        self.ensure_listener();
        let id = SubscriptionId(self.next_id.get() + 1);
        self.next_id.set(id.0);
        self.subscribers.borrow_mut().push((id, listener));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.borrow_mut().retain(|(sub, _)| *sub != id);
    }
}

impl Drop for LocalStorageBackend {
    fn drop(&mut self) {
        if let Some(closure) = self.listener.borrow_mut().take() {
            let _ = self
                .window
                .remove_event_listener_with_callback("storage", closure.as_ref().unchecked_ref());
        }
    }
}
