#![forbid(unsafe_code)]

//! Recording [`ServerChannel`].

use std::cell::{Cell, RefCell};

use serde_json::Value;

use crate::channel::{ChannelRef, ClientEvent, RawHandler, ServerChannel};

/// Records outbound pushes and lets a test play the server.
#[derive(Default)]
pub struct LabChannel {
    handlers: RefCell<Vec<(ChannelRef, String, RawHandler)>>,
    pushed: RefCell<Vec<(String, Value)>>,
    next_ref: Cell<u64>,
}

impl std::fmt::Debug for LabChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabChannel")
            .field("handlers", &self.handlers.borrow().len())
            .field("pushed", &self.pushed.borrow())
            .finish()
    }
}

impl LabChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a server event; returns how many handlers saw it.
    pub fn deliver(&self, event: &str, payload: Value) -> usize {
        let matching: Vec<RawHandler> = self
            .handlers
            .borrow()
            .iter()
            .filter(|(_, name, _)| name == event)
            .map(|(_, _, handler)| RawHandler::clone(handler))
            .collect();
        for handler in &matching {
            handler(payload.clone());
        }
        matching.len()
    }

    /// Outbound events so far, decoded.
    #[must_use]
    pub fn pushed(&self) -> Vec<ClientEvent> {
        self.pushed
            .borrow()
            .iter()
            .filter_map(|(name, payload)| ClientEvent::from_parts(name, payload.clone()))
            .collect()
    }

    /// Outbound events so far as raw `(name, payload)` pairs.
    #[must_use]
    pub fn pushed_raw(&self) -> Vec<(String, Value)> {
        self.pushed.borrow().clone()
    }

    /// Drain the outbound log.
    pub fn take_pushed(&self) -> Vec<ClientEvent> {
        let events = self.pushed();
        self.pushed.borrow_mut().clear();
        events
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().len()
    }
}

impl ServerChannel for LabChannel {
    fn push(&self, event: &str, payload: Value) {
        self.pushed.borrow_mut().push((event.to_string(), payload));
    }

    fn handle_event(&self, event: &str, handler: RawHandler) -> ChannelRef {
        let id = ChannelRef(self.next_ref.get());
        self.next_ref.set(id.0 + 1);
        self.handlers
            .borrow_mut()
            .push((id, event.to_string(), handler));
        id
    }

    fn remove_handler(&self, handler: ChannelRef) {
        self.handlers.borrow_mut().retain(|(id, _, _)| *id != handler);
    }
}
