//! Simple event bus for decoupled communication between the chat store and UI.
//!
//! The bus is single-threaded (WASM constraint) and uses interior mutability
//! via RefCell. Events are buffered and drained by the UI when it re-renders.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use chat_types::event::StoreEvent;

/// Shared event bus, clone-cheap via Rc.
#[derive(Clone)]
pub struct EventBus {
    inner: Rc<RefCell<VecDeque<StoreEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    /// Publish an event. Called by the store.
    pub fn emit(&self, event: StoreEvent) {
        let mut queue = self.inner.borrow_mut();
        // Stream deltas fire one MessagesChanged per event; a UI only needs one.
        if matches!(event, StoreEvent::MessagesChanged { .. }) && queue.back() == Some(&event) {
            return;
        }
        queue.push_back(event);
    }

    /// Drain all pending events. Called by the UI layer.
    pub fn drain(&self) -> Vec<StoreEvent> {
        self.inner.borrow_mut().drain(..).collect()
    }

    /// Check if there are pending events (useful for repaint triggers).
    pub fn has_pending(&self) -> bool {
        !self.inner.borrow().is_empty()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
