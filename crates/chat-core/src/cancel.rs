//! Cancellation token for one in-flight exchange.
//!
//! Cancelling sets a shared flag (checked before every cache write) and
//! aborts the registered future or stream, so a pending network read is
//! dropped instead of delivering late data.

use std::cell::Cell;
use std::rc::Rc;
use futures::future::{AbortHandle, AbortRegistration};

#[derive(Clone, Debug)]
pub struct CancelToken {
    cancelled: Rc<Cell<bool>>,
    handle: AbortHandle,
}

impl CancelToken {
    /// A token plus the registration to wrap the cancellable work with
    /// (`futures::future::Abortable`).
    pub fn new() -> (Self, AbortRegistration) {
        let (handle, registration) = AbortHandle::new_pair();
        let token = Self {
            cancelled: Rc::new(Cell::new(false)),
            handle,
        };
        (token, registration)
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
        self.handle.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}
