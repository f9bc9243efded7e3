//! Explicit handler registration list
//!
//! Hub notifications (state changes, unexpected closes, pushed batches) fan out
//! to every attached handler, in attachment order, on each emission.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Token returned by [`EventSource::attach`], used to detach the handler again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// A named event stream with an explicit list of attached handlers
pub struct EventSource<T> {
    handlers: Mutex<Vec<(HandlerId, Handler<T>)>>,
    next_id: AtomicU64,
}

impl<T> EventSource<T> {
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Append a handler to the end of the list
    pub fn attach<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.handlers.lock().push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler; returns false when it was not attached
    pub fn detach(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != before
    }

    /// Invoke every attached handler with `value`
    ///
    /// Handlers run on the emitting thread, outside the list lock, so a handler
    /// may attach or detach without deadlocking.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Handler<T>> = self
            .handlers
            .lock()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in snapshot {
            handler(value);
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn clear(&self) {
        self.handlers.lock().clear();
    }
}

impl<T> Default for EventSource<T> {
    fn default() -> Self {
        Self::new()
    }
}
