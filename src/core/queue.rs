//! # Coalescing queue of capacity one.
//!
//! Only the most recent analysis matters: when a newer request arrives while an
//! older one is still waiting, the older one is evicted and handed back to the
//! caller (which cancels it).
//!
//! ```text
//! put(A)            slot: [A]
//! put(B)  → Some(A) slot: [B]      (A must be cancelled by the caller)
//! get()   → B       slot: [ ]
//! get()   … suspends until the next put
//! ```
//!
//! ## Rules
//! - `put` never blocks.
//! - `get` has a single consumer (the run loop) and is cancel-safe: the item is
//!   taken synchronously, so a `get` dropped inside `select!` loses nothing.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

#[derive(Debug)]
pub(crate) struct CoalescingQueue<T> {
    slot: Mutex<Option<T>>,
    notify: Notify,
}

impl<T> CoalescingQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `item`, returning the item it replaced (if any).
    pub(crate) fn put(&self, item: T) -> Option<T> {
        let evicted = self.slot().replace(item);
        self.notify.notify_one();
        evicted
    }

    /// Waits for an item and takes it out of the queue.
    pub(crate) async fn get(&self) -> T {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.slot().take() {
                return item;
            }
            notified.await;
        }
    }

    pub(crate) fn len(&self) -> usize {
        usize::from(self.slot().is_some())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
