//! # Settle-once result channel with progress writes.
//!
//! [`ResultChannel`] is handed to the engine together with each request. The
//! engine writes partial results into it any number of times and resolves it
//! exactly once; the submitter awaits the final value.
//!
//! ## Rules
//! - `write` is only effective **before** resolution.
//! - `resolve` is effective **once**; later calls change nothing and return `false`.
//! - Every awaiter of [`ResultChannel::wait`] observes the **same** final value.
//! - Progress is "latest wins": a slow [`ProgressReceiver`] skips intermediate writes.
//!
//! ```text
//! engine ── write(p1) ── write(p2) ── resolve(final) ──► [slot]
//!                                                          │
//!                         submitter.wait() ◄───────────────┤ (clone of final)
//!                         progress.next()  ◄───────────────┘ (latest unseen p)
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

struct Slot<T> {
    progress: Option<T>,
    /// Number of effective progress writes so far.
    progress_seq: u64,
    result: Option<T>,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    changed: Notify,
}

/// Shared handle to one settle-once result slot.
///
/// Cloning is cheap and every clone refers to the same slot; the submitter keeps one
/// clone to await on and the engine holds another to write into.
pub struct ResultChannel<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for ResultChannel<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone> Default for ResultChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ResultChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.shared.slot.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ResultChannel")
            .field("writes", &slot.progress_seq)
            .field("resolved", &slot.result.is_some())
            .finish()
    }
}

impl<T: Clone> ResultChannel<T> {
    /// Creates an unresolved channel.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    progress: None,
                    progress_seq: 0,
                    result: None,
                }),
                changed: Notify::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.shared
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes a partial result.
    ///
    /// Returns `false` (and drops `partial`) if the channel is already resolved.
    pub fn write(&self, partial: T) -> bool {
        {
            let mut slot = self.lock();
            if slot.result.is_some() {
                return false;
            }
            slot.progress = Some(partial);
            slot.progress_seq += 1;
        }
        self.shared.changed.notify_waiters();
        true
    }

    /// Settles the channel with its final value.
    ///
    /// Returns `false` if it was already resolved; the first value is kept.
    pub fn resolve(&self, value: T) -> bool {
        {
            let mut slot = self.lock();
            if slot.result.is_some() {
                return false;
            }
            slot.result = Some(value);
        }
        self.shared.changed.notify_waiters();
        true
    }

    /// Returns `true` once [`resolve`](Self::resolve) has taken effect.
    pub fn is_resolved(&self) -> bool {
        self.lock().result.is_some()
    }

    /// Returns the final value without waiting, if resolved.
    pub fn try_result(&self) -> Option<T> {
        self.lock().result.clone()
    }

    /// Returns the most recent progress value, if any was written.
    pub fn latest_progress(&self) -> Option<T> {
        self.lock().progress.clone()
    }

    /// Waits until the channel is resolved and returns the final value.
    ///
    /// May be called concurrently and repeatedly; after resolution it returns immediately.
    pub async fn wait(&self) -> T {
        loop {
            let notified = self.shared.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(value) = self.try_result() {
                return value;
            }
            notified.await;
        }
    }

    /// Creates a receiver for progress writes made from now on.
    pub fn progress(&self) -> ProgressReceiver<T> {
        let seen = self.lock().progress_seq;
        ProgressReceiver {
            channel: self.clone(),
            seen,
        }
    }
}

/// Observer of the progress writes of one [`ResultChannel`].
pub struct ProgressReceiver<T> {
    channel: ResultChannel<T>,
    seen: u64,
}

impl<T: Clone> ProgressReceiver<T> {
    /// Waits for a progress value newer than the last one returned.
    ///
    /// Returns `None` once the channel is resolved and no unseen progress remains.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            let notified = self.channel.shared.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let slot = self.channel.lock();
                if slot.progress_seq > self.seen {
                    self.seen = slot.progress_seq;
                    return slot.progress.clone();
                }
                if slot.result.is_some() {
                    return None;
                }
            }
            notified.await;
        }
    }
}
