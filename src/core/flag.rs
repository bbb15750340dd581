//! # Level-triggered boolean flag.
//!
//! [`Flag`] is what the engine uses for "process ended": it can be set and
//! cleared any number of times, and [`Flag::wait`] resolves as soon as the flag
//! is set (immediately, if it already is). Built on `tokio::sync::watch`, so any
//! number of tasks may wait at once and a wait dropped mid-way loses nothing.

use tokio::sync::watch;

#[derive(Debug)]
pub(crate) struct Flag {
    tx: watch::Sender<bool>,
}

impl Flag {
    pub(crate) fn new(initial: bool) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub(crate) fn set(&self) {
        self.tx.send_replace(true);
    }

    pub(crate) fn clear(&self) {
        self.tx.send_replace(false);
    }

    pub(crate) fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the flag is set. Cancel-safe.
    pub(crate) async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|set| *set).await;
    }
}
