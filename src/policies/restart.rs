//! # Restart policy for the worker process.
//!
//! [`RestartPolicy`] decides what the engine does when its worker dies on its own
//! (crash, kill from outside, closed pipe, protocol violation).
//!
//! ```text
//! RestartPolicy::OnCrash  → spawn a fresh worker after the backoff delay (default)
//! RestartPolicy::Never    → the engine stays down until start() is called again
//! ```
//!
//! A stop requested through `Engine::stop` never triggers a restart.

/// Policy controlling whether the worker is respawned after it dies unexpectedly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Leave the engine stopped.
    Never,
    /// Respawn the worker with backoff (default).
    #[default]
    OnCrash,
}

impl RestartPolicy {
    #[inline]
    pub fn restarts(&self) -> bool {
        matches!(self, RestartPolicy::OnCrash)
    }
}
