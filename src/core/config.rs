//! # Engine configuration.
//!
//! Provides [`EngineConfig`], the settings of one engine instance.
//!
//! ## Sentinel values
//! - `grace = 0s` → no graceful phase; the worker is killed right away on stop
//! - `max_frame_len = 0` → default limit (64 MiB)

use std::sync::Arc;
use std::time::Duration;

use crate::policies::{BackoffPolicy, RestartPolicy};
use crate::protocol::DEFAULT_MAX_FRAME_LEN;

/// Configuration for one engine.
///
/// All fields are public. Prefer the helper accessors over sentinel checks.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Name attached to every event this engine publishes.
    pub name: Arc<str>,

    /// How long `stop()` waits after asking the worker to terminate before killing it.
    pub grace: Duration,

    /// What to do when the worker dies without a stop request.
    pub restart: RestartPolicy,

    /// Delay between consecutive crash restarts.
    pub backoff: BackoffPolicy,

    /// Capacity of the event bus ring buffer (min 1).
    pub bus_capacity: usize,

    /// Largest response frame accepted from the worker, in bytes.
    pub max_frame_len: usize,
}

impl EngineConfig {
    /// Returns a config with the given engine name and default settings.
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the grace period as an `Option`.
    ///
    /// - `None` → kill immediately
    /// - `Some(d)` → wait up to `d` for a graceful exit
    #[inline]
    pub fn grace_period(&self) -> Option<Duration> {
        if self.grace.is_zero() {
            None
        } else {
            Some(self.grace)
        }
    }

    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    #[inline]
    pub fn max_frame_len_clamped(&self) -> usize {
        if self.max_frame_len == 0 {
            DEFAULT_MAX_FRAME_LEN
        } else {
            self.max_frame_len
        }
    }
}

impl Default for EngineConfig {
    /// Default configuration:
    ///
    /// - `name = "engine"`
    /// - `grace = 1s`
    /// - `restart = RestartPolicy::OnCrash`
    /// - `backoff = BackoffPolicy::default()` (100ms doubling up to 5s)
    /// - `bus_capacity = 1024`
    /// - `max_frame_len = 64 MiB`
    fn default() -> Self {
        Self {
            name: Arc::from("engine"),
            grace: Duration::from_secs(1),
            restart: RestartPolicy::default(),
            backoff: BackoffPolicy::default(),
            bus_capacity: 1024,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}
