//! Restart and backoff policies.
//!
//! ## Contents
//! - [`RestartPolicy`] whether a crashed worker is respawned
//! - [`BackoffPolicy`] how long to wait before respawning (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization of that wait
//!
//! ## Quick wiring
//! ```text
//! EngineConfig { restart: RestartPolicy, backoff: BackoffPolicy, .. }
//!      └─► core::actor::EngineActor uses:
//!           - restart to decide respawn/exit after a crash
//!           - backoff.next(crashes) to delay the respawn
//! ```
//!
//! ## Defaults
//! - `RestartPolicy::OnCrash`.
//! - `BackoffPolicy::default()` → first=100ms, factor=2.0, max=5s, jitter=None.

mod backoff;
mod jitter;
mod restart;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use restart::RestartPolicy;
