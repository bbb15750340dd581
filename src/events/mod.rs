//! Engine events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Engine::run_analysis`, the engine actor, the run loop,
//!   the process reaper, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the listener task spawned by `EngineBuilder::build`, which
//!   fans out to the `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
