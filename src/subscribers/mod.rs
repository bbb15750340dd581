//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   engine ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!                                                        │
//!                                            ┌───────────┼───────────┐
//!                                            ▼           ▼           ▼
//!                                        LogWriter    Metrics     Custom
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
