//! Engine core: lifecycle, run loop and process supervision.
//!
//! The only public API from this module is [`Engine`], its [`EngineBuilder`]
//! and [`EngineConfig`].
//!
//! Internal modules:
//! - [`engine`]: facade and shared state, stop escalation;
//! - [`actor`]: session loop with restart policy and backoff;
//! - [`run_loop`]: one worker session (`select!` over exit, results, requests);
//! - [`process`]: reaper task owning the worker process;
//! - [`queue`]: coalescing capacity-one queue;
//! - [`flag`]: level-triggered "process ended" flag;
//! - [`builder`], [`config`]: construction and settings.

mod actor;
mod builder;
mod config;
mod engine;
mod flag;
mod process;
mod queue;
mod run_loop;

pub use builder::EngineBuilder;
pub use config::EngineConfig;
pub use engine::Engine;
