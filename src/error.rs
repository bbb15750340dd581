//! Error types used by the engine.
//!
//! - [`EngineError`] errors raised by engine control operations and worker sessions.
//! - [`CodecError`](crate::CodecError) wire-level errors, wrapped by [`EngineError::Codec`].
//!
//! Session errors never reach `run_analysis` callers; they are logged, published
//! as `RunLoopFailed` and turned into an error result on the current analysis.

use std::io;

use thiserror::Error;

use crate::protocol::CodecError;

/// # Errors produced by the engine.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EngineError {
    /// `start()` was called while the run loop is alive.
    #[error("engine already started")]
    AlreadyStarted,

    /// The worker process could not be spawned.
    #[error("failed to spawn worker: {0}")]
    Spawn(#[source] io::Error),

    /// Reading from or writing to the worker failed.
    #[error("worker i/o failed: {0}")]
    Io(#[from] io::Error),

    /// The worker sent something that is not a valid response frame.
    #[error("worker protocol error: {0}")]
    Codec(#[from] CodecError),

    /// The worker closed its output while still running.
    #[error("worker closed its output")]
    WorkerClosed,
}

impl EngineError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use enginevisor::EngineError;
    ///
    /// assert_eq!(EngineError::AlreadyStarted.as_label(), "engine_already_started");
    /// assert_eq!(EngineError::WorkerClosed.as_label(), "engine_worker_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            EngineError::AlreadyStarted => "engine_already_started",
            EngineError::Spawn(_) => "engine_spawn_failed",
            EngineError::Io(_) => "engine_io",
            EngineError::Codec(e) => e.as_label(),
            EngineError::WorkerClosed => "engine_worker_closed",
        }
    }
}
