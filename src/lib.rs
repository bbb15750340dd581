//! # enginevisor
//!
//! **Enginevisor** runs analyses on a single supervised worker process.
//!
//! The engine owns one child process, feeds it analysis requests over stdin and
//! routes the results it prints on stdout back to whoever asked. Only the most
//! recent request matters: a newer request supersedes an older one that has not
//! started yet, and dispatching a request aborts the one in flight. A worker
//! that dies unexpectedly is respawned.
//!
//! ## Architecture
//! ```text
//!   run_analysis(req, ch) ──► CoalescingQueue (capacity 1, newest wins)
//!                                   │
//! ┌─────────────────────────────────▼─────────────────────────────────┐
//! │  EngineActor (restart loop)                                       │
//! │    Session::run  select! {                                        │
//! │      process-ended ──────────────► leave session                  │
//! │      worker stdout ─ FrameCodec ─► match identity ─► ch.write /   │
//! │                                                      ch.resolve   │
//! │      queue.get() ─── FrameCodec ─► worker stdin                   │
//! │    }                                                              │
//! └──────┬──────────────────────────────────────────────┬─────────────┘
//!        ▼                                              ▼
//!   reaper task (owns the process,            Bus (broadcast events)
//!   sets process-ended)                              │
//!                                                    ▼
//!                                        SubscriberSet ─► LogWriter, ...
//! ```
//!
//! ## Wire format
//! Every message is a 4-byte little-endian length followed by an [`Envelope`]
//! (`id`, `payload`, `payload_type`, `status`) whose payload is an
//! [`AnalysisRequest`] or [`AnalysisResponse`].
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                          |
//! |-------------------|----------------------------------------------------------|---------------------------------------------|
//! | **Engine**        | Start/stop/restart, submit analyses, inspect state.      | [`Engine`], [`EngineBuilder`]               |
//! | **Results**       | Settle-once channel with progress updates.               | [`ResultChannel`], [`ProgressReceiver`]     |
//! | **Protocol**      | Envelope encoding and length-prefixed framing.           | [`Envelope`], [`FrameCodec`]                |
//! | **Workers**       | Pluggable process spawning.                              | [`Spawn`], [`WorkerProcess`], [`CommandSpawner`] |
//! | **Policies**      | Crash restart and backoff.                               | [`RestartPolicy`], [`BackoffPolicy`]        |
//! | **Subscriber API**| Hook into engine events.                                 | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed errors.                                            | [`EngineError`], [`CodecError`]             |
//!
//! ## Optional features
//! - `logging` (default): exports [`LogWriter`], which turns events into `tracing` records.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use enginevisor::{AnalysisRequest, CommandSpawner, Engine, EngineConfig, ResultChannel};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn enginevisor::Subscribe>> = vec![Arc::new(enginevisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn enginevisor::Subscribe>> = Vec::new();
//!
//!     let engine = Engine::builder(CommandSpawner::new("analysis-worker"))
//!         .with_config(EngineConfig::named("main"))
//!         .with_subscribers(subs)
//!         .build();
//!     engine.start()?;
//!
//!     let results = ResultChannel::new();
//!     engine.run_analysis(
//!         AnalysisRequest::new("doc-1", 1).with_name("stats", "descriptives"),
//!         results.clone(),
//!     );
//!
//!     let mut progress = results.progress();
//!     while let Some(partial) = progress.next().await {
//!         println!("partial: {} bytes", partial.results.len());
//!     }
//!     println!("final: {:?}", results.wait().await.status);
//!
//!     engine.stop().await;
//!     Ok(())
//! }
//! ```
mod analysis;
mod core;
mod error;
mod events;
mod policies;
mod protocol;
mod subscribers;
mod worker;

// ---- Public re-exports ----

pub use analysis::{
    Analysis, AnalysisKey, AnalysisRequest, AnalysisResponse, AnalysisStatus, CANCELLED_MESSAGE,
    CRASHED_MESSAGE, ProgressReceiver, ResultChannel,
};
pub use crate::core::{Engine, EngineBuilder, EngineConfig};
pub use error::EngineError;
pub use events::{Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy, RestartPolicy};
pub use protocol::{
    CodecError, DEFAULT_MAX_FRAME_LEN, Envelope, FrameCodec, LENGTH_PREFIX, MessageStatus,
    PayloadType, decode, encode, frame, read_frame, write_frame,
};
pub use subscribers::Subscribe;
pub use worker::{
    CommandSpawner, Spawn, SpawnedWorker, WorkerProcess, WorkerStdin, WorkerStdout,
    is_already_gone,
};

// Optional: expose a built-in logging subscriber.
// Enable with: `--features logging` (on by default)
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
