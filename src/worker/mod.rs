//! # Worker process abstraction.
//!
//! The engine never touches `tokio::process` directly. It asks a [`Spawn`]
//! implementation for a [`SpawnedWorker`]: two byte streams plus a
//! [`WorkerProcess`] control handle. [`CommandSpawner`] is the real implementation;
//! tests plug in in-process fakes.
//!
//! ## Already-exited processes
//! `terminate`/`kill` on a process that is already gone should fail with
//! [`io::ErrorKind::NotFound`] (or `InvalidInput`, which is what `tokio` reports).
//! The engine treats those as success; see [`is_already_gone`].

use std::io;
use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

mod command;

pub use command::CommandSpawner;

/// Writable end connected to the worker's standard input.
pub type WorkerStdin = Pin<Box<dyn AsyncWrite + Send>>;
/// Readable end connected to the worker's standard output.
pub type WorkerStdout = Pin<Box<dyn AsyncRead + Send>>;

/// Control handle of a running worker.
#[async_trait]
pub trait WorkerProcess: Send + 'static {
    /// OS process id, if the process has one and has not been reaped.
    fn id(&self) -> Option<u32>;

    /// Waits for the process to exit and returns its exit code (`None` if killed by a signal).
    ///
    /// Must be cancel-safe: the engine races it against other futures.
    async fn wait(&mut self) -> io::Result<Option<i32>>;

    /// Requests graceful termination (SIGTERM on unix).
    fn terminate(&mut self) -> io::Result<()>;

    /// Forcibly kills the process.
    fn kill(&mut self) -> io::Result<()>;
}

/// A freshly started worker: its pipes and its control handle.
pub struct SpawnedWorker {
    pub stdin: WorkerStdin,
    pub stdout: WorkerStdout,
    pub process: Box<dyn WorkerProcess>,
}

impl SpawnedWorker {
    pub fn new<W, R, P>(stdin: W, stdout: R, process: P) -> Self
    where
        W: AsyncWrite + Send + 'static,
        R: AsyncRead + Send + 'static,
        P: WorkerProcess,
    {
        Self {
            stdin: Box::pin(stdin),
            stdout: Box::pin(stdout),
            process: Box::new(process),
        }
    }
}

/// Starts worker processes; called once per (re)start.
pub trait Spawn: Send + Sync + 'static {
    fn spawn(&self) -> io::Result<SpawnedWorker>;
}

impl<F> Spawn for F
where
    F: Fn() -> io::Result<SpawnedWorker> + Send + Sync + 'static,
{
    fn spawn(&self) -> io::Result<SpawnedWorker> {
        (self)()
    }
}

/// Returns `true` if `err` only says the process had already exited.
pub fn is_already_gone(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::InvalidInput
    )
}
