//! # Process reaper.
//!
//! One reaper task per worker owns the [`WorkerProcess`] and races two things:
//!
//! ```text
//!            ┌─► process.wait() finished ──► WorkerExited    ─┐
//! reaper ────┤                                                ├─► set process-ended, drop process
//!            └─► process-ended set by someone else ─► WorkerAbandoned ─┘
//!
//! ProcessHandle::terminate / kill ──► control channel ──► applied by the reaper
//! ```
//!
//! ## Rules
//! - Whichever branch fires first wins; the other future is dropped.
//! - Control requests queued before abandonment are still applied.
//! - Signal failures meaning "already exited" are ignored; others are logged.
//! - Dropping the process after abandonment kills it (`kill_on_drop`).

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use crate::core::flag::Flag;
use crate::events::{Bus, Event, EventKind};
use crate::worker::{WorkerProcess, is_already_gone};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Control {
    Terminate,
    Kill,
}

/// Cheap handle for signalling a supervised worker.
#[derive(Clone, Debug)]
pub(crate) struct ProcessHandle {
    pid: Option<u32>,
    control: mpsc::UnboundedSender<Control>,
}

impl ProcessHandle {
    pub(crate) fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Asks the worker to exit gracefully. No-op once the reaper is gone.
    pub(crate) fn terminate(&self) {
        let _ = self.control.send(Control::Terminate);
    }

    /// Kills the worker. No-op once the reaper is gone.
    pub(crate) fn kill(&self) {
        let _ = self.control.send(Control::Kill);
    }
}

/// Spawns the reaper for `process`.
///
/// `ended` must be cleared by the caller beforehand; the reaper sets it.
pub(crate) fn supervise(
    mut process: Box<dyn WorkerProcess>,
    ended: Arc<Flag>,
    bus: Bus,
    engine: Arc<str>,
) -> ProcessHandle {
    let pid = process.id();
    let (tx, mut rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                Some(cmd) = rx.recv() => apply(process.as_mut(), cmd, pid),
                status = process.wait() => {
                    let code = status.unwrap_or_else(|e| {
                        warn!(engine = %engine, pid = ?pid, error = %e, "failed to wait for worker");
                        None
                    });
                    bus.publish(
                        Event::new(EventKind::WorkerExited)
                            .with_engine(engine.clone())
                            .with_pid(pid)
                            .with_exit_code(code),
                    );
                    ended.set();
                    break;
                }
                _ = ended.wait() => {
                    while let Ok(cmd) = rx.try_recv() {
                        apply(process.as_mut(), cmd, pid);
                    }
                    bus.publish(
                        Event::new(EventKind::WorkerAbandoned)
                            .with_engine(engine.clone())
                            .with_pid(pid),
                    );
                    break;
                }
            }
        }
    });

    ProcessHandle { pid, control: tx }
}

fn apply(process: &mut dyn WorkerProcess, cmd: Control, pid: Option<u32>) {
    let res = match cmd {
        Control::Terminate => process.terminate(),
        Control::Kill => process.kill(),
    };
    match res {
        Err(e) if !is_already_gone(&e) => {
            warn!(pid = ?pid, command = ?cmd, error = %e, "failed to signal worker");
        }
        _ => {}
    }
}
