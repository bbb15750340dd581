//! # EngineActor: keeps one worker alive.
//!
//! Runs worker sessions back to back until the engine is stopped or the
//! [`RestartPolicy`](crate::RestartPolicy) says no more.
//!
//! ## Architecture
//! ```text
//! start() ──► EngineActor::run(first worker)
//!
//! loop {
//!   ├─► worker = first ?: spawn_worker()   (failure → backoff, retry)
//!   ├─► Session::run()                     (until the process ends)
//!   │       └─ Err ──► error! + RunLoopFailed (unless stopping)
//!   ├─► abort current  ("cancelled" on stop, "stopped unexpectedly" on crash)
//!   ├─► terminate_worker() if process-ended is not set
//!   ├─► stopping?            → break
//!   ├─► RestartPolicy::Never → break
//!   └─► publish RestartScheduled, sleep(backoff) (cancellable)
//! }
//! publish EngineStopped
//! ```
//!
//! ## Rules
//! - Sessions run **sequentially**; there is never more than one worker.
//! - The crash counter feeding the backoff **resets** after a session that
//!   delivered at least one response.
//! - Cancellation is checked before each session and during backoff sleeps.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::analysis::{CANCELLED_MESSAGE, CRASHED_MESSAGE};
use crate::core::engine::Inner;
use crate::core::run_loop::{Session, WorkerIo};
use crate::events::EventKind;

pub(crate) struct EngineActor {
    inner: Arc<Inner>,
}

impl EngineActor {
    pub(crate) fn new(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    /// Runs sessions until stopped. `first` is the worker spawned by `start()`.
    pub(crate) async fn run(self, first: WorkerIo, token: CancellationToken) {
        let inner = &*self.inner;
        let mut next = Some(first);
        let mut crashes: u32 = 0;

        let reason = loop {
            let io = match next.take() {
                Some(io) => io,
                None => match inner.spawn_worker() {
                    Ok(worker) => inner.install(worker),
                    Err(_) => {
                        if self.backoff(&mut crashes, &token).await {
                            continue;
                        }
                        break "stopped";
                    }
                },
            };

            let mut session = Session::new(inner);
            let result = if token.is_cancelled() {
                Ok(())
            } else {
                session.run(io).await
            };

            let stopping = inner.stopping.load(Ordering::SeqCst);
            if let Err(e) = &result {
                if !stopping {
                    error!(engine = %inner.cfg.name, error = %e, label = e.as_label(), "engine run loop failed");
                    inner.publish(
                        inner
                            .event(EventKind::RunLoopFailed)
                            .with_reason(e.to_string()),
                    );
                }
            }

            inner.abort_current(if stopping {
                CANCELLED_MESSAGE
            } else {
                CRASHED_MESSAGE
            });
            if !inner.process_ended.is_set() {
                inner.terminate_worker().await;
            }
            inner.clear_process();

            if stopping || token.is_cancelled() {
                break "stopped";
            }
            if session.delivered > 0 {
                crashes = 0;
            }
            if !inner.cfg.restart.restarts() {
                break "restart policy";
            }
            if !self.backoff(&mut crashes, &token).await {
                break "stopped";
            }
        };

        inner.publish(inner.event(EventKind::EngineStopped).with_reason(reason));
    }

    /// Sleeps before the next spawn. Returns `false` if cancelled meanwhile.
    async fn backoff(&self, crashes: &mut u32, token: &CancellationToken) -> bool {
        let inner = &*self.inner;
        let delay = inner.cfg.backoff.next(*crashes);
        *crashes = crashes.saturating_add(1);

        inner.publish(
            inner
                .event(EventKind::RestartScheduled)
                .with_attempt(*crashes)
                .with_delay(delay),
        );

        let sleep = time::sleep(delay);
        tokio::pin!(sleep);
        select! {
            _ = &mut sleep => true,
            _ = token.cancelled() => false,
        }
    }
}
