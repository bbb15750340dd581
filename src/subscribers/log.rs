//! # LogWriter: events as `tracing` records.
//!
//! Maps every [`Event`] to one `tracing` call at a level that fits the event.
//! Install any `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  enginevisor: worker spawned engine="engine" pid=4242 attempt=1
//! DEBUG enginevisor: analysis dispatched analysis="doc/1@3" message_id=7
//! WARN  enginevisor: worker exited engine="engine" pid=4242 exit_code=Some(1)
//! INFO  enginevisor: restart scheduled engine="engine" attempt=1 delay_ms=100
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let engine = e.engine.as_deref().unwrap_or("-");
        let analysis = e.analysis.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::WorkerSpawned => {
                info!(engine, pid = ?e.pid, attempt = ?e.attempt, "worker spawned");
            }
            EventKind::WorkerSpawnFailed => {
                error!(engine, attempt = ?e.attempt, reason, "worker spawn failed");
            }
            EventKind::WorkerExited => {
                warn!(engine, pid = ?e.pid, exit_code = ?e.exit_code, "worker exited");
            }
            EventKind::WorkerAbandoned => {
                warn!(engine, pid = ?e.pid, "worker abandoned");
            }
            EventKind::StopRequested => {
                info!(engine, "stop requested");
            }
            EventKind::TerminateSent => {
                debug!(engine, pid = ?e.pid, timeout_ms = ?e.timeout_ms, "terminate sent");
            }
            EventKind::KillSent => {
                warn!(engine, pid = ?e.pid, timeout_ms = ?e.timeout_ms, "grace period exceeded, kill sent");
            }
            EventKind::RunLoopFailed => {
                error!(engine, reason, "run loop failed");
            }
            EventKind::RestartScheduled => {
                info!(engine, attempt = ?e.attempt, delay_ms = ?e.delay_ms, "restart scheduled");
            }
            EventKind::EngineStopped => {
                info!(engine, reason, "engine stopped");
            }
            EventKind::AnalysisQueued => {
                debug!(engine, analysis, "analysis queued");
            }
            EventKind::AnalysisSuperseded => {
                debug!(engine, analysis, "analysis superseded");
            }
            EventKind::AnalysisDispatched => {
                debug!(engine, analysis, message_id = ?e.message_id, "analysis dispatched");
            }
            EventKind::AnalysisCompleted => {
                debug!(engine, analysis, reason, "analysis completed");
            }
            EventKind::AnalysisAborted => {
                debug!(engine, analysis, reason, "analysis aborted");
            }
            EventKind::ResponseDiscarded => {
                debug!(engine, analysis, "response discarded");
            }
            EventKind::SubscriberOverflow => {
                warn!(subscriber = engine, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                error!(subscriber = engine, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
