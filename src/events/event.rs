//! # Runtime events emitted by the engine.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Worker events**: process lifecycle (spawned, exited, terminated, killed, restarted)
//! - **Analysis events**: request flow (queued, superseded, dispatched, completed, aborted)
//! - **Subscriber events**: delivery problems inside the fan-out itself
//!
//! The [`Event`] struct carries additional metadata such as timestamps, engine name,
//! analysis key, process id and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use enginevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::WorkerExited)
//!     .with_engine("engine-1")
//!     .with_pid(4242)
//!     .with_exit_code(Some(1));
//!
//! assert_eq!(ev.kind, EventKind::WorkerExited);
//! assert_eq!(ev.engine.as_deref(), Some("engine-1"));
//! assert_eq!(ev.exit_code, Some(1));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::analysis::AnalysisKey;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `engine`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `engine`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Worker lifecycle events ===
    /// A worker process was started.
    ///
    /// Sets:
    /// - `attempt`: start count (1-based, never resets)
    /// - `pid`: OS process id, if any
    WorkerSpawned,

    /// Starting a worker process failed.
    ///
    /// Sets:
    /// - `attempt`: start count
    /// - `reason`: spawn error
    WorkerSpawnFailed,

    /// The worker process exited on its own or after a signal.
    ///
    /// Sets:
    /// - `pid`: OS process id, if any
    /// - `exit_code`: exit code (`None` when killed by a signal)
    WorkerExited,

    /// The worker process was given up on without exit confirmation.
    ///
    /// Sets:
    /// - `pid`: OS process id, if any
    WorkerAbandoned,

    /// `stop()` was called.
    StopRequested,

    /// Graceful termination was requested from the worker.
    ///
    /// Sets:
    /// - `pid`: OS process id, if any
    /// - `timeout_ms`: grace period before escalation
    TerminateSent,

    /// Grace period expired; the worker was killed.
    ///
    /// Sets:
    /// - `pid`: OS process id, if any
    /// - `timeout_ms`: grace period that was exceeded
    KillSent,

    /// The run loop failed for a reason other than process exit.
    ///
    /// Sets:
    /// - `reason`: failure message
    RunLoopFailed,

    /// A crash restart was scheduled.
    ///
    /// Sets:
    /// - `attempt`: consecutive crash count
    /// - `delay_ms`: delay before the new worker is spawned
    RestartScheduled,

    /// The run loop ended and will not restart.
    ///
    /// Sets:
    /// - `reason`: `"stopped"` or `"restart policy"`
    EngineStopped,

    // === Analysis events ===
    /// An analysis entered the coalescing queue.
    ///
    /// Sets:
    /// - `analysis`: request key
    AnalysisQueued,

    /// A queued analysis was replaced before dispatch and cancelled.
    ///
    /// Sets:
    /// - `analysis`: key of the evicted request
    AnalysisSuperseded,

    /// An analysis was sent to the worker.
    ///
    /// Sets:
    /// - `analysis`: request key
    /// - `message_id`: envelope id
    AnalysisDispatched,

    /// The worker delivered the terminal response of the current analysis.
    ///
    /// Sets:
    /// - `analysis`: request key
    /// - `reason`: error message, for `Error` results
    AnalysisCompleted,

    /// The current analysis was resolved by the engine without a worker answer.
    ///
    /// Sets:
    /// - `analysis`: request key
    /// - `reason`: message of the synthesized error result
    AnalysisAborted,

    /// A response that does not belong to the current analysis was dropped.
    ///
    /// Sets:
    /// - `analysis`: key carried by the response
    ResponseDiscarded,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the engine (or subscriber, for subscriber events).
    pub engine: Option<Arc<str>>,
    /// Analysis key rendered as `instance/analysis@revision`.
    pub analysis: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Worker process id.
    pub pid: Option<u32>,
    /// Envelope id of a dispatched request.
    pub message_id: Option<u32>,
    /// Worker exit code.
    pub exit_code: Option<i32>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Delay before the next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            engine: None,
            analysis: None,
            reason: None,
            attempt: None,
            pid: None,
            message_id: None,
            exit_code: None,
            timeout_ms: None,
            delay_ms: None,
        }
    }

    /// Attaches an engine name.
    #[inline]
    pub fn with_engine(mut self, engine: impl Into<Arc<str>>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    /// Attaches an analysis key.
    #[inline]
    pub fn with_analysis(mut self, key: &AnalysisKey) -> Self {
        self.analysis = Some(key.to_string().into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a process id (no-op for `None`).
    #[inline]
    pub fn with_pid(mut self, pid: impl Into<Option<u32>>) -> Self {
        self.pid = pid.into();
        self
    }

    #[inline]
    pub fn with_message_id(mut self, id: u32) -> Self {
        self.message_id = Some(id);
        self
    }

    #[inline]
    pub fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_engine(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_engine(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
