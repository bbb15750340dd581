//! # Engine: public facade and shared state.
//!
//! An [`Engine`] is a cheap, cloneable handle to one supervised worker. All
//! clones share the same state; nothing is global.
//!
//! ## Lifecycle
//! ```text
//!  start() ──► spawn worker ──► EngineActor::run()
//!                                  │
//!                                  ├─► Session::run()  (until the process ends)
//!                                  ├─► abort current analysis
//!                                  ├─► terminate worker if still alive
//!                                  └─► stopping? exit : backoff + respawn
//!
//!  stop()  ──► stopping = true ──► cancel actor token
//!          ──► terminate_worker():  SIGTERM ─► wait grace ─► kill + mark ended
//!          ──► await actor
//! ```
//!
//! ## Rules
//! - `run_analysis` never blocks; older queued analyses are cancelled on the spot.
//! - Message ids increase monotonically across restarts and wrap at `u32::MAX`.
//! - A second `stop()` while one is in progress only waits for process-ended.
//! - Aborting an analysis only settles its channel. The worker is not told;
//!   its late output is discarded by the identity filter.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::analysis::{Analysis, AnalysisRequest, AnalysisResponse, CANCELLED_MESSAGE, ResultChannel};
use crate::core::actor::EngineActor;
use crate::core::builder::EngineBuilder;
use crate::core::config::EngineConfig;
use crate::core::flag::Flag;
use crate::core::process::{ProcessHandle, supervise};
use crate::core::queue::CoalescingQueue;
use crate::core::run_loop::WorkerIo;
use crate::error::EngineError;
use crate::events::{Bus, Event, EventKind};
use crate::worker::{Spawn, SpawnedWorker};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared by the facade, the actor, the session and the reaper.
pub(crate) struct Inner {
    pub(crate) cfg: EngineConfig,
    spawner: Arc<dyn Spawn>,
    bus: Bus,
    pub(crate) queue: CoalescingQueue<Analysis>,
    current: Mutex<Option<Analysis>>,
    message_ids: AtomicU32,
    spawns: AtomicU32,
    pub(crate) stopping: AtomicBool,
    terminating: AtomicBool,
    pub(crate) process_ended: Arc<Flag>,
    process: Mutex<Option<ProcessHandle>>,
    actor: Mutex<Option<JoinHandle<()>>>,
    token: Mutex<CancellationToken>,
    listener: CancellationToken,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.listener.cancel();
    }
}

impl Inner {
    pub(crate) fn new(
        cfg: EngineConfig,
        spawner: Arc<dyn Spawn>,
        bus: Bus,
        listener: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            spawner,
            bus,
            queue: CoalescingQueue::new(),
            current: Mutex::new(None),
            message_ids: AtomicU32::new(0),
            spawns: AtomicU32::new(0),
            stopping: AtomicBool::new(false),
            terminating: AtomicBool::new(false),
            process_ended: Arc::new(Flag::new(true)),
            process: Mutex::new(None),
            actor: Mutex::new(None),
            token: Mutex::new(CancellationToken::new()),
            listener,
        }
    }

    /// Creates an event tagged with this engine's name.
    pub(crate) fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_engine(self.cfg.name.clone())
    }

    pub(crate) fn publish(&self, ev: Event) {
        self.bus.publish(ev);
    }

    pub(crate) fn next_message_id(&self) -> u32 {
        self.message_ids.fetch_add(1, Ordering::Relaxed)
    }

    /// Asks the spawner for a new worker and reports the outcome.
    pub(crate) fn spawn_worker(&self) -> io::Result<SpawnedWorker> {
        let attempt = self.spawns.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        match self.spawner.spawn() {
            Ok(worker) => {
                let pid = worker.process.id();
                debug!(engine = %self.cfg.name, pid = ?pid, "engine process started");
                self.publish(
                    self.event(EventKind::WorkerSpawned)
                        .with_attempt(attempt)
                        .with_pid(pid),
                );
                Ok(worker)
            }
            Err(e) => {
                error!(engine = %self.cfg.name, error = %e, "failed to spawn engine process");
                self.publish(
                    self.event(EventKind::WorkerSpawnFailed)
                        .with_attempt(attempt)
                        .with_reason(e.to_string()),
                );
                Err(e)
            }
        }
    }

    /// Hands the process to a reaper and returns the pipes for the session.
    pub(crate) fn install(&self, worker: SpawnedWorker) -> WorkerIo {
        let SpawnedWorker {
            stdin,
            stdout,
            process,
        } = worker;

        self.process_ended.clear();
        let handle = supervise(
            process,
            Arc::clone(&self.process_ended),
            self.bus.clone(),
            self.cfg.name.clone(),
        );
        *lock(&self.process) = Some(handle);
        WorkerIo { stdin, stdout }
    }

    pub(crate) fn clear_process(&self) {
        lock(&self.process).take();
    }

    fn process_handle(&self) -> Option<ProcessHandle> {
        lock(&self.process).as_ref().cloned()
    }

    pub(crate) fn set_current(&self, analysis: Analysis) {
        *lock(&self.current) = Some(analysis);
    }

    pub(crate) fn current_request(&self) -> Option<Arc<AnalysisRequest>> {
        lock(&self.current)
            .as_ref()
            .map(|a| Arc::clone(&a.request))
    }

    /// Returns the current analysis if `response` belongs to it.
    ///
    /// For terminal responses the analysis is also cleared.
    pub(crate) fn route(&self, response: &AnalysisResponse, terminal: bool) -> Option<Analysis> {
        let mut current = lock(&self.current);
        if !current.as_ref()?.request.matches(response) {
            return None;
        }
        if terminal {
            current.take()
        } else {
            current.as_ref().cloned()
        }
    }

    /// Settles and clears the current analysis with an error result.
    pub(crate) fn abort_current(&self, message: &str) {
        let Some(analysis) = lock(&self.current).take() else {
            return;
        };
        if analysis.cancel(message) {
            self.publish(
                self.event(EventKind::AnalysisAborted)
                    .with_analysis(&analysis.request.key())
                    .with_reason(message),
            );
        }
    }

    /// Terminates the worker: SIGTERM, wait up to the grace period, then kill.
    ///
    /// Always leaves process-ended set. Concurrent callers wait for it instead.
    pub(crate) async fn terminate_worker(&self) {
        if self.process_ended.is_set() {
            return;
        }
        if self.terminating.swap(true, Ordering::SeqCst) {
            self.process_ended.wait().await;
            return;
        }

        match self.process_handle() {
            None => self.process_ended.set(),
            Some(handle) => {
                let pid = handle.pid();
                debug!(engine = %self.cfg.name, pid = ?pid, "terminating engine");
                handle.terminate();
                self.publish(
                    self.event(EventKind::TerminateSent)
                        .with_pid(pid)
                        .with_timeout(self.cfg.grace),
                );

                let exited = match self.cfg.grace_period() {
                    Some(grace) => time::timeout(grace, self.process_ended.wait())
                        .await
                        .is_ok(),
                    None => self.process_ended.is_set(),
                };

                if exited {
                    debug!(engine = %self.cfg.name, pid = ?pid, "terminated engine");
                } else {
                    debug!(engine = %self.cfg.name, pid = ?pid, "killing engine");
                    handle.kill();
                    self.publish(
                        self.event(EventKind::KillSent)
                            .with_pid(pid)
                            .with_timeout(self.cfg.grace),
                    );
                    self.process_ended.set();
                }
            }
        }
        self.terminating.store(false, Ordering::SeqCst);
    }
}

/// Handle to one analysis engine and its worker process.
///
/// # Example
/// ```no_run
/// use enginevisor::{AnalysisRequest, CommandSpawner, Engine, ResultChannel};
///
/// # async fn demo() -> Result<(), enginevisor::EngineError> {
/// let engine = Engine::builder(CommandSpawner::new("analysis-worker")).build();
/// engine.start()?;
///
/// let results = ResultChannel::new();
/// engine.run_analysis(AnalysisRequest::new("doc-1", 1), results.clone());
/// let response = results.wait().await;
/// println!("{:?}", response.status);
///
/// engine.stop().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    /// Starts building an engine that runs workers produced by `spawner`.
    pub fn builder<S: Spawn>(spawner: S) -> EngineBuilder {
        EngineBuilder::new(Arc::new(spawner))
    }

    /// Name used in this engine's events.
    pub fn name(&self) -> &str {
        &self.inner.cfg.name
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.cfg
    }

    /// Spawns the worker and launches the run loop.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    /// - [`EngineError::AlreadyStarted`] if the run loop is alive.
    /// - [`EngineError::Spawn`] if the worker could not be started.
    pub fn start(&self) -> Result<(), EngineError> {
        let inner = &self.inner;
        let mut actor = lock(&inner.actor);
        if actor.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(EngineError::AlreadyStarted);
        }

        inner.stopping.store(false, Ordering::SeqCst);
        let token = CancellationToken::new();
        *lock(&inner.token) = token.clone();

        let worker = inner.spawn_worker().map_err(EngineError::Spawn)?;
        let io = inner.install(worker);
        *actor = Some(tokio::spawn(
            EngineActor::new(Arc::clone(inner)).run(io, token),
        ));
        Ok(())
    }

    /// Stops the worker and waits for the run loop to finish.
    ///
    /// Sends SIGTERM, waits up to [`EngineConfig::grace`], then kills. A no-op
    /// when the engine is not running.
    pub async fn stop(&self) {
        let inner = &self.inner;
        if inner.stopping.swap(true, Ordering::SeqCst) {
            inner.process_ended.wait().await;
            return;
        }

        inner.publish(inner.event(EventKind::StopRequested));
        lock(&inner.token).cancel();
        inner.terminate_worker().await;

        let actor = lock(&inner.actor).take();
        if let Some(actor) = actor {
            if let Err(e) = actor.await {
                error!(engine = %inner.cfg.name, error = %e, "engine actor task failed");
            }
        }
    }

    /// `stop()` followed by `start()`.
    pub async fn restart(&self) -> Result<(), EngineError> {
        self.stop().await;
        self.start()
    }

    /// Queues `request`; its results go to `results`.
    ///
    /// Never blocks. If another analysis was still waiting to be dispatched, it
    /// is replaced and its channel resolved with a "cancelled" error.
    pub fn run_analysis(&self, request: AnalysisRequest, results: ResultChannel<AnalysisResponse>) {
        let inner = &self.inner;
        let analysis = Analysis::new(request, results);
        let key = analysis.request.key();
        debug!(engine = %inner.cfg.name, analysis = %key, "engine received request");

        inner.publish(inner.event(EventKind::AnalysisQueued).with_analysis(&key));
        if let Some(evicted) = inner.queue.put(analysis) {
            evicted.cancel(CANCELLED_MESSAGE);
            inner.publish(
                inner
                    .event(EventKind::AnalysisSuperseded)
                    .with_analysis(&evicted.request.key()),
            );
        }
    }

    /// The request currently being processed by the worker, if any.
    pub fn current_request(&self) -> Option<Arc<AnalysisRequest>> {
        self.inner.current_request()
    }

    /// `true` if an analysis is waiting to be dispatched.
    pub fn has_queued(&self) -> bool {
        !self.inner.queue.is_empty()
    }

    /// `true` while the run loop is alive (including restart backoff).
    pub fn is_running(&self) -> bool {
        lock(&self.inner.actor)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// `true` while a worker process is believed to be alive.
    pub fn is_worker_running(&self) -> bool {
        !self.inner.process_ended.is_set()
    }

    /// OS process id of the current worker.
    pub fn worker_pid(&self) -> Option<u32> {
        if self.inner.process_ended.is_set() {
            return None;
        }
        self.inner.process_handle().and_then(|h| h.pid())
    }

    /// Subscribes to this engine's events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }
}
