//! In-process fake worker for engine tests.
//!
//! [`FakeWorkers`] implements [`Spawn`]: every spawn creates a pair of
//! `tokio::io::duplex` pipes and a task that plays the worker. The task decodes
//! each request, records it, and answers according to a [`Script`].

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use enginevisor::{
    AnalysisRequest, AnalysisResponse, AnalysisStatus, DEFAULT_MAX_FRAME_LEN, Envelope,
    MessageStatus, Spawn, SpawnedWorker, WorkerProcess, decode, read_frame, write_frame,
};
use tokio_util::sync::CancellationToken;

/// What the fake worker does with one request.
pub enum Reply {
    /// Send these responses, in order.
    Respond(Vec<(MessageStatus, AnalysisResponse)>),
    /// Never answer.
    Silent,
    /// Exit with code 1 without answering.
    Crash,
    /// Send these responses, then exit with code 0.
    RespondThenExit(Vec<(MessageStatus, AnalysisResponse)>),
}

pub type Script = Arc<dyn Fn(&AnalysisRequest) -> Reply + Send + Sync>;

/// Answers every request with a single `Complete` response carrying `b"ok"`.
pub fn complete(request: &AnalysisRequest) -> Reply {
    Reply::Respond(vec![(MessageStatus::Complete, ok_response(request))])
}

pub fn ok_response(request: &AnalysisRequest) -> AnalysisResponse {
    AnalysisResponse::for_request(request, AnalysisStatus::Complete).with_results(b"ok".to_vec())
}

struct Shared {
    script: Mutex<Script>,
    received: Mutex<Vec<(u32, AnalysisRequest)>>,
    spawns: AtomicUsize,
    terminates: AtomicUsize,
    kills: AtomicUsize,
    ignore_terminate: AtomicBool,
    ignore_kill: AtomicBool,
}

#[derive(Clone)]
pub struct FakeWorkers {
    shared: Arc<Shared>,
}

impl FakeWorkers {
    pub fn new(script: impl Fn(&AnalysisRequest) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            shared: Arc::new(Shared {
                script: Mutex::new(Arc::new(script)),
                received: Mutex::new(Vec::new()),
                spawns: AtomicUsize::new(0),
                terminates: AtomicUsize::new(0),
                kills: AtomicUsize::new(0),
                ignore_terminate: AtomicBool::new(false),
                ignore_kill: AtomicBool::new(false),
            }),
        }
    }

    /// Worker processes survive SIGTERM.
    pub fn ignore_terminate(self) -> Self {
        self.shared.ignore_terminate.store(true, Ordering::SeqCst);
        self
    }

    /// Worker processes survive SIGKILL too.
    pub fn ignore_kill(self) -> Self {
        self.shared.ignore_kill.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_script(&self, script: impl Fn(&AnalysisRequest) -> Reply + Send + Sync + 'static) {
        *self.shared.script.lock().unwrap() = Arc::new(script);
    }

    pub fn received(&self) -> Vec<(u32, AnalysisRequest)> {
        self.shared.received.lock().unwrap().clone()
    }

    pub fn message_ids(&self) -> Vec<u32> {
        self.received().into_iter().map(|(id, _)| id).collect()
    }

    pub fn spawns(&self) -> usize {
        self.shared.spawns.load(Ordering::SeqCst)
    }

    pub fn terminates(&self) -> usize {
        self.shared.terminates.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> usize {
        self.shared.kills.load(Ordering::SeqCst)
    }

    /// Waits until the workers have received `n` requests in total.
    pub async fn wait_received(&self, n: usize) {
        eventually(|| self.shared.received.lock().unwrap().len() >= n).await;
    }

    /// Waits until `n` workers have been spawned in total.
    pub async fn wait_spawns(&self, n: usize) {
        eventually(|| self.spawns() >= n).await;
    }
}

/// Polls `cond` until it holds; panics after five seconds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

impl Spawn for FakeWorkers {
    fn spawn(&self) -> io::Result<SpawnedWorker> {
        self.shared.spawns.fetch_add(1, Ordering::SeqCst);

        let (engine_stdin, mut worker_stdin) = tokio::io::duplex(64 * 1024);
        let (mut worker_stdout, engine_stdout) = tokio::io::duplex(64 * 1024);
        let exit = CancellationToken::new();
        let code = Arc::new(Mutex::new(None));

        let shared = Arc::clone(&self.shared);
        let worker_exit = exit.clone();
        let worker_code = Arc::clone(&code);
        tokio::spawn(async move {
            loop {
                let body = tokio::select! {
                    _ = worker_exit.cancelled() => break,
                    body = read_frame(&mut worker_stdin, DEFAULT_MAX_FRAME_LEN) => match body {
                        Ok(body) => body,
                        Err(_) => break,
                    },
                };
                let envelope = decode(&body).unwrap();
                let request = envelope.decode_request().unwrap();
                shared
                    .received
                    .lock()
                    .unwrap()
                    .push((envelope.id, request.clone()));

                let script = Arc::clone(&*shared.script.lock().unwrap());
                match script(&request) {
                    Reply::Respond(messages) => {
                        for (status, response) in messages {
                            let out = Envelope::response(envelope.id, &response, status).unwrap();
                            if write_frame(&mut worker_stdout, &out).await.is_err() {
                                return;
                            }
                        }
                    }
                    Reply::RespondThenExit(messages) => {
                        for (status, response) in messages {
                            let out = Envelope::response(envelope.id, &response, status).unwrap();
                            if write_frame(&mut worker_stdout, &out).await.is_err() {
                                return;
                            }
                        }
                        *worker_code.lock().unwrap() = Some(0);
                        worker_exit.cancel();
                        break;
                    }
                    Reply::Silent => {}
                    Reply::Crash => {
                        *worker_code.lock().unwrap() = Some(1);
                        worker_exit.cancel();
                        break;
                    }
                }
            }
        });

        let process = FakeProcess {
            exit,
            code,
            shared: Arc::clone(&self.shared),
        };
        Ok(SpawnedWorker::new(engine_stdin, engine_stdout, process))
    }
}

struct FakeProcess {
    exit: CancellationToken,
    code: Arc<Mutex<Option<i32>>>,
    shared: Arc<Shared>,
}

impl FakeProcess {
    fn signal(&self, ignored: &AtomicBool) -> io::Result<()> {
        if self.exit.is_cancelled() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "already exited"));
        }
        if !ignored.load(Ordering::SeqCst) {
            self.exit.cancel();
        }
        Ok(())
    }
}

#[async_trait]
impl WorkerProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(4242)
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        self.exit.cancelled().await;
        Ok(*self.code.lock().unwrap())
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.shared.terminates.fetch_add(1, Ordering::SeqCst);
        self.signal(&self.shared.ignore_terminate)
    }

    fn kill(&mut self) -> io::Result<()> {
        self.shared.kills.fetch_add(1, Ordering::SeqCst);
        self.signal(&self.shared.ignore_kill)
    }
}
