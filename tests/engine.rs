mod common;

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{FakeWorkers, Reply, complete, eventually, ok_response};
use enginevisor::{
    AnalysisRequest, AnalysisResponse, AnalysisStatus, BackoffPolicy, CANCELLED_MESSAGE,
    CRASHED_MESSAGE, Engine, EngineConfig, EngineError, Event, EventKind, MessageStatus,
    ResultChannel, RestartPolicy, Spawn, SpawnedWorker, Subscribe,
};

fn engine(workers: &FakeWorkers) -> Engine {
    Engine::builder(workers.clone()).build()
}

fn request(rev: u32) -> AnalysisRequest {
    AnalysisRequest::new("doc", 1)
        .with_revision(rev)
        .with_name("stats", "descriptives")
}

async fn settle(channel: &ResultChannel<AnalysisResponse>) -> AnalysisResponse {
    tokio::time::timeout(Duration::from_secs(5), channel.wait())
        .await
        .expect("analysis never settled")
}

#[tokio::test]
async fn test_single_request_completes() {
    let workers = FakeWorkers::new(complete);
    let engine = engine(&workers);
    engine.start().unwrap();

    let results = ResultChannel::new();
    engine.run_analysis(request(1), results.clone());

    let response = settle(&results).await;
    assert_eq!(response.status, AnalysisStatus::Complete);
    assert_eq!(response.results, b"ok");
    assert_eq!(response.key(), request(1).key());

    assert_eq!(workers.message_ids(), vec![0]);
    assert_eq!(workers.received()[0].1, request(1));
    eventually(|| engine.current_request().is_none()).await;

    engine.stop().await;
}

#[tokio::test]
async fn test_progress_then_complete() {
    let workers = FakeWorkers::new(|req| {
        let partial = |n: u8| {
            AnalysisResponse::for_request(req, AnalysisStatus::Running).with_results(vec![n])
        };
        Reply::Respond(vec![
            (MessageStatus::InProgress, partial(1)),
            (MessageStatus::InProgress, partial(2)),
            (MessageStatus::Complete, ok_response(req)),
        ])
    });
    let engine = engine(&workers);
    engine.start().unwrap();

    let results = ResultChannel::new();
    engine.run_analysis(request(1), results.clone());

    let response = settle(&results).await;
    assert_eq!(response.status, AnalysisStatus::Complete);
    assert_eq!(results.latest_progress().unwrap().results, vec![2]);

    engine.stop().await;
}

#[tokio::test]
async fn test_error_status_settles_with_worker_error() {
    let workers = FakeWorkers::new(|req| {
        Reply::Respond(vec![(
            MessageStatus::Error,
            AnalysisResponse::error_for(req, "singular matrix"),
        )])
    });
    let engine = engine(&workers);
    engine.start().unwrap();

    let results = ResultChannel::new();
    engine.run_analysis(request(1), results.clone());

    let response = settle(&results).await;
    assert!(response.is_error());
    assert_eq!(response.error.as_deref(), Some("singular matrix"));

    engine.stop().await;
}

#[tokio::test]
async fn test_queued_request_is_superseded() {
    let workers = FakeWorkers::new(complete);
    let engine = engine(&workers);

    let first = ResultChannel::new();
    let second = ResultChannel::new();
    engine.run_analysis(request(1), first.clone());
    engine.run_analysis(request(2), second.clone());

    // Cancelled right away, before the engine even runs.
    let cancelled = first.try_result().unwrap();
    assert!(cancelled.is_error());
    assert_eq!(cancelled.error.as_deref(), Some(CANCELLED_MESSAGE));
    assert_eq!(cancelled.revision, 1);
    assert!(engine.has_queued());

    engine.start().unwrap();
    let response = settle(&second).await;
    assert_eq!(response.status, AnalysisStatus::Complete);
    assert!(!engine.has_queued());

    let received = workers.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0], (0, request(2)));

    engine.stop().await;
}

#[tokio::test]
async fn test_mismatched_response_is_discarded() {
    let workers = FakeWorkers::new(|req| {
        let mut stale = ok_response(req);
        stale.revision += 1;
        stale.results = b"stale".to_vec();
        Reply::Respond(vec![
            (MessageStatus::Complete, stale),
            (MessageStatus::Complete, ok_response(req)),
        ])
    });
    let engine = engine(&workers);
    let mut events = engine.subscribe();
    engine.start().unwrap();

    let results = ResultChannel::new();
    engine.run_analysis(request(1), results.clone());

    let response = settle(&results).await;
    assert_eq!(response.revision, 1);
    assert_eq!(response.results, b"ok");

    let discarded = loop {
        let ev = events.recv().await.unwrap();
        if ev.kind == EventKind::ResponseDiscarded {
            break ev;
        }
    };
    assert_eq!(discarded.analysis.as_deref(), Some("doc/1@2"));

    engine.stop().await;
}

#[tokio::test]
async fn test_dispatch_aborts_current_analysis() {
    let workers = FakeWorkers::new(|req| {
        if req.revision == 1 {
            Reply::Silent
        } else {
            complete(req)
        }
    });
    let engine = engine(&workers);
    engine.start().unwrap();

    let first = ResultChannel::new();
    engine.run_analysis(request(1), first.clone());
    workers.wait_received(1).await;
    assert_eq!(engine.current_request().unwrap().revision, 1);
    assert!(!first.is_resolved());

    let second = ResultChannel::new();
    engine.run_analysis(request(2), second.clone());

    let aborted = settle(&first).await;
    assert_eq!(aborted.error.as_deref(), Some(CANCELLED_MESSAGE));
    assert_eq!(settle(&second).await.status, AnalysisStatus::Complete);
    assert_eq!(workers.message_ids(), vec![0, 1]);

    engine.stop().await;
}

#[tokio::test]
async fn test_new_request_replaces_queued_not_current() {
    let workers = FakeWorkers::new(|req| {
        if req.revision == 1 {
            Reply::Silent
        } else {
            complete(req)
        }
    });
    let engine = engine(&workers);
    engine.start().unwrap();

    let first = ResultChannel::new();
    engine.run_analysis(request(1), first.clone());
    workers.wait_received(1).await;

    // No await in between: the run loop gets no chance to dispatch rev 2.
    let second = ResultChannel::new();
    let third = ResultChannel::new();
    engine.run_analysis(request(2), second.clone());
    engine.run_analysis(request(3), third.clone());

    let replaced = second.try_result().unwrap();
    assert_eq!(replaced.revision, 2);
    assert_eq!(replaced.error.as_deref(), Some(CANCELLED_MESSAGE));
    assert!(!first.is_resolved());
    assert_eq!(engine.current_request().unwrap().revision, 1);
    assert!(engine.has_queued());

    assert_eq!(settle(&third).await.status, AnalysisStatus::Complete);
    assert_eq!(
        settle(&first).await.error.as_deref(),
        Some(CANCELLED_MESSAGE)
    );

    let revisions: Vec<u32> = workers
        .received()
        .iter()
        .map(|(_, req)| req.revision)
        .collect();
    assert_eq!(revisions, vec![1, 3]);
    assert_eq!(workers.message_ids(), vec![0, 1]);

    engine.stop().await;
}

#[tokio::test]
async fn test_final_response_written_before_exit_is_delivered() {
    let workers = FakeWorkers::new(|req| {
        Reply::RespondThenExit(vec![(MessageStatus::Complete, ok_response(req))])
    });
    let cfg = EngineConfig {
        restart: RestartPolicy::Never,
        ..EngineConfig::default()
    };
    let engine = Engine::builder(workers.clone()).with_config(cfg).build();
    engine.start().unwrap();

    let results = ResultChannel::new();
    engine.run_analysis(request(1), results.clone());

    let response = settle(&results).await;
    assert_eq!(response.status, AnalysisStatus::Complete);
    assert_eq!(response.error, None);
    assert_eq!(response.results, b"ok");

    eventually(|| !engine.is_running()).await;
    assert_eq!(workers.spawns(), 1);
}

#[tokio::test]
async fn test_crash_is_not_a_run_loop_failure() {
    let workers = FakeWorkers::new(|_| Reply::Crash);
    let engine = engine(&workers);
    let mut events = engine.subscribe();
    engine.start().unwrap();

    let results = ResultChannel::new();
    engine.run_analysis(request(1), results.clone());
    assert_eq!(
        settle(&results).await.error.as_deref(),
        Some(CRASHED_MESSAGE)
    );

    let mut kinds = Vec::new();
    loop {
        let ev = events.recv().await.unwrap();
        kinds.push(ev.kind);
        if ev.kind == EventKind::WorkerSpawned && ev.attempt == Some(2) {
            break;
        }
    }
    assert!(kinds.contains(&EventKind::WorkerExited));
    assert!(kinds.contains(&EventKind::RestartScheduled));
    assert!(!kinds.contains(&EventKind::RunLoopFailed));

    engine.stop().await;
}

#[tokio::test]
async fn test_stop_returns_after_actor_panic() {
    let workers = FakeWorkers::new(|_| Reply::Crash);
    let calls = AtomicUsize::new(0);
    let engine = Engine::builder(move || {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            workers.spawn()
        } else {
            panic!("spawner exploded");
        }
    })
    .build();
    engine.start().unwrap();

    let results = ResultChannel::new();
    engine.run_analysis(request(1), results.clone());
    assert_eq!(
        settle(&results).await.error.as_deref(),
        Some(CRASHED_MESSAGE)
    );

    // The respawn after the crash panics inside the run-loop task.
    eventually(|| !engine.is_running()).await;
    engine.stop().await;
    assert!(!engine.is_running());
    assert!(!engine.is_worker_running());
}

#[tokio::test]
async fn test_crash_resolves_current_and_restarts() {
    let workers = FakeWorkers::new(|_| Reply::Crash);
    let engine = engine(&workers);
    engine.start().unwrap();

    let doomed = ResultChannel::new();
    engine.run_analysis(request(1), doomed.clone());

    let response = settle(&doomed).await;
    assert!(response.is_error());
    assert_eq!(response.error.as_deref(), Some(CRASHED_MESSAGE));

    workers.set_script(complete);
    workers.wait_spawns(2).await;
    assert!(engine.is_running());

    let results = ResultChannel::new();
    engine.run_analysis(request(2), results.clone());
    assert_eq!(settle(&results).await.status, AnalysisStatus::Complete);
    assert_eq!(workers.message_ids(), vec![0, 1]);

    engine.stop().await;
    assert!(!engine.is_running());
}

#[tokio::test]
async fn test_never_policy_stays_down_after_crash() {
    let workers = FakeWorkers::new(|_| Reply::Crash);
    let cfg = EngineConfig {
        restart: RestartPolicy::Never,
        ..EngineConfig::default()
    };
    let engine = Engine::builder(workers.clone()).with_config(cfg).build();
    engine.start().unwrap();

    let results = ResultChannel::new();
    engine.run_analysis(request(1), results.clone());
    assert_eq!(
        settle(&results).await.error.as_deref(),
        Some(CRASHED_MESSAGE)
    );

    eventually(|| !engine.is_running()).await;
    assert!(!engine.is_worker_running());
    assert_eq!(workers.spawns(), 1);

    // The engine can be brought back by hand.
    engine.start().unwrap();
    assert_eq!(workers.spawns(), 2);
    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_kills_after_grace_period() {
    let workers = FakeWorkers::new(complete).ignore_terminate().ignore_kill();
    let engine = engine(&workers);
    engine.start().unwrap();
    assert!(engine.is_worker_running());
    assert_eq!(engine.worker_pid(), Some(4242));

    let began = tokio::time::Instant::now();
    engine.stop().await;

    assert!(began.elapsed() >= Duration::from_secs(1));
    eventually(|| workers.kills() == 1).await;
    assert_eq!(workers.terminates(), 1);
    assert!(!engine.is_worker_running());
    assert!(!engine.is_running());
    assert_eq!(engine.worker_pid(), None);
}

#[tokio::test(start_paused = true)]
async fn test_graceful_stop_cancels_current() {
    let workers = FakeWorkers::new(|_| Reply::Silent);
    let engine = engine(&workers);
    engine.start().unwrap();

    let results = ResultChannel::new();
    engine.run_analysis(request(1), results.clone());
    workers.wait_received(1).await;

    let began = tokio::time::Instant::now();
    engine.stop().await;
    assert!(began.elapsed() < Duration::from_secs(1));

    let response = results.try_result().unwrap();
    assert_eq!(response.error.as_deref(), Some(CANCELLED_MESSAGE));
    assert!(engine.current_request().is_none());
    assert_eq!(workers.terminates(), 1);
    assert_eq!(workers.kills(), 0);
    assert_eq!(workers.spawns(), 1);
}

#[tokio::test]
async fn test_concurrent_stops_both_return() {
    let workers = FakeWorkers::new(complete);
    let engine = engine(&workers);
    engine.start().unwrap();

    let other = engine.clone();
    tokio::join!(engine.stop(), other.stop());
    assert!(!engine.is_worker_running());
    assert_eq!(workers.terminates(), 1);
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let workers = FakeWorkers::new(complete);
    let engine = engine(&workers);

    engine.start().unwrap();
    assert!(matches!(engine.start(), Err(EngineError::AlreadyStarted)));
    assert_eq!(workers.spawns(), 1);

    engine.stop().await;
    engine.start().unwrap();
    assert_eq!(workers.spawns(), 2);
    engine.stop().await;
}

#[tokio::test]
async fn test_stop_before_start_is_noop() {
    let workers = FakeWorkers::new(complete);
    let engine = engine(&workers);

    engine.stop().await;
    assert!(!engine.is_running());
    assert_eq!(workers.terminates(), 0);

    engine.start().unwrap();
    assert!(engine.is_running());
    engine.stop().await;
}

#[tokio::test]
async fn test_restart_keeps_message_ids_increasing() {
    let workers = FakeWorkers::new(complete);
    let engine = engine(&workers);
    engine.start().unwrap();

    let first = ResultChannel::new();
    engine.run_analysis(request(1), first.clone());
    settle(&first).await;

    engine.restart().await.unwrap();
    assert_eq!(workers.spawns(), 2);

    let second = ResultChannel::new();
    engine.run_analysis(request(2), second.clone());
    settle(&second).await;

    assert_eq!(workers.message_ids(), vec![0, 1]);
    engine.stop().await;
}

#[tokio::test]
async fn test_spawn_failure_is_returned_from_start() {
    let engine = Engine::builder(|| -> io::Result<SpawnedWorker> {
        Err(io::Error::new(io::ErrorKind::NotFound, "no such worker"))
    })
    .build();

    let err = engine.start().unwrap_err();
    assert!(matches!(err, EngineError::Spawn(_)));
    assert_eq!(err.as_label(), "engine_spawn_failed");
    assert!(!engine.is_running());
}

#[tokio::test]
async fn test_backoff_grows_and_resets_after_delivery() {
    let workers = FakeWorkers::new(|req| match req.revision {
        2 | 3 | 5 => Reply::Crash,
        _ => complete(req),
    });
    let cfg = EngineConfig {
        backoff: BackoffPolicy {
            first: Duration::from_millis(10),
            ..BackoffPolicy::default()
        },
        ..EngineConfig::default()
    };
    let engine = Engine::builder(workers.clone()).with_config(cfg).build();
    let mut events = engine.subscribe();
    engine.start().unwrap();

    // 1 ok, 2 crash | 3 crash | 4 ok, 5 crash
    for rev in 1..=5 {
        let results = ResultChannel::new();
        engine.run_analysis(request(rev), results.clone());
        settle(&results).await;
    }

    let mut scheduled = Vec::new();
    while scheduled.len() < 3 {
        let ev = events.recv().await.unwrap();
        if ev.kind == EventKind::RestartScheduled {
            scheduled.push((ev.attempt, ev.delay_ms));
        }
    }
    assert_eq!(
        scheduled,
        vec![(Some(1), Some(10)), (Some(2), Some(20)), (Some(1), Some(10))]
    );
    workers.wait_spawns(4).await;

    engine.stop().await;
}

#[derive(Default)]
struct Recorder {
    kinds: Mutex<Vec<EventKind>>,
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, ev: &Event) {
        self.kinds.lock().unwrap().push(ev.kind);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[tokio::test]
async fn test_subscribers_see_lifecycle() {
    let workers = FakeWorkers::new(complete);
    let recorder = Arc::new(Recorder::default());
    let engine = Engine::builder(workers.clone())
        .with_config(EngineConfig::named("observed"))
        .with_subscribers(vec![recorder.clone() as Arc<dyn Subscribe>])
        .build();
    assert_eq!(engine.name(), "observed");
    engine.start().unwrap();

    let results = ResultChannel::new();
    engine.run_analysis(request(1), results.clone());
    settle(&results).await;
    engine.stop().await;

    eventually(|| {
        recorder
            .kinds
            .lock()
            .unwrap()
            .contains(&EventKind::EngineStopped)
    })
    .await;

    let kinds = recorder.kinds.lock().unwrap().clone();
    let pos = |k: EventKind| kinds.iter().position(|x| *x == k).unwrap();
    assert!(pos(EventKind::WorkerSpawned) < pos(EventKind::AnalysisDispatched));
    assert!(pos(EventKind::AnalysisQueued) < pos(EventKind::AnalysisDispatched));
    assert!(pos(EventKind::AnalysisDispatched) < pos(EventKind::AnalysisCompleted));
    assert!(pos(EventKind::StopRequested) < pos(EventKind::TerminateSent));
}
