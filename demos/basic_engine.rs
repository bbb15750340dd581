//! # Example: basic_engine
//!
//! Runs a toy worker under the engine. The same binary plays both roles: started
//! with `--worker` it answers analysis requests on stdin/stdout, otherwise it
//! spawns itself as the worker and drives it.
//!
//! Shows how to:
//! - Configure a [`CommandSpawner`] and an [`EngineConfig`].
//! - Attach the [`LogWriter`] subscriber and a `tracing` fmt subscriber.
//! - Follow progress through [`ResultChannel::progress`].
//! - See supersession: the second of two back-to-back requests wins.
//!
//! ## Flow
//! ```text
//! Engine::start() ──► spawn `basic_engine --worker`
//!     ├─► run_analysis(doc/1@1)   ─► superseded by doc/1@2 before dispatch
//!     ├─► run_analysis(doc/1@2)   ─► InProgress ×3, Complete
//!     └─► Engine::stop()          ─► SIGTERM, worker exits
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example basic_engine
//! ```

use std::sync::Arc;
use std::time::Duration;

use enginevisor::{
    AnalysisRequest, AnalysisResponse, AnalysisStatus, CommandSpawner, DEFAULT_MAX_FRAME_LEN,
    Engine, EngineConfig, Envelope, LogWriter, MessageStatus, ResultChannel, Subscribe, decode,
    read_frame, write_frame,
};
use tracing_subscriber::EnvFilter;

async fn worker() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();

    // Until the engine closes our stdin (or signals us).
    while let Ok(body) = read_frame(&mut stdin, DEFAULT_MAX_FRAME_LEN).await {
        let envelope = decode(&body)?;
        let request = envelope.decode_request()?;

        for step in 1..=3u8 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let partial = AnalysisResponse::for_request(&request, AnalysisStatus::Running)
                .with_results(vec![step]);
            let msg = Envelope::response(envelope.id, &partial, MessageStatus::InProgress)?;
            write_frame(&mut stdout, &msg).await?;
        }

        let done = AnalysisResponse::for_request(&request, AnalysisStatus::Complete)
            .with_results(format!("{} rows", request.options.len()).into_bytes());
        let msg = Envelope::response(envelope.id, &done, MessageStatus::Complete)?;
        write_frame(&mut stdout, &msg).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::args().any(|a| a == "--worker") {
        return worker().await;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let exe = std::env::current_exe()?;
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let engine = Engine::builder(CommandSpawner::new(exe).arg("--worker"))
        .with_config(EngineConfig::named("demo"))
        .with_subscribers(subs)
        .build();
    engine.start()?;

    let stale = ResultChannel::new();
    let fresh = ResultChannel::new();
    engine.run_analysis(
        AnalysisRequest::new("doc", 1).with_revision(1),
        stale.clone(),
    );
    engine.run_analysis(
        AnalysisRequest::new("doc", 1)
            .with_revision(2)
            .with_name("demo", "descriptives")
            .with_options(vec![0u8; 12]),
        fresh.clone(),
    );

    let stale = stale.wait().await;
    println!("rev 1: {:?} ({:?})", stale.status, stale.error);

    let mut progress = fresh.progress();
    while let Some(partial) = progress.next().await {
        println!("rev 2: progress {:?}", partial.results);
    }
    let done = fresh.wait().await;
    println!(
        "rev 2: {:?} {}",
        done.status,
        String::from_utf8_lossy(&done.results)
    );

    engine.stop().await;
    Ok(())
}
