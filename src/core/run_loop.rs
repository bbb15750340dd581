//! # Worker session: the engine's run loop.
//!
//! A session lasts as long as one worker process. It races three sources with a
//! biased `tokio::select!`:
//!
//! ```text
//! loop {
//!   select! {
//!     next frame from stdout ──► on_envelope: match identity, write/resolve current
//!     process-ended set      ──► drain frames still in the pipe, return Ok
//!     next queued analysis   ──► dispatch: abort current, send request, flush
//!   }
//! }
//! ```
//!
//! ## Rules
//! - Output comes before exit: frames the worker wrote before it died are still
//!   routed. End of stdout means the process is going away; the session waits
//!   (up to the grace period) for the exit instead of failing.
//! - At most one analysis is current; dispatching a new one aborts the old one.
//! - Responses are routed by identity triple only. Anything not matching the
//!   current request is discarded.
//! - `InProgress` responses are progress; any other status settles the analysis.
//! - Every branch is cancel-safe: `FramedRead` keeps partial frames, the queue
//!   hands out items synchronously and the flag wait holds no state.

use std::sync::atomic::Ordering;

use futures::{SinkExt, StreamExt};
use tokio::{select, time};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::analysis::{Analysis, CANCELLED_MESSAGE};
use crate::core::engine::Inner;
use crate::error::EngineError;
use crate::events::EventKind;
use crate::protocol::{Envelope, FrameCodec};
use crate::worker::{WorkerStdin, WorkerStdout};

/// The two pipes of a running worker.
pub(crate) struct WorkerIo {
    pub(crate) stdin: WorkerStdin,
    pub(crate) stdout: WorkerStdout,
}

pub(crate) struct Session<'a> {
    inner: &'a Inner,
    /// Responses routed to the current analysis during this session.
    pub(crate) delivered: usize,
}

impl<'a> Session<'a> {
    pub(crate) fn new(inner: &'a Inner) -> Self {
        Self {
            inner,
            delivered: 0,
        }
    }

    /// Runs until the process ends (`Ok`) or the session fails.
    pub(crate) async fn run(&mut self, io: WorkerIo) -> Result<(), EngineError> {
        let inner = self.inner;
        let codec = FrameCodec::new(inner.cfg.max_frame_len_clamped());
        let mut writer = FramedWrite::new(io.stdin, codec);
        let mut reader = FramedRead::new(io.stdout, codec);

        loop {
            select! {
                biased;
                frame = reader.next() => match frame {
                    Some(Ok(envelope)) => self.on_envelope(envelope)?,
                    Some(Err(e)) => return Err(e.into()),
                    None => return self.closed().await,
                },
                _ = inner.process_ended.wait() => return self.drain(&mut reader).await,
                analysis = inner.queue.get() => self.dispatch(&mut writer, analysis).await?,
            }
        }
    }

    /// Stdout reached EOF: wait for the exit that normally follows.
    async fn closed(&self) -> Result<(), EngineError> {
        let inner = self.inner;
        let linger = inner.cfg.grace_period().unwrap_or_default();
        match time::timeout(linger, inner.process_ended.wait()).await {
            Ok(()) => Ok(()),
            Err(_) => Err(EngineError::WorkerClosed),
        }
    }

    /// Routes frames the worker wrote before it exited.
    ///
    /// Skipped during `stop()`; a truncated last frame counts as part of the exit.
    async fn drain(
        &mut self,
        reader: &mut FramedRead<WorkerStdout, FrameCodec>,
    ) -> Result<(), EngineError> {
        if self.inner.stopping.load(Ordering::SeqCst) {
            return Ok(());
        }
        let linger = self.inner.cfg.grace_period().unwrap_or_default();
        let drained = time::timeout(linger, async {
            while let Some(Ok(envelope)) = reader.next().await {
                self.on_envelope(envelope)?;
            }
            Ok::<(), EngineError>(())
        })
        .await;
        drained.unwrap_or(Ok(()))
    }

    async fn dispatch(
        &mut self,
        writer: &mut FramedWrite<WorkerStdin, FrameCodec>,
        analysis: Analysis,
    ) -> Result<(), EngineError> {
        let inner = self.inner;
        inner.abort_current(CANCELLED_MESSAGE);

        let id = inner.next_message_id();
        let envelope = match Envelope::request(id, &analysis.request) {
            Ok(envelope) => envelope,
            Err(e) => {
                analysis.cancel(&e.to_string());
                return Err(e.into());
            }
        };

        inner.publish(
            inner
                .event(EventKind::AnalysisDispatched)
                .with_analysis(&analysis.request.key())
                .with_message_id(id),
        );
        inner.set_current(analysis);
        writer.send(envelope).await?;
        Ok(())
    }

    fn on_envelope(&mut self, envelope: Envelope) -> Result<(), EngineError> {
        let response = envelope.decode_response()?;
        let inner = self.inner;

        match inner.route(&response, envelope.is_terminal()) {
            Some(analysis) => {
                self.delivered += 1;
                if envelope.is_terminal() {
                    let ev = inner
                        .event(EventKind::AnalysisCompleted)
                        .with_analysis(&response.key());
                    let ev = match &response.error {
                        Some(msg) if response.is_error() => ev.with_reason(msg.as_str()),
                        _ => ev,
                    };
                    analysis.results.resolve(response);
                    inner.publish(ev);
                } else {
                    analysis.results.write(response);
                }
            }
            None => {
                inner.publish(
                    inner
                        .event(EventKind::ResponseDiscarded)
                        .with_analysis(&response.key()),
                );
            }
        }
        Ok(())
    }
}
