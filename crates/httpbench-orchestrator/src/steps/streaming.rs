//! Background telemetry streaming.
//!
//! The two streaming steps fork one detached worker per container that
//! has a sink of the matching kind. A worker copies its stream into the
//! sink until the stream ends, then shuts the sink down. Workers have
//! no ordering relationship with later steps; the pipeline only waits
//! for them after the post phase, through the tracker pair built by
//! [`worker_channel`].
//!
//! Worker failures never reach the pipeline result. The forking step
//! already returned by the time a copy fails, and losing part of a
//! telemetry file does not invalidate the run, so failures go to the
//! shared diagnostic sink instead.

use std::future::Future;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::debug;

use crate::backend::LogChunk;
use crate::error::{OrchestratorError, Result};
use crate::plan::ContainerRef;
use crate::sink::{DiagnosticSink, TelemetrySink};
use crate::step::{Step, StepContext};

/// Creates a connected tracker/waiter pair for one pipeline run.
pub fn worker_channel() -> (WorkerTracker, WorkerWaiter) {
    let (tx, rx) = mpsc::channel(1);
    (WorkerTracker { tx }, WorkerWaiter { rx })
}

/// Registration handle for detached background workers.
///
/// Each spawned worker holds a clone of the internal sender for its
/// whole lifetime. The paired [`WorkerWaiter`] resolves once every
/// clone, including the tracker's own, has been dropped.
#[derive(Clone)]
pub struct WorkerTracker {
    tx: mpsc::Sender<()>,
}

impl WorkerTracker {
    /// Spawns a tracked background worker.
    pub fn spawn<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let alive = self.tx.clone();
        tokio::spawn(async move {
            work.await;
            drop(alive);
        });
    }
}

impl std::fmt::Debug for WorkerTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerTracker").finish_non_exhaustive()
    }
}

/// Awaits the completion of every worker spawned through the paired
/// [`WorkerTracker`].
pub struct WorkerWaiter {
    rx: mpsc::Receiver<()>,
}

impl WorkerWaiter {
    /// Blocks until all tracker handles and workers are gone.
    pub async fn wait(mut self) {
        while self.rx.recv().await.is_some() {}
    }
}

impl std::fmt::Debug for WorkerWaiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerWaiter").finish_non_exhaustive()
    }
}

/// Copies a stream of byte chunks into a sink, then closes the sink.
async fn copy_stream<S>(mut stream: S, mut sink: TelemetrySink, name: String, diag: DiagnosticSink)
where
    S: futures::Stream<Item = Result<bytes::Bytes>> + Unpin,
{
    while let Some(item) = stream.next().await {
        match item {
            Ok(bytes) => {
                if let Err(error) = sink.write_all(&bytes).await {
                    diag.report(&name, &error.into()).await;
                    break;
                }
            }
            Err(error) => {
                diag.report(&name, &error).await;
                break;
            }
        }
    }
    if let Err(error) = sink.shutdown().await {
        diag.report(&name, &error.into()).await;
    }
    debug!(container = %name, "stream worker finished");
}

/// Forks one log-copying worker per targeted container with a log sink.
///
/// Stdout frames go to the container's sink; stderr frames go to the
/// shared diagnostic sink. Containers without a log sink are skipped.
#[derive(Debug)]
pub struct StreamLogsStep {
    containers: Vec<ContainerRef>,
}

impl StreamLogsStep {
    /// Creates the step over the given containers.
    pub fn new(containers: Vec<ContainerRef>) -> Self {
        Self { containers }
    }
}

#[async_trait]
impl Step for StreamLogsStep {
    fn name(&self) -> &str {
        "stream-logs"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<()> {
        for &r in &self.containers {
            let slot = ctx.plan().container(r);
            if !slot.has_log_sink() {
                debug!(container = %slot.name(), "no log sink, skipping");
                continue;
            }
            let id = slot
                .id()
                .await
                .ok_or_else(|| OrchestratorError::missing_container_id(slot.name()))?;

            let mut stream = ctx
                .abortable(ctx.backend().container_logs(&id))
                .await
                .map_err(|e| {
                    if e.is_cancelled() {
                        e
                    } else {
                        OrchestratorError::log_stream_failed(slot.name(), e.to_string())
                    }
                })?;

            // Claimed only once the stream is open, so an open failure
            // leaves the sink for the final close step.
            let Some(mut sink) = slot.take_log_sink() else {
                continue;
            };
            let name = slot.name().to_string();
            let diag = ctx.diag();
            ctx.workers().spawn(async move {
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(LogChunk::Stdout(bytes)) => {
                            if let Err(error) = sink.write_all(&bytes).await {
                                diag.report(&name, &error.into()).await;
                                break;
                            }
                        }
                        Ok(LogChunk::Stderr(bytes)) => diag.write(&bytes).await,
                        Err(error) => {
                            diag.report(&name, &error).await;
                            break;
                        }
                    }
                }
                if let Err(error) = sink.shutdown().await {
                    diag.report(&name, &error.into()).await;
                }
                debug!(container = %name, "log worker finished");
            });
        }
        Ok(())
    }
}

/// Forks one stats-copying worker per targeted container with a stats
/// sink. Containers without a stats sink are skipped.
#[derive(Debug)]
pub struct StreamStatsStep {
    containers: Vec<ContainerRef>,
}

impl StreamStatsStep {
    /// Creates the step over the given containers.
    pub fn new(containers: Vec<ContainerRef>) -> Self {
        Self { containers }
    }
}

#[async_trait]
impl Step for StreamStatsStep {
    fn name(&self) -> &str {
        "stream-stats"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<()> {
        for &r in &self.containers {
            let slot = ctx.plan().container(r);
            if !slot.has_stat_sink() {
                debug!(container = %slot.name(), "no stats sink, skipping");
                continue;
            }
            let id = slot
                .id()
                .await
                .ok_or_else(|| OrchestratorError::missing_container_id(slot.name()))?;

            let stream = ctx
                .abortable(ctx.backend().container_stats(&id))
                .await
                .map_err(|e| {
                    if e.is_cancelled() {
                        e
                    } else {
                        OrchestratorError::stat_stream_failed(slot.name(), e.to_string())
                    }
                })?;

            // Claimed only once the stream is open, so an open failure
            // leaves the sink for the final close step.
            let Some(sink) = slot.take_stat_sink() else {
                continue;
            };
            let name = slot.name().to_string();
            let diag = ctx.diag();
            ctx.workers()
                .spawn(copy_stream(stream, sink, name, diag));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{ContainerSpec, Plan};
    use crate::testutil::{context, FakeBackend, SharedBuf};
    use bytes::Bytes;
    use std::sync::Arc;

    fn container(
        builder: &mut crate::plan::PlanBuilder,
        name: &str,
        log_sink: Option<TelemetrySink>,
        stat_sink: Option<TelemetrySink>,
    ) -> ContainerRef {
        builder.container(
            ContainerSpec::builder(name, "client:latest").build(),
            log_sink,
            stat_sink,
        )
    }

    #[tokio::test]
    async fn logs_fork_only_for_containers_with_a_sink() {
        let log_buf = SharedBuf::default();

        let mut builder = Plan::builder();
        let with_sink = container(&mut builder, "client-1", Some(log_buf.sink()), None);
        let without_sink = container(&mut builder, "server-0", None, None);
        let plan = builder.build();
        plan.container(with_sink).assign_id("c1").await.unwrap();
        plan.container(without_sink).assign_id("s0").await.unwrap();

        let backend = Arc::new(FakeBackend::default());
        backend.seed_logs("c1", vec![LogChunk::Stdout(Bytes::from_static(b"hello\n"))]);

        let (tracker, waiter) = worker_channel();
        let ctx = crate::testutil::context_with_workers(backend.clone(), plan, tracker);

        StreamLogsStep::new(vec![with_sink, without_sink])
            .execute(&ctx)
            .await
            .unwrap();

        drop(ctx);
        waiter.wait().await;

        assert_eq!(log_buf.contents(), b"hello\n");
        assert!(log_buf.is_shutdown());
        // Only the container with a sink opened a stream.
        assert_eq!(backend.calls(), vec!["logs c1".to_string()]);
    }

    #[tokio::test]
    async fn stderr_frames_go_to_the_diagnostic_sink() {
        let log_buf = SharedBuf::default();
        let diag_buf = SharedBuf::default();

        let mut builder = Plan::builder();
        let c = container(&mut builder, "client-1", Some(log_buf.sink()), None);
        let plan = builder.build();
        plan.container(c).assign_id("c1").await.unwrap();

        let backend = Arc::new(FakeBackend::default());
        backend.seed_logs(
            "c1",
            vec![
                LogChunk::Stdout(Bytes::from_static(b"record\n")),
                LogChunk::Stderr(Bytes::from_static(b"oops\n")),
            ],
        );

        let (tracker, waiter) = worker_channel();
        let diag = DiagnosticSink::new(diag_buf.sink());
        let ctx = crate::testutil::context_full(backend, plan, tracker, diag);

        StreamLogsStep::new(vec![c]).execute(&ctx).await.unwrap();

        drop(ctx);
        waiter.wait().await;

        assert_eq!(log_buf.contents(), b"record\n");
        assert_eq!(diag_buf.contents(), b"oops\n");
    }

    #[tokio::test]
    async fn stats_are_copied_and_sink_closed() {
        let stat_buf = SharedBuf::default();

        let mut builder = Plan::builder();
        let c = container(&mut builder, "server-0", None, Some(stat_buf.sink()));
        let plan = builder.build();
        plan.container(c).assign_id("s0").await.unwrap();

        let backend = Arc::new(FakeBackend::default());
        backend.seed_stats("s0", vec![Bytes::from_static(b"{\"cpu\":1}\n")]);

        let (tracker, waiter) = worker_channel();
        let ctx = crate::testutil::context_with_workers(backend, plan, tracker);

        StreamStatsStep::new(vec![c]).execute(&ctx).await.unwrap();

        drop(ctx);
        waiter.wait().await;

        assert_eq!(stat_buf.contents(), b"{\"cpu\":1}\n");
        assert!(stat_buf.is_shutdown());
    }

    #[tokio::test]
    async fn missing_id_with_a_sink_is_an_error() {
        let mut builder = Plan::builder();
        let c = container(
            &mut builder,
            "client-1",
            Some(SharedBuf::default().sink()),
            None,
        );
        let plan = builder.build();

        let backend = Arc::new(FakeBackend::default());
        let ctx = context(backend, Arc::clone(&plan));

        let err = StreamLogsStep::new(vec![c]).execute(&ctx).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::MissingContainerId(_)));
        // The unclaimed sink is still there for the close step.
        assert!(plan.container(c).take_log_sink().is_some());
    }
}
