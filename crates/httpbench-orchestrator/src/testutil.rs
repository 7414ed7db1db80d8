//! Shared test doubles for the in-crate unit tests.

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use crate::backend::{
    ContainerSummary, ImageSummary, LogChunk, LogStream, NetworkSummary, RuntimeBackend,
    StatStream,
};
use crate::error::{OrchestratorError, Result};
use crate::plan::{ContainerSpec, Plan};
use crate::sink::{DiagnosticSink, TelemetrySink};
use crate::step::{Step, StepContext};
use crate::steps::{worker_channel, WorkerTracker};

/// Builds a step context with a fresh token, tracker, and stderr diag.
pub(crate) fn context(backend: Arc<dyn RuntimeBackend>, plan: Arc<Plan>) -> StepContext {
    let (tracker, _waiter) = worker_channel();
    context_with_workers(backend, plan, tracker)
}

/// Like [`context`], with a caller-owned worker tracker.
pub(crate) fn context_with_workers(
    backend: Arc<dyn RuntimeBackend>,
    plan: Arc<Plan>,
    tracker: WorkerTracker,
) -> StepContext {
    context_full(backend, plan, tracker, DiagnosticSink::stderr())
}

/// Fully explicit step context construction.
pub(crate) fn context_full(
    backend: Arc<dyn RuntimeBackend>,
    plan: Arc<Plan>,
    tracker: WorkerTracker,
    diag: DiagnosticSink,
) -> StepContext {
    StepContext::new(backend, plan, CancellationToken::new(), tracker, diag)
}

/// In-memory capability backend that records every call.
#[derive(Default)]
pub(crate) struct FakeBackend {
    calls: Mutex<Vec<String>>,
    next_id: AtomicUsize,
    networks: Mutex<Vec<NetworkSummary>>,
    images: Mutex<Vec<ImageSummary>>,
    logs: Mutex<HashMap<String, Vec<LogChunk>>>,
    stats: Mutex<HashMap<String, Vec<Bytes>>>,
    exit_codes: Mutex<HashMap<String, i64>>,
    failing_waits: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub(crate) fn seed_network(&self, name: &str, id: &str) {
        self.networks.lock().unwrap().push(NetworkSummary {
            name: name.to_string(),
            id: id.to_string(),
        });
    }

    pub(crate) fn seed_image(&self, tag: &str) {
        self.images.lock().unwrap().push(ImageSummary {
            repo_tags: vec![tag.to_string()],
        });
    }

    pub(crate) fn seed_logs(&self, id: &str, chunks: Vec<LogChunk>) {
        self.logs.lock().unwrap().insert(id.to_string(), chunks);
    }

    pub(crate) fn seed_stats(&self, id: &str, lines: Vec<Bytes>) {
        self.stats.lock().unwrap().insert(id.to_string(), lines);
    }

    pub(crate) fn seed_exit_code(&self, id: &str, code: i64) {
        self.exit_codes.lock().unwrap().insert(id.to_string(), code);
    }

    pub(crate) fn fail_wait(&self, id: &str) {
        self.failing_waits.lock().unwrap().push(id.to_string());
    }
}

#[async_trait]
impl RuntimeBackend for FakeBackend {
    async fn create_container(
        &self,
        spec: &ContainerSpec,
        network: Option<&str>,
    ) -> Result<String> {
        self.record(format!(
            "create {} net={}",
            spec.name,
            network.unwrap_or("-")
        ));
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("id-{n}"))
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.record(format!("start {id}"));
        Ok(())
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        self.record(format!("stop {id}"));
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.record(format!("remove {id}"));
        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        self.record("list-containers");
        Ok(Vec::new())
    }

    async fn list_networks(&self) -> Result<Vec<NetworkSummary>> {
        self.record("list-networks");
        Ok(self.networks.lock().unwrap().clone())
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>> {
        self.record("list-images");
        Ok(self.images.lock().unwrap().clone())
    }

    async fn create_network(&self, name: &str) -> Result<String> {
        self.record(format!("create-network {name}"));
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("net-id-{n}"))
    }

    async fn build_image(&self, tag: &str, _build_context: Bytes) -> Result<()> {
        self.record(format!("build {tag}"));
        Ok(())
    }

    async fn container_logs(&self, id: &str) -> Result<LogStream> {
        self.record(format!("logs {id}"));
        let chunks = self.logs.lock().unwrap().remove(id).unwrap_or_default();
        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }

    async fn container_stats(&self, id: &str) -> Result<StatStream> {
        self.record(format!("stats {id}"));
        let lines = self.stats.lock().unwrap().remove(id).unwrap_or_default();
        Ok(Box::pin(stream::iter(lines.into_iter().map(Ok))))
    }

    async fn wait_terminal(&self, id: &str) -> Result<i64> {
        self.record(format!("wait {id}"));
        if self.failing_waits.lock().unwrap().iter().any(|f| f == id) {
            return Err(OrchestratorError::Io(io::Error::other(
                "injected wait failure",
            )));
        }
        let code = self.exit_codes.lock().unwrap().get(id).copied();
        match code {
            Some(code) => Ok(code),
            // Unseeded containers never terminate.
            None => std::future::pending().await,
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Shared in-memory write buffer observable after its sink is moved
/// into a worker.
#[derive(Clone, Default)]
pub(crate) struct SharedBuf {
    inner: Arc<Mutex<BufState>>,
}

#[derive(Default)]
struct BufState {
    bytes: Vec<u8>,
    shutdown: bool,
}

impl SharedBuf {
    pub(crate) fn sink(&self) -> TelemetrySink {
        Box::new(SharedBufWriter {
            inner: Arc::clone(&self.inner),
        })
    }

    pub(crate) fn contents(&self) -> Vec<u8> {
        self.inner.lock().unwrap().bytes.clone()
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.inner.lock().unwrap().shutdown
    }
}

struct SharedBufWriter {
    inner: Arc<Mutex<BufState>>,
}

impl AsyncWrite for SharedBufWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.inner.lock().unwrap().bytes.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.inner.lock().unwrap().shutdown = true;
        Poll::Ready(Ok(()))
    }
}

/// Execution trace shared between scripted steps and assertions.
pub(crate) type Trace = Arc<Mutex<Vec<&'static str>>>;

/// Creates an empty execution trace.
pub(crate) fn trace() -> Trace {
    Arc::new(Mutex::new(Vec::new()))
}

enum TraceMode {
    Ok,
    Fail,
    Abortable,
    Spawning(Box<dyn Fn(&WorkerTracker) + Send + Sync>),
}

/// Scripted step that appends its name to a trace when executed.
pub(crate) struct TraceStep {
    name: &'static str,
    log: Trace,
    mode: TraceMode,
}

impl TraceStep {
    pub(crate) fn ok(name: &'static str, log: &Trace) -> Self {
        Self {
            name,
            log: Arc::clone(log),
            mode: TraceMode::Ok,
        }
    }

    pub(crate) fn failing(name: &'static str, log: &Trace) -> Self {
        Self {
            name,
            log: Arc::clone(log),
            mode: TraceMode::Fail,
        }
    }

    /// Runs a trivial backend call through the cancellation race.
    pub(crate) fn abortable(name: &'static str, log: &Trace) -> Self {
        Self {
            name,
            log: Arc::clone(log),
            mode: TraceMode::Abortable,
        }
    }

    /// Invokes a callback with the worker tracker.
    pub(crate) fn spawning(
        name: &'static str,
        log: &Trace,
        spawn: impl Fn(&WorkerTracker) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            log: Arc::clone(log),
            mode: TraceMode::Spawning(Box::new(spawn)),
        }
    }
}

#[async_trait]
impl Step for TraceStep {
    fn name(&self) -> &str {
        self.name
    }

    async fn execute(&self, ctx: &StepContext) -> Result<()> {
        self.log.lock().unwrap().push(self.name);
        match &self.mode {
            TraceMode::Ok => Ok(()),
            TraceMode::Fail => Err(OrchestratorError::container_start_failed(
                self.name, "injected",
            )),
            TraceMode::Abortable => ctx.abortable(async { Ok(()) }).await,
            TraceMode::Spawning(spawn) => {
                spawn(ctx.workers());
                Ok(())
            }
        }
    }
}
