//! Telemetry sinks.
//!
//! A sink is any async write destination a container's telemetry is
//! copied into (typically a file in the run's output directory). Sinks
//! are supplied by the caller but closed by the pipeline: whichever
//! step takes a sink out of the plan owns shutting it down, exactly
//! once.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// A write destination for streamed telemetry.
pub type TelemetrySink = Box<dyn AsyncWrite + Send + Unpin>;

/// Shared best-effort writer for out-of-band diagnostics.
///
/// Receives the demultiplexed stderr frames of every log stream plus
/// one line per background-worker failure. Streaming errors go here
/// instead of the pipeline result: they occur after the forking step
/// already returned, and partial telemetry loss is non-fatal to the
/// run (the foreground failure policy is unaffected).
#[derive(Clone)]
pub struct DiagnosticSink {
    inner: Arc<Mutex<TelemetrySink>>,
}

impl DiagnosticSink {
    /// Creates a diagnostic sink over an arbitrary writer.
    pub fn new(sink: TelemetrySink) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sink)),
        }
    }

    /// Creates a diagnostic sink over the process stderr.
    pub fn stderr() -> Self {
        Self::new(Box::new(tokio::io::stderr()))
    }

    /// Writes raw bytes, ignoring write errors.
    pub async fn write(&self, bytes: &[u8]) {
        let mut sink = self.inner.lock().await;
        if let Err(error) = sink.write_all(bytes).await {
            tracing::debug!(error = %error, "diagnostic sink write failed");
        }
    }

    /// Reports a background-worker failure for a named container.
    pub async fn report(&self, container: &str, error: &crate::error::OrchestratorError) {
        tracing::warn!(container = %container, error = %error, "background worker failed");
        let line = format!("worker error for container {container}: {error}\n");
        self.write(line.as_bytes()).await;
    }
}

impl std::fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticSink").finish_non_exhaustive()
    }
}
