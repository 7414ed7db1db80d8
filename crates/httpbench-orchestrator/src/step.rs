//! Steps and their execution context.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::backend::RuntimeBackend;
use crate::error::{OrchestratorError, Result};
use crate::plan::Plan;
use crate::sink::DiagnosticSink;
use crate::steps::WorkerTracker;

/// The pipeline phase a step runs in. Each phase has a distinct
/// failure-propagation policy (see [`crate::pipeline::Pipeline`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Setup: first failure aborts the whole run, nothing to clean up.
    Pre,
    /// Execution: first failure skips the rest of the phase but is
    /// remembered while cleanup runs.
    Run,
    /// Cleanup: always runs in full, failures aggregate.
    Post,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Pre => write!(f, "pre"),
            Phase::Run => write!(f, "run"),
            Phase::Post => write!(f, "post"),
        }
    }
}

/// One unit of work within a phase.
///
/// A step talks to the capability backend through the context and
/// mutates the shared [`Plan`] arena (assigning ids, claiming sinks).
/// Steps are executed strictly in registration order, one at a time;
/// only the streaming steps fork detached background workers.
#[async_trait]
pub trait Step: Send + Sync {
    /// Step name used in failure reports and logs.
    fn name(&self) -> &str;

    /// Executes the step.
    async fn execute(&self, ctx: &StepContext) -> Result<()>;
}

/// Execution context threaded through every step of a run.
#[derive(Clone)]
pub struct StepContext {
    backend: Arc<dyn RuntimeBackend>,
    plan: Arc<Plan>,
    cancel: CancellationToken,
    workers: WorkerTracker,
    diag: DiagnosticSink,
}

impl StepContext {
    pub(crate) fn new(
        backend: Arc<dyn RuntimeBackend>,
        plan: Arc<Plan>,
        cancel: CancellationToken,
        workers: WorkerTracker,
        diag: DiagnosticSink,
    ) -> Self {
        Self {
            backend,
            plan,
            cancel,
            workers,
            diag,
        }
    }

    /// The capability backend shared by all steps and workers.
    pub fn backend(&self) -> &dyn RuntimeBackend {
        self.backend.as_ref()
    }

    /// A cloneable handle to the backend, for background tasks.
    pub fn backend_arc(&self) -> Arc<dyn RuntimeBackend> {
        Arc::clone(&self.backend)
    }

    /// The shared resource arena.
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// The run's cancellation token.
    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Registration handle for detached background workers.
    pub fn workers(&self) -> &WorkerTracker {
        &self.workers
    }

    /// The shared diagnostic sink.
    pub fn diag(&self) -> DiagnosticSink {
        self.diag.clone()
    }

    /// Races a backend call against run cancellation.
    ///
    /// A cancelled call surfaces as an ordinary step failure, so the
    /// phase policy (post-phase cleanup included) applies unchanged.
    pub async fn abortable<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(OrchestratorError::Cancelled),
            result = fut => result,
        }
    }
}

impl fmt::Debug for StepContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("backend", &self.backend.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_display_is_lowercase() {
        assert_eq!(Phase::Pre.to_string(), "pre");
        assert_eq!(Phase::Run.to_string(), "run");
        assert_eq!(Phase::Post.to_string(), "post");
    }
}
