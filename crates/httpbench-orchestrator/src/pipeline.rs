//! The phased execution pipeline.
//!
//! A [`Pipeline`] holds three ordered step lists and runs them with a
//! per-phase failure policy:
//!
//! * **pre**: setup. The first failure aborts the entire run; nothing
//!   has been provisioned yet, so there is nothing to clean up.
//! * **run**: execution. The first failure skips the remaining run
//!   steps but is remembered while cleanup proceeds.
//! * **post**: cleanup. Every step runs regardless of earlier
//!   failures, and every failure is kept.
//!
//! After the post phase the pipeline waits for all detached background
//! workers (log and stats copiers) to finish before returning, so the
//! caller can flush output files knowing no writer is still alive.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backend::RuntimeBackend;
use crate::error::{AggregateError, PipelineError, StepFailure};
use crate::plan::Plan;
use crate::sink::DiagnosticSink;
use crate::step::{Phase, Step, StepContext};
use crate::steps::worker_channel;

/// An ordered, phased collection of steps.
pub struct Pipeline {
    pre: Vec<Box<dyn Step>>,
    run: Vec<Box<dyn Step>>,
    post: Vec<Box<dyn Step>>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Runs the pipeline against a plan.
    ///
    /// Cancelling `cancel` makes the next cancellation-aware backend
    /// call fail; the failure flows through the ordinary phase policy,
    /// so cleanup still runs in full.
    pub async fn run(
        &self,
        backend: Arc<dyn RuntimeBackend>,
        plan: Arc<Plan>,
        cancel: CancellationToken,
        diag: DiagnosticSink,
    ) -> Result<(), PipelineError> {
        let (workers, waiter) = worker_channel();
        let ctx = StepContext::new(backend, plan, cancel, workers, diag);

        for step in &self.pre {
            info!(phase = %Phase::Pre, step = %step.name(), "executing step");
            if let Err(error) = step.execute(&ctx).await {
                warn!(phase = %Phase::Pre, step = %step.name(), error = %error, "step failed");
                return Err(PipelineError::Setup(StepFailure {
                    phase: Phase::Pre,
                    step: step.name().to_string(),
                    error,
                }));
            }
        }

        let mut failures = Vec::new();

        for step in &self.run {
            info!(phase = %Phase::Run, step = %step.name(), "executing step");
            if let Err(error) = step.execute(&ctx).await {
                warn!(phase = %Phase::Run, step = %step.name(), error = %error, "step failed, skipping rest of run phase");
                failures.push(StepFailure {
                    phase: Phase::Run,
                    step: step.name().to_string(),
                    error,
                });
                break;
            }
        }

        for step in &self.post {
            info!(phase = %Phase::Post, step = %step.name(), "executing step");
            if let Err(error) = step.execute(&ctx).await {
                warn!(phase = %Phase::Post, step = %step.name(), error = %error, "step failed, continuing cleanup");
                failures.push(StepFailure {
                    phase: Phase::Post,
                    step: step.name().to_string(),
                    error,
                });
            }
        }

        // The context holds the last worker registration handle; drop
        // it so the waiter completes once every worker has exited.
        drop(ctx);
        waiter.wait().await;

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Aborted(AggregateError::new(failures)))
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("pre", &self.pre.len())
            .field("run", &self.run.len())
            .field("post", &self.post.len())
            .finish()
    }
}

/// Builder for [`Pipeline`]. Steps execute within each phase in the
/// order they were added.
#[derive(Default)]
pub struct PipelineBuilder {
    pre: Vec<Box<dyn Step>>,
    run: Vec<Box<dyn Step>>,
    post: Vec<Box<dyn Step>>,
}

impl PipelineBuilder {
    /// Appends a setup step.
    pub fn pre(mut self, step: impl Step + 'static) -> Self {
        self.pre.push(Box::new(step));
        self
    }

    /// Appends an execution step.
    pub fn run(mut self, step: impl Step + 'static) -> Self {
        self.run.push(Box::new(step));
        self
    }

    /// Appends a cleanup step.
    pub fn post(mut self, step: impl Step + 'static) -> Self {
        self.post.push(Box::new(step));
        self
    }

    /// Builds the pipeline.
    pub fn build(self) -> Pipeline {
        Pipeline {
            pre: self.pre,
            run: self.run,
            post: self.post,
        }
    }
}
