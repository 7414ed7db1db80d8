//! Sink lifecycle backstop.

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::Result;
use crate::plan::ContainerRef;
use crate::step::{Step, StepContext};

/// Closes every sink the streaming steps never claimed.
///
/// A streaming worker closes the sink it took out of the plan; this
/// step picks up the rest, so every sink is shut down exactly once no
/// matter how far the run got before failing. It attempts every sink
/// even after a close fails, returning the first failure at the end.
#[derive(Debug)]
pub struct CloseSinksStep {
    containers: Vec<ContainerRef>,
}

impl CloseSinksStep {
    /// Creates the step over the given containers.
    pub fn new(containers: Vec<ContainerRef>) -> Self {
        Self { containers }
    }
}

#[async_trait]
impl Step for CloseSinksStep {
    fn name(&self) -> &str {
        "close-sinks"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<()> {
        let mut first_error = None;

        for &r in &self.containers {
            let slot = ctx.plan().container(r);

            for (kind, sink) in [
                ("log", slot.take_log_sink()),
                ("stats", slot.take_stat_sink()),
            ] {
                let Some(mut sink) = sink else { continue };
                debug!(container = %slot.name(), kind, "closing unclaimed sink");
                if let Err(error) = sink.shutdown().await {
                    if first_error.is_none() {
                        first_error = Some(error.into());
                    }
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{ContainerSpec, Plan};
    use crate::testutil::{context, FakeBackend, SharedBuf};
    use std::sync::Arc;

    #[tokio::test]
    async fn closes_only_unclaimed_sinks() {
        let claimed = SharedBuf::default();
        let unclaimed = SharedBuf::default();

        let mut builder = Plan::builder();
        let c = builder.container(
            ContainerSpec::builder("client-1", "client:latest").build(),
            Some(claimed.sink()),
            Some(unclaimed.sink()),
        );
        let plan = builder.build();

        // Simulate a streaming step having taken the log sink.
        let taken = plan.container(c).take_log_sink();
        assert!(taken.is_some());
        drop(taken);

        let ctx = context(Arc::new(FakeBackend::default()), plan);
        CloseSinksStep::new(vec![c]).execute(&ctx).await.unwrap();

        assert!(unclaimed.is_shutdown());
        assert!(!claimed.is_shutdown());
    }

    #[tokio::test]
    async fn running_twice_is_harmless() {
        let buf = SharedBuf::default();

        let mut builder = Plan::builder();
        let c = builder.container(
            ContainerSpec::builder("client-1", "client:latest").build(),
            Some(buf.sink()),
            None,
        );
        let plan = builder.build();

        let ctx = context(Arc::new(FakeBackend::default()), plan);
        let step = CloseSinksStep::new(vec![c]);
        step.execute(&ctx).await.unwrap();
        step.execute(&ctx).await.unwrap();

        assert!(buf.is_shutdown());
    }
}
