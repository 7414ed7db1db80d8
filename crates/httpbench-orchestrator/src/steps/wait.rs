//! The synchronization barrier between run and cleanup.

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::{OrchestratorError, Result};
use crate::plan::ContainerRef;
use crate::step::{Step, StepContext};

/// Blocks until every targeted container reaches a terminal state.
///
/// One listener runs per container; a listener's wait error is logged
/// and reported to the diagnostic sink, never returned, so one broken
/// wait cannot abandon the wait on the others. Cancellation unwinds
/// all listeners first, then surfaces as the step's failure.
///
/// This step is what makes it safe for post-phase stop and remove
/// steps to assume the workload containers have genuinely finished.
#[derive(Debug)]
pub struct WaitContainersStep {
    containers: Vec<ContainerRef>,
}

impl WaitContainersStep {
    /// Creates the step over the given containers.
    pub fn new(containers: Vec<ContainerRef>) -> Self {
        Self { containers }
    }
}

#[async_trait]
impl Step for WaitContainersStep {
    fn name(&self) -> &str {
        "wait-containers"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<()> {
        let mut listeners = JoinSet::new();

        for &r in &self.containers {
            let slot = ctx.plan().container(r);
            let id = slot
                .id()
                .await
                .ok_or_else(|| OrchestratorError::missing_container_id(slot.name()))?;

            let name = slot.name().to_string();
            let backend = ctx.backend_arc();
            let cancel = ctx.cancel().clone();
            let diag = ctx.diag();

            listeners.spawn(async move {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!(container = %name, "wait abandoned, run cancelled");
                    }
                    result = backend.wait_terminal(&id) => match result {
                        Ok(exit_code) => {
                            info!(container = %name, exit_code, "container reached terminal state");
                        }
                        Err(error) => {
                            warn!(container = %name, error = %error, "wait failed");
                            diag.report(&name, &error).await;
                        }
                    }
                }
            });
        }

        // Listener panics would be a bug in this crate; surface them.
        while let Some(joined) = listeners.join_next().await {
            joined.map_err(|e| std::io::Error::other(e.to_string()))?;
        }

        if ctx.cancel().is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }
        Ok(())
    }
}
