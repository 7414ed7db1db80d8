//! Error types for the orchestrator crate.

use std::fmt;

use thiserror::Error;

use crate::step::Phase;

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors that can occur during a single orchestration operation.
///
/// Every failure that involves a managed resource carries the resource
/// name so a run's error output is diagnosable without backend logs.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Container creation failed.
    #[error("failed to create container {name}: {reason}")]
    ContainerCreateFailed {
        /// The container name.
        name: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Container start failed.
    #[error("failed to start container {name}: {reason}")]
    ContainerStartFailed {
        /// The container name.
        name: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Container stop failed.
    #[error("failed to stop container {name}: {reason}")]
    ContainerStopFailed {
        /// The container name.
        name: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Container removal failed.
    #[error("failed to remove container {name}: {reason}")]
    ContainerRemoveFailed {
        /// The container name.
        name: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Network creation failed.
    #[error("failed to create network {name}: {reason}")]
    NetworkCreateFailed {
        /// The network name.
        name: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Image build failed.
    #[error("failed to build image {tag}: {reason}")]
    ImageBuildFailed {
        /// The image tag.
        tag: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Listing existing backend entities failed.
    #[error("failed listing {what}: {reason}")]
    ListFailed {
        /// What was being listed (containers, networks, images).
        what: &'static str,
        /// The reason for the failure.
        reason: String,
    },

    /// Opening a log stream failed.
    #[error("failed to open log stream for container {name}: {reason}")]
    LogStreamFailed {
        /// The container name.
        name: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Opening a stats stream failed.
    #[error("failed to open stats stream for container {name}: {reason}")]
    StatStreamFailed {
        /// The container name.
        name: String,
        /// The reason for the failure.
        reason: String,
    },

    /// A step needed a container id that was never assigned.
    #[error("container {0} has no assigned id")]
    MissingContainerId(String),

    /// A create step tried to assign an id twice.
    #[error("container {0} already has an assigned id")]
    IdAlreadyAssigned(String),

    /// The run was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Docker API error.
    #[error("Docker API error: {0}")]
    DockerApi(#[from] bollard::errors::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OrchestratorError {
    /// Creates a container-create failure.
    pub fn container_create_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ContainerCreateFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a container-start failure.
    pub fn container_start_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ContainerStartFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a container-stop failure.
    pub fn container_stop_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ContainerStopFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a container-remove failure.
    pub fn container_remove_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ContainerRemoveFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a network-create failure.
    pub fn network_create_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NetworkCreateFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates an image-build failure.
    pub fn image_build_failed(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ImageBuildFailed {
            tag: tag.into(),
            reason: reason.into(),
        }
    }

    /// Creates a list failure.
    pub fn list_failed(what: &'static str, reason: impl Into<String>) -> Self {
        Self::ListFailed {
            what,
            reason: reason.into(),
        }
    }

    /// Creates a log-stream failure.
    pub fn log_stream_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LogStreamFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a stats-stream failure.
    pub fn stat_stream_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StatStreamFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a missing-container-id failure.
    pub fn missing_container_id(name: impl Into<String>) -> Self {
        Self::MissingContainerId(name.into())
    }

    /// Returns true if this error was caused by run cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A step failure, tagged with the phase and step it occurred in.
#[derive(Debug, Error)]
#[error("{phase} step '{step}' failed: {error}")]
pub struct StepFailure {
    /// Phase the failing step belonged to.
    pub phase: Phase,
    /// Name of the failing step.
    pub step: String,
    /// The underlying failure.
    #[source]
    pub error: OrchestratorError,
}

/// Aggregate of every failure a run produced after setup completed.
///
/// Holds the remembered run failure (if any) followed by every post
/// failure, in the order they occurred. Nothing is dropped: skipping a
/// cleanup error would hide a possibly still-running container from
/// the operator.
#[derive(Debug)]
pub struct AggregateError {
    failures: Vec<StepFailure>,
}

impl AggregateError {
    pub(crate) fn new(failures: Vec<StepFailure>) -> Self {
        debug_assert!(!failures.is_empty());
        Self { failures }
    }

    /// All contained failures, in occurrence order.
    pub fn failures(&self) -> &[StepFailure] {
        &self.failures
    }

    /// The failures that occurred in the given phase.
    pub fn phase_failures(&self, phase: Phase) -> impl Iterator<Item = &StepFailure> {
        self.failures.iter().filter(move |f| f.phase == phase)
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures.first().map(|f| f as _)
    }
}

/// Terminal result of a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A pre step failed; run and post never executed.
    #[error("setup failed: {0}")]
    Setup(StepFailure),

    /// The run or post phase failed; cleanup was attempted in full.
    #[error("run aborted: {0}")]
    Aborted(AggregateError),
}
