//! Capability backends.
//!
//! The pipeline drives containers through the [`RuntimeBackend`]
//! trait; [`DockerBackend`] implements it against a local Docker
//! daemon. Tests inject a fake implementing the same contract.

mod docker;
mod r#trait;

pub use docker::DockerBackend;
pub use r#trait::{
    ContainerSummary, ImageSummary, LogChunk, LogStream, NetworkSummary, RuntimeBackend,
    StatStream,
};
