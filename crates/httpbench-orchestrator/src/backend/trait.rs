//! Capability backend trait definition.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::plan::ContainerSpec;

/// One frame of a multiplexed container log stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogChunk {
    /// Bytes the container wrote to stdout.
    Stdout(Bytes),
    /// Bytes the container wrote to stderr.
    Stderr(Bytes),
}

/// A live multiplexed log stream. Ends when the container stops
/// producing output or is removed.
pub type LogStream = Pin<Box<dyn Stream<Item = Result<LogChunk>> + Send>>;

/// A live stream of periodic telemetry snapshots, one encoded
/// snapshot per item.
pub type StatStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Summary of an existing container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSummary {
    /// Container id.
    pub id: String,
    /// Container names.
    pub names: Vec<String>,
}

/// Summary of an existing network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSummary {
    /// Network name.
    pub name: String,
    /// Network id.
    pub id: String,
}

/// Summary of an existing image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSummary {
    /// Repository tags attached to the image.
    pub repo_tags: Vec<String>,
}

/// The capability surface the pipeline needs from a container runtime.
///
/// Every method may block on the backend; cancellation is applied by
/// the caller racing the returned future against the run's token. No
/// retries happen at this layer; the backend is trusted to report
/// true failures, and steps wrap them with the resource name.
///
/// Implementations must be thread-safe: the handle is shared read-only
/// across the foreground pipeline and every background worker.
#[async_trait]
pub trait RuntimeBackend: Send + Sync {
    /// Creates a container from its spec, optionally attached to a
    /// named network. Returns the assigned container id.
    async fn create_container(
        &self,
        spec: &ContainerSpec,
        network: Option<&str>,
    ) -> Result<String>;

    /// Starts a created container.
    async fn start_container(&self, id: &str) -> Result<()>;

    /// Stops a running container.
    async fn stop_container(&self, id: &str) -> Result<()>;

    /// Removes a container.
    async fn remove_container(&self, id: &str) -> Result<()>;

    /// Lists existing containers, including stopped ones.
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>>;

    /// Lists existing networks.
    async fn list_networks(&self) -> Result<Vec<NetworkSummary>>;

    /// Lists existing images.
    async fn list_images(&self) -> Result<Vec<ImageSummary>>;

    /// Creates a network and returns its id.
    async fn create_network(&self, name: &str) -> Result<String>;

    /// Builds an image from a gzipped tar build context.
    async fn build_image(&self, tag: &str, build_context: Bytes) -> Result<()>;

    /// Opens a live, follow-mode log stream for a container.
    async fn container_logs(&self, id: &str) -> Result<LogStream>;

    /// Opens a live stream of periodic stats snapshots for a container.
    async fn container_stats(&self, id: &str) -> Result<StatStream>;

    /// Resolves once the container reaches a terminal (non-running)
    /// state, yielding its exit code.
    async fn wait_terminal(&self, id: &str) -> Result<i64>;

    /// Backend name, for logs and failure reports.
    fn name(&self) -> &str;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
