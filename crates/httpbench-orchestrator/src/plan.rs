//! The resource model for a single run.
//!
//! A [`Plan`] is an arena of container, network, and image records.
//! Steps address entries through typed index handles ([`ContainerRef`],
//! [`NetworkRef`], [`ImageRef`]) instead of capturing pointers, so the
//! mutation a step performs (id assignment, sink consumption) is
//! visible to every later step through the shared arena.
//!
//! Declared state (specs) is immutable once the plan is built. Observed
//! state is limited to the backend-assigned ids, written exactly once
//! by the corresponding create/ensure step, and the telemetry sinks,
//! which are *taken* by whichever step consumes them so a sink can
//! never be closed twice.

use std::sync::Arc;
use std::sync::Mutex;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{OrchestratorError, Result};
use crate::sink::TelemetrySink;

/// Index of a container record in a [`Plan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerRef(pub(crate) usize);

/// Index of a network record in a [`Plan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkRef(pub(crate) usize);

/// Index of an image record in a [`Plan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef(pub(crate) usize);

/// Declared configuration of a benchmark container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container name, unique within the run.
    pub name: String,

    /// Image reference the container runs.
    pub image: String,

    /// Environment variables as `KEY=VALUE` pairs.
    pub env: Vec<String>,

    /// Network the container attaches to, if any.
    pub network: Option<NetworkRef>,
}

impl ContainerSpec {
    /// Creates a new spec builder.
    pub fn builder(name: impl Into<String>, image: impl Into<String>) -> ContainerSpecBuilder {
        ContainerSpecBuilder {
            spec: ContainerSpec {
                name: name.into(),
                image: image.into(),
                env: Vec::new(),
                network: None,
            },
        }
    }
}

/// Builder for [`ContainerSpec`].
#[derive(Debug)]
pub struct ContainerSpecBuilder {
    spec: ContainerSpec,
}

impl ContainerSpecBuilder {
    /// Adds an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl std::fmt::Display) -> Self {
        self.spec.env.push(format!("{}={}", key.into(), value));
        self
    }

    /// Attaches the container to a network.
    pub fn network(mut self, network: NetworkRef) -> Self {
        self.spec.network = Some(network);
        self
    }

    /// Builds the spec.
    pub fn build(self) -> ContainerSpec {
        self.spec
    }
}

/// A container record: declared spec plus observed state.
pub struct ContainerSlot {
    spec: ContainerSpec,
    id: RwLock<Option<String>>,
    log_sink: Mutex<Option<TelemetrySink>>,
    stat_sink: Mutex<Option<TelemetrySink>>,
}

impl ContainerSlot {
    fn new(
        spec: ContainerSpec,
        log_sink: Option<TelemetrySink>,
        stat_sink: Option<TelemetrySink>,
    ) -> Self {
        Self {
            spec,
            id: RwLock::new(None),
            log_sink: Mutex::new(log_sink),
            stat_sink: Mutex::new(stat_sink),
        }
    }

    /// Returns the declared spec.
    pub fn spec(&self) -> &ContainerSpec {
        &self.spec
    }

    /// Returns the container name.
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Returns the backend-assigned id, if the container was created.
    pub async fn id(&self) -> Option<String> {
        self.id.read().await.clone()
    }

    /// Records the backend-assigned id. Fails if one is already set.
    pub async fn assign_id(&self, id: impl Into<String>) -> Result<()> {
        let mut slot = self.id.write().await;
        if slot.is_some() {
            return Err(OrchestratorError::IdAlreadyAssigned(self.spec.name.clone()));
        }
        *slot = Some(id.into());
        Ok(())
    }

    /// Whether an unclaimed log sink is present.
    pub fn has_log_sink(&self) -> bool {
        self.log_sink
            .lock()
            .expect("log sink lock poisoned")
            .is_some()
    }

    /// Whether an unclaimed stat sink is present.
    pub fn has_stat_sink(&self) -> bool {
        self.stat_sink
            .lock()
            .expect("stat sink lock poisoned")
            .is_some()
    }

    /// Takes ownership of the log sink. Returns `None` if the
    /// container has no log sink or it was already claimed.
    pub fn take_log_sink(&self) -> Option<TelemetrySink> {
        self.log_sink.lock().expect("log sink lock poisoned").take()
    }

    /// Takes ownership of the stat sink. Returns `None` if the
    /// container has no stat sink or it was already claimed.
    pub fn take_stat_sink(&self) -> Option<TelemetrySink> {
        self.stat_sink
            .lock()
            .expect("stat sink lock poisoned")
            .take()
    }
}

impl std::fmt::Debug for ContainerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerSlot")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// A network record. The name is caller-supplied and stable; the id is
/// assigned by the ensure-network step, reusing an existing network of
/// the same name when one exists.
#[derive(Debug)]
pub struct NetworkSlot {
    name: String,
    id: RwLock<Option<String>>,
}

impl NetworkSlot {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: RwLock::new(None),
        }
    }

    /// Returns the network name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the assigned network id, if resolved.
    pub async fn id(&self) -> Option<String> {
        self.id.read().await.clone()
    }

    /// Records the network id resolved by the ensure step.
    pub async fn assign_id(&self, id: impl Into<String>) {
        *self.id.write().await = Some(id.into());
    }
}

/// Declared image: a tag plus the gzipped tar build context producing it.
#[derive(Debug, Clone)]
pub struct ImageSpec {
    /// Image tag.
    pub tag: String,

    /// Rebuild even if an image with this tag already exists.
    pub rebuild: bool,

    /// Gzipped tar build context.
    pub build_context: Bytes,
}

impl ImageSpec {
    /// Creates an image spec.
    pub fn new(tag: impl Into<String>, build_context: Bytes) -> Self {
        Self {
            tag: tag.into(),
            rebuild: false,
            build_context,
        }
    }

    /// Forces a rebuild even when the tag already exists.
    pub fn rebuild(mut self, rebuild: bool) -> Self {
        self.rebuild = rebuild;
        self
    }
}

/// The resource arena for one run.
#[derive(Debug)]
pub struct Plan {
    containers: Vec<ContainerSlot>,
    networks: Vec<NetworkSlot>,
    images: Vec<ImageSpec>,
}

impl Plan {
    /// Creates a new plan builder.
    pub fn builder() -> PlanBuilder {
        PlanBuilder::default()
    }

    /// Returns the container record for a handle.
    pub fn container(&self, r: ContainerRef) -> &ContainerSlot {
        &self.containers[r.0]
    }

    /// Returns the network record for a handle.
    pub fn network(&self, r: NetworkRef) -> &NetworkSlot {
        &self.networks[r.0]
    }

    /// Returns the image record for a handle.
    pub fn image(&self, r: ImageRef) -> &ImageSpec {
        &self.images[r.0]
    }

    /// Handles to every container, in registration order.
    pub fn container_refs(&self) -> Vec<ContainerRef> {
        (0..self.containers.len()).map(ContainerRef).collect()
    }

    /// Handles to every network, in registration order.
    pub fn network_refs(&self) -> Vec<NetworkRef> {
        (0..self.networks.len()).map(NetworkRef).collect()
    }

    /// Handles to every image, in registration order.
    pub fn image_refs(&self) -> Vec<ImageRef> {
        (0..self.images.len()).map(ImageRef).collect()
    }
}

/// Append-only builder for a [`Plan`].
#[derive(Debug, Default)]
pub struct PlanBuilder {
    containers: Vec<ContainerSlot>,
    networks: Vec<NetworkSlot>,
    images: Vec<ImageSpec>,
}

impl PlanBuilder {
    /// Registers a network and returns its handle.
    pub fn network(&mut self, name: impl Into<String>) -> NetworkRef {
        self.networks.push(NetworkSlot::new(name));
        NetworkRef(self.networks.len() - 1)
    }

    /// Registers an image and returns its handle.
    pub fn image(&mut self, spec: ImageSpec) -> ImageRef {
        self.images.push(spec);
        ImageRef(self.images.len() - 1)
    }

    /// Registers a container with optional telemetry sinks and returns
    /// its handle.
    pub fn container(
        &mut self,
        spec: ContainerSpec,
        log_sink: Option<TelemetrySink>,
        stat_sink: Option<TelemetrySink>,
    ) -> ContainerRef {
        self.containers
            .push(ContainerSlot::new(spec, log_sink, stat_sink));
        ContainerRef(self.containers.len() - 1)
    }

    /// Builds the immutable plan.
    pub fn build(self) -> Arc<Plan> {
        Arc::new(Plan {
            containers: self.containers,
            networks: self.networks,
            images: self.images,
        })
    }
}
