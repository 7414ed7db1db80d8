//! Provisioning steps: container lifecycle, networks, and images.
//!
//! Every step here loops over its records in registration order and
//! fails fast on the first error. Later records may depend on earlier
//! ones through shared network or image state, so attempting record
//! `i + 1` after record `i` failed would build on a broken foundation.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{OrchestratorError, Result};
use crate::plan::{ContainerRef, ImageRef, NetworkRef};
use crate::step::{Step, StepContext};

/// Rewraps a backend failure with resource context, leaving
/// cancellation untouched so it stays detectable upstream.
fn contextualize(
    error: OrchestratorError,
    wrap: impl FnOnce(String) -> OrchestratorError,
) -> OrchestratorError {
    if error.is_cancelled() {
        error
    } else {
        wrap(error.to_string())
    }
}

/// Creates every targeted container and records the assigned ids.
#[derive(Debug)]
pub struct CreateContainersStep {
    containers: Vec<ContainerRef>,
}

impl CreateContainersStep {
    /// Creates the step over the given containers.
    pub fn new(containers: Vec<ContainerRef>) -> Self {
        Self { containers }
    }
}

#[async_trait]
impl Step for CreateContainersStep {
    fn name(&self) -> &str {
        "create-containers"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<()> {
        for &r in &self.containers {
            let slot = ctx.plan().container(r);
            let spec = slot.spec();
            let network = spec.network.map(|n| ctx.plan().network(n).name().to_string());

            let id = ctx
                .abortable(ctx.backend().create_container(spec, network.as_deref()))
                .await
                .map_err(|e| {
                    contextualize(e, |reason| OrchestratorError::container_create_failed(&spec.name, reason))
                })?;

            slot.assign_id(id).await?;
        }
        Ok(())
    }
}

/// Starts every targeted container. Requires create to have run.
#[derive(Debug)]
pub struct StartContainersStep {
    containers: Vec<ContainerRef>,
}

impl StartContainersStep {
    /// Creates the step over the given containers.
    pub fn new(containers: Vec<ContainerRef>) -> Self {
        Self { containers }
    }
}

#[async_trait]
impl Step for StartContainersStep {
    fn name(&self) -> &str {
        "start-containers"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<()> {
        for &r in &self.containers {
            let slot = ctx.plan().container(r);
            let id = slot
                .id()
                .await
                .ok_or_else(|| OrchestratorError::missing_container_id(slot.name()))?;

            ctx.abortable(ctx.backend().start_container(&id))
                .await
                .map_err(|e| {
                    contextualize(e, |reason| OrchestratorError::container_start_failed(slot.name(), reason))
                })?;
        }
        Ok(())
    }
}

/// Stops every targeted container that was actually created.
///
/// A container without an assigned id never existed on the backend, so
/// it is skipped rather than treated as a failure. That keeps cleanup
/// meaningful when the run phase aborted mid-create.
#[derive(Debug)]
pub struct StopContainersStep {
    containers: Vec<ContainerRef>,
}

impl StopContainersStep {
    /// Creates the step over the given containers.
    pub fn new(containers: Vec<ContainerRef>) -> Self {
        Self { containers }
    }
}

#[async_trait]
impl Step for StopContainersStep {
    fn name(&self) -> &str {
        "stop-containers"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<()> {
        for &r in &self.containers {
            let slot = ctx.plan().container(r);
            let Some(id) = slot.id().await else {
                debug!(container = %slot.name(), "never created, skipping stop");
                continue;
            };

            ctx.backend().stop_container(&id).await.map_err(|e| {
                contextualize(e, |reason| OrchestratorError::container_stop_failed(slot.name(), reason))
            })?;
        }
        Ok(())
    }
}

/// Removes every targeted container that was actually created.
#[derive(Debug)]
pub struct RemoveContainersStep {
    containers: Vec<ContainerRef>,
}

impl RemoveContainersStep {
    /// Creates the step over the given containers.
    pub fn new(containers: Vec<ContainerRef>) -> Self {
        Self { containers }
    }
}

#[async_trait]
impl Step for RemoveContainersStep {
    fn name(&self) -> &str {
        "remove-containers"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<()> {
        for &r in &self.containers {
            let slot = ctx.plan().container(r);
            let Some(id) = slot.id().await else {
                debug!(container = %slot.name(), "never created, skipping remove");
                continue;
            };

            ctx.backend().remove_container(&id).await.map_err(|e| {
                contextualize(e, |reason| OrchestratorError::container_remove_failed(slot.name(), reason))
            })?;
        }
        Ok(())
    }
}

/// Resolves every targeted network, creating the ones that do not
/// already exist on the backend.
///
/// Idempotent: an existing network of the same name is adopted, its
/// backend id recorded in the plan for diagnosis.
#[derive(Debug)]
pub struct EnsureNetworksStep {
    networks: Vec<NetworkRef>,
}

impl EnsureNetworksStep {
    /// Creates the step over the given networks.
    pub fn new(networks: Vec<NetworkRef>) -> Self {
        Self { networks }
    }
}

#[async_trait]
impl Step for EnsureNetworksStep {
    fn name(&self) -> &str {
        "ensure-networks"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<()> {
        let existing = ctx
            .abortable(ctx.backend().list_networks())
            .await
            .map_err(|e| contextualize(e, |reason| OrchestratorError::list_failed("networks", reason)))?;

        for &r in &self.networks {
            let slot = ctx.plan().network(r);

            if let Some(net) = existing.iter().find(|n| n.name == slot.name()) {
                debug!(network = %slot.name(), id = %net.id, "network already exists");
                slot.assign_id(net.id.clone()).await;
                continue;
            }

            let id = ctx
                .abortable(ctx.backend().create_network(slot.name()))
                .await
                .map_err(|e| {
                    contextualize(e, |reason| OrchestratorError::network_create_failed(slot.name(), reason))
                })?;
            slot.assign_id(id).await;
        }
        Ok(())
    }
}

/// Builds every targeted image whose tag is missing on the backend.
///
/// Idempotent unless an image spec forces a rebuild, in which case the
/// build always runs.
#[derive(Debug)]
pub struct EnsureImagesStep {
    images: Vec<ImageRef>,
}

impl EnsureImagesStep {
    /// Creates the step over the given images.
    pub fn new(images: Vec<ImageRef>) -> Self {
        Self { images }
    }
}

#[async_trait]
impl Step for EnsureImagesStep {
    fn name(&self) -> &str {
        "ensure-images"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<()> {
        let existing = ctx
            .abortable(ctx.backend().list_images())
            .await
            .map_err(|e| contextualize(e, |reason| OrchestratorError::list_failed("images", reason)))?;

        let tags: HashSet<&str> = existing
            .iter()
            .flat_map(|i| i.repo_tags.iter().map(String::as_str))
            .collect();

        for &r in &self.images {
            let image = ctx.plan().image(r);

            if !image.rebuild && tags.contains(image.tag.as_str()) {
                debug!(image = %image.tag, "image already exists");
                continue;
            }

            info!(image = %image.tag, rebuild = image.rebuild, "building image");
            ctx.abortable(
                ctx.backend()
                    .build_image(&image.tag, image.build_context.clone()),
            )
            .await
            .map_err(|e| match e {
                already @ OrchestratorError::ImageBuildFailed { .. } => already,
                other => {
                    contextualize(other, |reason| OrchestratorError::image_build_failed(&image.tag, reason))
                }
            })?;
        }
        Ok(())
    }
}
