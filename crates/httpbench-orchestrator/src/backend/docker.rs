//! Docker backend implementation.
//!
//! Implements [`RuntimeBackend`] against a local Docker daemon via
//! bollard.

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, StatsOptions, StopContainerOptions,
    WaitContainerOptions,
};
use bollard::image::{BuildImageOptions, ListImagesOptions};
use bollard::network::{CreateNetworkOptions, ListNetworksOptions};
use bollard::service::HostConfig;
use bollard::Docker;
use bytes::Bytes;
use futures::StreamExt;
use tracing::{debug, info};

use crate::backend::r#trait::{
    ContainerSummary, ImageSummary, LogChunk, LogStream, NetworkSummary, RuntimeBackend,
    StatStream,
};
use crate::error::{OrchestratorError, Result};
use crate::plan::ContainerSpec;

/// Seconds a container gets to exit gracefully before the daemon kills it.
const STOP_TIMEOUT_SECS: i64 = 10;

/// Docker capability backend.
pub struct DockerBackend {
    docker: Docker,
}

impl DockerBackend {
    /// Connects to the local Docker daemon and verifies the connection.
    pub async fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        docker.ping().await?;
        info!("connected to Docker daemon");
        Ok(Self { docker })
    }
}

#[async_trait]
impl RuntimeBackend for DockerBackend {
    async fn create_container(
        &self,
        spec: &ContainerSpec,
        network: Option<&str>,
    ) -> Result<String> {
        let host_config = network.map(|net| HostConfig {
            network_mode: Some(net.to_string()),
            ..Default::default()
        });

        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            host_config,
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.as_str(),
            platform: None,
        };

        let response = self.docker.create_container(Some(options), config).await?;
        info!(container = %spec.name, id = %response.id, "created container");
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await?;
        info!(id = %id, "started container");
        Ok(())
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        let options = StopContainerOptions {
            t: STOP_TIMEOUT_SECS,
        };
        self.docker.stop_container(id, Some(options)).await?;
        info!(id = %id, "stopped container");
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker.remove_container(id, Some(options)).await?;
        info!(id = %id, "removed container");
        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };
        let summaries = self.docker.list_containers(Some(options)).await?;

        Ok(summaries
            .into_iter()
            .filter_map(|c| {
                Some(ContainerSummary {
                    id: c.id?,
                    names: c.names.unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn list_networks(&self) -> Result<Vec<NetworkSummary>> {
        let networks = self
            .docker
            .list_networks(None::<ListNetworksOptions<String>>)
            .await?;

        Ok(networks
            .into_iter()
            .filter_map(|n| {
                Some(NetworkSummary {
                    name: n.name?,
                    id: n.id?,
                })
            })
            .collect())
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>> {
        let options = ListImagesOptions::<String> {
            all: true,
            ..Default::default()
        };
        let images = self.docker.list_images(Some(options)).await?;

        Ok(images
            .into_iter()
            .map(|i| ImageSummary {
                repo_tags: i.repo_tags,
            })
            .collect())
    }

    async fn create_network(&self, name: &str) -> Result<String> {
        let options = CreateNetworkOptions {
            name,
            ..Default::default()
        };
        let response = self.docker.create_network(options).await?;
        if response.id.is_empty() {
            return Err(OrchestratorError::network_create_failed(
                name,
                "no id returned",
            ));
        }
        info!(network = %name, id = %response.id, "created network");
        Ok(response.id)
    }

    async fn build_image(&self, tag: &str, build_context: Bytes) -> Result<()> {
        let options = BuildImageOptions {
            t: tag,
            rm: true,
            ..Default::default()
        };

        let mut stream = self
            .docker
            .build_image(options, None, Some(build_context));

        while let Some(item) = stream.next().await {
            let progress = item?;
            if let Some(error) = progress.error {
                return Err(OrchestratorError::image_build_failed(tag, error));
            }
            if let Some(message) = progress.stream {
                debug!(image = %tag, message = %message.trim_end(), "build progress");
            }
        }

        info!(image = %tag, "built image");
        Ok(())
    }

    async fn container_logs(&self, id: &str) -> Result<LogStream> {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        let stream = self.docker.logs(id, Some(options)).filter_map(|item| async move {
            match item {
                Ok(LogOutput::StdErr { message }) => Some(Ok(LogChunk::Stderr(message))),
                Ok(LogOutput::StdOut { message }) | Ok(LogOutput::Console { message }) => {
                    Some(Ok(LogChunk::Stdout(message)))
                }
                Ok(LogOutput::StdIn { .. }) => None,
                Err(e) => Some(Err(OrchestratorError::DockerApi(e))),
            }
        });

        Ok(Box::pin(stream))
    }

    async fn container_stats(&self, id: &str) -> Result<StatStream> {
        let options = StatsOptions {
            stream: true,
            one_shot: false,
        };

        let stream = self.docker.stats(id, Some(options)).map(|item| {
            let stats = item?;
            let mut line = serde_json::to_vec(&stats)?;
            line.push(b'\n');
            Ok(Bytes::from(line))
        });

        Ok(Box::pin(stream))
    }

    async fn wait_terminal(&self, id: &str) -> Result<i64> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };
        let mut stream = self.docker.wait_container(id, Some(options));

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // A non-zero exit is a terminal state, not a wait failure.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(e.into()),
            None => Ok(0),
        }
    }

    fn name(&self) -> &str {
        "docker"
    }

    async fn ping(&self) -> Result<()> {
        self.docker.ping().await?;
        Ok(())
    }
}

impl std::fmt::Debug for DockerBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerBackend").finish_non_exhaustive()
    }
}
