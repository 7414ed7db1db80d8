//! The benchmark scenario: which containers run, how they are wired,
//! and where their telemetry lands.
//!
//! One run provisions six containers on a dedicated network: four
//! clients covering every combination of HTTP version (1, 2) and body
//! handling (drain, discard), plus one server per body mode so the
//! server-side cost of each mode is measured in isolation. Each client
//! gets a log file and a stats file in the run's output directory;
//! servers get a stats file only.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use httpbench_orchestrator::{ContainerRef, ContainerSpec, ImageRef, ImageSpec, NetworkRef, Plan};
use tracing::info;

const NETWORK_NAME: &str = "http-bench-network";
const CLIENT_IMAGE: &str = "bench-client:latest";
const SERVER_IMAGE: &str = "bench-server:latest";
const SERVER_PORT: u16 = 8080;

/// Benchmark run configuration, loaded from the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "httpbench-runner", about = "Run the containerized HTTP benchmark", version)]
pub struct RunConfig {
    /// Prefix applied to every created resource name, for running
    /// multiple benchmarks against one daemon.
    #[arg(long, env = "RESOURCE_PREFIX", default_value = "")]
    pub resource_prefix: String,

    /// Requests each client sends.
    #[arg(long, env = "NUMBER_OF_REQUESTS", default_value_t = 1000)]
    pub number_of_requests: u64,

    /// Response size in bytes the clients ask the servers for.
    #[arg(long, env = "RESPONSE_LENGTH", default_value_t = 1000)]
    pub response_length: u64,

    /// Rebuild the workload images even if their tags already exist.
    #[arg(long, env = "FORCE_IMAGE_REBUILD", default_value_t = false)]
    pub force_image_rebuild: bool,

    /// Directory the run's telemetry files are written under.
    #[arg(long, env = "OUTPUT_DIRECTORY", default_value = "benchresults")]
    pub output_directory: PathBuf,
}

impl RunConfig {
    fn prefixed(&self, name: &str) -> String {
        format!("{}{}", self.resource_prefix, name)
    }
}

/// A fully wired benchmark run: the plan plus the handle groups the
/// pipeline steps operate on.
#[derive(Debug)]
pub struct Scenario {
    /// The resource arena.
    pub plan: Arc<Plan>,
    /// The four client containers, the ones the run waits on.
    pub clients: Vec<ContainerRef>,
    /// Every container, clients first.
    pub all_containers: Vec<ContainerRef>,
    /// The benchmark network.
    pub networks: Vec<NetworkRef>,
    /// The two workload images.
    pub images: Vec<ImageRef>,
    /// Where this run's telemetry files land.
    pub output_dir: PathBuf,
}

/// Builds the scenario, creating the timestamped output directory and
/// its telemetry files.
pub async fn build(
    config: &RunConfig,
    client_context: Bytes,
    server_context: Bytes,
) -> Result<Scenario> {
    let timestamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
    let output_dir = config.output_directory.join(timestamp.to_string());
    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("failed to create output directory {}", output_dir.display()))?;
    info!(dir = %output_dir.display(), "writing results");

    let mut plan = Plan::builder();
    let network = plan.network(config.prefixed(NETWORK_NAME));
    let client_image = plan.image(
        ImageSpec::new(config.prefixed(CLIENT_IMAGE), client_context)
            .rebuild(config.force_image_rebuild),
    );
    let server_image = plan.image(
        ImageSpec::new(config.prefixed(SERVER_IMAGE), server_context)
            .rebuild(config.force_image_rebuild),
    );

    // One client per combination of HTTP version and body handling.
    // Clients that drain the body target server-1, the rest server-0,
    // so each server only ever sees one body mode.
    let mut clients = Vec::new();
    for (http_version, drain) in [(1, true), (2, true), (1, false), (2, false)] {
        let server_name = config.prefixed(&format!("server-{}", u8::from(drain)));
        let name = config.prefixed(&format!(
            "client-http-{}-drain-{}",
            http_version,
            u8::from(drain)
        ));

        let spec = ContainerSpec::builder(&name, config.prefixed(CLIENT_IMAGE))
            .env(
                "TARGET_ENDPOINT_URI",
                format!(
                    "http://{server_name}:{SERVER_PORT}/{}",
                    config.response_length
                ),
            )
            .env("CLIENT_HTTP_VERSION", http_version)
            .env("MUST_DRAIN_AND_CLOSE", drain)
            .env("NUMBER_OF_REQUESTS", config.number_of_requests)
            .network(network)
            .build();

        let log_sink = sink_file(&output_dir, &format!("{name}-logs.jsonl")).await?;
        let stat_sink = sink_file(&output_dir, &format!("{name}-stats.jsonl")).await?;
        clients.push(plan.container(spec, Some(log_sink), Some(stat_sink)));
    }

    let mut all_containers = clients.clone();
    for i in 0..2u8 {
        let name = config.prefixed(&format!("server-{i}"));
        let spec = ContainerSpec::builder(&name, config.prefixed(SERVER_IMAGE))
            .env("TEST_SERVER_PORT", SERVER_PORT)
            .network(network)
            .build();

        let stat_sink = sink_file(&output_dir, &format!("{name}-stats.jsonl")).await?;
        all_containers.push(plan.container(spec, None, Some(stat_sink)));
    }

    Ok(Scenario {
        plan: plan.build(),
        clients,
        all_containers,
        networks: vec![network],
        images: vec![client_image, server_image],
        output_dir,
    })
}

async fn sink_file(
    dir: &std::path::Path,
    name: &str,
) -> Result<httpbench_orchestrator::TelemetrySink> {
    let path = dir.join(name);
    let file = tokio::fs::File::create(&path)
        .await
        .with_context(|| format!("failed to create telemetry file {}", path.display()))?;
    Ok(Box::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(output: PathBuf) -> RunConfig {
        RunConfig {
            resource_prefix: "test-".to_string(),
            number_of_requests: 10,
            response_length: 256,
            force_image_rebuild: false,
            output_directory: output,
        }
    }

    #[tokio::test]
    async fn scenario_wires_six_containers_on_one_network() {
        let dir = tempfile::tempdir().unwrap();
        let scenario = build(&config(dir.path().into()), Bytes::new(), Bytes::new())
            .await
            .unwrap();

        assert_eq!(scenario.clients.len(), 4);
        assert_eq!(scenario.all_containers.len(), 6);
        assert_eq!(scenario.networks.len(), 1);
        assert_eq!(scenario.images.len(), 2);

        let network = scenario.plan.network(scenario.networks[0]);
        assert_eq!(network.name(), "test-http-bench-network");

        for &c in &scenario.all_containers {
            let spec = scenario.plan.container(c).spec();
            assert_eq!(spec.network, Some(scenario.networks[0]));
            assert!(spec.name.starts_with("test-"));
        }
    }

    #[tokio::test]
    async fn drain_clients_target_the_drain_server() {
        let dir = tempfile::tempdir().unwrap();
        let scenario = build(&config(dir.path().into()), Bytes::new(), Bytes::new())
            .await
            .unwrap();

        let drain_client = scenario.plan.container(scenario.clients[0]).spec();
        assert_eq!(drain_client.name, "test-client-http-1-drain-1");
        assert!(drain_client
            .env
            .contains(&"TARGET_ENDPOINT_URI=http://test-server-1:8080/256".to_string()));
        assert!(drain_client
            .env
            .contains(&"MUST_DRAIN_AND_CLOSE=true".to_string()));

        let discard_client = scenario.plan.container(scenario.clients[3]).spec();
        assert_eq!(discard_client.name, "test-client-http-2-drain-0");
        assert!(discard_client
            .env
            .contains(&"TARGET_ENDPOINT_URI=http://test-server-0:8080/256".to_string()));
        assert!(discard_client
            .env
            .contains(&"CLIENT_HTTP_VERSION=2".to_string()));
    }

    #[tokio::test]
    async fn telemetry_files_are_created_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let scenario = build(&config(dir.path().into()), Bytes::new(), Bytes::new())
            .await
            .unwrap();

        let mut files: Vec<String> = std::fs::read_dir(&scenario.output_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        files.sort();

        // 4 clients x 2 files + 2 servers x 1 file.
        assert_eq!(files.len(), 10);
        assert!(files.contains(&"test-client-http-2-drain-1-logs.jsonl".to_string()));
        assert!(files.contains(&"test-server-0-stats.jsonl".to_string()));
    }
}
