//! HTTP benchmark runner.
//!
//! Builds the workload binaries, packages them into container images,
//! and drives the full benchmark pipeline against a local Docker
//! daemon: four HTTP clients (every combination of HTTP version and
//! body handling) hammering two servers over a dedicated network,
//! with per-container logs and stats streamed into a timestamped
//! results directory.
//!
//! ```bash
//! # Defaults: 1000 requests, 1000-byte responses, ./benchresults
//! httpbench-runner
//!
//! # Customize through the environment
//! NUMBER_OF_REQUESTS=5000 RESPONSE_LENGTH=65536 FORCE_IMAGE_REBUILD=true httpbench-runner
//! ```
//!
//! Interrupting the run (Ctrl-C) cancels in-flight work but still
//! tears down every container that was created.

mod artifacts;
mod scenario;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use httpbench_orchestrator::{
    backend::DockerBackend,
    steps::{
        CloseSinksStep, CreateContainersStep, EnsureImagesStep, EnsureNetworksStep,
        RemoveContainersStep, StartContainersStep, StopContainersStep, StreamLogsStep,
        StreamStatsStep, WaitContainersStep,
    },
    DiagnosticSink, Pipeline, PipelineError,
};
use scenario::RunConfig;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    let config = RunConfig::parse();

    let binaries = artifacts::build_workload_binaries().await?;
    let client_context = artifacts::build_context(&binaries.client)?;
    let server_context = artifacts::build_context(&binaries.server)?;

    let scenario = scenario::build(&config, client_context, server_context).await?;

    let backend = Arc::new(
        DockerBackend::connect()
            .await
            .context("failed to connect to Docker")?,
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            interrupt.cancel();
        }
    });

    let pipeline = Pipeline::builder()
        .pre(EnsureImagesStep::new(scenario.images.clone()))
        .pre(EnsureNetworksStep::new(scenario.networks.clone()))
        .run(CreateContainersStep::new(scenario.all_containers.clone()))
        .run(StreamStatsStep::new(scenario.all_containers.clone()))
        .run(StartContainersStep::new(scenario.all_containers.clone()))
        .run(StreamLogsStep::new(scenario.all_containers.clone()))
        // The servers never exit on their own; only the clients mark
        // the benchmark as finished.
        .run(WaitContainersStep::new(scenario.clients.clone()))
        .post(StopContainersStep::new(scenario.all_containers.clone()))
        .post(RemoveContainersStep::new(scenario.all_containers.clone()))
        .post(CloseSinksStep::new(scenario.all_containers.clone()))
        .build();

    let result = pipeline
        .run(
            backend,
            Arc::clone(&scenario.plan),
            cancel,
            DiagnosticSink::stderr(),
        )
        .await;

    match result {
        Ok(()) => {
            info!(results = %scenario.output_dir.display(), "benchmark run complete");
            Ok(())
        }
        Err(PipelineError::Setup(failure)) => {
            error!(error = %failure, "setup failed, nothing was provisioned");
            Err(failure.into())
        }
        Err(PipelineError::Aborted(aggregate)) => {
            for failure in aggregate.failures() {
                error!(error = %failure, "run failure");
            }
            Err(aggregate.into())
        }
    }
}
