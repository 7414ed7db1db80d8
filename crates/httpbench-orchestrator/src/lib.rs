//! Phased container orchestration for HTTP benchmark runs.
//!
//! This crate coordinates the lifecycle of a single benchmark run: it
//! provisions networks, images, and containers against an abstract
//! container runtime, streams their telemetry into caller-supplied
//! sinks, waits for the workload to finish, and tears everything down
//! again with a failure policy that never skips cleanup.
//!
//! # Overview
//!
//! A run is described once, up front, as a [`Plan`]: the arena of
//! container, network, and image records the steps operate on through
//! typed handles. The [`Pipeline`] then executes three ordered phases:
//!
//! - **pre**: setup (ensure images and networks exist). The first
//!   failure aborts the run; nothing was provisioned, nothing to clean.
//! - **run**: execution (create, stream, start, wait). The first
//!   failure skips the rest of the phase but is remembered while
//!   cleanup proceeds.
//! - **post**: cleanup (stop, remove, close sinks). Always runs in
//!   full; every failure is aggregated, never dropped.
//!
//! All backend access goes through the [`RuntimeBackend`] capability
//! trait; [`DockerBackend`](backend::DockerBackend) implements it
//! against a local Docker daemon via bollard.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use httpbench_orchestrator::{
//!     backend::DockerBackend,
//!     steps::{
//!         CloseSinksStep, CreateContainersStep, EnsureImagesStep, EnsureNetworksStep,
//!         RemoveContainersStep, StartContainersStep, StopContainersStep, StreamLogsStep,
//!         StreamStatsStep, WaitContainersStep,
//!     },
//!     ContainerSpec, DiagnosticSink, ImageSpec, Pipeline, Plan,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut plan = Plan::builder();
//!     let net = plan.network("bench-net");
//!     let image = plan.image(ImageSpec::new("bench-client:latest", build_context));
//!     let client = plan.container(
//!         ContainerSpec::builder("client-1", "bench-client:latest")
//!             .env("NUMBER_OF_REQUESTS", 1000)
//!             .network(net)
//!             .build(),
//!         Some(log_file),
//!         Some(stats_file),
//!     );
//!     let plan = plan.build();
//!
//!     let pipeline = Pipeline::builder()
//!         .pre(EnsureImagesStep::new(vec![image]))
//!         .pre(EnsureNetworksStep::new(vec![net]))
//!         .run(CreateContainersStep::new(vec![client]))
//!         .run(StreamStatsStep::new(vec![client]))
//!         .run(StartContainersStep::new(vec![client]))
//!         .run(StreamLogsStep::new(vec![client]))
//!         .run(WaitContainersStep::new(vec![client]))
//!         .post(StopContainersStep::new(vec![client]))
//!         .post(RemoveContainersStep::new(vec![client]))
//!         .post(CloseSinksStep::new(vec![client]))
//!         .build();
//!
//!     let backend = Arc::new(DockerBackend::connect().await?);
//!     pipeline
//!         .run(backend, plan, CancellationToken::new(), DiagnosticSink::stderr())
//!         .await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backend;
pub mod error;
pub mod pipeline;
pub mod plan;
pub mod sink;
pub mod step;
pub mod steps;

#[cfg(test)]
mod testutil;

// Re-export commonly used types at the crate root
pub use backend::{DockerBackend, RuntimeBackend};
pub use error::{AggregateError, OrchestratorError, PipelineError, Result, StepFailure};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use plan::{ContainerRef, ContainerSpec, ImageRef, ImageSpec, NetworkRef, Plan, PlanBuilder};
pub use sink::{DiagnosticSink, TelemetrySink};
pub use step::{Phase, Step, StepContext};
