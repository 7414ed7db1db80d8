//! Benchmark client entry point.
//!
//! Repeats a GET request against the target endpoint and writes one
//! JSON request record per line to stdout. Diagnostics go to stderr so
//! the record stream stays parseable.
//!
//! Configured through environment variables, matching how the
//! orchestrator injects settings into the container:
//!
//! ```bash
//! TARGET_ENDPOINT_URI=http://server-0:8080/1000 \
//! NUMBER_OF_REQUESTS=1000 \
//! CLIENT_HTTP_VERSION=2 \
//! MUST_DRAIN_AND_CLOSE=true \
//! bench-client
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use httpbench_workload::{BodyMode, HttpVersion, RepeatClient};
use reqwest::Url;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// CLI arguments for the benchmark client.
#[derive(Parser, Debug)]
#[command(name = "bench-client", about = "Repeat-request HTTP benchmark client", version)]
struct CliArgs {
    /// Endpoint to benchmark.
    #[arg(long, env = "TARGET_ENDPOINT_URI")]
    target_endpoint_uri: Url,

    /// Number of requests to send.
    #[arg(long, env = "NUMBER_OF_REQUESTS", default_value_t = 1000)]
    number_of_requests: u64,

    /// HTTP protocol version to pin (1 or 2).
    #[arg(long, env = "CLIENT_HTTP_VERSION", default_value_t = 1)]
    client_http_version: u8,

    /// Drain each response body before closing it.
    #[arg(long, env = "MUST_DRAIN_AND_CLOSE", default_value_t = false)]
    must_drain_and_close: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    let version = HttpVersion::try_from(args.client_http_version)
        .map_err(anyhow::Error::msg)
        .context("CLIENT_HTTP_VERSION")?;
    let body_mode = if args.must_drain_and_close {
        BodyMode::Drain
    } else {
        BodyMode::Discard
    };

    let client = RepeatClient::new(args.target_endpoint_uri, version, body_mode)
        .context("failed to build benchmark client")?;

    let mut stdout = tokio::io::stdout();
    client
        .run(args.number_of_requests, &mut stdout)
        .await
        .context("benchmark run failed")?;
    Ok(())
}
