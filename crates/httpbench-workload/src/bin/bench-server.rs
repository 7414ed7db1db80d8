//! Benchmark server entry point.
//!
//! Serves `GET /{len}` with `len` random bytes on the configured port.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// CLI arguments for the benchmark server.
#[derive(Parser, Debug)]
#[command(name = "bench-server", about = "Random-byte HTTP benchmark server", version)]
struct CliArgs {
    /// Port to listen on.
    #[arg(long, env = "TEST_SERVER_PORT", default_value_t = 8080)]
    test_server_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();
    let addr = format!("0.0.0.0:{}", args.test_server_port);

    httpbench_workload::server::serve(&addr)
        .await
        .context("server failed")?;
    Ok(())
}
