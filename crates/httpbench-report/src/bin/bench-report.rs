//! Report entry point: summarize every result file in a directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// CLI arguments for the benchmark report.
#[derive(Parser, Debug)]
#[command(name = "bench-report", about = "Summarize benchmark result files", version)]
struct CliArgs {
    /// Directory holding the run's result files.
    #[arg(long, env = "BENCH_RESULTS_DIRECTORY")]
    bench_results_directory: PathBuf,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();
    let reports = httpbench_report::scan_directory(&args.bench_results_directory)
        .with_context(|| {
            format!(
                "failed to summarize {}",
                args.bench_results_directory.display()
            )
        })?;

    for report in reports {
        println!("{report}");
    }
    Ok(())
}
