//! Workload artifact preparation.
//!
//! Builds the two workload binaries with cargo and packages each into
//! the gzipped tar build context the image-build step hands to the
//! container runtime. The context holds exactly two entries: the
//! binary as `app` and a Dockerfile that runs it.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::process::Command;
use tracing::info;

const DOCKERFILE: &str = "FROM debian:bookworm-slim\nCOPY app /app\nENTRYPOINT [\"/app\"]\n";

/// Paths to the compiled workload binaries.
#[derive(Debug)]
pub struct WorkloadBinaries {
    /// The bench-client binary.
    pub client: PathBuf,
    /// The bench-server binary.
    pub server: PathBuf,
}

/// Compiles the workload binaries in release mode.
pub async fn build_workload_binaries() -> Result<WorkloadBinaries> {
    info!("building workload binaries");
    let status = Command::new("cargo")
        .args(["build", "--release", "--package", "httpbench-workload", "--bins"])
        .status()
        .await
        .context("failed to run cargo")?;
    if !status.success() {
        bail!("cargo build of the workload binaries failed with {status}");
    }

    let target = std::env::var("CARGO_TARGET_DIR").unwrap_or_else(|_| "target".to_string());
    let release = Path::new(&target).join("release");
    let binaries = WorkloadBinaries {
        client: release.join("bench-client"),
        server: release.join("bench-server"),
    };

    for path in [&binaries.client, &binaries.server] {
        if !path.is_file() {
            bail!("expected workload binary at {}", path.display());
        }
    }
    Ok(binaries)
}

/// Packages a workload binary into a gzipped tar image build context.
pub fn build_context(binary: &Path) -> Result<Bytes> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut archive = tar::Builder::new(encoder);

    let mut header = tar::Header::new_gnu();
    header.set_size(DOCKERFILE.len() as u64);
    header.set_mode(0o444);
    header.set_cksum();
    archive
        .append_data(&mut header, "Dockerfile", DOCKERFILE.as_bytes())
        .context("failed to archive Dockerfile")?;

    let mut file = std::fs::File::open(binary)
        .with_context(|| format!("failed to open workload binary {}", binary.display()))?;
    let mut header = tar::Header::new_gnu();
    header.set_size(file.metadata()?.len());
    header.set_mode(0o555);
    header.set_cksum();
    archive
        .append_data(&mut header, "app", &mut file)
        .with_context(|| format!("failed to archive {}", binary.display()))?;

    let bytes = archive
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .context("failed to finish build context")?;
    Ok(Bytes::from(bytes))
}
