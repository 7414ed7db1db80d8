//! Result-directory traversal and report rendering.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::ReportError;
use crate::summary::Summary;
use crate::{logs, stats};

/// What kind of result file a summary was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// A client log file of request records; samples are nanoseconds.
    RequestLogs,
    /// A container stats file; samples are CPU-usage percentages.
    Stats,
}

/// The summary of one result file.
#[derive(Debug)]
pub struct FileReport {
    /// The file the summary was computed from.
    pub path: PathBuf,
    /// How the file was interpreted.
    pub kind: FileKind,
    /// The computed summary; `None` if the file held no usable samples.
    pub summary: Option<Summary>,
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FileKind::RequestLogs => {
                writeln!(
                    f,
                    "Summarizing result logs from file: {}",
                    self.path.display()
                )?;
                let Some(s) = self.summary else {
                    return writeln!(f, "Request Time: no samples");
                };
                writeln!(f, "Request Time:")?;
                writeln!(f, "- Min: {:?}", Duration::from_nanos(s.min as u64))?;
                writeln!(f, "- Max: {:?}", Duration::from_nanos(s.max as u64))?;
                writeln!(f, "- Mean: {:?}", Duration::from_nanos(s.mean as u64))?;
                writeln!(f, "- Median: {:?}", Duration::from_nanos(s.median as u64))
            }
            FileKind::Stats => {
                writeln!(
                    f,
                    "Summarizing result stats from file: {}",
                    self.path.display()
                )?;
                let Some(s) = self.summary else {
                    return writeln!(f, "CPU Usage: no samples");
                };
                writeln!(f, "CPU Usage:")?;
                writeln!(f, "- Min: {:.2}%", s.min)?;
                writeln!(f, "- Max: {:.2}%", s.max)?;
                writeln!(f, "- Mean: {:.2}%", s.mean)?;
                writeln!(f, "- Median: {:.2}%", s.median)
            }
        }
    }
}

/// Classifies a result file by its name.
fn classify(path: &Path) -> Option<FileKind> {
    let name = path.file_name()?.to_str()?;
    if name.ends_with("logs.jsonl") {
        Some(FileKind::RequestLogs)
    } else if name.ends_with("stats.jsonl") {
        Some(FileKind::Stats)
    } else {
        None
    }
}

/// Walks a results directory and summarizes every recognized file.
///
/// Files are visited in sorted order within each directory, so the
/// report order is stable across runs. Unrecognized files are skipped.
pub fn scan_directory(root: &Path) -> Result<Vec<FileReport>, ReportError> {
    let mut reports = Vec::new();
    scan_into(root, &mut reports)?;
    Ok(reports)
}

fn scan_into(dir: &Path, reports: &mut Vec<FileReport>) -> Result<(), ReportError> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            scan_into(&path, reports)?;
            continue;
        }
        let Some(kind) = classify(&path) else {
            debug!(path = %path.display(), "skipping unrecognized file");
            continue;
        };

        let reader = BufReader::new(File::open(&path)?);
        let summary = match kind {
            FileKind::RequestLogs => logs::summarize(reader)?,
            FileKind::Stats => stats::summarize(reader)?,
        };
        reports.push(FileReport {
            path,
            kind,
            summary,
        });
    }
    Ok(())
}
