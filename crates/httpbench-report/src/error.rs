//! Error types for report generation.

use thiserror::Error;

/// Errors from reading or parsing benchmark result files.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Reading a result file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A result file contained an unparseable record.
    #[error("invalid record on line {line}: {source}")]
    InvalidRecord {
        /// One-based line number of the bad record.
        line: usize,
        /// The underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
}
