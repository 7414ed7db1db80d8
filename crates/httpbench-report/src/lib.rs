//! Post-run summaries over benchmark result files.
//!
//! A benchmark run leaves behind a directory of JSON-lines files: one
//! `*-logs.jsonl` of request records per client container and one
//! `*-stats.jsonl` of runtime stats snapshots per container. This
//! crate walks such a directory and reduces each file to min, max,
//! mean, and median: request latency for log files, CPU usage for
//! stats files.

#![warn(missing_docs)]

pub mod error;
pub mod logs;
pub mod scan;
pub mod stats;
pub mod summary;

pub use error::ReportError;
pub use scan::{scan_directory, FileKind, FileReport};
pub use summary::Summary;
