//! CPU-usage summaries from container stats files.

use std::io::BufRead;

use serde::Deserialize;

use crate::error::ReportError;
use crate::summary::Summary;

/// One periodic stats snapshot, as the container runtime reports it.
///
/// Only the CPU counters are read; everything else in the snapshot is
/// ignored.
#[derive(Debug, Default, Deserialize)]
pub struct StatsSample {
    #[serde(default)]
    cpu_stats: CpuStats,
    #[serde(default)]
    precpu_stats: CpuStats,
}

#[derive(Debug, Default, Deserialize)]
struct CpuStats {
    #[serde(default)]
    cpu_usage: CpuUsage,
    #[serde(default)]
    system_cpu_usage: u64,
    #[serde(default)]
    online_cpus: u64,
}

#[derive(Debug, Default, Deserialize)]
struct CpuUsage {
    #[serde(default)]
    total_usage: u64,
}

impl StatsSample {
    /// Container CPU usage over the snapshot interval, as a
    /// percentage of one core.
    ///
    /// `None` for unusable snapshots: the first sample of a stream has
    /// no previous counters, leaving the system delta (or the online
    /// CPU count) at zero.
    pub fn cpu_percent(&self) -> Option<f64> {
        let cpu_delta =
            self.cpu_stats.cpu_usage.total_usage as i64 - self.precpu_stats.cpu_usage.total_usage as i64;
        let system_delta =
            self.cpu_stats.system_cpu_usage as i64 - self.precpu_stats.system_cpu_usage as i64;

        if system_delta == 0 || self.cpu_stats.online_cpus == 0 {
            return None;
        }
        Some(cpu_delta as f64 / system_delta as f64 * self.cpu_stats.online_cpus as f64 * 100.0)
    }
}

/// Extracts the CPU usage percentage of every usable snapshot.
pub fn cpu_usages(reader: impl BufRead) -> Result<Vec<f64>, ReportError> {
    let mut usages = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let sample: StatsSample =
            serde_json::from_str(&line).map_err(|source| ReportError::InvalidRecord {
                line: number + 1,
                source,
            })?;
        if let Some(usage) = sample.cpu_percent() {
            usages.push(usage);
        }
    }
    Ok(usages)
}

/// Summarizes the CPU usage recorded in a stats file.
pub fn summarize(reader: impl BufRead) -> Result<Option<Summary>, ReportError> {
    Ok(Summary::compute(&cpu_usages(reader)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(total: u64, pre_total: u64, system: u64, pre_system: u64, cpus: u64) -> String {
        format!(
            "{{\"cpu_stats\":{{\"cpu_usage\":{{\"total_usage\":{total}}},\
             \"system_cpu_usage\":{system},\"online_cpus\":{cpus}}},\
             \"precpu_stats\":{{\"cpu_usage\":{{\"total_usage\":{pre_total}}},\
             \"system_cpu_usage\":{pre_system}}}}}"
        )
    }

    #[test]
    fn usage_follows_the_delta_formula() {
        let line = sample(200, 100, 2000, 1000, 4);
        let parsed: StatsSample = serde_json::from_str(&line).unwrap();
        // (100 / 1000) * 4 cores * 100
        assert_eq!(parsed.cpu_percent(), Some(40.0));
    }

    #[test]
    fn first_snapshot_of_a_stream_is_skipped() {
        // No previous counters: system delta equals the full counter,
        // but online_cpus may be zero on the very first frame.
        let no_cpus = sample(100, 0, 1000, 0, 0);
        let parsed: StatsSample = serde_json::from_str(&no_cpus).unwrap();
        assert_eq!(parsed.cpu_percent(), None);

        let no_system_delta = sample(100, 100, 1000, 1000, 4);
        let parsed: StatsSample = serde_json::from_str(&no_system_delta).unwrap();
        assert_eq!(parsed.cpu_percent(), None);
    }

    #[test]
    fn summarize_skips_unusable_snapshots() {
        let input = format!(
            "{}\n{}\n{}\n",
            sample(100, 0, 1000, 0, 0),
            sample(200, 100, 2000, 1000, 4),
            sample(400, 200, 3000, 2000, 4),
        );
        let summary = summarize(input.as_bytes()).unwrap().unwrap();
        assert_eq!(summary.min, 40.0);
        assert_eq!(summary.max, 80.0);
    }
}
