//! Request-time summaries from client log files.

use std::io::BufRead;

use serde::Deserialize;

use crate::error::ReportError;
use crate::summary::Summary;

/// The subset of a client request record the report cares about.
///
/// Parsed leniently: diagnostic lines without a latency field are
/// skipped rather than rejected.
#[derive(Debug, Default, Deserialize)]
struct LogLine {
    #[serde(default)]
    elapsed_ns: u64,
}

/// Extracts every recorded request latency, in nanoseconds.
pub fn request_times_ns(reader: impl BufRead) -> Result<Vec<f64>, ReportError> {
    let mut times = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: LogLine =
            serde_json::from_str(&line).map_err(|source| ReportError::InvalidRecord {
                line: number + 1,
                source,
            })?;
        if entry.elapsed_ns > 0 {
            times.push(entry.elapsed_ns as f64);
        }
    }
    Ok(times)
}

/// Summarizes the request latencies in a client log file.
pub fn summarize(reader: impl BufRead) -> Result<Option<Summary>, ReportError> {
    Ok(Summary::compute(&request_times_ns(reader)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latencies_are_collected_and_zero_lines_skipped() {
        let input = concat!(
            "{\"time\":\"2026-01-01T00:00:00Z\",\"req_uuid\":\"a\",\"status_code\":200,\"elapsed_ns\":100}\n",
            "{\"req_uuid\":\"b\",\"msg\":\"diagnostic line without timing\"}\n",
            "\n",
            "{\"time\":\"2026-01-01T00:00:01Z\",\"req_uuid\":\"c\",\"status_code\":200,\"elapsed_ns\":300}\n",
        );

        let times = request_times_ns(input.as_bytes()).unwrap();
        assert_eq!(times, vec![100.0, 300.0]);

        let summary = summarize(input.as_bytes()).unwrap().unwrap();
        assert_eq!(summary.min, 100.0);
        assert_eq!(summary.max, 300.0);
        assert_eq!(summary.mean, 200.0);
    }

    #[test]
    fn malformed_json_reports_the_line_number() {
        let input = "{\"elapsed_ns\":1}\nnot json\n";
        let err = request_times_ns(input.as_bytes()).unwrap_err();
        assert!(matches!(err, ReportError::InvalidRecord { line: 2, .. }));
    }
}
