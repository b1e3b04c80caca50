//! Run report types.
//!
//! A [`RunReport`] summarizes one invocation of the runner. It is written
//! as `report.json` next to the CSV files and printed by the CLI; the CSV
//! files stay the source of truth for analysis.

use cardbench_core::{Operation, RecordFormat, Summary, Transport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of the sequential loop for one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationReport {
    /// Operation measured
    pub operation: Operation,
    /// Samples requested
    pub requested: u64,
    /// Calls that completed and were recorded
    pub completed: u64,
    /// Calls that failed and were skipped
    pub failed: u64,
    /// CSV file the samples went to
    pub file: PathBuf,
    /// Latency of the completed calls
    pub latency: Option<Summary>,
}

/// Outcome of throughput mode for one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThroughputReport {
    /// Operation measured
    pub operation: Operation,
    /// Concurrent workers
    pub workers: usize,
    /// Wall time actually spent, in seconds
    pub elapsed_secs: f64,
    /// Completed calls
    pub completed: u64,
    /// Failed calls
    pub errors: u64,
    /// Completed calls per second of wall time
    pub throughput_per_sec: f64,
    /// Latency of the completed calls
    pub latency: Option<Summary>,
}

impl ThroughputReport {
    /// CSV header of the throughput summary file.
    pub const HEADER: [&'static str; 9] = [
        "operation",
        "workers",
        "elapsed_secs",
        "completed",
        "errors",
        "throughput_per_sec",
        "mean_latency_ms",
        "p95_latency_ms",
        "std_latency_ms",
    ];

    /// CSV record matching [`Self::HEADER`].
    pub fn to_record(&self) -> Vec<String> {
        let stat = |pick: fn(&Summary) -> f64| {
            self.latency
                .as_ref()
                .map(|s| pick(s).to_string())
                .unwrap_or_default()
        };
        vec![
            self.operation.name().to_string(),
            self.workers.to_string(),
            self.elapsed_secs.to_string(),
            self.completed.to_string(),
            self.errors.to_string(),
            self.throughput_per_sec.to_string(),
            stat(|s| s.mean_ms),
            stat(|s| s.p95_ms),
            stat(|s| s.std_ms),
        ]
    }
}

/// Summary of one runner invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Transport measured
    pub transport: Transport,
    /// Shape of the latency files
    pub format: RecordFormat,
    /// Run directory
    pub run_dir: PathBuf,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
    /// Sequential results per operation
    pub operations: Vec<OperationReport>,
    /// Throughput results per operation, empty unless enabled
    #[serde(default)]
    pub throughput: Vec<ThroughputReport>,
}

impl RunReport {
    /// Start an empty report.
    pub fn new(transport: Transport, format: RecordFormat, run_dir: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            transport,
            format,
            run_dir: run_dir.into(),
            started_at: now,
            finished_at: now,
            operations: Vec::new(),
            throughput: Vec::new(),
        }
    }

    /// Stamp the finish time.
    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
    }

    /// Calls completed across all operations.
    pub fn total_completed(&self) -> u64 {
        self.operations.iter().map(|o| o.completed).sum()
    }

    /// Calls failed across all operations.
    pub fn total_failed(&self) -> u64 {
        self.operations.iter().map(|o| o.failed).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_totals() {
        let mut report = RunReport::new(Transport::Rest, RecordFormat::TimestampPair, "/tmp/run_x");
        for (operation, completed, failed) in [
            (Operation::GetModelcard, 9, 1),
            (Operation::SearchModelcards, 10, 0),
        ] {
            report.operations.push(OperationReport {
                operation,
                requested: 10,
                completed,
                failed,
                file: PathBuf::from(operation.file_name()),
                latency: None,
            });
        }
        report.finish();
        assert_eq!(report.total_completed(), 19);
        assert_eq!(report.total_failed(), 1);
        assert!(report.finished_at >= report.started_at);
    }

    #[test]
    fn test_throughput_record_matches_header() {
        let report = ThroughputReport {
            operation: Operation::SearchModelcards,
            workers: 4,
            elapsed_secs: 2.0,
            completed: 100,
            errors: 0,
            throughput_per_sec: 50.0,
            latency: Summary::from_ms(&[10.0, 20.0]),
        };
        let record = report.to_record();
        assert_eq!(record.len(), ThroughputReport::HEADER.len());
        assert_eq!(record[0], "search_modelcards");
        assert_eq!(record[5], "50");
        assert_eq!(record[6], "15");
    }

    #[test]
    fn test_report_json_shape() {
        let report = RunReport::new(Transport::NativeMcp, RecordFormat::SizedResponse, "r");
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["transport"], "native_mcp");
        assert_eq!(value["format"], "sized_response");
    }
}
