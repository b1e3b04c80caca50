//! Transport comparison against the database baseline.
//!
//! For each operation the latest REST, native MCP and layered MCP runs are
//! summarized next to the database time reported by the server. A bar is
//! stacked from the baseline upwards; each segment's error bar combines
//! the deviations of the two means it is the difference of.

use cardbench_core::{combine_std, AnalysisConfig, BenchError, Operation, Summary, Transport};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{AnalysisError, Result};
use crate::loader::load_samples;
use crate::runs::latest_run_dir;

/// Meaning of one stacked segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Database time
    Database,
    /// REST layer on top of the database
    RestOverhead,
    /// MCP layer on top of what it wraps
    McpOverhead,
    /// Server stage time
    QueryTime,
    /// Request time not spent in server stages
    ProtocolOverhead,
}

impl SegmentKind {
    /// Legend label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Database => "Database",
            Self::RestOverhead => "REST overhead",
            Self::McpOverhead => "MCP overhead",
            Self::QueryTime => "Query time",
            Self::ProtocolOverhead => "Protocol overhead",
        }
    }
}

/// One stacked segment, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment {
    /// What the segment measures
    pub kind: SegmentKind,
    /// Height
    pub value_ms: f64,
    /// Error bar half-height, zero for none
    pub error_ms: f64,
}

impl Segment {
    /// Segment with an error bar.
    pub fn new(kind: SegmentKind, value_ms: f64, error_ms: f64) -> Self {
        Self {
            kind,
            value_ms,
            error_ms,
        }
    }
}

/// A bar made of segments stacked bottom to top.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackedBar {
    /// Axis label
    pub label: String,
    /// Segments, bottom first
    pub segments: Vec<Segment>,
}

impl StackedBar {
    /// Height of the whole bar.
    pub fn total_ms(&self) -> f64 {
        self.segments.iter().map(|s| s.value_ms).sum()
    }
}

/// Optional sample sets, in seconds, for one operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportSamples {
    /// Direct REST
    pub rest: Option<Vec<f64>>,
    /// Native MCP
    pub native_mcp: Option<Vec<f64>>,
    /// Layered MCP
    pub layered_mcp: Option<Vec<f64>>,
    /// Database baseline
    pub database: Option<Vec<f64>>,
}

impl TransportSamples {
    /// Samples of one transport.
    pub fn get(&self, transport: Transport) -> Option<&[f64]> {
        match transport {
            Transport::Rest => self.rest.as_deref(),
            Transport::NativeMcp => self.native_mcp.as_deref(),
            Transport::LayeredMcp => self.layered_mcp.as_deref(),
            Transport::Database => self.database.as_deref(),
        }
    }

    /// Transports without samples, in reporting order.
    pub fn missing(&self) -> Vec<Transport> {
        COMPARED
            .iter()
            .copied()
            .filter(|t| self.get(*t).map(|s| s.is_empty()).unwrap_or(true))
            .collect()
    }
}

const COMPARED: [Transport; 4] = [
    Transport::Database,
    Transport::Rest,
    Transport::NativeMcp,
    Transport::LayeredMcp,
];

/// Summaries of every transport for one operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    /// Operation compared
    pub operation: Operation,
    /// Database baseline
    pub database: Summary,
    /// Direct REST
    pub rest: Summary,
    /// Native MCP
    pub native_mcp: Summary,
    /// Layered MCP
    pub layered_mcp: Summary,
}

impl Comparison {
    /// Summarize complete sample sets; `None` when an arm is missing.
    pub fn from_samples(operation: Operation, samples: &TransportSamples) -> Option<Self> {
        let summarize = |t: Transport| samples.get(t).and_then(Summary::from_secs);
        Some(Self {
            operation,
            database: summarize(Transport::Database)?,
            rest: summarize(Transport::Rest)?,
            native_mcp: summarize(Transport::NativeMcp)?,
            layered_mcp: summarize(Transport::LayeredMcp)?,
        })
    }

    /// Summary of one transport.
    pub fn summary(&self, transport: Transport) -> &Summary {
        match transport {
            Transport::Rest => &self.rest,
            Transport::NativeMcp => &self.native_mcp,
            Transport::LayeredMcp => &self.layered_mcp,
            Transport::Database => &self.database,
        }
    }

    /// Mean latency above the database baseline.
    pub fn overhead_ms(&self, transport: Transport) -> f64 {
        self.summary(transport).mean_ms - self.database.mean_ms
    }

    /// MCP bar (database plus MCP overhead) and layered bar (database plus
    /// REST overhead plus the MCP layer over REST).
    pub fn stacked_bars(&self) -> Vec<StackedBar> {
        let db = &self.database;
        let rest = &self.rest;
        let native = &self.native_mcp;
        let layered = &self.layered_mcp;

        vec![
            StackedBar {
                label: "MCP".to_string(),
                segments: vec![
                    Segment::new(SegmentKind::Database, db.mean_ms, db.std_ms),
                    Segment::new(
                        SegmentKind::McpOverhead,
                        native.mean_ms - db.mean_ms,
                        combine_std(native.std_ms, db.std_ms),
                    ),
                ],
            },
            StackedBar {
                label: "REST+MCP".to_string(),
                segments: vec![
                    Segment::new(SegmentKind::Database, db.mean_ms, db.std_ms),
                    Segment::new(
                        SegmentKind::RestOverhead,
                        rest.mean_ms - db.mean_ms,
                        combine_std(rest.std_ms, db.std_ms),
                    ),
                    Segment::new(
                        SegmentKind::McpOverhead,
                        layered.mean_ms - rest.mean_ms,
                        combine_std(layered.std_ms, rest.std_ms),
                    ),
                ],
            },
        ]
    }
}

/// Result of comparing one operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    /// Every arm had data
    Compared(Comparison),
    /// Some arms had no data; the operation is left out of the charts
    Skipped {
        /// Operation skipped
        operation: Operation,
        /// Transports without data
        missing: Vec<Transport>,
    },
}

impl OperationOutcome {
    /// Operation this outcome is about.
    pub fn operation(&self) -> Operation {
        match self {
            Self::Compared(c) => c.operation,
            Self::Skipped { operation, .. } => *operation,
        }
    }
}

/// Latest run directory of each compared transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestRuns {
    /// REST run
    pub rest: PathBuf,
    /// Native MCP run
    pub native_mcp: PathBuf,
    /// Layered MCP run
    pub layered_mcp: PathBuf,
    /// Database run, `None` when its root does not exist
    pub database: Option<PathBuf>,
}

impl LatestRuns {
    /// Resolve the latest runs; a missing transport root is an error.
    pub fn resolve(config: &AnalysisConfig) -> Result<Self> {
        let database = match latest_run_dir(&config.db_dir) {
            Ok(dir) => Some(dir),
            Err(AnalysisError::Bench(BenchError::DirectoryNotFound(dir))) => {
                warn!(dir = %dir.display(), "no database baseline directory");
                None
            }
            Err(err) => return Err(err),
        };
        Ok(Self {
            rest: latest_run_dir(&config.rest_dir)?,
            native_mcp: latest_run_dir(&config.mcp_dir)?,
            layered_mcp: latest_run_dir(&config.rest_mcp_dir)?,
            database,
        })
    }

    /// Load every arm for one operation.
    pub fn samples(&self, operation: Operation) -> Result<TransportSamples> {
        Ok(TransportSamples {
            rest: load_samples(&self.rest, operation)?,
            native_mcp: load_samples(&self.native_mcp, operation)?,
            layered_mcp: load_samples(&self.layered_mcp, operation)?,
            database: match &self.database {
                Some(dir) => load_samples(dir, operation)?,
                None => None,
            },
        })
    }
}

/// Compare every operation; missing arms skip only their operation.
pub fn compare_operations(
    runs: &LatestRuns,
    operations: &[Operation],
) -> Result<Vec<OperationOutcome>> {
    let mut outcomes = Vec::with_capacity(operations.len());
    for &operation in operations {
        let samples = runs.samples(operation)?;
        match Comparison::from_samples(operation, &samples) {
            Some(comparison) => {
                info!(operation = %operation, "comparison computed");
                outcomes.push(OperationOutcome::Compared(comparison));
            }
            None => {
                let missing = samples.missing();
                warn!(
                    operation = %operation,
                    missing = ?missing.iter().map(Transport::label).collect::<Vec<_>>(),
                    "missing {} results, operation skipped",
                    operation.file_name()
                );
                outcomes.push(OperationOutcome::Skipped { operation, missing });
            }
        }
    }
    Ok(outcomes)
}

/// Resolve the latest runs and compare every operation.
pub fn compare_latest(config: &AnalysisConfig) -> Result<Vec<OperationOutcome>> {
    let runs = LatestRuns::resolve(config)?;
    compare_operations(&runs, &Operation::ALL)
}

/// Chart file name of an operation's comparison.
pub fn comparison_file_name(operation: Operation) -> String {
    format!("latency_{}_comparison.svg", operation.name())
}

/// Full chart path under an output directory.
pub fn comparison_path(output_dir: &Path, operation: Operation) -> PathBuf {
    output_dir.join(comparison_file_name(operation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_run(root: &Path, label: &str, file: &str, content: &str) {
        let dir = root.join(label);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), content).unwrap();
    }

    fn fixture() -> (TempDir, AnalysisConfig) {
        let tmp = TempDir::new().unwrap();
        let config = AnalysisConfig {
            rest_dir: tmp.path().join("rest"),
            mcp_dir: tmp.path().join("mcp"),
            rest_mcp_dir: tmp.path().join("rest_mcp"),
            db_dir: tmp.path().join("db"),
            output_dir: tmp.path().join("out"),
        };
        // stale run that must be ignored
        write_run(&config.rest_dir, "run_20250101_000000", "get_modelcard.csv", "0,9\n");
        write_run(&config.rest_dir, "run_20250102_000000", "get_modelcard.csv", "0,0.02\n1,1.04\n");
        write_run(&config.mcp_dir, "run_20250102_000000", "get_modelcard.csv", "0.05\n0.07\n");
        write_run(&config.rest_mcp_dir, "run_20250102_000000", "get_modelcard.csv", "0,0.08\n");
        write_run(&config.db_dir, "run_20250102_000000", "get_modelcard.csv", "0,0.01\n");
        // only REST has search results
        write_run(&config.rest_dir, "run_20250102_000000", "search_modelcards.csv", "0,0.5\n");
        (tmp, config)
    }

    #[test]
    fn test_missing_operation_is_skipped_not_fatal() {
        let (_tmp, config) = fixture();
        let outcomes = compare_latest(&config).unwrap();
        assert_eq!(outcomes.len(), 2);

        match &outcomes[0] {
            OperationOutcome::Compared(c) => {
                assert_eq!(c.operation, Operation::GetModelcard);
                assert!((c.rest.mean_ms - 30.0).abs() < 1e-6);
                assert!((c.native_mcp.mean_ms - 60.0).abs() < 1e-6);
                assert!((c.overhead_ms(Transport::LayeredMcp) - 70.0).abs() < 1e-6);
            }
            other => panic!("unexpected: {:?}", other),
        }
        match &outcomes[1] {
            OperationOutcome::Skipped { operation, missing } => {
                assert_eq!(*operation, Operation::SearchModelcards);
                assert_eq!(
                    missing,
                    &vec![Transport::Database, Transport::NativeMcp, Transport::LayeredMcp]
                );
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let (_tmp, config) = fixture();
        assert_eq!(compare_latest(&config).unwrap(), compare_latest(&config).unwrap());
    }

    #[test]
    fn test_missing_transport_root_is_an_error() {
        let (_tmp, mut config) = fixture();
        config.mcp_dir = config.mcp_dir.join("absent");
        assert!(compare_latest(&config).is_err());
    }

    #[test]
    fn test_stacked_bars_sum_to_transport_means() {
        let (_tmp, config) = fixture();
        let outcomes = compare_latest(&config).unwrap();
        let OperationOutcome::Compared(c) = &outcomes[0] else {
            panic!("expected a comparison");
        };
        let bars = c.stacked_bars();
        assert!((bars[0].total_ms() - c.native_mcp.mean_ms).abs() < 1e-9);
        assert!((bars[1].total_ms() - c.layered_mcp.mean_ms).abs() < 1e-9);
        let mcp_error = bars[0].segments[1].error_ms;
        assert!((mcp_error - combine_std(c.native_mcp.std_ms, c.database.std_ms)).abs() < 1e-12);
    }
}
