//! Response-time series for run-by-run comparison.

use cardbench_core::{secs_to_ms, stats::mean, Operation};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::Result;
use crate::loader::{DurationSource, LatencyTable};

/// Response times of one transport in run order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseSeries {
    /// Transport label
    pub label: String,
    /// Response time per run, milliseconds
    pub response_ms: Vec<f64>,
    /// Mean response size, when the file records sizes
    pub avg_size_kb: Option<f64>,
}

impl ResponseSeries {
    /// Read a series from a latency file; `None` when it has no data.
    pub fn read(label: impl Into<String>, path: impl AsRef<Path>) -> Result<Option<Self>> {
        let Some(table) = LatencyTable::read(path)? else {
            return Ok(None);
        };
        let response_ms: Vec<f64> = table
            .durations(DurationSource::Wall)
            .into_iter()
            .map(secs_to_ms)
            .collect();
        if response_ms.is_empty() {
            return Ok(None);
        }
        let avg_size_kb = table.sizes_kb().and_then(|sizes| mean(&sizes));
        Ok(Some(Self {
            label: label.into(),
            response_ms,
            avg_size_kb,
        }))
    }

    /// Legend entry, with the average size when known.
    pub fn legend(&self) -> String {
        match self.avg_size_kb {
            Some(kb) => format!("{} ({:.0} KB)", self.label, kb),
            None => self.label.clone(),
        }
    }
}

/// Candidate files for each series under a run directory.
fn series_sources(run_dir: &Path, operation: Operation) -> [(&'static str, Vec<PathBuf>); 3] {
    let file = operation.file_name();
    [
        ("REST", vec![run_dir.join("rest").join(&file), run_dir.join(&file)]),
        ("MCP Native", vec![run_dir.join("native").join(&file)]),
        ("MCP Layered", vec![run_dir.join("layered").join(&file)]),
    ]
}

/// Load the REST, native and layered series of one run.
///
/// Transports without a file are left out with a diagnostic.
pub fn load_run_series(
    run_dir: impl AsRef<Path>,
    operation: Operation,
) -> Result<Vec<ResponseSeries>> {
    let run_dir = run_dir.as_ref();
    let mut series = Vec::new();
    for (label, candidates) in series_sources(run_dir, operation) {
        let Some(path) = candidates.into_iter().find(|p| p.is_file()) else {
            warn!(run_dir = %run_dir.display(), series = label, "no response-time file");
            continue;
        };
        if let Some(s) = ResponseSeries::read(label, &path)? {
            series.push(s);
        }
    }
    Ok(series)
}

/// Chart file name of the response-time comparison.
pub fn series_file_name(operation: Operation) -> String {
    format!("rtt_comparison_{}.svg", operation.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_run_series_layout() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("get_modelcard.csv"), "0,0.25\n1,1.5\n").unwrap();
        fs::create_dir(tmp.path().join("native")).unwrap();
        fs::write(
            tmp.path().join("native/get_modelcard.csv"),
            "response_time_ms,response_size_kb\n12.5,10\n14.5,14\n",
        )
        .unwrap();

        let series = load_run_series(tmp.path(), Operation::GetModelcard).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].label, "REST");
        assert_eq!(series[0].response_ms, vec![250.0, 500.0]);
        assert_eq!(series[0].legend(), "REST");
        assert!((series[1].response_ms[0] - 12.5).abs() < 1e-9);
        assert!((series[1].response_ms[1] - 14.5).abs() < 1e-9);
        assert_eq!(series[1].legend(), "MCP Native (12 KB)");
    }
}
