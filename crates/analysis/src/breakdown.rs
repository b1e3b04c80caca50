//! Server pipeline stage breakdown.
//!
//! Staged pipeline files carry one timestamp per server stage. A stage's
//! duration is the gap between consecutive timestamps; stages are laid out
//! back to back for Gantt charts, and summed against the caller's request
//! time to split query time from protocol overhead.
//!
//! # Example
//!
//! ```ignore
//! use cardbench_analysis::breakdown::{stage_layout, RowSelection, StageOptions, StageTable};
//!
//! let table = StageTable::read("timestamps.csv")?;
//! let point = table.select(RowSelection::default())?;
//! for stage in stage_layout(&point, &StageOptions::default()) {
//!     println!("{}: {:.1} ms", stage.label, stage.duration_ms);
//! }
//! ```

use cardbench_core::{secs_to_ms, Aggregation, REQ_END_COLUMN, REQ_START_COLUMN, STAGE_COLUMNS};
use serde::Serialize;
use std::path::Path;

use crate::compare::{Segment, SegmentKind, StackedBar};
use crate::error::{AnalysisError, Result};
use crate::loader::LatencyTable;

/// Label of the segment ending at each stage column after the first.
pub const STAGE_LABELS: [&str; 5] = [
    "Base Model Card",
    "Remove Embedding",
    "AI Model",
    "Bias Analysis",
    "XAI Analysis",
];

/// Label of the segment from the last stage to the end of the request.
pub const OVERHEAD_LABEL: &str = "Finalize / Overhead";

/// Stage column whose segment is hidden unless asked for.
pub const EMBEDDING_COLUMN: &str = "remove_embedding_timestamp";

/// Stage timestamps of every row, in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct StageTable {
    /// One row per request, timestamps in stage column order
    pub stages: Vec<[f64; 6]>,
    /// Caller-side `(req_start_time, req_end_time)` per row, when recorded
    pub requests: Option<Vec<(f64, f64)>>,
}

/// Which row, or which reduction of all rows, to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSelection {
    /// Reduce every column with an aggregation
    Aggregate(Aggregation),
    /// One row, zero-based
    Row(usize),
}

impl Default for RowSelection {
    fn default() -> Self {
        Self::Aggregate(Aggregation::Mean)
    }
}

/// Stage timestamps of one selected or aggregated row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StagePoint {
    /// Timestamps in stage column order
    pub stages: [f64; 6],
    /// Request end, when recorded
    pub request_end: Option<f64>,
}

/// Layout options for a stage chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOptions {
    /// Stage columns whose segment is dropped
    pub exclude: Vec<String>,
    /// Append the segment from the last stage to the request end
    pub include_overhead: bool,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            exclude: vec![EMBEDDING_COLUMN.to_string()],
            include_overhead: false,
        }
    }
}

impl StageOptions {
    /// Options from the chart flags.
    pub fn new(include_embedding: bool, include_overhead: bool) -> Self {
        Self {
            exclude: if include_embedding {
                Vec::new()
            } else {
                vec![EMBEDDING_COLUMN.to_string()]
            },
            include_overhead,
        }
    }

    /// Suffix distinguishing output files rendered with these options.
    pub fn file_suffix(&self) -> String {
        let overhead = if self.include_overhead {
            "with_overhead"
        } else {
            "no_overhead"
        };
        let embed = if self.exclude.iter().any(|c| c == EMBEDDING_COLUMN) {
            "no_embed"
        } else {
            "with_embed"
        };
        format!("{}_{}", overhead, embed)
    }
}

/// One bar of a stage chart, in milliseconds from the first stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageBar {
    /// Stage name
    pub label: &'static str,
    /// Offset of the bar
    pub start_ms: f64,
    /// Bar length
    pub duration_ms: f64,
    /// Whether this is the overhead segment
    pub overhead: bool,
}

/// Query time against protocol overhead for one transport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QueryOverhead {
    /// Sum of server stage durations, clamped at zero
    pub query_ms: f64,
    /// Request time minus query time, clamped at zero
    pub overhead_ms: f64,
}

impl QueryOverhead {
    /// Two-segment bar: query time below, overhead on top.
    pub fn bar(&self, label: impl Into<String>) -> StackedBar {
        StackedBar {
            label: label.into(),
            segments: vec![
                Segment::new(SegmentKind::QueryTime, self.query_ms, 0.0),
                Segment::new(SegmentKind::ProtocolOverhead, self.overhead_ms, 0.0),
            ],
        }
    }
}

impl StageTable {
    /// Read a staged pipeline file; every stage column must be present.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let table = LatencyTable::read(path)?.ok_or_else(|| {
            if path.is_file() {
                AnalysisError::NoData(path.to_path_buf())
            } else {
                AnalysisError::FileNotFound(path.to_path_buf())
            }
        })?;
        Self::from_table(&table)
    }

    /// Extract stage columns from a loaded table.
    pub fn from_table(table: &LatencyTable) -> Result<Self> {
        let missing: Vec<String> = STAGE_COLUMNS
            .iter()
            .filter(|name| table.column_index(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(AnalysisError::MissingColumns {
                path: table.path.clone(),
                columns: missing,
            });
        }

        let columns: Vec<Vec<f64>> = STAGE_COLUMNS
            .iter()
            .filter_map(|name| table.column(name))
            .collect();
        let stages = (0..table.len())
            .map(|row| {
                let mut timestamps = [0.0; 6];
                for (slot, column) in timestamps.iter_mut().zip(&columns) {
                    *slot = column[row];
                }
                timestamps
            })
            .collect();

        let requests = match (table.column(REQ_START_COLUMN), table.column(REQ_END_COLUMN)) {
            (Some(start), Some(end)) => Some(start.into_iter().zip(end).collect()),
            _ => None,
        };

        Ok(Self { stages, requests })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Pick one row or aggregate every column.
    pub fn select(&self, selection: RowSelection) -> Result<StagePoint> {
        match selection {
            RowSelection::Row(row) => {
                let stages = *self.stages.get(row).ok_or(AnalysisError::RowOutOfRange {
                    row,
                    rows: self.len(),
                })?;
                let request_end = self
                    .requests
                    .as_ref()
                    .and_then(|r| r.get(row))
                    .map(|(_, end)| *end);
                Ok(StagePoint { stages, request_end })
            }
            RowSelection::Aggregate(aggregation) => {
                let mut stages = [f64::NAN; 6];
                for (i, slot) in stages.iter_mut().enumerate() {
                    let column: Vec<f64> = self
                        .stages
                        .iter()
                        .map(|row| row[i])
                        .filter(|v| v.is_finite())
                        .collect();
                    *slot = aggregation.apply(&column).unwrap_or(f64::NAN);
                }
                let request_end = self.requests.as_ref().and_then(|requests| {
                    let ends = finite(requests.iter().map(|(_, end)| *end));
                    aggregation.apply(&ends)
                });
                Ok(StagePoint { stages, request_end })
            }
        }
    }

    /// Mean query time and overhead, when request times were recorded.
    pub fn query_vs_overhead(&self) -> Option<QueryOverhead> {
        let requests = self.requests.as_ref()?;
        let point = self.select(RowSelection::default()).ok()?;
        let starts = finite(requests.iter().map(|(start, _)| *start));
        let ends = finite(requests.iter().map(|(_, end)| *end));
        let wall_ms =
            secs_to_ms(Aggregation::Mean.apply(&ends)? - Aggregation::Mean.apply(&starts)?);

        let query_ms: f64 = point
            .stages
            .windows(2)
            .map(|pair| secs_to_ms(pair[1] - pair[0]))
            .sum::<f64>()
            .max(0.0);
        Some(QueryOverhead {
            query_ms,
            overhead_ms: (wall_ms - query_ms).max(0.0),
        })
    }
}

fn finite(values: impl Iterator<Item = f64>) -> Vec<f64> {
    values.filter(|v| v.is_finite()).collect()
}

/// Lay stage segments out back to back, dropping excluded ones.
pub fn stage_layout(point: &StagePoint, options: &StageOptions) -> Vec<StageBar> {
    let mut bars = Vec::new();
    let mut cursor = 0.0;

    for (i, label) in STAGE_LABELS.iter().copied().enumerate() {
        let end_column = STAGE_COLUMNS[i + 1];
        if options.exclude.iter().any(|c| c == end_column) {
            continue;
        }
        let duration_ms = secs_to_ms(point.stages[i + 1] - point.stages[i]);
        bars.push(StageBar {
            label,
            start_ms: cursor,
            duration_ms,
            overhead: false,
        });
        cursor += duration_ms;
    }

    if options.include_overhead {
        if let Some(end) = point.request_end {
            let duration_ms = secs_to_ms(end - point.stages[STAGE_COLUMNS.len() - 1]);
            bars.push(StageBar {
                label: OVERHEAD_LABEL,
                start_ms: cursor,
                duration_ms,
                overhead: true,
            });
        }
    }

    bars
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str = "start_timestamp,base_model_card_timestamp,remove_embedding_timestamp,\
        enrich_ai_model_timestamp,enrich_bias_analysis_timestamp,enrich_xai_analysis_timestamp,\
        req_start_time,req_end_time";

    fn stage_table(rows: &[&str]) -> (TempDir, StageTable) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("timestamps.csv");
        fs::write(&path, format!("{}\n{}\n", HEADER, rows.join("\n"))).unwrap();
        let table = StageTable::read(&path).unwrap();
        (tmp, table)
    }

    #[test]
    fn test_layout_is_contiguous_without_embedding() {
        let (_tmp, table) = stage_table(&["0,1,1.5,2,4,8,0,10"]);
        let point = table.select(RowSelection::Row(0)).unwrap();
        let bars = stage_layout(&point, &StageOptions::default());

        let labels: Vec<&str> = bars.iter().map(|b| b.label).collect();
        assert_eq!(labels, vec!["Base Model Card", "AI Model", "Bias Analysis", "XAI Analysis"]);
        assert_eq!(bars[0].start_ms, 0.0);
        assert_eq!(bars[0].duration_ms, 1000.0);
        assert_eq!(bars[1].start_ms, 1000.0);
        assert_eq!(bars[1].duration_ms, 500.0);
        assert_eq!(bars[2].start_ms, 1500.0);
        assert_eq!(bars[3].start_ms, 3500.0);
    }

    #[test]
    fn test_layout_with_embedding_and_overhead() {
        let (_tmp, table) = stage_table(&["0,1,1.5,2,4,8,0,10"]);
        let point = table.select(RowSelection::Row(0)).unwrap();
        let bars = stage_layout(&point, &StageOptions::new(true, true));

        assert_eq!(bars.len(), 6);
        assert_eq!(bars[1].label, "Remove Embedding");
        let last = bars.last().unwrap();
        assert!(last.overhead);
        assert_eq!(last.start_ms, 8000.0);
        assert_eq!(last.duration_ms, 2000.0);
    }

    #[test]
    fn test_aggregations() {
        let (_tmp, table) = stage_table(&["0,1,1,1,1,1,0,1", "0,2,2,2,2,2,0,2", "0,6,6,6,6,6,0,6"]);
        let mean = table.select(RowSelection::Aggregate(Aggregation::Mean)).unwrap();
        assert_eq!(mean.stages[1], 3.0);
        let median = table.select(RowSelection::Aggregate(Aggregation::Median)).unwrap();
        assert_eq!(median.stages[1], 2.0);
        assert_eq!(median.request_end, Some(2.0));
    }

    #[test]
    fn test_row_out_of_range() {
        let (_tmp, table) = stage_table(&["0,1,1,1,1,1,0,1"]);
        match table.select(RowSelection::Row(3)) {
            Err(AnalysisError::RowOutOfRange { row, rows }) => {
                assert_eq!(row, 3);
                assert_eq!(rows, 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_query_vs_overhead_is_clamped() {
        let (_tmp, table) = stage_table(&["0,0.1,0.1,0.2,0.3,0.4,0,0.5"]);
        let split = table.query_vs_overhead().unwrap();
        assert!((split.query_ms - 400.0).abs() < 1e-9);
        assert!((split.overhead_ms - 100.0).abs() < 1e-9);

        let (_tmp, table) = stage_table(&["0,0.1,0.1,0.2,0.3,0.4,0,0.2"]);
        let split = table.query_vs_overhead().unwrap();
        assert_eq!(split.overhead_ms, 0.0);
    }

    #[test]
    fn test_query_overhead_bar_totals_wall_time() {
        let split = QueryOverhead {
            query_ms: 8.0,
            overhead_ms: 2.0,
        };
        let bar = split.bar("REST");
        assert_eq!(bar.total_ms(), 10.0);
        assert_eq!(bar.segments[1].kind, SegmentKind::ProtocolOverhead);
    }

    #[test]
    fn test_missing_stage_columns() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("t.csv");
        fs::write(&path, "start_timestamp,base_model_card_timestamp\n0,1\n").unwrap();
        match StageTable::read(&path) {
            Err(AnalysisError::MissingColumns { columns, .. }) => assert_eq!(columns.len(), 4),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            StageTable::read(tmp.path().join("absent.csv")),
            Err(AnalysisError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_file_suffix() {
        assert_eq!(StageOptions::default().file_suffix(), "no_overhead_no_embed");
        assert_eq!(StageOptions::new(true, true).file_suffix(), "with_overhead_with_embed");
    }
}
