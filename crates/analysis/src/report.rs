//! End-to-end analysis steps: load, aggregate, render, write.
//!
//! Every step is read-only on its inputs and overwrites its own outputs,
//! so running a step twice yields the same files.

use cardbench_core::{AnalysisConfig, Operation};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::breakdown::{stage_layout, RowSelection, StageOptions, StageTable};
use crate::chart::{render_gantt, render_series, render_stacked_bars};
use crate::compare::{compare_latest, comparison_path, Comparison, OperationOutcome};
use crate::error::{AnalysisError, Result};
use crate::layered::{breakdown_file_name, load_breakdown, LayeredBreakdown};
use crate::markdown::{generate_breakdown_report, generate_summary, BREAKDOWN_FILE, SUMMARY_FILE};
use crate::series::{load_run_series, series_file_name};

/// File name of the machine-readable comparison.
pub const COMPARISON_JSON_FILE: &str = "comparison.json";

/// File name of the query-vs-overhead chart.
pub const QUERY_OVERHEAD_FILE: &str = "query_vs_overhead.svg";

fn write_text(output_dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(name);
    fs::write(&path, content)?;
    Ok(path)
}

/// Compare the latest runs, render one chart per compared operation and
/// write the markdown summary.
pub fn comparison_report(config: &AnalysisConfig) -> Result<Vec<OperationOutcome>> {
    let outcomes = compare_latest(config)?;
    for outcome in &outcomes {
        if let OperationOutcome::Compared(comparison) = outcome {
            let path = comparison_path(&config.output_dir, comparison.operation);
            render_stacked_bars(&path, comparison.operation.title(), &comparison.stacked_bars())?;
        }
    }
    let compared: Vec<&Comparison> = outcomes
        .iter()
        .filter_map(|o| match o {
            OperationOutcome::Compared(c) => Some(c),
            OperationOutcome::Skipped { .. } => None,
        })
        .collect();
    let json = serde_json::to_string_pretty(&compared)?;
    write_text(&config.output_dir, COMPARISON_JSON_FILE, &json)?;
    let summary = write_text(&config.output_dir, SUMMARY_FILE, &generate_summary(&outcomes))?;
    info!(path = %summary.display(), "comparison summary written");
    Ok(outcomes)
}

/// Break every operation down per transport and render what has data.
pub fn breakdown_report(config: &AnalysisConfig) -> Result<Vec<LayeredBreakdown>> {
    let mut breakdowns = Vec::with_capacity(Operation::ALL.len());
    for operation in Operation::ALL {
        let breakdown = load_breakdown(config, operation)?;
        if breakdown.legs.is_empty() {
            warn!(operation = %operation, "no transport has a complete breakdown");
        } else {
            let path = config.output_dir.join(breakdown_file_name(operation));
            render_stacked_bars(&path, operation.title(), &breakdown.bars())?;
        }
        breakdowns.push(breakdown);
    }
    write_text(&config.output_dir, BREAKDOWN_FILE, &generate_breakdown_report(&breakdowns))?;
    Ok(breakdowns)
}

/// Default chart path of a stage chart.
pub fn gantt_file_name(selection: RowSelection, options: &StageOptions) -> String {
    let mode = match selection {
        RowSelection::Row(row) => format!("row{}", row),
        RowSelection::Aggregate(aggregation) => aggregation.to_string(),
    };
    format!("timestamps_gantt_{}_{}.svg", mode, options.file_suffix())
}

/// Render the stage chart of one staged pipeline file.
pub fn gantt_report(
    csv: &Path,
    selection: RowSelection,
    options: &StageOptions,
    output: Option<PathBuf>,
    output_dir: &Path,
) -> Result<PathBuf> {
    let table = StageTable::read(csv)?;
    let point = table.select(selection)?;
    let bars = stage_layout(&point, options);
    if options.include_overhead && point.request_end.is_none() {
        warn!(path = %csv.display(), "no request end recorded, overhead segment omitted");
    }

    let path = output.unwrap_or_else(|| output_dir.join(gantt_file_name(selection, options)));
    let title = match selection {
        RowSelection::Row(row) => format!("Server stages, row {}", row),
        RowSelection::Aggregate(aggregation) => format!("Server stages ({})", aggregation),
    };
    render_gantt(&path, &title, &bars)?;
    Ok(path)
}

/// Render query time against protocol overhead for labelled staged files.
pub fn query_overhead_report(inputs: &[(String, PathBuf)], output_dir: &Path) -> Result<PathBuf> {
    let mut bars = Vec::with_capacity(inputs.len());
    for (label, csv) in inputs {
        let table = StageTable::read(csv)?;
        match table.query_vs_overhead() {
            Some(split) => bars.push(split.bar(label.as_str())),
            None => warn!(path = %csv.display(), "no request times recorded, skipped"),
        }
    }
    if bars.is_empty() {
        let first = inputs.first().map(|(_, p)| p.clone()).unwrap_or_default();
        return Err(AnalysisError::NoData(first));
    }
    let path = output_dir.join(QUERY_OVERHEAD_FILE);
    render_stacked_bars(&path, "Query Time vs Protocol Overhead", &bars)?;
    Ok(path)
}

/// Render the response-time series of one run directory.
pub fn series_report(run_dir: &Path, operation: Operation, output_dir: &Path) -> Result<PathBuf> {
    let series = load_run_series(run_dir, operation)?;
    if series.is_empty() {
        return Err(AnalysisError::NoData(run_dir.to_path_buf()));
    }
    let path = output_dir.join(series_file_name(operation));
    render_series(&path, "Response Time Comparison", &series)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardbench_core::Aggregation;
    use tempfile::TempDir;

    fn write(path: PathBuf, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_gantt_file_name() {
        let options = StageOptions::new(false, true);
        assert_eq!(
            gantt_file_name(RowSelection::Aggregate(Aggregation::P95), &options),
            "timestamps_gantt_p95_with_overhead_no_embed.svg"
        );
        assert_eq!(
            gantt_file_name(RowSelection::Row(3), &StageOptions::new(true, false)),
            "timestamps_gantt_row3_no_overhead_with_embed.svg"
        );
    }

    #[test]
    fn test_comparison_report_is_repeatable() {
        let tmp = TempDir::new().unwrap();
        let config = AnalysisConfig {
            rest_dir: tmp.path().join("rest"),
            mcp_dir: tmp.path().join("mcp"),
            rest_mcp_dir: tmp.path().join("rest_mcp"),
            db_dir: tmp.path().join("db"),
            output_dir: tmp.path().join("out"),
        };
        write(config.rest_dir.join("get_modelcard.csv"), "0,0.02\n1,1.03\n");
        write(config.mcp_dir.join("get_modelcard.csv"), "0.05\n");
        write(config.rest_mcp_dir.join("get_modelcard.csv"), "0.08\n0.09\n");
        write(config.db_dir.join("get_modelcard.csv"), "0.01\n");

        let first = comparison_report(&config).unwrap();
        let second = comparison_report(&config).unwrap();
        assert_eq!(first, second);
        assert!(config.output_dir.join("latency_get_modelcard_comparison.svg").is_file());
        assert!(!config.output_dir.join("latency_search_modelcards_comparison.svg").exists());
        assert!(config.output_dir.join(SUMMARY_FILE).is_file());
        let json = fs::read_to_string(config.output_dir.join(COMPARISON_JSON_FILE)).unwrap();
        assert!(json.contains("\"operation\": \"get_modelcard\""));
    }

    #[test]
    fn test_series_report_without_data() {
        let tmp = TempDir::new().unwrap();
        let result = series_report(tmp.path(), Operation::GetModelcard, tmp.path());
        assert!(matches!(result, Err(AnalysisError::NoData(_))));
    }
}
