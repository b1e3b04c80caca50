//! Errors raised by the aggregator.
//!
//! Missing comparison data is not an error; loaders return `None` and the
//! caller reports a diagnostic.

use cardbench_core::BenchError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop an analysis step.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Shared error (missing root directory, I/O, CSV)
    #[error(transparent)]
    Bench(#[from] BenchError),

    /// An input file required by the step does not exist
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A staged pipeline file lacks required columns
    #[error("Missing required columns in {}: {columns:?}", .path.display())]
    MissingColumns {
        /// File read
        path: PathBuf,
        /// Columns not found in its header
        columns: Vec<String>,
    },

    /// Requested row does not exist
    #[error("Row index out of range: {row} (file has {rows} rows)")]
    RowOutOfRange {
        /// Requested row
        row: usize,
        /// Rows in the file
        rows: usize,
    },

    /// Nothing to aggregate
    #[error("No usable data in {}", .0.display())]
    NoData(PathBuf),

    /// Chart rendering failed
    #[error("Chart error: {0}")]
    Chart(String),
}

impl From<std::io::Error> for AnalysisError {
    fn from(err: std::io::Error) -> Self {
        Self::Bench(BenchError::Io(err))
    }
}

impl From<csv::Error> for AnalysisError {
    fn from(err: csv::Error) -> Self {
        Self::Bench(BenchError::Csv(err))
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        Self::Bench(BenchError::Json(err))
    }
}

/// Result type for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;
