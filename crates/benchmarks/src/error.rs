//! Errors that abort a benchmark run.
//!
//! Individual call failures are not errors: they are counted and logged.

use cardbench_adapters::AdapterError;
use cardbench_core::BenchError;
use thiserror::Error;

/// Errors raised while setting up or recording a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Client or session setup failed
    #[error("Setup failed: {0}")]
    Setup(#[from] AdapterError),

    /// Configuration or results storage error
    #[error(transparent)]
    Bench(#[from] BenchError),

    /// The record format cannot be produced by this runner
    #[error("Record format {0:?} is not produced by this runner")]
    UnsupportedFormat(cardbench_core::RecordFormat),

    /// A worker or blocking task panicked or was cancelled
    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<std::io::Error> for RunError {
    fn from(err: std::io::Error) -> Self {
        Self::Bench(BenchError::Io(err))
    }
}

impl From<csv::Error> for RunError {
    fn from(err: csv::Error) -> Self {
        Self::Bench(BenchError::Csv(err))
    }
}

impl From<serde_json::Error> for RunError {
    fn from(err: serde_json::Error) -> Self {
        Self::Bench(BenchError::Json(err))
    }
}

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunError>;
