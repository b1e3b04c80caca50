//! Error type shared by the cardbench crates.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while configuring or running a benchmark.
#[derive(Debug, Error)]
pub enum BenchError {
    /// A configuration value was missing or could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A results directory that must exist was not found
    #[error("Directory does not exist: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// A file that the run is about to create already exists
    #[error("Refusing to overwrite existing file: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// Unknown operation name
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Unknown transport name
    #[error("Unknown transport: {0}")]
    UnknownTransport(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding or decoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<config::ConfigError> for BenchError {
    fn from(err: config::ConfigError) -> Self {
        BenchError::InvalidConfig(err.to_string())
    }
}

/// Result type for cardbench operations.
pub type Result<T> = std::result::Result<T, BenchError>;
