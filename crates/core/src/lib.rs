//! Core types for the cardbench latency suite.
//!
//! This crate holds everything the runner and the aggregator agree on:
//!
//! - [`model`] - operations, transports, record formats and run labels
//! - [`config`] - explicit configuration built once from the environment
//! - [`stats`] - summary statistics in milliseconds
//! - [`clock`] - monotonic timestamps for `(start, end)` records
//! - [`error`] - the shared error type

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod stats;

pub use clock::{epoch_secs, BenchClock};
pub use config::{AnalysisConfig, BenchConfig, EndpointPaths, ThroughputConfig};
pub use error::{BenchError, Result};
pub use model::{
    Operation, OperationCall, RecordFormat, RunLabel, Transport, DURATION_HEADER, REQ_END_COLUMN,
    REQ_START_COLUMN, RUN_PREFIX, SIZED_RESPONSE_HEADER, SOCKET_TIMING_HEADER, STAGE_COLUMNS,
};
pub use stats::{combine_std, secs_to_ms, Aggregation, Summary};
