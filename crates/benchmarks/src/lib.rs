//! Benchmark runners for cardbench.
//!
//! A run opens exactly one client for its transport, creates a fresh
//! `run_<stamp>` directory and measures each requested operation into its
//! own CSV file. Optional throughput mode and the REST socket probe share
//! the same directory layout.
//!
//! # Example
//!
//! ```ignore
//! use cardbench_benchmarks::{run_benchmark, RunPlan, RunTarget};
//! use cardbench_core::BenchConfig;
//!
//! let config = BenchConfig::from_env()?;
//! let plan = RunPlan::new("native-mcp".parse::<RunTarget>()?);
//! let report = run_benchmark(&config, &plan).await?;
//! println!("{} calls recorded", report.total_completed());
//! ```
//!
//! # Modules
//!
//! - [`runner`] - sequential latency loop
//! - [`throughput`] - concurrent worker pool
//! - [`socket`] - per-stage socket timing for REST
//! - [`io`] - run directories and append-only CSV files
//! - [`result`] - run report types

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod error;
pub mod io;
pub mod result;
pub mod runner;
pub mod socket;
pub mod throughput;

pub use error::{Result, RunError};
pub use io::{CsvSink, RunDirectory};
pub use result::{OperationReport, RunReport, ThroughputReport};
pub use runner::LatencyRunner;

use cardbench_adapters::{connect, ModelcardClient, SocketProbe};
use cardbench_core::{BenchConfig, BenchError, Operation, RecordFormat, RunLabel, Transport};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// What a run measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTarget {
    /// Call-level latency through a client transport
    Client(Transport),
    /// Per-stage socket timing against the REST API
    SocketTiming,
}

impl RunTarget {
    /// Transport the target exercises.
    pub fn transport(&self) -> Transport {
        match self {
            Self::Client(transport) => *transport,
            Self::SocketTiming => Transport::Rest,
        }
    }

    /// Record format used when none is requested.
    pub fn default_format(&self) -> RecordFormat {
        match self {
            Self::Client(Transport::NativeMcp) => RecordFormat::SizedResponse,
            Self::Client(Transport::LayeredMcp) => RecordFormat::ScalarDuration,
            Self::Client(_) => RecordFormat::TimestampPair,
            Self::SocketTiming => RecordFormat::SocketTiming,
        }
    }
}

impl fmt::Display for RunTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client(transport) => write!(f, "{}", transport),
            Self::SocketTiming => f.write_str("REST (socket timing)"),
        }
    }
}

impl FromStr for RunTarget {
    type Err = BenchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "rest-socket" | "socket" => Ok(Self::SocketTiming),
            other => other.parse().map(Self::Client),
        }
    }
}

/// Operations and output format of one run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// What is measured
    pub target: RunTarget,
    /// Operations, measured in order
    pub operations: Vec<Operation>,
    /// Output format, the target's default when unset
    pub format: Option<RecordFormat>,
}

impl RunPlan {
    /// Plan measuring every operation in the default format.
    pub fn new(target: RunTarget) -> Self {
        Self {
            target,
            operations: Operation::ALL.to_vec(),
            format: None,
        }
    }

    /// Effective record format.
    pub fn format(&self) -> RecordFormat {
        self.format.unwrap_or_else(|| self.target.default_format())
    }
}

/// Run a plan against the configured server.
///
/// The client is connected before the run directory is created, so a
/// setup failure leaves nothing behind.
pub async fn run_benchmark(config: &BenchConfig, plan: &RunPlan) -> Result<RunReport> {
    config.validate()?;
    let format = plan.format();

    match plan.target {
        RunTarget::SocketTiming => {
            if format != RecordFormat::SocketTiming {
                return Err(RunError::UnsupportedFormat(format));
            }
            let probe = SocketProbe::new(&config.server_url)?;
            let run_dir = RunDirectory::create(
                &config.results_dir,
                RunLabel::now(),
                config.variant.as_deref(),
            )?;
            let mut report = RunReport::new(Transport::Rest, format, run_dir.path());

            for operation in &plan.operations {
                let sink = CsvSink::create(run_dir.file(&operation.file_name()), format.header())?;
                let call = config.call_for(*operation);
                let op_report =
                    socket::run_socket_timing(&probe, &config.paths, &call, config.runs, &sink)
                        .await?;
                report.operations.push(op_report);
            }

            finish(report, &run_dir)
        }
        RunTarget::Client(transport) => {
            let client: Arc<dyn ModelcardClient> = Arc::from(connect(transport, config).await?);
            let runner = LatencyRunner::new(client.as_ref(), format, config.runs, config.warmup)?;
            let run_dir = RunDirectory::create(
                &config.results_dir,
                RunLabel::now(),
                config.variant.as_deref(),
            )?;
            info!(
                run_dir = %run_dir.path().display(),
                transport = %transport,
                format = ?format,
                "run started"
            );
            let mut report = RunReport::new(transport, format, run_dir.path());

            for operation in &plan.operations {
                let sink = CsvSink::create(run_dir.file(&operation.file_name()), format.header())?;
                let op_report = runner.run(&config.call_for(*operation), &sink).await?;
                report.operations.push(op_report);
            }

            if config.throughput.enabled {
                for operation in &plan.operations {
                    let call = config.call_for(*operation);
                    let tp = throughput::measure_throughput(
                        Arc::clone(&client),
                        &call,
                        &config.throughput,
                    )
                    .await;
                    let sink = CsvSink::create(
                        run_dir.file(&operation.throughput_file_name()),
                        Some(&ThroughputReport::HEADER[..]),
                    )?;
                    sink.append(tp.to_record())?;
                    report.throughput.push(tp);
                }
            }

            finish(report, &run_dir)
        }
    }
}

fn finish(mut report: RunReport, run_dir: &RunDirectory) -> Result<RunReport> {
    report.finish();
    io::write_report_json(&report, run_dir.file(io::REPORT_FILE))?;
    info!(
        run_dir = %run_dir.path().display(),
        completed = report.total_completed(),
        failed = report.total_failed(),
        "run finished"
    );
    Ok(report)
}
