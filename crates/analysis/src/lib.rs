//! Offline aggregation of cardbench results.
//!
//! Reads the CSV files written by the runners (and the server's staged
//! timestamp files), summarizes them per transport and operation, and
//! renders SVG charts with a markdown summary. Nothing here touches the
//! network.
//!
//! # Example
//!
//! ```ignore
//! use cardbench_analysis::report::comparison_report;
//! use cardbench_core::AnalysisConfig;
//!
//! let config = AnalysisConfig::from_env()?;
//! for outcome in comparison_report(&config)? {
//!     println!("{:?}", outcome);
//! }
//! ```
//!
//! # Modules
//!
//! - [`runs`] - run directory selection
//! - [`loader`] - format detection and sample loading
//! - [`compare`] - transport comparison against the database baseline
//! - [`layered`] - per-transport leg breakdown
//! - [`breakdown`] - server stage timing
//! - [`series`] - response time per run
//! - [`chart`] - SVG rendering
//! - [`markdown`] - markdown reports
//! - [`report`] - complete analysis steps

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod breakdown;
pub mod chart;
pub mod compare;
pub mod error;
pub mod layered;
pub mod loader;
pub mod markdown;
pub mod report;
pub mod runs;
pub mod series;

pub use breakdown::{stage_layout, QueryOverhead, RowSelection, StageBar, StageOptions, StageTable};
pub use compare::{
    compare_latest, Comparison, OperationOutcome, Segment, SegmentKind, StackedBar,
    TransportSamples,
};
pub use error::{AnalysisError, Result};
pub use layered::{load_breakdown, LayeredBreakdown, TransportLegs};
pub use loader::{load_samples, load_samples_with, DurationSource, LatencyTable};
pub use runs::{latest_run_dir, list_runs};
pub use series::{load_run_series, ResponseSeries};
