//! Per-transport latency breakdown.
//!
//! Each transport root may carry a `database/` sub-root with the database
//! time the server reported during that transport's run, and the layered
//! root a `rest/` sub-root with the time spent in the wrapped REST call.
//! Legs are summarized independently and stacked from the database up.

use cardbench_core::{combine_std, AnalysisConfig, Operation, Summary, Transport};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::compare::{Segment, SegmentKind, StackedBar};
use crate::error::Result;
use crate::loader::load_samples;
use crate::runs::latest_run_dir;

/// Sub-root holding database legs.
pub const DATABASE_SUBDIR: &str = "database";

/// Sub-root holding the REST leg of layered runs.
pub const REST_SUBDIR: &str = "rest";

/// Summarized legs of one transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportLegs {
    /// Transport measured
    pub transport: Transport,
    /// Database time during the run
    pub database: Summary,
    /// Wrapped REST call, layered transport only
    pub rest_leg: Option<Summary>,
    /// End-to-end time
    pub total: Summary,
}

impl TransportLegs {
    /// Stacked bar from the database up.
    pub fn bar(&self) -> StackedBar {
        let db = &self.database;
        let base = Segment::new(SegmentKind::Database, db.mean_ms, db.std_ms);
        let upper_kind = if self.transport.is_mcp() {
            SegmentKind::McpOverhead
        } else {
            SegmentKind::RestOverhead
        };

        let segments = match &self.rest_leg {
            Some(rest) => vec![
                base,
                Segment::new(
                    SegmentKind::RestOverhead,
                    rest.mean_ms - db.mean_ms,
                    combine_std(rest.std_ms, db.std_ms),
                ),
                Segment::new(
                    upper_kind,
                    self.total.mean_ms - rest.mean_ms,
                    combine_std(self.total.std_ms, rest.std_ms),
                ),
            ],
            None => vec![
                base,
                Segment::new(
                    upper_kind,
                    self.total.mean_ms - db.mean_ms,
                    combine_std(self.total.std_ms, db.std_ms),
                ),
            ],
        };

        StackedBar {
            label: bar_label(self.transport).to_string(),
            segments,
        }
    }
}

fn bar_label(transport: Transport) -> &'static str {
    match transport {
        Transport::Rest => "REST",
        Transport::NativeMcp => "Native",
        Transport::LayeredMcp => "Layered",
        Transport::Database => "Database",
    }
}

/// Breakdown of one operation across transports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayeredBreakdown {
    /// Operation broken down
    pub operation: Operation,
    /// Transports with every leg present
    pub legs: Vec<TransportLegs>,
    /// Transports left out, with the leg that was missing
    pub missing: Vec<(Transport, &'static str)>,
}

impl LayeredBreakdown {
    /// Bars in transport order.
    pub fn bars(&self) -> Vec<StackedBar> {
        self.legs.iter().map(TransportLegs::bar).collect()
    }
}

fn roots(config: &AnalysisConfig) -> [(Transport, &Path); 3] {
    [
        (Transport::Rest, config.rest_dir.as_path()),
        (Transport::NativeMcp, config.mcp_dir.as_path()),
        (Transport::LayeredMcp, config.rest_mcp_dir.as_path()),
    ]
}

/// Summary of the latest run under `root`, `None` when root or file is missing.
fn latest_summary(root: &Path, operation: Operation) -> Result<Option<Summary>> {
    if !root.is_dir() {
        debug!(root = %root.display(), "result root absent");
        return Ok(None);
    }
    let run_dir: PathBuf = latest_run_dir(root)?;
    Ok(load_samples(&run_dir, operation)?.and_then(|s| Summary::from_secs(&s)))
}

/// Build the breakdown of one operation from the configured roots.
pub fn load_breakdown(config: &AnalysisConfig, operation: Operation) -> Result<LayeredBreakdown> {
    let mut legs = Vec::new();
    let mut missing = Vec::new();

    for (transport, root) in roots(config) {
        let Some(total) = latest_summary(root, operation)? else {
            missing.push((transport, "total"));
            continue;
        };
        let Some(database) = latest_summary(&root.join(DATABASE_SUBDIR), operation)? else {
            missing.push((transport, DATABASE_SUBDIR));
            continue;
        };
        let rest_leg = if transport == Transport::LayeredMcp {
            match latest_summary(&root.join(REST_SUBDIR), operation)? {
                Some(rest) => Some(rest),
                None => {
                    missing.push((transport, REST_SUBDIR));
                    continue;
                }
            }
        } else {
            None
        };
        legs.push(TransportLegs {
            transport,
            database,
            rest_leg,
            total,
        });
    }

    for (transport, leg) in &missing {
        warn!(
            operation = %operation,
            transport = %transport,
            leg,
            "breakdown leg missing, transport skipped"
        );
    }

    Ok(LayeredBreakdown {
        operation,
        legs,
        missing,
    })
}

/// Chart file name of an operation's breakdown.
pub fn breakdown_file_name(operation: Operation) -> String {
    format!("{}_breakdown.svg", operation.name())
}
