//! Benchmark domain types.
//!
//! Operations and transports name what is measured and how the server is
//! reached. [`RecordFormat`] is the explicit tag for the shape of a results
//! file; it is detected once per file by the aggregator and chosen once per
//! invocation by the runner.

use chrono::{DateTime, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BenchError;

/// Prefix shared by every run directory name.
pub const RUN_PREFIX: &str = "run_";

/// Header of the `SizedResponse` format.
pub const SIZED_RESPONSE_HEADER: [&str; 2] = ["response_time_ms", "response_size_kb"];

/// Header of the `ScalarDuration` format.
pub const DURATION_HEADER: [&str; 1] = ["total_time"];

/// Header of the detailed socket timing format.
pub const SOCKET_TIMING_HEADER: [&str; 12] = [
    "timestamp",
    "dns_lookup",
    "socket_creation",
    "tcp_connect",
    "ssl_context_creation",
    "ssl_handshake",
    "request_send",
    "time_to_first_byte",
    "response_read",
    "socket_close",
    "server_processing",
    "total_time",
];

/// Server-side pipeline stage timestamps, in chronological order.
pub const STAGE_COLUMNS: [&str; 6] = [
    "start_timestamp",
    "base_model_card_timestamp",
    "remove_embedding_timestamp",
    "enrich_ai_model_timestamp",
    "enrich_bias_analysis_timestamp",
    "enrich_xai_analysis_timestamp",
];

/// Column holding the client-side request start of a staged file.
pub const REQ_START_COLUMN: &str = "req_start_time";

/// Column holding the client-side request end of a staged file.
pub const REQ_END_COLUMN: &str = "req_end_time";

/// A benchmarked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Fetch one model card by identifier
    GetModelcard,
    /// Full-text search over model cards
    SearchModelcards,
}

impl Operation {
    /// Every operation, in reporting order.
    pub const ALL: [Operation; 2] = [Operation::GetModelcard, Operation::SearchModelcards];

    /// Operation name, also used as the MCP tool name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetModelcard => "get_modelcard",
            Self::SearchModelcards => "search_modelcards",
        }
    }

    /// Latency file name inside a run directory.
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.name())
    }

    /// Throughput summary file name inside a run directory.
    pub fn throughput_file_name(&self) -> String {
        format!("{}_throughput.csv", self.name())
    }

    /// Human readable title for charts.
    pub fn title(&self) -> &'static str {
        match self {
            Self::GetModelcard => "Model Card Retrieval",
            Self::SearchModelcards => "Model Cards Search",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "get_modelcard" | "get" => Ok(Self::GetModelcard),
            "search_modelcards" | "search" => Ok(Self::SearchModelcards),
            _ => Err(BenchError::UnknownOperation(s.to_string())),
        }
    }
}

/// An operation together with its call argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationCall {
    /// The operation being invoked
    pub operation: Operation,
    /// Model card id for `get_modelcard`, query string for `search_modelcards`
    pub argument: String,
}

impl OperationCall {
    /// Build a `get_modelcard` call.
    pub fn get(modelcard_id: impl Into<String>) -> Self {
        Self {
            operation: Operation::GetModelcard,
            argument: modelcard_id.into(),
        }
    }

    /// Build a `search_modelcards` call.
    pub fn search(query: impl Into<String>) -> Self {
        Self {
            operation: Operation::SearchModelcards,
            argument: query.into(),
        }
    }

    /// Arguments object for an MCP `tools/call` request.
    pub fn tool_arguments(&self) -> serde_json::Value {
        match self.operation {
            Operation::GetModelcard => serde_json::json!({ "mc_id": self.argument }),
            Operation::SearchModelcards => serde_json::json!({ "query": self.argument }),
        }
    }
}

/// The mechanism used to reach the server under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Direct REST calls
    Rest,
    /// Native MCP session
    NativeMcp,
    /// MCP server layered over the REST API
    LayeredMcp,
    /// Database-only baseline, reported by the server
    Database,
}

impl Transport {
    /// Label used on charts and in console summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rest => "REST",
            Self::NativeMcp => "Native MCP",
            Self::LayeredMcp => "Layered MCP",
            Self::Database => "Database",
        }
    }

    /// Whether the runner talks to this transport through an MCP session.
    pub fn is_mcp(&self) -> bool {
        matches!(self, Self::NativeMcp | Self::LayeredMcp)
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Transport {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "rest" => Ok(Self::Rest),
            "native_mcp" | "mcp" | "native" => Ok(Self::NativeMcp),
            "layered_mcp" | "rest_mcp" | "layered" => Ok(Self::LayeredMcp),
            "database" | "db" => Ok(Self::Database),
            _ => Err(BenchError::UnknownTransport(s.to_string())),
        }
    }
}

/// Shape of one latency results file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    /// `start,end` timestamps in seconds, no header
    TimestampPair,
    /// One `total_time` column in seconds with header
    ScalarDuration,
    /// `response_time_ms,response_size_kb` with header
    SizedResponse,
    /// Server pipeline stage timestamps with header
    StagedPipeline,
    /// Raw socket stage durations with header
    SocketTiming,
}

impl RecordFormat {
    /// Header row written before the first record, if the format has one.
    ///
    /// Staged pipeline files are produced by the server, so the runner
    /// never writes them and no fixed header is defined.
    pub fn header(&self) -> Option<&'static [&'static str]> {
        match self {
            Self::TimestampPair | Self::StagedPipeline => None,
            Self::ScalarDuration => Some(&DURATION_HEADER),
            Self::SizedResponse => Some(&SIZED_RESPONSE_HEADER),
            Self::SocketTiming => Some(&SOCKET_TIMING_HEADER),
        }
    }

    /// Classify a header row by the column names it carries.
    pub fn from_header<S: AsRef<str>>(columns: &[S]) -> Self {
        let has = |name: &str| columns.iter().any(|c| c.as_ref().trim() == name);
        if has(SIZED_RESPONSE_HEADER[0]) {
            Self::SizedResponse
        } else if has(STAGE_COLUMNS[0]) {
            Self::StagedPipeline
        } else if has("dns_lookup") && has(DURATION_HEADER[0]) {
            Self::SocketTiming
        } else if has(DURATION_HEADER[0]) {
            Self::ScalarDuration
        } else if columns.len() >= 2 {
            Self::TimestampPair
        } else {
            Self::ScalarDuration
        }
    }
}

impl FromStr for RecordFormat {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "pair" | "timestamp_pair" => Ok(Self::TimestampPair),
            "scalar" | "duration" | "scalar_duration" => Ok(Self::ScalarDuration),
            "sized" | "sized_response" => Ok(Self::SizedResponse),
            "staged" | "staged_pipeline" => Ok(Self::StagedPipeline),
            "socket" | "socket_timing" => Ok(Self::SocketTiming),
            other => Err(BenchError::InvalidConfig(format!("unknown record format '{}'", other))),
        }
    }
}

/// Name of a run directory, `run_<stamp>`.
///
/// Labels sort lexicographically in creation order as long as the stamp
/// keeps its fixed width.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunLabel(String);

impl RunLabel {
    /// Label for a run starting now, `run_YYYYMMDD_HHMMSS`.
    pub fn now() -> Self {
        Self::at(&Local::now())
    }

    /// Label for a run starting at the given instant.
    pub fn at<Tz: TimeZone>(time: &DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        Self(format!("{}{}", RUN_PREFIX, time.format("%Y%m%d_%H%M%S")))
    }

    /// Day-granular label, `run_YYYYMMDD`, shared by the variants of one day.
    pub fn daily(date: NaiveDate) -> Self {
        Self(format!("{}{}", RUN_PREFIX, date.format("%Y%m%d")))
    }

    /// Whether a directory name follows the run naming pattern.
    pub fn is_run_name(name: &str) -> bool {
        name.starts_with(RUN_PREFIX)
    }

    /// Get the label as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_operation_names_and_files() {
        assert_eq!(Operation::GetModelcard.name(), "get_modelcard");
        assert_eq!(Operation::SearchModelcards.file_name(), "search_modelcards.csv");
        assert_eq!("search".parse::<Operation>().unwrap(), Operation::SearchModelcards);
        assert!("delete_modelcard".parse::<Operation>().is_err());
    }

    #[test]
    fn test_tool_arguments() {
        let get = OperationCall::get("megadetector-mc");
        assert_eq!(get.tool_arguments(), serde_json::json!({"mc_id": "megadetector-mc"}));
        let search = OperationCall::search("AlexNet");
        assert_eq!(search.tool_arguments(), serde_json::json!({"query": "AlexNet"}));
    }

    #[test]
    fn test_transport_parse() {
        assert_eq!("rest-mcp".parse::<Transport>().unwrap(), Transport::LayeredMcp);
        assert_eq!("native".parse::<Transport>().unwrap(), Transport::NativeMcp);
        assert_eq!("db".parse::<Transport>().unwrap(), Transport::Database);
        assert!(Transport::LayeredMcp.is_mcp());
        assert!(!Transport::Rest.is_mcp());
    }

    #[test]
    fn test_record_format_from_header() {
        assert_eq!(
            RecordFormat::from_header(&["response_time_ms", "response_size_kb"]),
            RecordFormat::SizedResponse
        );
        assert_eq!(
            RecordFormat::from_header(&[" start_timestamp", "enrich_xai_analysis_timestamp"]),
            RecordFormat::StagedPipeline
        );
        assert_eq!(
            RecordFormat::from_header(&SOCKET_TIMING_HEADER),
            RecordFormat::SocketTiming
        );
        assert_eq!(RecordFormat::from_header(&["total_time"]), RecordFormat::ScalarDuration);
        assert_eq!(
            RecordFormat::from_header(&["timestamp", "total_time"]),
            RecordFormat::ScalarDuration
        );
        assert_eq!(RecordFormat::from_header(&["a", "b"]), RecordFormat::TimestampPair);
    }

    #[test]
    fn test_record_format_headers() {
        assert!(RecordFormat::TimestampPair.header().is_none());
        assert_eq!(RecordFormat::ScalarDuration.header(), Some(&["total_time"][..]));
        assert_eq!(RecordFormat::SizedResponse.header().unwrap().len(), 2);
        assert_eq!(RecordFormat::SocketTiming.header().unwrap()[0], "timestamp");
    }

    #[test]
    fn test_run_labels_sort_in_time_order() {
        let earlier = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let a = RunLabel::at(&earlier);
        let b = RunLabel::at(&later);
        assert_eq!(a.as_str(), "run_20250101_000000");
        assert!(b > a);
        assert!(RunLabel::is_run_name(b.as_str()));
        assert!(!RunLabel::is_run_name("database"));
    }

    #[test]
    fn test_daily_label() {
        let day = NaiveDate::from_ymd_opt(2025, 10, 24).unwrap();
        assert_eq!(RunLabel::daily(day).as_str(), "run_20251024");
    }
}
