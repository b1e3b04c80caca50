//! Explicit configuration for runners and the aggregator.
//!
//! Both configurations are built once at process start, from the process
//! environment or from an injected map, and then passed by reference.
//! Nothing below reads the environment after construction.
//!
//! # Example
//!
//! ```ignore
//! use cardbench_core::BenchConfig;
//!
//! let config = BenchConfig::from_env()?;
//! println!("benchmarking {} with {} runs", config.server_url, config.runs);
//! ```

use config::{Config, Environment, Map};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::error::{BenchError, Result};
use crate::model::{Operation, OperationCall};

/// Default server endpoint.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:5002";
/// Default root for run output.
pub const DEFAULT_RESULTS_DIR: &str = "benchmark_results";
/// Default sample count.
pub const DEFAULT_RUNS: i64 = 1000;
/// Default model card identifier for `get_modelcard`.
pub const DEFAULT_MODELCARD_ID: &str = "3f7b2c82-75fa-4335-a3b8-e1930893a974";
/// Default query for `search_modelcards`.
pub const DEFAULT_SEARCH_QUERY: &str = "AlexNet";
/// Default REST path template for `get_modelcard`.
pub const DEFAULT_GET_MODELCARD_PATH: &str = "/modelcard/{mc_id}";
/// Default REST path for `search_modelcards`.
pub const DEFAULT_SEARCH_MODELCARDS_PATH: &str = "/modelcards/search";

/// Raw environment view, one field per recognized variable.
#[derive(Debug, Deserialize)]
struct RawBenchConfig {
    server_url: String,
    benchmark_results_dir: String,
    benchmark_runs: i64,
    benchmark_warmup: i64,
    modelcard_id: String,
    search_query: String,
    throughput_duration: i64,
    max_concurrent: i64,
    measure_throughput: bool,
    client_type: Option<String>,
    get_modelcard_path: String,
    search_modelcards_path: String,
    request_timeout_secs: i64,
}

/// REST endpoint paths for the benchmarked operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPaths {
    /// Path template for `get_modelcard`; `{mc_id}` is substituted
    pub get_modelcard: String,
    /// Path for `search_modelcards`; the query goes into `q`
    pub search_modelcards: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            get_modelcard: DEFAULT_GET_MODELCARD_PATH.to_string(),
            search_modelcards: DEFAULT_SEARCH_MODELCARDS_PATH.to_string(),
        }
    }
}

impl EndpointPaths {
    /// Request path for a call, without the query string.
    pub fn path_for(&self, call: &OperationCall) -> String {
        match call.operation {
            Operation::GetModelcard => self.get_modelcard.replace("{mc_id}", &call.argument),
            Operation::SearchModelcards => self.search_modelcards.clone(),
        }
    }

    /// Query parameters for a call.
    pub fn query_for(call: &OperationCall) -> Option<(&'static str, &str)> {
        match call.operation {
            Operation::GetModelcard => None,
            Operation::SearchModelcards => Some(("q", call.argument.as_str())),
        }
    }
}

/// Controls for the concurrent throughput mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThroughputConfig {
    /// Whether throughput is measured after the latency loop
    pub enabled: bool,
    /// Wall-clock length of the measurement window
    pub duration: Duration,
    /// Number of concurrent workers
    pub max_concurrent: usize,
}

impl Default for ThroughputConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            duration: Duration::from_secs(30),
            max_concurrent: 10,
        }
    }
}

/// Runner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Endpoint to benchmark
    pub server_url: String,
    /// Root directory for run output
    pub results_dir: PathBuf,
    /// Measured samples per operation
    pub runs: u64,
    /// Discarded calls before the measured loop
    pub warmup: u64,
    /// Argument for `get_modelcard`
    pub modelcard_id: String,
    /// Argument for `search_modelcards`
    pub search_query: String,
    /// Optional label nesting the output under the run directory
    pub variant: Option<String>,
    /// REST endpoint paths
    pub paths: EndpointPaths,
    /// Upper bound for a single call
    pub request_timeout: Duration,
    /// Throughput mode controls
    pub throughput: ThroughputConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            runs: DEFAULT_RUNS as u64,
            warmup: 0,
            modelcard_id: DEFAULT_MODELCARD_ID.to_string(),
            search_query: DEFAULT_SEARCH_QUERY.to_string(),
            variant: None,
            paths: EndpointPaths::default(),
            request_timeout: Duration::from_secs(30),
            throughput: ThroughputConfig::default(),
        }
    }
}

impl BenchConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::load(Environment::default().try_parsing(true))
    }

    /// Build the configuration from an explicit variable map.
    ///
    /// Keys use the environment spelling, e.g. `BENCHMARK_RUNS`.
    pub fn from_vars(vars: Map<String, String>) -> Result<Self> {
        Self::load(Environment::default().try_parsing(true).source(Some(vars)))
    }

    fn load(source: Environment) -> Result<Self> {
        let defaults = Self::default();
        let raw: RawBenchConfig = Config::builder()
            .set_default("server_url", defaults.server_url.as_str())?
            .set_default("benchmark_results_dir", DEFAULT_RESULTS_DIR)?
            .set_default("benchmark_runs", DEFAULT_RUNS)?
            .set_default("benchmark_warmup", 0i64)?
            .set_default("modelcard_id", DEFAULT_MODELCARD_ID)?
            .set_default("search_query", DEFAULT_SEARCH_QUERY)?
            .set_default("throughput_duration", 30i64)?
            .set_default("max_concurrent", 10i64)?
            .set_default("measure_throughput", false)?
            .set_default("get_modelcard_path", DEFAULT_GET_MODELCARD_PATH)?
            .set_default("search_modelcards_path", DEFAULT_SEARCH_MODELCARDS_PATH)?
            .set_default("request_timeout_secs", 30i64)?
            .add_source(source)
            .build()?
            .try_deserialize()?;

        let config = Self {
            server_url: raw.server_url,
            results_dir: PathBuf::from(raw.benchmark_results_dir),
            runs: positive("BENCHMARK_RUNS", raw.benchmark_runs)?,
            warmup: non_negative("BENCHMARK_WARMUP", raw.benchmark_warmup)?,
            modelcard_id: raw.modelcard_id,
            search_query: raw.search_query,
            variant: raw.client_type.filter(|v| !v.trim().is_empty()),
            paths: EndpointPaths {
                get_modelcard: raw.get_modelcard_path,
                search_modelcards: raw.search_modelcards_path,
            },
            request_timeout: Duration::from_secs(positive(
                "REQUEST_TIMEOUT_SECS",
                raw.request_timeout_secs,
            )?),
            throughput: ThroughputConfig {
                enabled: raw.measure_throughput,
                duration: Duration::from_secs(positive(
                    "THROUGHPUT_DURATION",
                    raw.throughput_duration,
                )?),
                max_concurrent: positive("MAX_CONCURRENT", raw.max_concurrent)? as usize,
            },
        };
        config.validate()?;
        debug!(
            server_url = %config.server_url,
            runs = config.runs,
            results_dir = %config.results_dir.display(),
            "benchmark configuration loaded"
        );
        Ok(config)
    }

    /// Check runtime-facing invariants.
    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(BenchError::InvalidConfig("SERVER_URL must not be empty".to_string()));
        }
        if self.runs == 0 {
            return Err(BenchError::InvalidConfig("BENCHMARK_RUNS must be at least 1".to_string()));
        }
        if self.throughput.max_concurrent == 0 {
            return Err(BenchError::InvalidConfig("MAX_CONCURRENT must be at least 1".to_string()));
        }
        Ok(())
    }

    /// The call for an operation with its configured argument.
    pub fn call_for(&self, operation: Operation) -> OperationCall {
        match operation {
            Operation::GetModelcard => OperationCall::get(self.modelcard_id.clone()),
            Operation::SearchModelcards => OperationCall::search(self.search_query.clone()),
        }
    }
}

/// Aggregator configuration: where each transport's runs live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Root of the REST runs
    pub rest_dir: PathBuf,
    /// Root of the native MCP runs
    pub mcp_dir: PathBuf,
    /// Root of the layered MCP runs
    pub rest_mcp_dir: PathBuf,
    /// Root of the database baseline runs
    pub db_dir: PathBuf,
    /// Directory receiving charts and reports
    pub output_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawAnalysisConfig {
    rest_results_dir: String,
    mcp_results_dir: String,
    rest_mcp_results_dir: String,
    db_results_dir: String,
    analysis_output_dir: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            rest_dir: PathBuf::from("rest/benchmark_results"),
            mcp_dir: PathBuf::from("mcp/benchmark_results"),
            rest_mcp_dir: PathBuf::from("rest_mcp/benchmark_results"),
            db_dir: PathBuf::from("db/benchmark_results"),
            output_dir: PathBuf::from("analysis/outputs"),
        }
    }
}

impl AnalysisConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::load(Environment::default())
    }

    /// Build the configuration from an explicit variable map.
    pub fn from_vars(vars: Map<String, String>) -> Result<Self> {
        Self::load(Environment::default().source(Some(vars)))
    }

    fn load(source: Environment) -> Result<Self> {
        let defaults = Self::default();
        let path = |p: &PathBuf| p.to_string_lossy().into_owned();
        let raw: RawAnalysisConfig = Config::builder()
            .set_default("rest_results_dir", path(&defaults.rest_dir))?
            .set_default("mcp_results_dir", path(&defaults.mcp_dir))?
            .set_default("rest_mcp_results_dir", path(&defaults.rest_mcp_dir))?
            .set_default("db_results_dir", path(&defaults.db_dir))?
            .set_default("analysis_output_dir", path(&defaults.output_dir))?
            .add_source(source)
            .build()?
            .try_deserialize()?;

        Ok(Self {
            rest_dir: raw.rest_results_dir.into(),
            mcp_dir: raw.mcp_results_dir.into(),
            rest_mcp_dir: raw.rest_mcp_results_dir.into(),
            db_dir: raw.db_results_dir.into(),
            output_dir: raw.analysis_output_dir.into(),
        })
    }
}

fn positive(name: &str, value: i64) -> Result<u64> {
    if value < 1 {
        return Err(BenchError::InvalidConfig(format!(
            "{} must be a positive integer, got {}",
            name, value
        )));
    }
    Ok(value as u64)
}

fn non_negative(name: &str, value: i64) -> Result<u64> {
    if value < 0 {
        return Err(BenchError::InvalidConfig(format!(
            "{} must not be negative, got {}",
            name, value
        )));
    }
    Ok(value as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Map<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = BenchConfig::from_vars(Map::new()).unwrap();
        assert_eq!(config, BenchConfig::default());
    }

    #[test]
    fn test_recognized_variables() {
        let config = BenchConfig::from_vars(vars(&[
            ("SERVER_URL", "http://localhost:8050/sse"),
            ("BENCHMARK_RESULTS_DIR", "/tmp/results"),
            ("BENCHMARK_RUNS", "5"),
            ("MODELCARD_ID", "megadetector-mc"),
            ("SEARCH_QUERY", "ResNet"),
            ("THROUGHPUT_DURATION", "3"),
            ("MAX_CONCURRENT", "4"),
            ("MEASURE_THROUGHPUT", "true"),
            ("CLIENT_TYPE", "native"),
        ]))
        .unwrap();

        assert_eq!(config.server_url, "http://localhost:8050/sse");
        assert_eq!(config.results_dir, PathBuf::from("/tmp/results"));
        assert_eq!(config.runs, 5);
        assert_eq!(config.modelcard_id, "megadetector-mc");
        assert_eq!(config.search_query, "ResNet");
        assert_eq!(config.variant.as_deref(), Some("native"));
        assert!(config.throughput.enabled);
        assert_eq!(config.throughput.duration, Duration::from_secs(3));
        assert_eq!(config.throughput.max_concurrent, 4);
    }

    #[test]
    fn test_zero_runs_rejected() {
        let err = BenchConfig::from_vars(vars(&[("BENCHMARK_RUNS", "0")])).unwrap_err();
        assert!(matches!(err, BenchError::InvalidConfig(_)));
    }

    #[test]
    fn test_non_numeric_runs_rejected() {
        assert!(BenchConfig::from_vars(vars(&[("BENCHMARK_RUNS", "many")])).is_err());
    }

    #[test]
    fn test_endpoint_paths() {
        let paths = EndpointPaths::default();
        let get = OperationCall::get("abc");
        assert_eq!(paths.path_for(&get), "/modelcard/abc");
        assert_eq!(EndpointPaths::query_for(&get), None);

        let search = OperationCall::search("AlexNet");
        assert_eq!(paths.path_for(&search), "/modelcards/search");
        assert_eq!(EndpointPaths::query_for(&search), Some(("q", "AlexNet")));
    }

    #[test]
    fn test_call_for_uses_configured_arguments() {
        let config = BenchConfig::default();
        let call = config.call_for(Operation::GetModelcard);
        assert_eq!(call.argument, DEFAULT_MODELCARD_ID);
        let call = config.call_for(Operation::SearchModelcards);
        assert_eq!(call.argument, DEFAULT_SEARCH_QUERY);
    }

    #[test]
    fn test_analysis_config_overrides() {
        let config = AnalysisConfig::from_vars(vars(&[
            ("REST_RESULTS_DIR", "/data/rest"),
            ("ANALYSIS_OUTPUT_DIR", "/data/out"),
        ]))
        .unwrap();
        assert_eq!(config.rest_dir, PathBuf::from("/data/rest"));
        assert_eq!(config.output_dir, PathBuf::from("/data/out"));
        assert_eq!(config.db_dir, AnalysisConfig::default().db_dir);
    }
}
