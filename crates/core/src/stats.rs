//! Summary statistics over latency samples.
//!
//! Samples are recorded in seconds and reported in milliseconds. The
//! standard deviation is the sample deviation (n - 1 denominator) every
//! time it is computed, and percentiles interpolate linearly between the
//! two closest ranks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BenchError;

/// Convert seconds to milliseconds.
pub fn secs_to_ms(secs: f64) -> f64 {
    secs * 1000.0
}

/// Error bar of a stacked segment made of two independent components.
///
/// Root-sum-of-squares is only exact when the components are
/// statistically independent; correlated components are understated.
pub fn combine_std(a_std: f64, b_std: f64) -> f64 {
    (a_std * a_std + b_std * b_std).sqrt()
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation; zero for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt()
}

/// Percentile `q` in `[0, 1]` of already sorted values.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Percentile `q` in `[0, 1]` of unsorted values.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, q)
}

/// How a column of values is reduced to one number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Arithmetic mean
    #[default]
    Mean,
    /// 50th percentile
    Median,
    /// 95th percentile
    P95,
}

impl Aggregation {
    /// Reduce the values, `None` when there are none.
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        match self {
            Self::Mean => mean(values),
            Self::Median => percentile(values, 0.5),
            Self::P95 => percentile(values, 0.95),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::P95 => "p95",
        })
    }
}

impl FromStr for Aggregation {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "p95" | "p_95" | "quantile95" => Ok(Self::P95),
            other => Err(BenchError::InvalidConfig(format!(
                "unsupported aggregation '{}'",
                other
            ))),
        }
    }
}

/// Latency summary in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of samples
    pub count: usize,
    /// Mean latency
    pub mean_ms: f64,
    /// Sample standard deviation
    pub std_ms: f64,
    /// Median latency
    pub median_ms: f64,
    /// 95th percentile latency
    pub p95_ms: f64,
    /// Minimum latency
    pub min_ms: f64,
    /// Maximum latency
    pub max_ms: f64,
}

impl Summary {
    /// Summarize durations given in seconds.
    pub fn from_secs(samples: &[f64]) -> Option<Self> {
        let ms: Vec<f64> = samples.iter().copied().map(secs_to_ms).collect();
        Self::from_ms(&ms)
    }

    /// Summarize durations given in milliseconds.
    pub fn from_ms(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        Some(Self {
            count: sorted.len(),
            mean_ms: mean(&sorted)?,
            std_ms: sample_std(&sorted),
            median_ms: percentile_sorted(&sorted, 0.5)?,
            p95_ms: percentile_sorted(&sorted, 0.95)?,
            min_ms: sorted[0],
            max_ms: sorted[sorted.len() - 1],
        })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} ± {:.1} ms (n={})", self.mean_ms, self.std_ms, self.count)
    }
}
