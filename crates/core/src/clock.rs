// Copyright 2025 Cardbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Timestamps for latency records.
//!
//! Records of the `(start, end)` shape need timestamps that never run
//! backwards between two reads, and that still look like wall-clock
//! seconds when read back. [`BenchClock`] anchors a monotonic [`Instant`]
//! to the epoch once and derives every later reading from it.

use chrono::Utc;
use std::time::Instant;

/// Monotonic clock anchored to the Unix epoch.
#[derive(Debug, Clone, Copy)]
pub struct BenchClock {
    origin: Instant,
    origin_epoch_secs: f64,
}

impl Default for BenchClock {
    fn default() -> Self {
        Self::new()
    }
}

impl BenchClock {
    /// Anchor a new clock at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            origin_epoch_secs: epoch_secs(),
        }
    }

    /// Seconds since the Unix epoch, advanced monotonically.
    pub fn now_secs(&self) -> f64 {
        self.origin_epoch_secs + self.origin.elapsed().as_secs_f64()
    }
}

/// Wall-clock seconds since the Unix epoch with microsecond resolution.
pub fn epoch_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
