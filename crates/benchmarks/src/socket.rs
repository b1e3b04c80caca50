//! Detailed socket timing loop for the REST API.
//!
//! Unlike the latency loop, a row is written for every iteration, failed
//! or not; failed stages read as zero.

use cardbench_adapters::SocketProbe;
use cardbench_core::clock::epoch_secs;
use cardbench_core::{EndpointPaths, OperationCall, Summary};
use tracing::{info, warn};

use crate::error::Result;
use crate::io::CsvSink;
use crate::result::OperationReport;

/// Probe `runs` fresh connections for one call.
///
/// The blocking probe runs on tokio's blocking pool, one iteration at a time.
pub async fn run_socket_timing(
    probe: &SocketProbe,
    paths: &EndpointPaths,
    call: &OperationCall,
    runs: u64,
    sink: &CsvSink,
) -> Result<OperationReport> {
    let target = probe.target_for(paths, call)?;
    info!(operation = %call.operation, target = %target, runs, "starting socket timing");

    let mut completed = 0u64;
    let mut failed = 0u64;
    let mut totals = Vec::new();

    for i in 0..runs {
        let iteration_probe = probe.clone();
        let iteration_target = target.clone();
        let timing =
            tokio::task::spawn_blocking(move || iteration_probe.measure(&iteration_target)).await?;
        sink.append(timing.to_record(epoch_secs()))?;

        match timing.failed_stage {
            None => {
                completed += 1;
                totals.push(timing.total_time);
            }
            Some(stage) => {
                failed += 1;
                warn!(
                    operation = %call.operation,
                    iteration = i + 1,
                    stage,
                    "socket timing incomplete"
                );
            }
        }
    }

    Ok(OperationReport {
        operation: call.operation,
        requested: runs,
        completed,
        failed,
        file: sink.path().to_path_buf(),
        latency: Summary::from_secs(&totals),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardbench_core::RecordFormat;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_failed_iterations_still_write_rows() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let tmp = TempDir::new().unwrap();
        let sink = CsvSink::create(
            tmp.path().join("get_modelcard.csv"),
            RecordFormat::SocketTiming.header(),
        )
        .unwrap();
        let probe = SocketProbe::new(&format!("http://127.0.0.1:{}", port)).unwrap();

        let paths = EndpointPaths::default();
        let report = run_socket_timing(&probe, &paths, &OperationCall::get("x"), 3, &sink)
            .await
            .unwrap();

        assert_eq!(report.failed, 3);
        assert!(report.latency.is_none());
        let content = fs::read_to_string(sink.path()).unwrap();
        assert_eq!(content.lines().count(), 4);
        assert!(content.starts_with("timestamp,dns_lookup,"));
    }
}
