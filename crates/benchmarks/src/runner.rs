//! Sequential latency loop.
//!
//! Calls are issued strictly one after another. Each completed call is
//! appended to the operation's CSV before the next call starts; a failed
//! call is logged and leaves no row.

use cardbench_adapters::ModelcardClient;
use cardbench_core::{BenchClock, OperationCall, RecordFormat, Summary};
use tracing::{debug, info, warn};

use crate::error::{Result, RunError};
use crate::io::CsvSink;
use crate::result::OperationReport;

/// Build the CSV record of one completed call.
///
/// `start` and `end` are clock readings in seconds.
pub fn latency_record(
    format: RecordFormat,
    start: f64,
    end: f64,
    size_kb: f64,
) -> Result<Vec<String>> {
    let duration = end - start;
    match format {
        RecordFormat::TimestampPair => Ok(vec![start.to_string(), end.to_string()]),
        RecordFormat::ScalarDuration => Ok(vec![duration.to_string()]),
        RecordFormat::SizedResponse => Ok(vec![
            (duration * 1000.0).to_string(),
            size_kb.to_string(),
        ]),
        other => Err(RunError::UnsupportedFormat(other)),
    }
}

/// Drives one client through the measured loop of each operation.
pub struct LatencyRunner<'a> {
    client: &'a dyn ModelcardClient,
    format: RecordFormat,
    runs: u64,
    warmup: u64,
    clock: BenchClock,
}

impl<'a> LatencyRunner<'a> {
    /// Create a runner; `format` must be one the loop can produce.
    pub fn new(
        client: &'a dyn ModelcardClient,
        format: RecordFormat,
        runs: u64,
        warmup: u64,
    ) -> Result<Self> {
        latency_record(format, 0.0, 0.0, 0.0)?;
        Ok(Self {
            client,
            format,
            runs,
            warmup,
            clock: BenchClock::new(),
        })
    }

    /// Record format of the rows this runner appends.
    pub fn format(&self) -> RecordFormat {
        self.format
    }

    /// Issue the discarded warm-up calls.
    pub async fn warm_up(&self, call: &OperationCall) {
        for i in 0..self.warmup {
            if let Err(err) = self.client.call(call).await {
                debug!(
                    operation = %call.operation,
                    iteration = i,
                    error = %err,
                    "warm-up call failed"
                );
            }
        }
    }

    /// Warm up, then run the measured loop and append one row per success.
    pub async fn run(&self, call: &OperationCall, sink: &CsvSink) -> Result<OperationReport> {
        self.warm_up(call).await;

        info!(
            operation = %call.operation,
            transport = %self.client.transport(),
            runs = self.runs,
            "starting measured loop"
        );

        let mut completed = 0u64;
        let mut failed = 0u64;
        let mut latencies = Vec::with_capacity(self.runs as usize);

        for i in 0..self.runs {
            let start = self.clock.now_secs();
            let outcome = self.client.call(call).await;
            let end = self.clock.now_secs();

            match outcome {
                Ok(response) => {
                    sink.append(latency_record(self.format, start, end, response.size_kb())?)?;
                    latencies.push(end - start);
                    completed += 1;
                    debug!(
                        operation = %call.operation,
                        iteration = i + 1,
                        ms = (end - start) * 1000.0,
                        "call completed"
                    );
                }
                Err(err) => {
                    failed += 1;
                    warn!(
                        operation = %call.operation,
                        iteration = i + 1,
                        error = %err,
                        "call failed, no row recorded"
                    );
                }
            }
        }

        let latency = Summary::from_secs(&latencies);
        if let Some(summary) = &latency {
            info!(operation = %call.operation, completed, failed, "{}", summary);
        }

        Ok(OperationReport {
            operation: call.operation,
            requested: self.runs,
            completed,
            failed,
            file: sink.path().to_path_buf(),
            latency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardbench_adapters::{AdapterError, CallResponse, MockModelcardClient};
    use cardbench_core::{Operation, Transport};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn always_ok() -> MockModelcardClient {
        let mut mock = MockModelcardClient::new();
        mock.expect_transport().return_const(Transport::NativeMcp);
        mock.expect_call()
            .returning(|_| Ok(CallResponse { size_bytes: 2048 }));
        mock
    }

    #[test]
    fn test_latency_record_shapes() {
        assert_eq!(
            latency_record(RecordFormat::TimestampPair, 1.0, 1.5, 0.0).unwrap(),
            vec!["1", "1.5"]
        );
        assert_eq!(
            latency_record(RecordFormat::ScalarDuration, 1.0, 1.5, 0.0).unwrap(),
            vec!["0.5"]
        );
        assert_eq!(
            latency_record(RecordFormat::SizedResponse, 1.0, 1.5, 2.0).unwrap(),
            vec!["500", "2"]
        );
        assert!(latency_record(RecordFormat::StagedPipeline, 1.0, 1.5, 0.0).is_err());
    }

    #[tokio::test]
    async fn test_sized_response_run_has_header_plus_n_lines() {
        let tmp = TempDir::new().unwrap();
        let client = always_ok();
        let format = RecordFormat::SizedResponse;
        let sink = CsvSink::create(tmp.path().join("get_modelcard.csv"), format.header()).unwrap();

        let runner = LatencyRunner::new(&client, format, 5, 0).unwrap();
        let report = runner.run(&OperationCall::get("x"), &sink).await.unwrap();

        let content = fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "response_time_ms,response_size_kb");
        assert!(lines[1].ends_with(",2"));
        assert_eq!(report.completed, 5);
        assert_eq!(report.failed, 0);
        assert_eq!(report.operation, Operation::GetModelcard);
    }

    #[tokio::test]
    async fn test_scalar_run_starts_with_total_time_header() {
        let tmp = TempDir::new().unwrap();
        let client = always_ok();
        let format = RecordFormat::ScalarDuration;
        let sink = CsvSink::create(tmp.path().join("get_modelcard.csv"), format.header()).unwrap();

        let runner = LatencyRunner::new(&client, format, 3, 0).unwrap();
        runner.run(&OperationCall::get("x"), &sink).await.unwrap();

        let content = fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "total_time");
        assert!(lines[1].parse::<f64>().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_failed_calls_leave_no_row() {
        let tmp = TempDir::new().unwrap();
        let mut client = MockModelcardClient::new();
        client.expect_transport().return_const(Transport::Rest);
        let mut n = 0;
        client.expect_call().times(9).returning(move |_| {
            n += 1;
            if n % 3 == 0 {
                Err(AdapterError::Timeout(Duration::from_secs(1)))
            } else {
                Ok(CallResponse { size_bytes: 10 })
            }
        });

        let sink = CsvSink::create(tmp.path().join("search_modelcards.csv"), None).unwrap();
        let runner = LatencyRunner::new(&client, RecordFormat::TimestampPair, 9, 0).unwrap();
        let report = runner.run(&OperationCall::search("AlexNet"), &sink).await.unwrap();

        assert_eq!(report.completed, 6);
        assert_eq!(report.failed, 3);
        let content = fs::read_to_string(sink.path()).unwrap();
        assert_eq!(content.lines().count(), 6);
    }

    #[tokio::test]
    async fn test_pair_rows_are_ordered() {
        let tmp = TempDir::new().unwrap();
        let client = always_ok();
        let sink = CsvSink::create(tmp.path().join("get_modelcard.csv"), None).unwrap();
        let runner = LatencyRunner::new(&client, RecordFormat::TimestampPair, 20, 0).unwrap();
        runner.run(&OperationCall::get("x"), &sink).await.unwrap();

        let content = fs::read_to_string(sink.path()).unwrap();
        for line in content.lines() {
            let (start, end) = line.split_once(',').unwrap();
            let start: f64 = start.parse().unwrap();
            let end: f64 = end.parse().unwrap();
            assert!(end - start >= 0.0);
        }
    }

    #[tokio::test]
    async fn test_warmup_calls_are_not_recorded() {
        let tmp = TempDir::new().unwrap();
        let mut client = MockModelcardClient::new();
        client.expect_transport().return_const(Transport::Rest);
        client.expect_call()
            .times(5)
            .returning(|_| Ok(CallResponse { size_bytes: 1 }));

        let sink = CsvSink::create(tmp.path().join("get_modelcard.csv"), None).unwrap();
        let runner = LatencyRunner::new(&client, RecordFormat::ScalarDuration, 3, 2).unwrap();
        let report = runner.run(&OperationCall::get("x"), &sink).await.unwrap();

        assert_eq!(report.completed, 3);
        assert_eq!(fs::read_to_string(sink.path()).unwrap().lines().count(), 3);
    }

    #[test]
    fn test_runner_rejects_server_side_formats() {
        let client = always_ok();
        assert!(LatencyRunner::new(&client, RecordFormat::SocketTiming, 1, 0).is_err());
    }
}
