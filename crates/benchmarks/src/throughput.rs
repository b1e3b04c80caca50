//! Throughput mode.
//!
//! A fixed pool of worker tasks shares one client and issues calls until a
//! common deadline. Counters are atomic; each worker keeps its own latency
//! vector, merged after every worker has joined.

use cardbench_adapters::ModelcardClient;
use cardbench_core::{OperationCall, Summary, ThroughputConfig};
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::result::ThroughputReport;

/// Run the worker pool for one operation and summarize it.
pub async fn measure_throughput(
    client: Arc<dyn ModelcardClient>,
    call: &OperationCall,
    config: &ThroughputConfig,
) -> ThroughputReport {
    let completed = Arc::new(AtomicU64::new(0));
    let errors = Arc::new(AtomicU64::new(0));
    let started = Instant::now();
    let deadline = started + config.duration;

    info!(
        operation = %call.operation,
        workers = config.max_concurrent,
        duration_secs = config.duration.as_secs_f64(),
        "starting throughput measurement"
    );

    let handles: Vec<_> = (0..config.max_concurrent)
        .map(|worker| {
            let client = Arc::clone(&client);
            let call = call.clone();
            let completed = Arc::clone(&completed);
            let errors = Arc::clone(&errors);
            tokio::spawn(async move {
                let mut latencies = Vec::new();
                while Instant::now() < deadline {
                    let start = Instant::now();
                    match client.call(&call).await {
                        Ok(_) => {
                            latencies.push(start.elapsed().as_secs_f64());
                            completed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => {
                            errors.fetch_add(1, Ordering::Relaxed);
                            debug!(worker, error = %err, "throughput call failed");
                        }
                    }
                }
                latencies
            })
        })
        .collect();

    let mut latencies = Vec::new();
    for joined in join_all(handles).await {
        match joined {
            Ok(worker_latencies) => latencies.extend(worker_latencies),
            Err(err) => warn!(error = %err, "throughput worker did not finish"),
        }
    }

    let elapsed_secs = started.elapsed().as_secs_f64();
    let completed = completed.load(Ordering::Relaxed);
    let errors = errors.load(Ordering::Relaxed);
    let throughput_per_sec = if elapsed_secs > 0.0 {
        completed as f64 / elapsed_secs
    } else {
        0.0
    };

    info!(
        operation = %call.operation,
        completed,
        errors,
        throughput = %format!("{:.2}/s", throughput_per_sec),
        "throughput measurement finished"
    );

    ThroughputReport {
        operation: call.operation,
        workers: config.max_concurrent,
        elapsed_secs,
        completed,
        errors,
        throughput_per_sec,
        latency: Summary::from_secs(&latencies),
    }
}
