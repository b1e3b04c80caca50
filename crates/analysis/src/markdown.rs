//! Markdown reports of aggregated results.

use cardbench_core::{Summary, Transport};
use std::fmt::Write;

use crate::compare::OperationOutcome;
use crate::layered::LayeredBreakdown;

/// File name of the comparison report.
pub const SUMMARY_FILE: &str = "summary.md";

/// File name of the breakdown report.
pub const BREAKDOWN_FILE: &str = "breakdown.md";

const SUMMARY_HEADER: &str =
    "| Transport | n | Mean (ms) | Std (ms) | Median (ms) | p95 (ms) | Overhead vs DB (ms) |";
const SUMMARY_RULE: &str =
    "|-----------|---|-----------|----------|-------------|----------|---------------------|";

const TRANSPORTS: [Transport; 4] = [
    Transport::Database,
    Transport::Rest,
    Transport::NativeMcp,
    Transport::LayeredMcp,
];

fn summary_row(output: &mut String, name: &str, summary: &Summary, overhead: Option<f64>) {
    let _ = writeln!(
        output,
        "| {} | {} | {:.2} | {:.2} | {:.2} | {:.2} | {} |",
        name,
        summary.count,
        summary.mean_ms,
        summary.std_ms,
        summary.median_ms,
        summary.p95_ms,
        overhead.map(|o| format!("{:+.2}", o)).unwrap_or_else(|| "-".to_string()),
    );
}

/// Generate a markdown summary of the transport comparison.
pub fn generate_summary(outcomes: &[OperationOutcome]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Latency Comparison");
    let _ = writeln!(output);
    let _ = writeln!(output, "Generated: {}", chrono::Utc::now().to_rfc3339());
    let _ = writeln!(output);

    for outcome in outcomes {
        let operation = outcome.operation();
        let _ = writeln!(output, "## {} (`{}`)", operation.title(), operation);
        let _ = writeln!(output);

        match outcome {
            OperationOutcome::Compared(comparison) => {
                let _ = writeln!(output, "{}", SUMMARY_HEADER);
                let _ = writeln!(output, "{}", SUMMARY_RULE);
                for transport in TRANSPORTS {
                    let overhead = (transport != Transport::Database)
                        .then(|| comparison.overhead_ms(transport));
                    let summary = comparison.summary(transport);
                    summary_row(&mut output, transport.label(), summary, overhead);
                }
            }
            OperationOutcome::Skipped { missing, .. } => {
                let names: Vec<&str> = missing.iter().map(Transport::label).collect();
                let _ = writeln!(output, "Skipped, no data for: {}", names.join(", "));
            }
        }
        let _ = writeln!(output);
    }

    let compared = outcomes
        .iter()
        .filter(|o| matches!(o, OperationOutcome::Compared(_)))
        .count();
    let _ = writeln!(output, "---");
    let _ = writeln!(output, "Operations compared: {} of {}", compared, outcomes.len());

    output
}

/// Generate a markdown report of per-transport breakdowns.
pub fn generate_breakdown_report(breakdowns: &[LayeredBreakdown]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Latency Breakdown");
    let _ = writeln!(output);
    let _ = writeln!(output, "Generated: {}", chrono::Utc::now().to_rfc3339());
    let _ = writeln!(output);

    for breakdown in breakdowns {
        let _ = writeln!(output, "## {}", breakdown.operation.title());
        let _ = writeln!(output);
        let _ = writeln!(output, "| Transport | Segment | Mean (ms) | Error (ms) |");
        let _ = writeln!(output, "|-----------|---------|-----------|------------|");
        for bar in breakdown.bars() {
            for segment in &bar.segments {
                let _ = writeln!(
                    output,
                    "| {} | {} | {:.2} | {:.2} |",
                    bar.label,
                    segment.kind.label(),
                    segment.value_ms,
                    segment.error_ms
                );
            }
        }
        for (transport, leg) in &breakdown.missing {
            let _ = writeln!(output);
            let _ = writeln!(output, "- {}: missing `{}` results", transport.label(), leg);
        }
        let _ = writeln!(output);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{Comparison, TransportSamples};
    use cardbench_core::Operation;

    #[test]
    fn test_summary_lists_compared_and_skipped() {
        let samples = TransportSamples {
            rest: Some(vec![0.02, 0.04]),
            native_mcp: Some(vec![0.05]),
            layered_mcp: Some(vec![0.08]),
            database: Some(vec![0.01]),
        };
        let outcomes = vec![
            OperationOutcome::Compared(
                Comparison::from_samples(Operation::GetModelcard, &samples).unwrap(),
            ),
            OperationOutcome::Skipped {
                operation: Operation::SearchModelcards,
                missing: vec![Transport::NativeMcp],
            },
        ];

        let report = generate_summary(&outcomes);
        assert!(report.contains("## Model Card Retrieval (`get_modelcard`)"));
        assert!(report.contains("| Database | 1 | 10.00 |"));
        assert!(report.contains("| REST | 2 | 30.00 |"));
        assert!(report.contains("+20.00"));
        assert!(report.contains("Skipped, no data for: Native MCP"));
        assert!(report.contains("Operations compared: 1 of 2"));
    }
}
