//! CLI for cardbench.
//!
//! This crate provides the command-line interface: the `run` subcommand
//! drives one benchmark transport against a live server, the remaining
//! subcommands aggregate results already on disk.

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

use anyhow::{anyhow, Context};
use cardbench_analysis::compare::OperationOutcome;
use cardbench_analysis::layered::LayeredBreakdown;
use cardbench_analysis::report;
use cardbench_analysis::{RowSelection, StageOptions};
use cardbench_benchmarks::{run_benchmark, RunPlan, RunReport, RunTarget};
use cardbench_core::{Aggregation, AnalysisConfig, BenchConfig, Operation, RecordFormat, Transport};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Cardbench CLI.
#[derive(Parser, Debug)]
#[command(name = "cardbench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Benchmark one transport and write a new run directory.
    ///
    /// Settings come from the environment (and `.env`); flags override them.
    Run {
        /// rest, rest-socket, native-mcp or layered-mcp.
        #[arg(short, long)]
        transport: RunTarget,

        /// Operation to measure, repeatable (default: all).
        #[arg(short, long = "operation")]
        operations: Vec<Operation>,

        /// Record format override (pair, scalar, sized, socket).
        #[arg(short, long)]
        format: Option<RecordFormat>,

        /// Samples per operation.
        #[arg(short = 'n', long)]
        runs: Option<u64>,

        /// Server endpoint.
        #[arg(long)]
        server_url: Option<String>,

        /// Root directory for run directories.
        #[arg(long)]
        results_dir: Option<PathBuf>,

        /// Also measure throughput after the sequential runs.
        #[arg(long)]
        throughput: bool,
    },

    /// Compare transports against the database baseline.
    Compare {
        /// Output directory override.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Break latency down per transport into database and protocol legs.
    Breakdown {
        /// Output directory override.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Staged timestamp file as LABEL=PATH, repeatable; renders the
        /// query-vs-overhead chart.
        #[arg(long, value_parser = parse_labelled_path)]
        staged: Vec<(String, PathBuf)>,
    },

    /// Render server stages of a staged timestamp file.
    Gantt {
        /// Staged timestamp CSV file.
        #[arg(long)]
        csv: PathBuf,

        /// Plot one row (zero-based) instead of an aggregate.
        #[arg(long, conflicts_with = "agg")]
        row: Option<usize>,

        /// Aggregation across rows: mean, median or p95.
        #[arg(long)]
        agg: Option<Aggregation>,

        /// Keep the embedding removal segment.
        #[arg(long)]
        include_embedding: bool,

        /// Append the segment from the last stage to the request end.
        #[arg(long)]
        include_overhead: bool,

        /// Output file, default derived from the options.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Plot response time per run for REST, native and layered MCP.
    Rtt {
        /// Run directory holding the series files.
        #[arg(long)]
        run_dir: PathBuf,

        /// Operation to plot.
        #[arg(long, default_value = "get_modelcard")]
        operation: Operation,

        /// Output directory override.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Show the effective configuration.
    Status {
        /// Show analysis paths as well.
        #[arg(short, long)]
        detailed: bool,
    },
}

fn parse_labelled_path(s: &str) -> Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((label, path)) if !label.trim().is_empty() && !path.trim().is_empty() => {
            Ok((label.trim().to_string(), PathBuf::from(path.trim())))
        }
        _ => Err(format!("expected LABEL=PATH, got '{}'", s)),
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` selects the filter, `info` when unset.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn analysis_config(output_dir: Option<PathBuf>) -> anyhow::Result<AnalysisConfig> {
    let mut config = AnalysisConfig::from_env().context("invalid analysis configuration")?;
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    Ok(config)
}

/// Run the CLI with parsed arguments.
///
/// # Returns
///
/// Returns `Ok(())` on success, or an error if the command fails.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run {
            transport,
            operations,
            format,
            runs,
            server_url,
            results_dir,
            throughput,
        } => {
            let mut config = BenchConfig::from_env().context("invalid benchmark configuration")?;
            if let Some(runs) = runs {
                config.runs = runs;
            }
            if let Some(url) = server_url {
                config.server_url = url;
            }
            if let Some(dir) = results_dir {
                config.results_dir = dir;
            }
            config.throughput.enabled |= throughput;

            let mut plan = RunPlan::new(transport);
            if !operations.is_empty() {
                plan.operations = operations;
            }
            plan.format = format;

            println!("Benchmarking {} against {}", transport.to_string().bold(), config.server_url);
            let report = run_benchmark(&config, &plan).await?;
            print_run(&report);
            Ok(())
        }
        Commands::Compare { output_dir } => {
            let config = analysis_config(output_dir)?;
            let outcomes = report::comparison_report(&config)?;
            for outcome in &outcomes {
                print_outcome(outcome);
            }
            println!("\nCharts written to {}", config.output_dir.display());
            Ok(())
        }
        Commands::Breakdown { output_dir, staged } => {
            let config = analysis_config(output_dir)?;
            let breakdowns = report::breakdown_report(&config)?;
            for breakdown in &breakdowns {
                print_breakdown(breakdown);
            }
            if !staged.is_empty() {
                let path = report::query_overhead_report(&staged, &config.output_dir)?;
                println!("Query vs overhead chart: {}", path.display());
            }
            println!("\nCharts written to {}", config.output_dir.display());
            Ok(())
        }
        Commands::Gantt {
            csv,
            row,
            agg,
            include_embedding,
            include_overhead,
            output,
        } => {
            let config = analysis_config(None)?;
            let selection = match row {
                Some(row) => RowSelection::Row(row),
                None => RowSelection::Aggregate(agg.unwrap_or_default()),
            };
            let options = StageOptions::new(include_embedding, include_overhead);
            let path = report::gantt_report(&csv, selection, &options, output, &config.output_dir)?;
            println!("Stage chart: {}", path.display());
            Ok(())
        }
        Commands::Rtt {
            run_dir,
            operation,
            output_dir,
        } => {
            let config = analysis_config(output_dir)?;
            let path = report::series_report(&run_dir, operation, &config.output_dir)?;
            println!("Response time chart: {}", path.display());
            Ok(())
        }
        Commands::Status { detailed } => {
            let config = BenchConfig::from_env().context("invalid benchmark configuration")?;
            println!("{}", "Cardbench".bold());
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("{}", serde_json::to_string_pretty(&config)?);

            if detailed {
                let analysis =
                    AnalysisConfig::from_env().context("invalid analysis configuration")?;
                println!("\nAnalysis:");
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            }
            Ok(())
        }
    }
}

fn print_run(report: &RunReport) {
    for op in &report.operations {
        let latency = op
            .latency
            .map(|s| s.to_string())
            .unwrap_or_else(|| "no samples".to_string());
        let failed = if op.failed > 0 {
            format!("{} failed", op.failed).red().to_string()
        } else {
            "0 failed".green().to_string()
        };
        println!(
            "  {:<18} {}/{} ok, {}  {}",
            op.operation.name(),
            op.completed,
            op.requested,
            failed,
            latency
        );
    }
    for tp in &report.throughput {
        println!(
            "  {:<18} {:.1} req/s over {} workers ({} errors)",
            tp.operation.name(),
            tp.throughput_per_sec,
            tp.workers,
            tp.errors
        );
    }
    println!("Results written to {}", report.run_dir.display());
}

fn print_outcome(outcome: &OperationOutcome) {
    let operation = outcome.operation();
    println!("\n{}", operation.title().bold());
    match outcome {
        OperationOutcome::Compared(comparison) => {
            let db = comparison.summary(Transport::Database);
            println!(
                "  {:<12} {:.2} ± {:.2} ms",
                Transport::Database.label(),
                db.mean_ms,
                db.std_ms
            );
            for (name, transport) in [
                ("REST", Transport::Rest),
                ("MCP", Transport::NativeMcp),
                ("REST+MCP", Transport::LayeredMcp),
            ] {
                let s = comparison.summary(transport);
                let overhead = format!("{:+.2} ms vs DB", comparison.overhead_ms(transport));
                println!(
                    "  {:<12} {:.2} ± {:.2} ms ({})",
                    name,
                    s.mean_ms,
                    s.std_ms,
                    overhead.yellow()
                );
            }
        }
        OperationOutcome::Skipped { missing, .. } => {
            let names: Vec<&str> = missing.iter().map(Transport::label).collect();
            println!("  {} missing {}", "skipped:".yellow(), names.join(", "));
        }
    }
}

fn print_breakdown(breakdown: &LayeredBreakdown) {
    println!("\n{}", breakdown.operation.title().bold());
    for bar in breakdown.bars() {
        let parts: Vec<String> = bar
            .segments
            .iter()
            .map(|s| format!("{} {:.2} ms", s.kind.label(), s.value_ms))
            .collect();
        println!("  {:<8} {:.2} ms = {}", bar.label, bar.total_ms(), parts.join(" + "));
    }
    for (transport, leg) in &breakdown.missing {
        println!("  {} {} has no {} results", "skipped:".yellow(), transport.label(), leg);
    }
}

/// Reject flags that parse but cannot be honored together.
pub fn check_args(cli: &Cli) -> anyhow::Result<()> {
    if let Commands::Run {
        transport: RunTarget::Client(Transport::Database),
        ..
    } = &cli.command
    {
        return Err(anyhow!("the database baseline is produced by the server, not by a runner"));
    }
    Ok(())
}
