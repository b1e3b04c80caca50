//! Cardbench CLI entry point.

use clap::Parser;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = cardbench_cli::Cli::parse();
    cardbench_cli::init_tracing(cli.log_json);

    let result = match cardbench_cli::check_args(&cli) {
        Ok(()) => cardbench_cli::run(cli).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
