//! # Cloudship Operator
//!
//! Binary entry point. `run` (the default) starts the operator; `crd` prints
//! the CustomResourceDefinitions for `kubectl apply`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use cloudship_operator::observability::otel::shutdown_otel;
use cloudship_operator::runtime::{initialize, run_watch_loop};
use tracing::info;

/// Cloudship operator
#[derive(Parser)]
#[command(name = "cloudship-operator", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the operator (default)
    Run,
    /// Print the CustomResourceDefinitions as YAML
    Crd,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Crd => {
            print!("{}", cloudship_operator::crd::render_crds()?);
            Ok(())
        }
        Commands::Run => run().await,
    }
}

async fn run() -> Result<()> {
    let init = initialize().await?;
    let result = run_watch_loop(init.reconciler, init.server_state).await;

    info!("Shutting down...");
    shutdown_otel(init.otel_tracer_provider);
    result
}
