mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "longseg", about = "Longitudinal SAMSEG pipeline orchestrator")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the longitudinal pipeline over a BIDS cohort
    Run(commands::run::RunArgs),
    /// Convert a raw scanner dataset into a BIDS database
    Bidsify(commands::bidsify::BidsifyArgs),
    /// Aggregate per-session segmentation stats into a cohort table
    Stats(commands::stats::StatsArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Bidsify(args) => commands::bidsify::run(args),
        Commands::Stats(args) => commands::stats::run(args),
    }
}
