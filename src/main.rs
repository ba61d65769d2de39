use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod bsig;
mod cli;
mod config;
mod conformant;
mod error;
mod plan;
mod planner;
mod sas;
mod solver;
mod task;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing - only show logs with --verbose
    let filter = if cli.verbose {
        EnvFilter::new("planrace=debug")
    } else {
        EnvFilter::new("planrace=warn")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Solve(args) => cli::solve::execute(args).await,
        Commands::Schema => cli::schema::execute(),
    }
}
