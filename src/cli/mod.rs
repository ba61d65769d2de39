pub mod schema;
pub mod solve;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "planrace")]
#[command(
    author,
    version,
    about = "Speculative planning-solver racer for SAS+ orchestration tasks"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Solve an encoded planning task
    Solve(SolveArgs),

    /// Print JSON Schema for config validation
    Schema,
}

#[derive(Parser, Clone)]
pub struct SolveArgs {
    /// Path to the encoded task file (JSON)
    pub task: PathBuf,

    /// Path to config file
    #[arg(short, long, default_value = "planrace.yaml")]
    pub config: PathBuf,

    /// Build a partial-order (parallel) representation
    #[arg(long)]
    pub parallel: bool,

    /// Emit a behavioural signature instead of a plan model
    #[arg(long)]
    pub bsig: bool,

    /// Print the raw solver plan artifact
    #[arg(long)]
    pub raw: bool,

    /// Try heuristics one after another instead of racing them
    #[arg(long)]
    pub sequential: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Override per-search timeout (seconds)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Override per-search memory budget (KiB)
    #[arg(long)]
    pub max_memory: Option<u64>,

    /// Keep scratch directories for inspection
    #[arg(long)]
    pub debug: bool,
}
