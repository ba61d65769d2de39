use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::defaults::*;

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct Config {
    /// Wall-clock timeout for each search subprocess, in seconds
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,

    /// Virtual-memory ceiling for each search subprocess, in KB
    #[serde(default = "default_max_memory_kb")]
    pub max_memory_kb: u64,

    /// Heuristic configurations raced concurrently by the scheduler
    #[serde(default = "default_heuristics")]
    pub heuristics: Vec<String>,

    /// Heuristic order tried by the sequential racer
    #[serde(default = "default_mixed_heuristics")]
    pub mixed_heuristics: Vec<String>,

    /// Sequential racer: keep trying configurations after the first success
    #[serde(default)]
    pub continue_after_success: bool,

    /// Refine the winning plan with an admissible re-solve.
    /// Unset means the per-mode default: off when racing, on sequentially.
    #[serde(default)]
    pub optimize: Option<bool>,

    /// Keep scratch directories and solver logs for inspection
    #[serde(default)]
    pub debug: bool,

    /// Disable the memory ceiling on spawned solvers
    #[serde(default)]
    pub no_limit: bool,

    /// Interval of the race completion poll, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Copy the solver search log here after every solve
    #[serde(default)]
    pub search_log: Option<PathBuf>,

    /// Directory holding the per-platform solver binaries
    /// (defaults to `solver/` next to the executable)
    #[serde(default)]
    pub solver_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_sec: default_timeout_sec(),
            max_memory_kb: default_max_memory_kb(),
            heuristics: default_heuristics(),
            mixed_heuristics: default_mixed_heuristics(),
            continue_after_success: false,
            optimize: None,
            debug: false,
            no_limit: false,
            poll_interval_ms: default_poll_interval_ms(),
            search_log: None,
            solver_dir: None,
        }
    }
}
