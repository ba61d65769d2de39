mod downward;
mod optimize;
mod race;
mod sequential;
mod workspace;

pub use downward::DownwardBackend;
pub use optimize::optimize_plan;
pub use race::RaceScheduler;
pub use sequential::SequentialRacer;
pub use workspace::Workspace;

use crate::config::Config;
use crate::error::SolverError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the intermediate artifact the preprocessing step must produce
/// before any search subprocess is spawned.
pub const INTERMEDIATE_ARTIFACT: &str = "output";

pub const SEARCH_LOG: &str = "search.log";

/// Admissible, cost-optimal configuration used by the plan optimizer.
pub const ADMISSIBLE_HEURISTIC: &str = "lmcut";

/// Resource budget wrapped around every search subprocess.
#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    pub timeout: Duration,
    pub max_memory_kb: u64,
    pub enforce_memory: bool,
}

impl SearchLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_sec),
            max_memory_kb: config.max_memory_kb,
            enforce_memory: !config.no_limit,
        }
    }
}

/// What happened to one solver subprocess. Success is never read off this:
/// a run succeeded only if its output artifact exists on storage.
#[derive(Debug, Clone, Copy)]
pub struct SearchOutcome {
    pub exit_code: i32,
    pub duration: Duration,
    pub timed_out: bool,
}

/// Seam to the external solver executable pair: a preprocessing step that
/// consumes the encoded problem, and a search step that consumes the
/// intermediate artifact and writes a plan artifact.
#[async_trait]
pub trait SolverBackend: Send + Sync {
    #[allow(dead_code)]
    fn name(&self) -> &'static str;

    /// Consume the encoded problem, producing the intermediate artifact in
    /// `dir`. Whether the artifact actually appeared is the caller's check.
    async fn preprocess(&self, dir: &Path, sas_file: &Path) -> Result<SearchOutcome, SolverError>;

    /// Run one search subprocess under `limits`, writing to `plan_file` and
    /// appending solver output to `log_file`.
    async fn search(
        &self,
        dir: &Path,
        heuristic: &str,
        plan_file: &Path,
        log_file: &Path,
        limits: SearchLimits,
    ) -> Result<SearchOutcome, SolverError>;
}

/// Resolve the platform-specific solver binary directory. Unsupported hosts
/// are a fatal configuration error at command-construction time.
pub fn solver_root(config: &Config) -> Result<PathBuf, SolverError> {
    let base = match &config.solver_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("solver")))
            .unwrap_or_else(|| PathBuf::from("solver")),
    };

    let platform = match (std::env::consts::OS, std::env::consts::ARCH) {
        ("linux", arch) if arch.starts_with("x86") => "linux-x86",
        ("linux", "arm") | ("linux", "aarch64") => "linux-arm",
        ("macos", _) => "macos",
        (os, arch) => {
            return Err(SolverError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            })
        }
    };

    Ok(base.join(platform))
}

/// Search-step arguments for a named heuristic configuration.
/// Unknown names fall back to plain FF.
pub fn heuristic_arguments(heuristic: &str) -> Vec<String> {
    let args: Vec<&str> = match heuristic {
        "lmcut" => vec!["--search", "astar(lmcut())"],
        "blind" => vec!["--search", "astar(blind())"],
        "cg" => vec!["--search", "lazy_greedy(cg(cost_type=2))"],
        "cea" => vec!["--search", "lazy_greedy(cea(cost_type=2))"],
        "mad" => vec!["--search", "lazy_greedy(mad())"],
        "cea2" => vec![
            "--heuristic",
            "hCea=cea(cost_type=2)",
            "--search",
            "ehc(hCea, preferred=hCea,preferred_usage=0,cost_type=0)",
        ],
        "ff2" => vec![
            "--heuristic",
            "hFF=ff(cost_type=1)",
            "--search",
            "lazy(alt([single(sum([g(),weight(hFF, 10)])),\
             single(sum([g(),weight(hFF, 10)]),pref_only=true)],boost=2000),\
             preferred=hFF,reopen_closed=false,cost_type=1)",
        ],
        "fd-autotune-1" => vec![
            "--heuristic",
            "hFF=ff(cost_type=1)",
            "--heuristic",
            "hCea=cea(cost_type=0)",
            "--heuristic",
            "hCg=cg(cost_type=2)",
            "--heuristic",
            "hGoalCount=goalcount(cost_type=0)",
            "--heuristic",
            "hAdd=add(cost_type=0)",
            "--search",
            "lazy(alt([single(sum([g(),weight(hAdd, 7)])),\
             single(sum([g(),weight(hAdd, 7)]),pref_only=true),\
             single(sum([g(),weight(hCg, 7)])),\
             single(sum([g(),weight(hCg, 7)]),pref_only=true),\
             single(sum([g(),weight(hCea, 7)])),\
             single(sum([g(),weight(hCea, 7)]),pref_only=true),\
             single(sum([g(),weight(hGoalCount, 7)])),\
             single(sum([g(),weight(hGoalCount, 7)]),pref_only=true)],boost=1000),\
             preferred=[hCea,hGoalCount],reopen_closed=false,cost_type=1)",
        ],
        "fd-autotune-2" => vec![
            "--heuristic",
            "hCea=cea(cost_type=2)",
            "--heuristic",
            "hCg=cg(cost_type=1)",
            "--heuristic",
            "hGoalCount=goalcount(cost_type=2)",
            "--heuristic",
            "hFF=ff(cost_type=0)",
            "--search",
            "lazy(alt([single(sum([weight(g(), 2),weight(hFF, 3)])),\
             single(sum([weight(g(), 2),weight(hFF, 3)]),pref_only=true),\
             single(sum([weight(g(), 2),weight(hCg, 3)])),\
             single(sum([weight(g(), 2),weight(hCg, 3)]),pref_only=true),\
             single(sum([weight(g(), 2),weight(hCea, 3)])),\
             single(sum([weight(g(), 2),weight(hCea, 3)]),pref_only=true),\
             single(sum([weight(g(), 2),weight(hGoalCount, 3)])),\
             single(sum([weight(g(), 2),weight(hGoalCount, 3)]),pref_only=true)],boost=200),\
             preferred=[hCea,hGoalCount],reopen_closed=false,cost_type=1)",
        ],
        "lama" => vec![
            "--heuristic",
            "hlm,hff=lm_ff_syn(lm_rhw(reasonable_orders=true,lm_cost_type=2,cost_type=0),\
             admissible=false, optimal=false, cost_type=0)",
            "--search",
            "lazy_greedy([hlm,hff],preferred=[hlm,hff])",
        ],
        "lmlazy" | "lm" => vec![
            "--landmarks",
            "lm=lm_rhw(reasonable_orders=true,lm_cost_type=2,cost_type=2)",
            "--heuristic",
            "hlm=lmcount(lm)",
            "--search",
            "lazy_greedy(sum([g(),weight(hlm,10)]),boost=2000,cost_type=2)",
        ],
        "lmeager" => vec![
            "--landmarks",
            "lm=lm_rhw(reasonable_orders=true,lm_cost_type=2,cost_type=2)",
            "--heuristic",
            "hlm=lmcount(lm)",
            "--search",
            "eager_greedy(sum([g(),weight(hlm,10)]),boost=2000,cost_type=2)",
        ],
        _ => vec!["--search", "lazy_greedy(ff(cost_type=0))"],
    };

    args.into_iter().map(str::to_string).collect()
}
