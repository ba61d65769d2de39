use super::{optimize_plan, SearchLimits, SolverBackend, Workspace};
use super::SEARCH_LOG;
use crate::config::Config;
use crate::error::SolverError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// One competing solver subprocess: a heuristic configuration racing its
/// siblings for the same problem, writing to its own output artifact.
struct RaceRun {
    heuristic: String,
    artifact: PathBuf,
    handle: JoinHandle<()>,
}

/// Speculative Race Scheduler: launches one search subprocess per heuristic
/// configuration against the same preprocessed problem, cancels every run as
/// soon as any output artifact appears, and keeps the shortest plan.
pub struct RaceScheduler {
    backend: Arc<dyn SolverBackend>,
    heuristics: Vec<String>,
    limits: SearchLimits,
    poll_interval: Duration,
    optimize: bool,
}

impl RaceScheduler {
    pub fn new(backend: Arc<dyn SolverBackend>, config: &Config) -> Self {
        Self {
            backend,
            heuristics: config.heuristics.clone(),
            limits: SearchLimits::from_config(config),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            // racing defaults to no refinement; config can switch it on
            optimize: config.optimize.unwrap_or(false),
        }
    }

    /// Race every configured heuristic. `Ok(None)` means no run produced a
    /// plan; a missing intermediate artifact aborts before any search spawns.
    pub async fn solve(&self, workspace: &Workspace) -> Result<Option<PathBuf>, SolverError> {
        let dir = workspace.path();
        let plan_file = workspace.plan_file();

        self.backend.preprocess(dir, &workspace.sas_file()).await?;
        if !workspace.intermediate_artifact().exists() {
            warn!("preprocessing produced no intermediate artifact, not racing");
            return Err(SolverError::PreprocessingFailed);
        }

        let runs = self.spawn_runs(dir, &plan_file);
        info!(runs = runs.len(), "race started");

        // external termination signals funnel into the same cancellation
        // routine as winner-takes-all cutoff
        #[cfg(unix)]
        let signal_guard = tokio::spawn(cancel_on_signal(
            runs.iter().map(|run| run.handle.abort_handle()).collect(),
        ));

        loop {
            let alive = runs.iter().any(|run| !run.handle.is_finished());
            let artifact_exists = runs.iter().any(|run| run.artifact.exists());
            if !alive || artifact_exists {
                break;
            }
            sleep(self.poll_interval).await;
        }

        // cut off stragglers that raced past the check
        cancel_runs(&runs);
        #[cfg(unix)]
        signal_guard.abort();

        let artifacts: Vec<PathBuf> = runs.iter().map(|run| run.artifact.clone()).collect();
        futures::future::join_all(runs.into_iter().map(|run| run.handle)).await;

        match select_shortest(artifacts.iter().map(PathBuf::as_path)) {
            Some(selected) => {
                std::fs::copy(&selected, &plan_file)?;
                info!(artifact = %selected.display(), "race produced a plan");
                if self.optimize {
                    optimize_plan(self.backend.as_ref(), workspace, self.limits).await;
                }
                Ok(Some(plan_file))
            }
            None => {
                debug!("no race run produced a plan");
                Ok(None)
            }
        }
    }

    fn spawn_runs(&self, dir: &Path, plan_file: &Path) -> Vec<RaceRun> {
        let single = self.heuristics.len() == 1;
        let mut runs = Vec::with_capacity(self.heuristics.len());

        for heuristic in &self.heuristics {
            let artifact = PathBuf::from(format!("{}.{}", plan_file.display(), heuristic));
            let log_file = if single {
                dir.join(SEARCH_LOG)
            } else {
                dir.join(format!("{}.{}", SEARCH_LOG, heuristic))
            };

            let backend = self.backend.clone();
            let limits = self.limits;
            let dir = dir.to_path_buf();
            let heuristic_name = heuristic.clone();
            let run_artifact = artifact.clone();

            let handle = tokio::spawn(async move {
                match backend
                    .search(&dir, &heuristic_name, &run_artifact, &log_file, limits)
                    .await
                {
                    Ok(outcome) => debug!(
                        heuristic = %heuristic_name,
                        code = outcome.exit_code,
                        secs = outcome.duration.as_secs_f64(),
                        timed_out = outcome.timed_out,
                        "race run finished"
                    ),
                    Err(e) => warn!(heuristic = %heuristic_name, error = %e, "race run failed"),
                }
            });

            runs.push(RaceRun {
                heuristic: heuristic.clone(),
                artifact,
                handle,
            });
        }
        runs
    }
}

/// Terminate every race run scoped to this invocation. Aborting a run's task
/// drops its child handle, which kills the underlying subprocess.
fn cancel_runs(runs: &[RaceRun]) {
    for run in runs {
        if !run.handle.is_finished() {
            debug!(heuristic = %run.heuristic, "cancelling race run");
        }
        run.handle.abort();
    }
}

#[cfg(unix)]
async fn cancel_on_signal(aborts: Vec<tokio::task::AbortHandle>) {
    use tokio::signal::unix::{signal, SignalKind};

    let (Ok(mut hangup), Ok(mut interrupt), Ok(mut terminate)) = (
        signal(SignalKind::hangup()),
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) else {
        warn!("failed to install signal handlers for race cancellation");
        return;
    };

    tokio::select! {
        _ = hangup.recv() => {}
        _ = interrupt.recv() => {}
        _ = terminate.recv() => {}
    }

    warn!("termination signal received, cancelling race runs");
    for handle in &aborts {
        handle.abort();
    }
}

/// Pick the artifact with the fewest plan lines. Line count is the tie-break
/// proxy for plan length; cost is deliberately not consulted. Ties keep the
/// first artifact scanned.
pub(super) fn select_shortest<'a>(
    artifacts: impl Iterator<Item = &'a Path>,
) -> Option<PathBuf> {
    let mut best: Option<(usize, PathBuf)> = None;
    for artifact in artifacts {
        if !artifact.exists() {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(artifact) else {
            continue;
        };
        let lines = content.lines().count();
        if best.as_ref().map_or(true, |(shortest, _)| lines < *shortest) {
            best = Some((lines, artifact.to_path_buf()));
        }
    }
    best.map(|(_, artifact)| artifact)
}

#[cfg(test)]
mod tests {
    use super::super::testing::MockBackend;
    use super::*;

    fn plan_of(lines: usize) -> String {
        (0..lines)
            .map(|i| format!("(op-{} a)\n", i))
            .collect::<String>()
    }

    fn race_config(heuristics: &[&str]) -> Config {
        Config {
            heuristics: heuristics.iter().map(|h| h.to_string()).collect(),
            poll_interval_ms: 10,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_selects_shortest_artifact() {
        let config = race_config(&["wide", "narrow"]);
        let backend = Arc::new(
            MockBackend::new()
                .with_plan("wide", &plan_of(8))
                .with_plan("narrow", &plan_of(5)),
        );
        let workspace = Workspace::create(&config).unwrap();
        std::fs::write(workspace.sas_file(), "encoded").unwrap();

        let scheduler = RaceScheduler::new(backend, &config);
        let plan_file = scheduler.solve(&workspace).await.unwrap().unwrap();

        let content = std::fs::read_to_string(plan_file).unwrap();
        assert_eq!(content.lines().count(), 5);
    }

    #[tokio::test]
    async fn test_preprocess_failure_spawns_no_search() {
        let config = race_config(&["lama"]);
        let backend = Arc::new(MockBackend::failing_preprocess());
        let workspace = Workspace::create(&config).unwrap();
        std::fs::write(workspace.sas_file(), "encoded").unwrap();

        let scheduler = RaceScheduler::new(backend.clone(), &config);
        let err = scheduler.solve(&workspace).await.unwrap_err();

        assert!(matches!(err, SolverError::PreprocessingFailed));
        assert_eq!(backend.search_count(), 0);
    }

    #[tokio::test]
    async fn test_tie_selects_exactly_one() {
        let config = race_config(&["first", "second"]);
        let backend = Arc::new(
            MockBackend::new()
                .with_plan("first", &plan_of(10))
                .with_plan("second", &plan_of(10)),
        );
        let workspace = Workspace::create(&config).unwrap();
        std::fs::write(workspace.sas_file(), "encoded").unwrap();

        let scheduler = RaceScheduler::new(backend.clone(), &config);
        let plan_file = scheduler.solve(&workspace).await.unwrap().unwrap();

        let content = std::fs::read_to_string(plan_file).unwrap();
        assert_eq!(content.lines().count(), 10);
        assert_eq!(backend.search_count(), 2);
    }

    #[tokio::test]
    async fn test_no_artifact_reports_absence() {
        let config = race_config(&["lama"]);
        let backend = Arc::new(MockBackend::new());
        let workspace = Workspace::create(&config).unwrap();
        std::fs::write(workspace.sas_file(), "encoded").unwrap();

        let scheduler = RaceScheduler::new(backend, &config);
        let result = scheduler.solve(&workspace).await.unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_select_shortest_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("out.plan.a");
        let missing = dir.path().join("out.plan.b");
        std::fs::write(&present, plan_of(3)).unwrap();

        let selected = select_shortest([missing.as_path(), present.as_path()].into_iter());
        assert_eq!(selected.unwrap(), present);
    }
}
