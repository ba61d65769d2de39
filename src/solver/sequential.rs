use super::race::select_shortest;
use super::{optimize_plan, SearchLimits, SolverBackend, Workspace};
use super::SEARCH_LOG;
use crate::config::Config;
use crate::error::SolverError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lower-concurrency fallback to the race scheduler: tries heuristic
/// configurations one at a time with the same selection semantics.
pub struct SequentialRacer {
    backend: Arc<dyn SolverBackend>,
    heuristics: Vec<String>,
    limits: SearchLimits,
    continue_after_success: bool,
    optimize: bool,
}

impl SequentialRacer {
    pub fn new(backend: Arc<dyn SolverBackend>, config: &Config) -> Self {
        Self {
            backend,
            heuristics: config.mixed_heuristics.clone(),
            limits: SearchLimits::from_config(config),
            continue_after_success: config.continue_after_success,
            // the sequential pipeline refines by default
            optimize: config.optimize.unwrap_or(true),
        }
    }

    /// Try each configuration in order. First-success mode stops at the first
    /// produced artifact; continue mode collects every success and keeps the
    /// one with the fewest plan lines.
    pub async fn solve(&self, workspace: &Workspace) -> Result<Option<PathBuf>, SolverError> {
        let dir = workspace.path();
        let plan_file = workspace.plan_file();
        let log_file = dir.join(SEARCH_LOG);

        self.backend.preprocess(dir, &workspace.sas_file()).await?;
        if !workspace.intermediate_artifact().exists() {
            warn!("preprocessing produced no intermediate artifact");
            return Err(SolverError::PreprocessingFailed);
        }

        let mut produced = 0usize;
        for heuristic in &self.heuristics {
            let outcome = self
                .backend
                .search(dir, heuristic, &plan_file, &log_file, self.limits)
                .await?;
            debug!(
                heuristic = %heuristic,
                code = outcome.exit_code,
                timed_out = outcome.timed_out,
                "sequential attempt finished"
            );

            if plan_file.exists() {
                produced += 1;
                // tag each success with its sequence number
                std::fs::rename(&plan_file, solution_path(&plan_file, produced))?;
                if !self.continue_after_success {
                    break;
                }
            }
        }

        if produced == 0 {
            debug!("no sequential attempt produced a plan");
            return Ok(None);
        }

        let candidates: Vec<PathBuf> = (1..=produced)
            .map(|i| solution_path(&plan_file, i))
            .collect();
        let Some(selected) = select_shortest(candidates.iter().map(PathBuf::as_path)) else {
            return Ok(None);
        };

        std::fs::copy(&selected, &plan_file)?;
        info!(artifact = %selected.display(), attempts = produced, "sequential race produced a plan");

        if self.optimize {
            optimize_plan(self.backend.as_ref(), workspace, self.limits).await;
        }
        Ok(Some(plan_file))
    }
}

fn solution_path(plan_file: &std::path::Path, index: usize) -> PathBuf {
    PathBuf::from(format!("{}.sol.{}", plan_file.display(), index))
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

    fn racer_config(heuristics: &[&str], continue_after_success: bool) -> Config {
        Config {
            mixed_heuristics: heuristics.iter().map(|h| h.to_string()).collect(),
            continue_after_success,
            optimize: Some(false),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_first_success_stops_early() {
        let config = racer_config(&["ff2", "cea2"], false);
        let backend = Arc::new(
            MockBackend::new()
                .with_plan("ff2", &plan_of(6))
                .with_plan("cea2", &plan_of(2)),
        );
        let workspace = Workspace::create(&config).unwrap();
        std::fs::write(workspace.sas_file(), "encoded").unwrap();

        let racer = SequentialRacer::new(backend.clone(), &config);
        let plan_file = racer.solve(&workspace).await.unwrap().unwrap();

        assert_eq!(backend.search_count(), 1);
        let content = std::fs::read_to_string(plan_file).unwrap();
        assert_eq!(content.lines().count(), 6);
    }

    #[tokio::test]
    async fn test_continue_mode_keeps_shortest() {
        let config = racer_config(&["ff2", "cea2", "lm"], true);
        let backend = Arc::new(
            MockBackend::new()
                .with_plan("ff2", &plan_of(7))
                .with_plan("cea2", &plan_of(4))
                .with_plan("lm", &plan_of(9)),
        );
        let workspace = Workspace::create(&config).unwrap();
        std::fs::write(workspace.sas_file(), "encoded").unwrap();

        let racer = SequentialRacer::new(backend.clone(), &config);
        let plan_file = racer.solve(&workspace).await.unwrap().unwrap();

        assert_eq!(backend.search_count(), 3);
        let content = std::fs::read_to_string(plan_file).unwrap();
        assert_eq!(content.lines().count(), 4);
    }

    #[tokio::test]
    async fn test_all_attempts_exhausted() {
        let config = racer_config(&["ff2", "cea2"], true);
        let backend = Arc::new(MockBackend::new());
        let workspace = Workspace::create(&config).unwrap();
        std::fs::write(workspace.sas_file(), "encoded").unwrap();

        let racer = SequentialRacer::new(backend.clone(), &config);
        let result = racer.solve(&workspace).await.unwrap();

        assert!(result.is_none());
        assert_eq!(backend.search_count(), 2);
    }
}
