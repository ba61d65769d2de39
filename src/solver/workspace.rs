use super::{INTERMEDIATE_ARTIFACT, SEARCH_LOG};
use crate::config::Config;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

const SAS_FILE: &str = "problem.sas";
const PLAN_FILE: &str = "out.plan";
const TIMINGS_FILE: &str = "solve.benchmarks";

/// Stray cost-accounting file the search binary leaves in its working
/// directory.
const COST_FILE: &str = "plan_numbers_and_cost";

/// Scratch directory for one solve invocation. The namespace is partitioned
/// per invocation (pid plus a random discriminator) so concurrent top-level
/// solves never collide. Cleanup runs unconditionally on drop; under debug
/// mode the directory is kept for offline inspection.
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
    keep: bool,
    search_log_copy: Option<PathBuf>,
}

impl Workspace {
    pub fn create(config: &Config) -> std::io::Result<Self> {
        let discriminator: u32 = rand::random();
        let dir = tempfile::Builder::new()
            .prefix(&format!(
                "planrace-{}-{:08x}-",
                std::process::id(),
                discriminator
            ))
            .tempdir()?;
        let path = dir.path().to_path_buf();
        debug!(dir = %path.display(), "created scratch workspace");

        Ok(Self {
            dir: Some(dir),
            path,
            keep: config.debug,
            search_log_copy: config.search_log.clone(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encoded problem location, written once per solve attempt.
    pub fn sas_file(&self) -> PathBuf {
        self.path.join(SAS_FILE)
    }

    /// Canonical plan artifact location.
    pub fn plan_file(&self) -> PathBuf {
        self.path.join(PLAN_FILE)
    }

    pub fn intermediate_artifact(&self) -> PathBuf {
        self.path.join(INTERMEDIATE_ARTIFACT)
    }

    /// Persist the named-phase timing breakdown alongside the encoded problem.
    pub fn write_timings(&self, timings: &BTreeMap<String, f64>) -> std::io::Result<()> {
        let rendered = serde_json::to_string_pretty(timings)?;
        std::fs::write(self.path.join(TIMINGS_FILE), rendered)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let stray = self.path.join(COST_FILE);
        if stray.exists() {
            let _ = std::fs::remove_file(&stray);
        }

        if let Some(destination) = &self.search_log_copy {
            let log = self.path.join(SEARCH_LOG);
            if log.exists() {
                if let Err(e) = std::fs::copy(&log, destination) {
                    warn!(error = %e, "failed to copy search log");
                }
            }
        }

        if self.keep {
            if let Some(dir) = self.dir.take() {
                // persist before logging; the macro must not carry the side effect
                let kept = dir.keep();
                info!(dir = %kept.display(), "keeping scratch workspace");
            }
        }
        // otherwise the TempDir removes the directory as it drops
    }
}
