use super::{heuristic_arguments, solver_root, SearchLimits, SearchOutcome, SolverBackend};
use super::INTERMEDIATE_ARTIFACT;
use crate::config::Config;
use crate::error::SolverError;
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// The real solver pair: a `preprocess` binary consuming the encoded problem
/// and a `downward` search binary consuming the intermediate artifact.
/// Commands are built as structured argv lists, never shell strings.
pub struct DownwardBackend {
    root: PathBuf,
}

impl DownwardBackend {
    pub fn new(config: &Config) -> Result<Self, SolverError> {
        Ok(Self {
            root: solver_root(config)?,
        })
    }
}

#[async_trait]
impl SolverBackend for DownwardBackend {
    fn name(&self) -> &'static str {
        "downward"
    }

    async fn preprocess(&self, dir: &Path, sas_file: &Path) -> Result<SearchOutcome, SolverError> {
        let start = std::time::Instant::now();
        let stdin = File::open(sas_file)?;

        let status = Command::new(self.root.join("preprocess"))
            .current_dir(dir)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        debug!(code = status.code().unwrap_or(-1), "preprocess finished");
        Ok(SearchOutcome {
            exit_code: status.code().unwrap_or(-1),
            duration: start.elapsed(),
            timed_out: false,
        })
    }

    async fn search(
        &self,
        dir: &Path,
        heuristic: &str,
        plan_file: &Path,
        log_file: &Path,
        limits: SearchLimits,
    ) -> Result<SearchOutcome, SolverError> {
        let start = std::time::Instant::now();
        let stdin = File::open(dir.join(INTERMEDIATE_ARTIFACT))?;
        let log = OpenOptions::new().create(true).append(true).open(log_file)?;
        let log_err = log.try_clone()?;

        let mut cmd = Command::new(self.root.join("downward"));
        for arg in heuristic_arguments(heuristic) {
            cmd.arg(arg);
        }
        cmd.arg("--plan-file")
            .arg(plan_file)
            .current_dir(dir)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true);

        #[cfg(unix)]
        if limits.enforce_memory {
            let bytes = limits.max_memory_kb.saturating_mul(1024);
            unsafe {
                cmd.pre_exec(move || {
                    let rlimit = libc::rlimit {
                        rlim_cur: bytes as libc::rlim_t,
                        rlim_max: bytes as libc::rlim_t,
                    };
                    if libc::setrlimit(libc::RLIMIT_AS, &rlimit) != 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
        }

        let mut child = cmd.spawn()?;

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                debug!(heuristic, code = status.code().unwrap_or(-1), "search finished");
                Ok(SearchOutcome {
                    exit_code: status.code().unwrap_or(-1),
                    duration: start.elapsed(),
                    timed_out: false,
                })
            }
            _ = tokio::time::sleep(limits.timeout) => {
                warn!(heuristic, timeout = ?limits.timeout, "search timed out");
                let _ = child.start_kill();
                let _ = child.wait().await;
                Ok(SearchOutcome {
                    exit_code: -1,
                    duration: start.elapsed(),
                    timed_out: true,
                })
            }
        }
    }
}
