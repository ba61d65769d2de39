use super::{SearchLimits, SolverBackend, Workspace};
use super::{ADMISSIBLE_HEURISTIC, SEARCH_LOG};
use crate::sas;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Best-effort plan refinement: reduce the encoded problem to the operators
/// the found plan actually uses, then re-solve with an admissible
/// configuration. A successful re-solve replaces the plan artifact (it can
/// only be at most as long); any failure keeps the original untouched.
pub async fn optimize_plan(backend: &dyn SolverBackend, workspace: &Workspace, limits: SearchLimits) {
    let plan_file = workspace.plan_file();
    let Ok(plan_text) = std::fs::read_to_string(&plan_file) else {
        warn!("plan artifact unreadable, skipping optimization");
        return;
    };
    let Ok(sas_text) = std::fs::read_to_string(workspace.sas_file()) else {
        warn!("encoded problem unreadable, skipping optimization");
        return;
    };

    let selected = sas::selected_identities(&plan_text);
    let reduced = sas::filter_operators(&sas_text, &selected);

    let reduced_sas = suffixed(&workspace.sas_file(), "2");
    let reduced_plan = suffixed(&plan_file, "2");
    if let Err(e) = std::fs::write(&reduced_sas, reduced) {
        warn!(error = %e, "failed to write reduced problem, skipping optimization");
        return;
    }

    let dir = workspace.path();
    if let Err(e) = backend.preprocess(dir, &reduced_sas).await {
        debug!(error = %e, "reduced problem preprocessing failed, keeping original plan");
        return;
    }

    match backend
        .search(
            dir,
            ADMISSIBLE_HEURISTIC,
            &reduced_plan,
            &dir.join(SEARCH_LOG),
            limits,
        )
        .await
    {
        Ok(_) if reduced_plan.exists() => {
            let _ = std::fs::remove_file(&plan_file);
            match std::fs::rename(&reduced_plan, &plan_file) {
                Ok(()) => info!("plan refined with admissible re-solve"),
                Err(e) => warn!(error = %e, "failed to install refined plan"),
            }
        }
        Ok(_) => {
            // the admissible search found nothing within budget; not an error
            debug!("admissible re-solve produced no plan, keeping original");
        }
        Err(e) => {
            debug!(error = %e, "admissible re-solve failed, keeping original plan");
        }
    }
}

fn suffixed(path: &std::path::Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}.{}", path.display(), suffix))
}
