use crate::bsig::{self, Bsig, WorkflowNode};
use crate::config::Config;
use crate::conformant::{self, ConformantReport, ScenarioSolution};
use crate::error::{ModelError, PlanraceError, SolverError, TaskError};
use crate::plan::Plan;
use crate::solver::{DownwardBackend, RaceScheduler, SequentialRacer, SolverBackend, Workspace};
use crate::task::Task;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Produces the encoded SAS+ problem text for a task. The real encoder is the
/// external compiler; tasks carrying precompiled text use the default
/// implementation. Conformant scenarios hand the encoder a clone with a
/// concrete initial state, so a real implementation must re-encode per call.
pub trait ProblemEncoder: Send + Sync {
    fn encode(&self, task: &Task) -> Result<String, TaskError>;
}

/// Encoder for tasks whose SAS+ text was produced ahead of time.
pub struct PrecompiledEncoder;

impl ProblemEncoder for PrecompiledEncoder {
    fn encode(&self, task: &Task) -> Result<String, TaskError> {
        Ok(task.sas.clone())
    }
}

/// Labels an operator sequence with predecessor/successor index sets. The
/// dependency analysis itself is an external collaborator; this crate only
/// consumes its annotated workflow.
pub trait PartialOrderExtractor: Send + Sync {
    fn extract(&self, task: &Task, plan: &Plan) -> Result<Vec<WorkflowNode>, ModelError>;
}

#[derive(Debug, Clone, Default)]
pub struct SolveOptions {
    /// Build a parallel (partial-order) representation
    pub parallel: bool,
    /// Return the behavioural-signature model
    pub bsig: bool,
    /// Return the raw solver plan artifact
    pub raw_plan: bool,
    /// Try heuristics one at a time instead of racing them
    pub sequential_racer: bool,
}

/// Plan representation returned when no signature was requested.
#[derive(Debug, Clone, Serialize)]
pub struct PlanModel {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub version: &'static str,
    pub init: BTreeMap<String, Value>,
    pub total: usize,
    pub workflow: Vec<WorkflowNode>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SolveOutput {
    Raw(String),
    Model(PlanModel),
    Bsig(Bsig),
    Conformant(ConformantReport),
}

struct Solved {
    plan: Plan,
    goal_operator: Option<String>,
    plan_text: String,
}

/// Top-level orchestration: dispatches classical vs conformant tasks, runs
/// the race (or the sequential fallback), and builds the requested
/// representation from the winning plan.
pub struct Planner {
    config: Config,
    backend: Arc<dyn SolverBackend>,
    encoder: Box<dyn ProblemEncoder>,
    extractor: Option<Box<dyn PartialOrderExtractor>>,
    run_id: Uuid,
}

impl Planner {
    pub fn new(config: Config) -> Result<Self, SolverError> {
        let backend = Arc::new(DownwardBackend::new(&config)?);
        Ok(Self::with_backend(config, backend))
    }

    pub fn with_backend(config: Config, backend: Arc<dyn SolverBackend>) -> Self {
        Self {
            config,
            backend,
            encoder: Box::new(PrecompiledEncoder),
            extractor: None,
            run_id: Uuid::new_v4(),
        }
    }

    #[allow(dead_code)]
    pub fn with_encoder(mut self, encoder: Box<dyn ProblemEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    #[allow(dead_code)]
    pub fn with_extractor(mut self, extractor: Box<dyn PartialOrderExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Solve a task. `Ok(None)` is the explicit no-plan result; a returned
    /// output is always fully populated.
    pub async fn solve(
        &self,
        task: &Task,
        options: &SolveOptions,
    ) -> Result<Option<SolveOutput>, PlanraceError> {
        info!(run = %self.run_id, conformant = task.is_conformant(), "starting solve");

        if task.is_conformant() {
            if options.bsig {
                return Err(ModelError::ConformantBsig.into());
            }
            let report = self.solve_conformant(task).await?;
            return Ok(Some(SolveOutput::Conformant(report)));
        }

        self.solve_classical(task, options).await
    }

    async fn solve_classical(
        &self,
        task: &Task,
        options: &SolveOptions,
    ) -> Result<Option<SolveOutput>, PlanraceError> {
        let mut timings = BTreeMap::new();
        let Some(solved) = self
            .solve_encoded(task, options.sequential_racer, &mut timings)
            .await?
        else {
            return Ok(None);
        };

        if options.raw_plan {
            return Ok(Some(SolveOutput::Raw(solved.plan_text)));
        }

        if let Some(op) = &solved.goal_operator {
            debug!(operator = %op, "plan carries a synthetic goal operator");
        }

        let representation_started = Instant::now();
        let workflow = if options.parallel {
            self.parallel_workflow(task, &solved.plan)?
        } else {
            sequential_workflow(task, &solved.plan)
        };

        let output = if options.bsig {
            let model = if options.parallel {
                bsig::parallel_bsig(&workflow, &task.goal)?
            } else {
                bsig::sequential_bsig(&workflow, &task.goal)
            };
            SolveOutput::Bsig(model)
        } else {
            SolveOutput::Model(PlanModel {
                kind: if options.parallel { "parallel" } else { "sequential" },
                version: "1",
                init: task.flat_initial(),
                total: workflow.len(),
                workflow,
            })
        };
        debug!(
            seconds = representation_started.elapsed().as_secs_f64(),
            "representation built"
        );

        Ok(Some(output))
    }

    /// Encode, race, and parse one task. The scratch workspace is released on
    /// every exit path.
    async fn solve_encoded(
        &self,
        task: &Task,
        sequential_racer: bool,
        timings: &mut BTreeMap<String, f64>,
    ) -> Result<Option<Solved>, PlanraceError> {
        let workspace = Workspace::create(&self.config)?;

        let encode_started = Instant::now();
        let sas_text = self.encoder.encode(task)?;
        std::fs::write(workspace.sas_file(), &sas_text)?;
        timings.insert("encode".to_string(), encode_started.elapsed().as_secs_f64());

        let search_started = Instant::now();
        let result = if sequential_racer {
            SequentialRacer::new(self.backend.clone(), &self.config)
                .solve(&workspace)
                .await?
        } else {
            RaceScheduler::new(self.backend.clone(), &self.config)
                .solve(&workspace)
                .await?
        };
        timings.insert("search".to_string(), search_started.elapsed().as_secs_f64());

        if let Err(e) = workspace.write_timings(timings) {
            warn!(error = %e, "failed to write timing breakdown");
        }

        let Some(plan_file) = result else {
            return Ok(None);
        };

        let plan_text = std::fs::read_to_string(&plan_file)?;
        let plan = Plan::parse(&plan_text, &task.operators)?;
        let (plan, goal_operator) = plan.strip_synthetic();
        if plan.is_empty() {
            warn!("solved plan is empty after stripping synthetic operators");
            return Ok(None);
        }
        debug!(actions = plan.len(), "plan parsed");

        Ok(Some(Solved {
            plan,
            goal_operator,
            plan_text,
        }))
    }

    /// Enumerate every concrete initial state and solve each scenario through
    /// the race scheduler. The per-scenario collection is the result; no
    /// combined plan is derived.
    async fn solve_conformant(&self, task: &Task) -> Result<ConformantReport, PlanraceError> {
        let variables = conformant::nondeterministic_variables(&task.initial);
        let assignments = conformant::enumerate_assignments(&variables);
        info!(
            variables = variables.len(),
            scenarios = assignments.len(),
            "enumerating conformant initial states"
        );

        let mut solutions = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let mut scenario = task.clone();
            conformant::apply_assignment(&mut scenario.initial, &assignment);

            let mut timings = BTreeMap::new();
            let solved = match self.solve_encoded(&scenario, false, &mut timings).await {
                Ok(solved) => solved,
                Err(PlanraceError::Solver(SolverError::PreprocessingFailed)) => {
                    warn!(?assignment, "scenario preprocessing failed, recording no plan");
                    None
                }
                Err(e) => return Err(e),
            };

            solutions.push(ScenarioSolution {
                assignment,
                plan: solved.map(|s| s.plan),
                task: scenario,
            });
        }

        Ok(ConformantReport { solutions })
    }

    fn parallel_workflow(
        &self,
        task: &Task,
        plan: &Plan,
    ) -> Result<Vec<WorkflowNode>, PlanraceError> {
        match &self.extractor {
            Some(extractor) => Ok(extractor.extract(task, plan)?),
            None => Err(ModelError::NoPartialOrderExtractor.into()),
        }
    }
}

/// Linear workflow: one node per plan action, conditions and effects copied
/// from the catalog, no dependency edges.
fn sequential_workflow(task: &Task, plan: &Plan) -> Vec<WorkflowNode> {
    plan.actions
        .iter()
        .filter_map(|action| task.operators.get(&action.name))
        .map(|operator| WorkflowNode {
            name: operator.name.clone(),
            condition: operator.condition.clone(),
            effect: operator.effect.clone(),
            predecessors: Vec::new(),
            successors: Vec::new(),
        })
        .collect()
}

/// Final state after executing the plan from the task's initial state.
#[allow(dead_code)]
pub fn final_state(task: &Task, plan: &Plan) -> BTreeMap<String, Value> {
    plan.final_state(&task.operators, &task.flat_initial())
}
