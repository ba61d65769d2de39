use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanraceError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value '{value}' for override {name}")]
    InvalidOverride { name: &'static str, value: String },

    #[error("No heuristic configurations enabled")]
    NoHeuristics,
}

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Failed to read task file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse task: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Preprocessing produced no intermediate artifact")]
    PreprocessingFailed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Malformed plan line: {0}")]
    MalformedPlanLine(String),

    #[error("Plan references unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Workflow node {node} declares out-of-range successor {successor}")]
    InvalidWorkflowEdge { node: usize, successor: usize },

    #[error("Parallel representation requested but no partial-order extractor is configured")]
    NoPartialOrderExtractor,

    #[error("Behavioural signature for conformant tasks is not supported")]
    ConformantBsig,
}
