use thiserror::Error;

use crate::llm::LlmError;
use crate::schema::SchemaError;

/// Stage wiring problems. Raised before any LLM call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Stage '{0}' is already registered")]
    DuplicateStage(String),

    #[error("Unknown stage '{name}'. Available stages: {}", .available.join(", "))]
    UnknownStage {
        name: String,
        available: Vec<String>,
    },

    #[error("Stage '{stage}' depends on '{dependency}', but '{dependency}' is not registered")]
    MissingDependency { stage: String, dependency: String },

    #[error("Circular dependency detected among stages: {}", .stages.join(", "))]
    Cycle { stages: Vec<String> },
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Output contract unavailable: {0}")]
    Schema(#[from] SchemaError),

    #[error("Malformed output for {task}: {source}")]
    MalformedOutput {
        task: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Custom(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid stage configuration: {0}")]
    Registry(#[from] RegistryError),

    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: StageError,
    },

    #[error("Pipeline is missing a required component: {0}")]
    MissingComponent(&'static str),
}
