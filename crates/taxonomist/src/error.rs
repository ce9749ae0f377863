use std::path::PathBuf;
use thiserror::Error;

use crate::content::ContentError;
use crate::llm::LlmError;
use crate::pipeline::{PipelineError, RegistryError};
use crate::schema::SchemaError;
use crate::secrets::SecretError;
use crate::telemetry::TelemetryError;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Taxonomy content error: {0}")]
    Content(#[from] ContentError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
}

impl From<RegistryError> for ClassifierError {
    fn from(err: RegistryError) -> Self {
        ClassifierError::Pipeline(PipelineError::Registry(err))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid stage '{name}': {reason}")]
    InvalidStage { name: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ClassifierError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_wraps_into_pipeline() {
        let err: ClassifierError = RegistryError::DuplicateStage("x".to_string()).into();
        assert!(matches!(
            err,
            ClassifierError::Pipeline(PipelineError::Registry(RegistryError::DuplicateStage(_)))
        ));
        assert_eq!(
            err.to_string(),
            "Pipeline error: Invalid stage configuration: Stage 'x' is already registered"
        );
    }

    #[test]
    fn test_config_error_message() {
        let err = ConfigError::InvalidStage {
            name: "summary".to_string(),
            reason: "Duplicate stage name".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid stage 'summary': Duplicate stage name");
    }
}
