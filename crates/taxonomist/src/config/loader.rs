use std::collections::HashSet;
use std::path::Path;

use crate::config::schema::ClassifierConfig;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ClassifierConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<ClassifierConfig, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: ClassifierConfig = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &ClassifierConfig) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.taxonomy.path.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "taxonomy.path must not be empty".to_string(),
        });
    }

    if config.llm.concurrency == 0 {
        return Err(ConfigError::Validation {
            message: "llm.concurrency must be at least 1".to_string(),
        });
    }

    if let Some(stages) = &config.pipeline.stages {
        let mut seen = HashSet::new();
        for stage in stages {
            if !seen.insert(stage.as_str()) {
                return Err(ConfigError::InvalidStage {
                    name: stage.clone(),
                    reason: "Duplicate stage name".to_string(),
                });
            }
        }
    }

    Ok(())
}
