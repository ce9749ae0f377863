use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("Failed to read taxonomy file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse taxonomy YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Failed to parse taxonomy JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Duplicate {kind} name '{name}' in {scope}")]
    DuplicateName {
        kind: &'static str,
        name: String,
        scope: String,
    },

    #[error("Empty {kind} name in {scope}")]
    EmptyName { kind: &'static str, scope: String },
}
