use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::Serialize;

use crate::llm::LlmClient;
use crate::schema::{AttributeExtraction, CategoryDetection, ElementExtraction};

use super::context::PipelineContext;
use super::error::StageError;

/// What one stage produced for one input text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StageOutput {
    /// Category detection: the detected category set.
    Categories(CategoryDetection),
    /// Element extraction, keyed by category name.
    Elements(BTreeMap<String, ElementExtraction>),
    /// Attribute extraction, keyed by `category::element`.
    Attributes(BTreeMap<String, AttributeExtraction>),
    /// Output of a stage outside the built-in three.
    Custom(serde_json::Value),
}

impl StageOutput {
    pub fn as_categories(&self) -> Option<&CategoryDetection> {
        match self {
            StageOutput::Categories(detection) => Some(detection),
            _ => None,
        }
    }

    pub fn as_elements(&self) -> Option<&BTreeMap<String, ElementExtraction>> {
        match self {
            StageOutput::Elements(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_attributes(&self) -> Option<&BTreeMap<String, AttributeExtraction>> {
        match self {
            StageOutput::Attributes(map) => Some(map),
            _ => None,
        }
    }
}

/// A stage's results for a whole run, keyed by input text.
pub type StageResults = HashMap<String, StageOutput>;

/// One unit of pipeline work.
///
/// A stage reads only the context sections of its declared dependencies
/// and returns its own section; the orchestrator stores it under
/// [`Stage::name`].
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    /// Stages that must have written to the context before this one runs.
    fn dependencies(&self) -> Vec<String>;

    async fn process(
        &self,
        texts: &[String],
        context: &PipelineContext,
        llm: &dyn LlmClient,
    ) -> Result<StageResults, StageError>;

    /// Prompts this stage would send for `text` without upstream results.
    /// Stages that need upstream output return nothing.
    fn preview_prompts(&self, _text: &str) -> Result<Vec<String>, StageError> {
        Ok(Vec::new())
    }
}
