//! Builder patterns for creating test data programmatically.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use taxonomist::llm::LlmClient;
use taxonomist::pipeline::{PipelineContext, Stage, StageError, StageResults};
use taxonomist::{ContentProvider, StaticContentProvider};

/// Path to a file under `tests/fixtures/`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// The conference feedback taxonomy fixture.
pub fn conference_content() -> Arc<dyn ContentProvider> {
    Arc::new(
        StaticContentProvider::from_path(fixture_path("conference-taxonomy.yaml"))
            .expect("Failed to load conference taxonomy fixture"),
    )
}

/// A stage that declares dependencies and does nothing, for exercising the
/// registry.
pub struct StubStage {
    name: String,
    dependencies: Vec<String>,
}

impl StubStage {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dependencies: Vec::new(),
        }
    }

    pub fn depends_on(mut self, dependencies: &[&str]) -> Self {
        self.dependencies = dependencies.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn build(self) -> Arc<dyn Stage> {
        Arc::new(self)
    }
}

#[async_trait]
impl Stage for StubStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }

    async fn process(
        &self,
        _texts: &[String],
        _context: &PipelineContext,
        _llm: &dyn LlmClient,
    ) -> Result<StageResults, StageError> {
        Ok(StageResults::new())
    }
}

/// Builder for config JSON documents.
pub struct ConfigJson {
    taxonomy_path: String,
    overlays: Vec<String>,
    merge_policy: Option<&'static str>,
    stages: Option<Vec<String>>,
    warm_schemas: bool,
}

impl ConfigJson {
    pub fn new(taxonomy_path: &str) -> Self {
        Self {
            taxonomy_path: taxonomy_path.to_string(),
            overlays: Vec::new(),
            merge_policy: None,
            stages: None,
            warm_schemas: false,
        }
    }

    pub fn overlay(mut self, path: &str) -> Self {
        self.overlays.push(path.to_string());
        self
    }

    pub fn merge_policy(mut self, policy: &'static str) -> Self {
        self.merge_policy = Some(policy);
        self
    }

    pub fn stages(mut self, stages: &[&str]) -> Self {
        self.stages = Some(stages.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn warm_schemas(mut self) -> Self {
        self.warm_schemas = true;
        self
    }

    pub fn build(self) -> String {
        let mut pipeline = json!({ "warm_schemas": self.warm_schemas });
        if let Some(stages) = self.stages {
            pipeline["stages"] = json!(stages);
        }
        let mut taxonomy = json!({
            "path": self.taxonomy_path,
            "overlays": self.overlays,
        });
        if let Some(policy) = self.merge_policy {
            taxonomy["merge_policy"] = json!(policy);
        }
        let config = json!({
            "version": "1.0",
            "taxonomy": taxonomy,
            "llm": { "base_url": "http://127.0.0.1:9/v1", "concurrency": 2 },
            "pipeline": pipeline,
        });
        serde_json::to_string_pretty(&config).expect("Failed to serialize config")
    }
}

/// Stage 1 response naming `categories`.
pub fn categories_response(categories: &[&str]) -> Value {
    json!({
        "categories_present": categories,
        "reasoning": "scripted"
    })
}

/// Stage 2 response with `(element, sentiment, confidence, excerpt)` entries.
pub fn elements_response(category: &str, elements: &[(&str, &str, u8, &str)]) -> Value {
    let elements: Vec<Value> = elements
        .iter()
        .map(|(element, sentiment, confidence, excerpt)| {
            json!({
                "element": element,
                "sentiment": sentiment,
                "confidence": confidence,
                "excerpt": excerpt,
            })
        })
        .collect();
    json!({ "category": category, "elements": elements })
}

/// Stage 3 response with `(attribute, sentiment, confidence, excerpt)` entries.
pub fn attributes_response(
    category: &str,
    element: &str,
    element_sentiment: &str,
    attributes: &[(&str, &str, u8, &str)],
    sentiment_consensus: bool,
) -> Value {
    let attributes: Vec<Value> = attributes
        .iter()
        .map(|(attribute, sentiment, confidence, excerpt)| {
            json!({
                "attribute": attribute,
                "sentiment": sentiment,
                "confidence": confidence,
                "excerpt": excerpt,
            })
        })
        .collect();
    json!({
        "category": category,
        "element": element,
        "element_sentiment": element_sentiment,
        "attributes": attributes,
        "sentiment_consensus": sentiment_consensus,
    })
}
