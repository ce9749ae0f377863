use std::sync::Arc;

use tracing::warn;

use crate::content::ContentProvider;
use crate::llm::LlmClient;
use crate::schema::SchemaFactory;
use crate::stages::default_registry;

use super::error::PipelineError;
use super::progress::{NoopProgress, ProgressReporter};
use super::registry::StageRegistry;
use super::runner::Pipeline;
use super::stage::Stage;

/// Assembles a [`Pipeline`] from its collaborators.
///
/// Content and an LLM client are required. Without an explicit registry
/// the three built-in stages are registered; extra stages added with
/// [`with_stage`](Self::with_stage) are registered on top.
#[derive(Default)]
pub struct PipelineBuilder {
    content: Option<Arc<dyn ContentProvider>>,
    schemas: Option<Arc<SchemaFactory>>,
    llm: Option<Arc<dyn LlmClient>>,
    registry: Option<StageRegistry>,
    extra_stages: Vec<Arc<dyn Stage>>,
    stages: Option<Vec<String>>,
    progress: Option<Arc<dyn ProgressReporter>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(mut self, content: Arc<dyn ContentProvider>) -> Self {
        self.content = Some(content);
        self
    }

    /// Share an existing contract cache. Its content provider is used when
    /// none is set explicitly.
    pub fn with_schema_factory(mut self, schemas: Arc<SchemaFactory>) -> Self {
        self.schemas = Some(schemas);
        self
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Replace the built-in stages entirely.
    pub fn with_registry(mut self, registry: StageRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.extra_stages.push(stage);
        self
    }

    /// Stages to run when a call does not name any.
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = Some(stages);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Wire everything up and check the stage graph, so wiring mistakes
    /// surface here rather than on the first run.
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let content = self
            .content
            .or_else(|| self.schemas.as_ref().map(|s| s.content().clone()))
            .ok_or(PipelineError::MissingComponent("content"))?;
        let llm = self.llm.ok_or(PipelineError::MissingComponent("llm"))?;
        let schemas = self
            .schemas
            .unwrap_or_else(|| Arc::new(SchemaFactory::new(content.clone())));

        let mut registry = match self.registry {
            Some(registry) => registry,
            None => default_registry(content, schemas.clone())?,
        };
        for stage in self.extra_stages {
            registry.register(stage)?;
        }

        registry.resolve_order(self.stages.as_deref())?;
        for warning in registry.validate() {
            warn!(warning = %warning, "Stage graph warning");
        }

        Ok(Pipeline::from_parts(
            registry,
            schemas,
            llm,
            self.progress.unwrap_or_else(|| Arc::new(NoopProgress)),
            self.stages,
        ))
    }
}
