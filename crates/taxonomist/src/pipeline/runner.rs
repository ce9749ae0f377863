use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, info_span, Instrument};

use crate::config::ClassifierConfig;
use crate::content::{CompositeContentProvider, ContentProvider, StaticContentProvider};
use crate::error::ClassifierError;
use crate::llm::{LlmClient, OpenAiClient};
use crate::schema::SchemaFactory;

use super::builder::PipelineBuilder;
use super::context::{MergedView, PipelineContext};
use super::error::PipelineError;
use super::merger::{ClassificationOutput, ResultMerger};
use super::progress::{ProgressEvent, ProgressReporter};
use super::registry::StageRegistry;

/// Prompts a stage would send for one text, rendered without any LLM call.
#[derive(Debug, Clone, Serialize)]
pub struct DryRunStage {
    pub stage: String,
    pub prompts: Vec<String>,
    /// True when the stage needs upstream results, so its prompts cannot be
    /// rendered ahead of a real run.
    pub requires_upstream: bool,
}

/// Runs registered stages in dependency order against one LLM collaborator.
pub struct Pipeline {
    registry: StageRegistry,
    schemas: Arc<SchemaFactory>,
    llm: Arc<dyn LlmClient>,
    progress: Arc<dyn ProgressReporter>,
    default_stages: Option<Vec<String>>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub(crate) fn from_parts(
        registry: StageRegistry,
        schemas: Arc<SchemaFactory>,
        llm: Arc<dyn LlmClient>,
        progress: Arc<dyn ProgressReporter>,
        default_stages: Option<Vec<String>>,
    ) -> Self {
        Self {
            registry,
            schemas,
            llm,
            progress,
            default_stages,
        }
    }

    /// Production constructor: loads the taxonomy (plus overlays) and wires
    /// the HTTP client described by `config`.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let base: Arc<dyn ContentProvider> =
            Arc::new(StaticContentProvider::from_path(&config.taxonomy.path)?);

        let content: Arc<dyn ContentProvider> = if config.taxonomy.overlays.is_empty() {
            base
        } else {
            let mut providers = vec![base];
            for overlay in &config.taxonomy.overlays {
                providers.push(Arc::new(StaticContentProvider::from_path(overlay)?));
            }
            Arc::new(CompositeContentProvider::new(
                providers,
                config.taxonomy.merge_policy,
            ))
        };

        let llm = Arc::new(OpenAiClient::from_config(&config.llm)?);

        let mut builder = Self::builder().with_content(content).with_llm(llm);
        if let Some(stages) = &config.pipeline.stages {
            builder = builder.with_stages(stages.clone());
        }
        let pipeline = builder.build()?;

        if config.pipeline.warm_schemas {
            let built = pipeline.schemas.warm()?;
            debug!(contracts = built, "Warmed output contracts");
        }

        Ok(pipeline)
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    pub fn schemas(&self) -> &Arc<SchemaFactory> {
        &self.schemas
    }

    /// Run and return the per-text view of every stage's raw output.
    pub async fn run<I, S>(
        &self,
        texts: I,
        stages: Option<&[String]>,
    ) -> Result<MergedView, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(self.run_with_context(texts, stages).await?.merged_view())
    }

    /// Run and return the nested category → element → attribute result
    /// for every text.
    pub async fn classify<I, S>(
        &self,
        texts: I,
        stages: Option<&[String]>,
    ) -> Result<Vec<ClassificationOutput>, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let context = self.run_with_context(texts, stages).await?;
        Ok(ResultMerger::merge(&context))
    }

    /// Run the requested stages (or the configured default selection, or
    /// every registered stage) and hand back the full context.
    ///
    /// Stage order is resolved before any LLM call. The first failing stage
    /// aborts the run.
    pub async fn run_with_context<I, S>(
        &self,
        texts: I,
        stages: Option<&[String]>,
    ) -> Result<PipelineContext, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let requested: Option<Vec<String>> = stages
            .map(<[String]>::to_vec)
            .or_else(|| self.default_stages.clone());
        let order = self.registry.resolve_order(requested.as_deref())?;

        let mut context = PipelineContext::new(texts);
        context.metadata.stages_requested = requested;
        context.metadata.started_at = Some(Utc::now());

        let run_id = context.metadata.run_id;
        let span = info_span!("pipeline",
            run_id = %run_id,
            texts = context.texts().len(),
            stages = %order.join(","),
        );

        async move {
            let started = Instant::now();
            info!("Starting pipeline run");
            self.progress.report(ProgressEvent::RunStarted {
                run_id: run_id.to_string(),
                stages: order.clone(),
                texts: context.texts().len(),
            });

            let texts = context.texts().to_vec();
            for (index, name) in order.iter().enumerate() {
                let stage = self.registry.get(name)?;

                self.progress.report(ProgressEvent::StageStarted {
                    stage: name.clone(),
                    index,
                    total: order.len(),
                });
                let stage_started = Instant::now();

                let outcome = stage
                    .process(&texts, &context, self.llm.as_ref())
                    .instrument(info_span!("stage", stage = %name))
                    .await;

                match outcome {
                    Ok(results) => {
                        let outputs = results.len();
                        let elapsed_ms = stage_started.elapsed().as_millis() as u64;
                        context.set_stage_results(name, results);
                        context.metadata.stages_executed.push(name.clone());

                        info!(stage = %name, outputs, elapsed_ms, "Stage completed");
                        self.progress.report(ProgressEvent::StageCompleted {
                            stage: name.clone(),
                            outputs,
                            elapsed_ms,
                        });
                    }
                    Err(source) => {
                        error!(stage = %name, error = %source, "Stage failed, aborting run");
                        self.progress.report(ProgressEvent::Failed {
                            stage: name.clone(),
                            error: source.to_string(),
                        });
                        return Err(PipelineError::Stage {
                            stage: name.clone(),
                            source,
                        });
                    }
                }
            }

            context.metadata.finished_at = Some(Utc::now());
            let elapsed_ms = started.elapsed().as_millis() as u64;
            info!(elapsed_ms, "Pipeline run completed");
            self.progress.report(ProgressEvent::RunCompleted {
                run_id: run_id.to_string(),
                elapsed_ms,
            });

            Ok(context)
        }
        .instrument(span)
        .await
    }

    /// Render the prompts each stage would send for `text`, in execution
    /// order. Nothing is sent to the LLM.
    pub fn dry_run(
        &self,
        text: &str,
        stages: Option<&[String]>,
    ) -> Result<Vec<DryRunStage>, PipelineError> {
        let requested: Option<Vec<String>> = stages
            .map(<[String]>::to_vec)
            .or_else(|| self.default_stages.clone());
        let order = self.registry.resolve_order(requested.as_deref())?;

        order
            .into_iter()
            .map(|name| -> Result<DryRunStage, PipelineError> {
                let stage = self.registry.get(&name)?;
                let prompts = stage
                    .preview_prompts(text)
                    .map_err(|source| PipelineError::Stage {
                        stage: name.clone(),
                        source,
                    })?;
                Ok(DryRunStage {
                    requires_upstream: !stage.dependencies().is_empty(),
                    stage: name,
                    prompts,
                })
            })
            .collect()
    }
}
