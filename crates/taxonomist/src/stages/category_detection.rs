use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::content::ContentProvider;
use crate::llm::{LlmClient, LlmRequest};
use crate::pipeline::{PipelineContext, Stage, StageError, StageOutput, StageResults};
use crate::sanitize::{preview, text_fingerprint, PREVIEW_CHARS};
use crate::schema::{CategoryDetection, SchemaFactory};

use super::{prompts, task, CATEGORY_DETECTION};

/// Stage 1: which top-level categories each text discusses.
///
/// One prompt per text, all submitted as a single batch.
pub struct CategoryDetectionStage {
    content: Arc<dyn ContentProvider>,
    schemas: Arc<SchemaFactory>,
}

impl CategoryDetectionStage {
    pub fn new(content: Arc<dyn ContentProvider>, schemas: Arc<SchemaFactory>) -> Self {
        Self { content, schemas }
    }

    pub fn build_prompt(&self, text: &str) -> Result<String, StageError> {
        let contract = self.schemas.categories()?;
        let categories = self.content.get_categories();
        let examples = self.content.get_examples(CATEGORY_DETECTION, None, None);
        let rules = self.content.get_rules(CATEGORY_DETECTION, None, None);

        Ok(prompts::category_detection_prompt(
            text,
            &categories,
            &examples,
            &rules,
            &contract,
        ))
    }
}

#[async_trait]
impl Stage for CategoryDetectionStage {
    fn name(&self) -> &str {
        CATEGORY_DETECTION
    }

    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    async fn process(
        &self,
        texts: &[String],
        _context: &PipelineContext,
        llm: &dyn LlmClient,
    ) -> Result<StageResults, StageError> {
        if texts.is_empty() {
            return Ok(StageResults::new());
        }

        let contract = self.schemas.categories()?;
        let requests = texts
            .iter()
            .map(|text| Ok(LlmRequest::new(self.build_prompt(text)?, contract.clone())))
            .collect::<Result<Vec<_>, StageError>>()?;

        debug!(prompts = requests.len(), "Submitting category detection batch");
        let responses = llm.batch_generate(&requests).await?;

        // Responses line up with texts by position.
        let mut results = StageResults::with_capacity(texts.len());
        for (text, response) in texts.iter().zip(responses) {
            let detection: CategoryDetection =
                task::decode(format!("categories [{}]", text_fingerprint(text)), response.parsed)?;
            debug!(
                text = %text_fingerprint(text),
                preview = %preview(text, PREVIEW_CHARS),
                categories = detection.categories_present.len(),
                "Detected categories"
            );
            results.insert(text.clone(), StageOutput::Categories(detection));
        }

        Ok(results)
    }

    fn preview_prompts(&self, text: &str) -> Result<Vec<String>, StageError> {
        Ok(vec![self.build_prompt(text)?])
    }
}
