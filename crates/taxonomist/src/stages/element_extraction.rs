use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::content::ContentProvider;
use crate::llm::{LlmClient, LlmRequest};
use crate::pipeline::{PipelineContext, Stage, StageError, StageOutput, StageResults};
use crate::schema::{ElementExtraction, SchemaFactory};

use super::task::{self, Task};
use super::{prompts, CATEGORY_DETECTION, ELEMENT_EXTRACTION};

/// Stage 2: elements within each detected category.
///
/// Fans out one task per (text, detected category). Every input text gets
/// an entry in the output, empty when nothing was detected upstream.
pub struct ElementExtractionStage {
    content: Arc<dyn ContentProvider>,
    schemas: Arc<SchemaFactory>,
}

impl ElementExtractionStage {
    pub fn new(content: Arc<dyn ContentProvider>, schemas: Arc<SchemaFactory>) -> Self {
        Self { content, schemas }
    }

    /// One task per category stage 1 detected for each text.
    pub fn build_tasks(&self, texts: &[String], context: &PipelineContext) -> Vec<Task> {
        let tasks = texts
            .iter()
            .filter_map(|text| {
                context
                    .stage_result(CATEGORY_DETECTION, text)
                    .and_then(StageOutput::as_categories)
                    .map(|detection| (text, detection))
            })
            .flat_map(|(text, detection)| {
                detection
                    .categories_present
                    .iter()
                    .map(move |category| Task::for_category(text, category))
            })
            .collect();
        task::dedup(tasks)
    }

    pub fn build_prompt(&self, text: &str, category: &str) -> Result<String, StageError> {
        let contract = self.schemas.elements(category)?;
        let elements = self.content.get_elements(category);
        let examples = self.content.get_examples(ELEMENT_EXTRACTION, Some(category), None);
        let rules = self.content.get_rules(ELEMENT_EXTRACTION, Some(category), None);

        Ok(prompts::element_extraction_prompt(
            text,
            category,
            &elements,
            &examples,
            &rules,
            &contract,
        ))
    }
}

#[async_trait]
impl Stage for ElementExtractionStage {
    fn name(&self) -> &str {
        ELEMENT_EXTRACTION
    }

    fn dependencies(&self) -> Vec<String> {
        vec![CATEGORY_DETECTION.to_string()]
    }

    async fn process(
        &self,
        texts: &[String],
        context: &PipelineContext,
        llm: &dyn LlmClient,
    ) -> Result<StageResults, StageError> {
        let tasks = self.build_tasks(texts, context);
        debug!(texts = texts.len(), tasks = tasks.len(), "Element extraction fan-out");

        let mut grouped: HashMap<&str, BTreeMap<String, ElementExtraction>> = texts
            .iter()
            .map(|text| (text.as_str(), BTreeMap::new()))
            .collect();

        if !tasks.is_empty() {
            let requests = tasks
                .iter()
                .map(|task| {
                    Ok(LlmRequest::new(
                        self.build_prompt(&task.text, &task.category)?,
                        self.schemas.elements(&task.category)?,
                    ))
                })
                .collect::<Result<Vec<_>, StageError>>()?;

            let responses = llm.batch_generate(&requests).await?;

            for (task, response) in tasks.iter().zip(responses) {
                let mut parsed = response.parsed;
                task::fill_missing(&mut parsed, &[("category", json!(task.category))]);
                let mut extraction: ElementExtraction = task::decode(task.label(), parsed)?;

                // Detected elements form a set; the first mention wins.
                let detected = extraction.elements.len();
                let mut seen = HashSet::new();
                extraction.elements.retain(|e| seen.insert(e.element.clone()));
                if extraction.elements.len() < detected {
                    debug!(
                        task = %task.label(),
                        dropped = detected - extraction.elements.len(),
                        "Dropped repeated element detections"
                    );
                }

                grouped
                    .entry(task.text.as_str())
                    .or_default()
                    .insert(task.category.clone(), extraction);
            }
        }

        Ok(grouped
            .into_iter()
            .map(|(text, by_category)| (text.to_string(), StageOutput::Elements(by_category)))
            .collect())
    }
}
