use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::content::ContentProvider;
use crate::llm::{LlmClient, LlmRequest};
use crate::pipeline::{PipelineContext, Stage, StageError, StageOutput, StageResults};
use crate::schema::{AttributeExtraction, SchemaFactory, Sentiment};

use super::task::{self, Task};
use super::{prompts, ATTRIBUTE_EXTRACTION, ELEMENT_EXTRACTION};

/// Stage 3: attributes of each detected element.
///
/// Fans out one task per (text, category, element) found by stage 2 and
/// keys results by `category::element`. The parent element's sentiment
/// goes into the prompt so the model can report `sentiment_consensus`.
pub struct AttributeExtractionStage {
    content: Arc<dyn ContentProvider>,
    schemas: Arc<SchemaFactory>,
}

impl AttributeExtractionStage {
    pub fn new(content: Arc<dyn ContentProvider>, schemas: Arc<SchemaFactory>) -> Self {
        Self { content, schemas }
    }

    pub fn build_tasks(&self, texts: &[String], context: &PipelineContext) -> Vec<Task> {
        let mut tasks = Vec::new();
        for text in texts {
            let Some(by_category) = context
                .stage_result(ELEMENT_EXTRACTION, text)
                .and_then(StageOutput::as_elements)
            else {
                continue;
            };

            for (category, extraction) in by_category {
                for detection in &extraction.elements {
                    tasks.push(Task::for_element(text, category, detection));
                }
            }
        }
        task::dedup(tasks)
    }

    pub fn build_prompt(
        &self,
        text: &str,
        category: &str,
        element: &str,
        element_sentiment: Option<Sentiment>,
    ) -> Result<String, StageError> {
        let contract = self.schemas.attributes(category, element)?;
        let attributes = self.content.get_attributes(category, element);
        let examples = self
            .content
            .get_examples(ATTRIBUTE_EXTRACTION, Some(category), Some(element));
        let rules = self
            .content
            .get_rules(ATTRIBUTE_EXTRACTION, Some(category), Some(element));

        Ok(prompts::attribute_extraction_prompt(
            text,
            category,
            element,
            element_sentiment,
            &attributes,
            &examples,
            &rules,
            &contract,
        ))
    }

    fn request_for(&self, task: &Task) -> Result<LlmRequest, StageError> {
        let element = task.element.as_deref().unwrap_or_default();
        Ok(LlmRequest::new(
            self.build_prompt(&task.text, &task.category, element, task.element_sentiment)?,
            self.schemas.attributes(&task.category, element)?,
        ))
    }
}

#[async_trait]
impl Stage for AttributeExtractionStage {
    fn name(&self) -> &str {
        ATTRIBUTE_EXTRACTION
    }

    fn dependencies(&self) -> Vec<String> {
        vec![ELEMENT_EXTRACTION.to_string()]
    }

    async fn process(
        &self,
        texts: &[String],
        context: &PipelineContext,
        llm: &dyn LlmClient,
    ) -> Result<StageResults, StageError> {
        let tasks = self.build_tasks(texts, context);
        debug!(texts = texts.len(), tasks = tasks.len(), "Attribute extraction fan-out");

        let mut grouped: HashMap<&str, BTreeMap<String, AttributeExtraction>> = texts
            .iter()
            .map(|text| (text.as_str(), BTreeMap::new()))
            .collect();

        if !tasks.is_empty() {
            let requests = tasks
                .iter()
                .map(|task| self.request_for(task))
                .collect::<Result<Vec<_>, StageError>>()?;

            let responses = llm.batch_generate(&requests).await?;

            for (task, response) in tasks.iter().zip(responses) {
                let carried = task.element_sentiment.unwrap_or(Sentiment::Neutral);
                let mut parsed = response.parsed;
                task::fill_missing(
                    &mut parsed,
                    &[
                        ("category", json!(task.category)),
                        ("element", json!(task.element)),
                        ("element_sentiment", json!(carried)),
                    ],
                );
                let mut extraction: AttributeExtraction = task::decode(task.label(), parsed)?;
                // A fallback instance knows nothing about the element; keep
                // what stage 2 detected.
                if response.repaired {
                    extraction.element_sentiment = carried;
                }

                grouped
                    .entry(task.text.as_str())
                    .or_default()
                    .insert(task.result_key(), extraction);
            }
        }

        Ok(grouped
            .into_iter()
            .map(|(text, by_key)| (text.to_string(), StageOutput::Attributes(by_key)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::StaticContentProvider;
    use crate::llm::MockLlmClient;
    use crate::schema::{ContractKey, ElementDetection, ElementExtraction};

    const TAXONOMY: &str = r#"
categories:
  - name: Logistics
    elements:
      - name: Wi-Fi
        attributes:
          - name: Reliability
          - name: Speed
      - name: Signage
  - name: People
    elements:
      - name: Speakers
        attributes:
          - name: Delivery
"#;

    fn stage() -> AttributeExtractionStage {
        let content: Arc<dyn ContentProvider> =
            Arc::new(StaticContentProvider::from_yaml_str(TAXONOMY).unwrap());
        let schemas = Arc::new(SchemaFactory::new(content.clone()));
        AttributeExtractionStage::new(content, schemas)
    }

    fn detection(element: &str, sentiment: Sentiment) -> ElementDetection {
        ElementDetection {
            element: element.to_string(),
            sentiment,
            confidence: 4,
            excerpt: String::new(),
            reasoning: String::new(),
        }
    }

    fn context(text: &str, found: Vec<(&str, Vec<ElementDetection>)>) -> PipelineContext {
        let mut ctx = PipelineContext::new([text]);
        let by_category = found
            .into_iter()
            .map(|(category, elements)| {
                (
                    category.to_string(),
                    ElementExtraction {
                        category: category.to_string(),
                        elements,
                    },
                )
            })
            .collect();
        ctx.set_stage_result(ELEMENT_EXTRACTION, text, StageOutput::Elements(by_category));
        ctx
    }

    // ── Task construction ──

    #[test]
    fn test_two_level_fan_out() {
        let ctx = context(
            "t",
            vec![
                (
                    "Logistics",
                    vec![
                        detection("Wi-Fi", Sentiment::Negative),
                        detection("Signage", Sentiment::Neutral),
                    ],
                ),
                ("People", vec![detection("Speakers", Sentiment::Positive)]),
            ],
        );

        let tasks = stage().build_tasks(ctx.texts(), &ctx);
        let keys: Vec<String> = tasks.iter().map(Task::result_key).collect();
        assert_eq!(
            keys,
            vec!["Logistics::Wi-Fi", "Logistics::Signage", "People::Speakers"]
        );
        assert_eq!(tasks[0].element_sentiment, Some(Sentiment::Negative));
    }

    #[test]
    fn test_no_stage_two_entry_means_no_tasks() {
        let ctx = PipelineContext::new(["t"]);
        assert!(stage().build_tasks(ctx.texts(), &ctx).is_empty());
    }

    // ── process ──

    #[tokio::test]
    async fn test_results_keyed_by_category_and_element() {
        let stage = stage();
        let ctx = context(
            "t",
            vec![("Logistics", vec![detection("Wi-Fi", Sentiment::Negative)])],
        );
        let llm = MockLlmClient::new().respond_to(
            ContractKey::attributes("Logistics", "Wi-Fi"),
            "",
            json!({
                "attributes": [
                    {"attribute": "Reliability", "sentiment": "negative", "confidence": 5}
                ],
                "sentiment_consensus": true
            }),
        );

        let results = stage.process(ctx.texts(), &ctx, &llm).await.unwrap();
        let by_key = results["t"].as_attributes().unwrap();
        let wifi = &by_key["Logistics::Wi-Fi"];

        assert_eq!(wifi.category, "Logistics");
        assert_eq!(wifi.element, "Wi-Fi");
        assert_eq!(wifi.element_sentiment, Sentiment::Negative);
        assert_eq!(wifi.attributes[0].attribute, "Reliability");
        assert!(wifi.sentiment_consensus);
    }

    #[tokio::test]
    async fn test_prompt_carries_parent_sentiment() {
        let stage = stage();
        let ctx = context(
            "t",
            vec![("People", vec![detection("Speakers", Sentiment::Positive)])],
        );
        let llm = MockLlmClient::new();

        stage.process(ctx.texts(), &ctx, &llm).await.unwrap();
        assert!(llm.calls()[0]
            .prompt
            .contains("Overall sentiment for this element: **positive**"));
    }

    #[tokio::test]
    async fn test_element_without_attributes_accepts_empty_list() {
        let stage = stage();
        let ctx = context(
            "t",
            vec![("Logistics", vec![detection("Signage", Sentiment::Mixed)])],
        );
        let llm = MockLlmClient::new().with_default(json!({
            "attributes": [],
            "sentiment_consensus": false
        }));

        let results = stage.process(ctx.texts(), &ctx, &llm).await.unwrap();
        let signage = &results["t"].as_attributes().unwrap()["Logistics::Signage"];

        assert!(signage.attributes.is_empty());
        assert!(!signage.sentiment_consensus);
        assert!(!llm.calls()[0].repaired);
    }

    #[tokio::test]
    async fn test_element_without_attributes_repairs_incomplete_items() {
        let stage = stage();
        let ctx = context(
            "t",
            vec![("Logistics", vec![detection("Signage", Sentiment::Mixed)])],
        );
        let llm = MockLlmClient::new().with_default(json!({
            "attributes": [{"attribute": "Visibility"}],
            "sentiment_consensus": true
        }));

        let results = stage.process(ctx.texts(), &ctx, &llm).await.unwrap();
        let signage = &results["t"].as_attributes().unwrap()["Logistics::Signage"];

        assert!(llm.calls()[0].repaired);
        assert!(signage.attributes.is_empty());
        assert_eq!(signage.element_sentiment, Sentiment::Mixed);
    }

    #[tokio::test]
    async fn test_element_without_attributes_keeps_free_named_items() {
        let stage = stage();
        let ctx = context(
            "t",
            vec![("Logistics", vec![detection("Signage", Sentiment::Mixed)])],
        );
        let llm = MockLlmClient::new().with_default(json!({
            "attributes": [
                {"attribute": "Visibility", "sentiment": "negative", "confidence": 3}
            ]
        }));

        let results = stage.process(ctx.texts(), &ctx, &llm).await.unwrap();
        let signage = &results["t"].as_attributes().unwrap()["Logistics::Signage"];

        assert!(!llm.calls()[0].repaired);
        assert_eq!(signage.attributes.len(), 1);
        assert_eq!(signage.attributes[0].attribute, "Visibility");
        assert_eq!(signage.attributes[0].sentiment, Sentiment::Negative);
    }

    #[tokio::test]
    async fn test_fallback_keeps_stage_two_sentiment() {
        let stage = stage();
        let ctx = context(
            "t",
            vec![("Logistics", vec![detection("Wi-Fi", Sentiment::Negative)])],
        );
        // Attribute not defined for Wi-Fi, so the response is repaired.
        let llm = MockLlmClient::new().with_default(json!({
            "attributes": [
                {"attribute": "Catering", "sentiment": "positive", "confidence": 3}
            ]
        }));

        let results = stage.process(ctx.texts(), &ctx, &llm).await.unwrap();
        let wifi = &results["t"].as_attributes().unwrap()["Logistics::Wi-Fi"];

        assert!(llm.calls()[0].repaired);
        assert!(wifi.attributes.is_empty());
        assert_eq!(wifi.element_sentiment, Sentiment::Negative);
    }

    #[tokio::test]
    async fn test_every_text_gets_an_entry() {
        let stage = stage();
        let mut ctx = PipelineContext::new(["t1", "t2"]);
        ctx.set_stage_result(ELEMENT_EXTRACTION, "t1", StageOutput::Elements(BTreeMap::new()));
        let llm = MockLlmClient::new();

        let results = stage.process(ctx.texts(), &ctx, &llm).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results["t1"].as_attributes().unwrap().is_empty());
        assert!(results["t2"].as_attributes().unwrap().is_empty());
        assert_eq!(llm.call_count(), 0);
    }
}
