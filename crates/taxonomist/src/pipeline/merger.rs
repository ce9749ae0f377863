use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::schema::{
    attribute_key, AttributeDetection, AttributeExtraction, CategoryDetection, ElementDetection,
    ElementExtraction, Sentiment,
};
use crate::stages::{ATTRIBUTE_EXTRACTION, CATEGORY_DETECTION, ELEMENT_EXTRACTION};

use super::context::PipelineContext;
use super::stage::StageOutput;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeResult {
    pub name: String,
    pub sentiment: Sentiment,
    pub confidence: u8,
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementResult {
    pub name: String,
    pub sentiment: Sentiment,
    pub confidence: u8,
    pub excerpt: String,
    /// As reported by attribute extraction; `None` when that stage did not
    /// run for this element.
    pub sentiment_consensus: Option<bool>,
    pub attributes: Vec<AttributeResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub name: String,
    pub elements: Vec<ElementResult>,
}

/// Final nested classification of one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationOutput {
    pub text: String,
    pub categories: Vec<CategoryResult>,
}

impl ClassificationOutput {
    pub fn category(&self, name: &str) -> Option<&CategoryResult> {
        self.categories.iter().find(|c| c.name == name)
    }
}

impl CategoryResult {
    pub fn element(&self, name: &str) -> Option<&ElementResult> {
        self.elements.iter().find(|e| e.name == name)
    }
}

/// One denormalized row: the deepest detected node plus its full ancestry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRecord {
    pub text: String,
    pub category: String,
    pub element: Option<String>,
    pub element_sentiment: Option<Sentiment>,
    pub element_confidence: Option<u8>,
    pub element_excerpt: Option<String>,
    pub attribute: Option<String>,
    pub attribute_sentiment: Option<Sentiment>,
    pub attribute_confidence: Option<u8>,
    pub attribute_excerpt: Option<String>,
}

/// Rebuilds the category → element → attribute tree from the flat
/// per-stage sections of a [`PipelineContext`].
pub struct ResultMerger;

impl ResultMerger {
    /// One entry per text that has a category detection result, in input
    /// order. Missing element or attribute results mean "nothing detected".
    pub fn merge(context: &PipelineContext) -> Vec<ClassificationOutput> {
        context
            .texts()
            .iter()
            .filter_map(|text| {
                match context.stage_result(CATEGORY_DETECTION, text) {
                    Some(StageOutput::Categories(detection)) => {
                        Some(Self::merge_text(context, text, detection))
                    }
                    Some(other) => {
                        debug!(?other, "Unexpected output shape for category detection");
                        None
                    }
                    None => None,
                }
            })
            .collect()
    }

    fn merge_text(
        context: &PipelineContext,
        text: &str,
        detection: &CategoryDetection,
    ) -> ClassificationOutput {
        let elements_by_category = match context.stage_result(ELEMENT_EXTRACTION, text) {
            Some(StageOutput::Elements(map)) => Some(map),
            _ => None,
        };
        let attributes_by_key = match context.stage_result(ATTRIBUTE_EXTRACTION, text) {
            Some(StageOutput::Attributes(map)) => Some(map),
            _ => None,
        };

        let categories = detection
            .categories_present
            .iter()
            .map(|category| {
                let extraction: Option<&ElementExtraction> =
                    elements_by_category.and_then(|m| m.get(category));

                let elements = extraction
                    .map(|x| x.elements.as_slice())
                    .unwrap_or(&[])
                    .iter()
                    .map(|element| {
                        let attributes: Option<&AttributeExtraction> = attributes_by_key
                            .and_then(|m| m.get(&attribute_key(category, &element.element)));
                        element_result(element, attributes)
                    })
                    .collect();

                CategoryResult {
                    name: category.clone(),
                    elements,
                }
            })
            .collect();

        ClassificationOutput {
            text: text.to_string(),
            categories,
        }
    }

    /// One row per attribute; an element without attributes gets one
    /// element-level row; a category without elements gets one
    /// category-only row.
    pub fn to_flat_records(merged: &[ClassificationOutput]) -> Vec<FlatRecord> {
        let mut rows = Vec::new();

        for output in merged {
            for category in &output.categories {
                if category.elements.is_empty() {
                    rows.push(FlatRecord {
                        text: output.text.clone(),
                        category: category.name.clone(),
                        element: None,
                        element_sentiment: None,
                        element_confidence: None,
                        element_excerpt: None,
                        attribute: None,
                        attribute_sentiment: None,
                        attribute_confidence: None,
                        attribute_excerpt: None,
                    });
                    continue;
                }

                for element in &category.elements {
                    let element_row = FlatRecord {
                        text: output.text.clone(),
                        category: category.name.clone(),
                        element: Some(element.name.clone()),
                        element_sentiment: Some(element.sentiment),
                        element_confidence: Some(element.confidence),
                        element_excerpt: Some(element.excerpt.clone()),
                        attribute: None,
                        attribute_sentiment: None,
                        attribute_confidence: None,
                        attribute_excerpt: None,
                    };

                    if element.attributes.is_empty() {
                        rows.push(element_row);
                        continue;
                    }

                    for attribute in &element.attributes {
                        rows.push(FlatRecord {
                            attribute: Some(attribute.name.clone()),
                            attribute_sentiment: Some(attribute.sentiment),
                            attribute_confidence: Some(attribute.confidence),
                            attribute_excerpt: Some(attribute.excerpt.clone()),
                            ..element_row.clone()
                        });
                    }
                }
            }
        }

        rows
    }
}

fn element_result(
    element: &ElementDetection,
    attributes: Option<&AttributeExtraction>,
) -> ElementResult {
    ElementResult {
        name: element.element.clone(),
        sentiment: element.sentiment,
        confidence: element.confidence,
        excerpt: element.excerpt.clone(),
        sentiment_consensus: attributes.map(|a| a.sentiment_consensus),
        attributes: attributes
            .map(|a| a.attributes.iter().map(attribute_result).collect())
            .unwrap_or_default(),
    }
}

fn attribute_result(attribute: &AttributeDetection) -> AttributeResult {
    AttributeResult {
        name: attribute.attribute.clone(),
        sentiment: attribute.sentiment,
        confidence: attribute.confidence,
        excerpt: attribute.excerpt.clone(),
    }
}
