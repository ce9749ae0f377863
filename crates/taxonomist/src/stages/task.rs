use std::collections::HashSet;

use serde_json::Value;

use crate::pipeline::StageError;
use crate::sanitize::text_fingerprint;
use crate::schema::{attribute_key, ContractKey, ElementDetection, Sentiment};

/// One unit of fan-out work: a text scoped to a taxonomy node detected
/// for it upstream. Built fresh per run.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub text: String,
    pub category: String,
    pub element: Option<String>,
    /// Carried from the element detection that produced this task.
    pub element_sentiment: Option<Sentiment>,
    pub element_excerpt: Option<String>,
}

impl Task {
    pub fn for_category(text: &str, category: &str) -> Self {
        Self {
            text: text.to_string(),
            category: category.to_string(),
            element: None,
            element_sentiment: None,
            element_excerpt: None,
        }
    }

    pub fn for_element(text: &str, category: &str, detection: &ElementDetection) -> Self {
        Self {
            text: text.to_string(),
            category: category.to_string(),
            element: Some(detection.element.clone()),
            element_sentiment: Some(detection.sentiment),
            element_excerpt: Some(detection.excerpt.clone()),
        }
    }

    /// Key of this task's entry in its stage's per-text map: the category
    /// name, or `category::element`.
    pub fn result_key(&self) -> String {
        match &self.element {
            Some(element) => attribute_key(&self.category, element),
            None => self.category.clone(),
        }
    }

    pub fn contract_key(&self) -> ContractKey {
        match &self.element {
            Some(element) => ContractKey::attributes(&self.category, element),
            None => ContractKey::elements(&self.category),
        }
    }

    /// Log-safe label: fingerprint of the text plus the node key.
    pub fn label(&self) -> String {
        format!("{} [{}]", self.result_key(), text_fingerprint(&self.text))
    }
}

/// Drop tasks whose (text, node) pair already appeared, keeping the first.
pub(crate) fn dedup(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter(|t| seen.insert((t.text.clone(), t.result_key())))
        .collect()
}

/// Insert `fields` into a JSON object where they are missing.
pub(crate) fn fill_missing(value: &mut Value, fields: &[(&str, Value)]) {
    if let Value::Object(map) = value {
        for (key, field) in fields {
            map.entry(key.to_string()).or_insert_with(|| field.clone());
        }
    }
}

/// Typed view of a collaborator response.
pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    label: String,
    value: Value,
) -> Result<T, StageError> {
    serde_json::from_value(value).map_err(|source| StageError::MalformedOutput {
        task: label,
        source,
    })
}
