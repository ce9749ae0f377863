use std::fmt;

use serde_json::{json, Value};

use super::types::{attribute_key, Sentiment};
use super::SchemaError;

/// Identifies which taxonomy node an output contract constrains.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContractKey {
    /// Stage 1: the full category list.
    Categories,
    /// Stage 2: the elements of one category.
    Elements { category: String },
    /// Stage 3: the attributes of one element.
    Attributes { category: String, element: String },
}

impl ContractKey {
    pub fn elements(category: &str) -> Self {
        ContractKey::Elements {
            category: category.to_string(),
        }
    }

    pub fn attributes(category: &str, element: &str) -> Self {
        ContractKey::Attributes {
            category: category.to_string(),
            element: element.to_string(),
        }
    }

    /// Identifier-safe name, used as the `json_schema` name in requests.
    pub fn schema_name(&self) -> &'static str {
        match self {
            ContractKey::Categories => "category_detection",
            ContractKey::Elements { .. } => "element_extraction",
            ContractKey::Attributes { .. } => "attribute_extraction",
        }
    }
}

impl fmt::Display for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractKey::Categories => write!(f, "categories"),
            ContractKey::Elements { category } => write!(f, "elements[{}]", category),
            ContractKey::Attributes { category, element } => {
                write!(f, "attributes[{}]", attribute_key(category, element))
            }
        }
    }
}

/// A runtime-built structural constraint on one LLM response.
///
/// Holds the generated JSON Schema together with its compiled validator so
/// collaborators can both send the schema to a guided-decoding backend and
/// check what comes back.
pub struct OutputContract {
    key: ContractKey,
    schema: Value,
    allowed: Vec<String>,
    validator: jsonschema::Validator,
}

impl OutputContract {
    pub fn new(key: ContractKey, schema: Value, allowed: Vec<String>) -> Result<Self, SchemaError> {
        let validator = jsonschema::validator_for(&schema).map_err(|e| SchemaError::Compile {
            contract: key.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            key,
            schema,
            allowed,
            validator,
        })
    }

    pub fn key(&self) -> &ContractKey {
        &self.key
    }

    /// The JSON Schema document.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Taxonomy names the contract accepts at its node, in taxonomy order.
    /// Empty for an element with no defined attributes.
    pub fn allowed_values(&self) -> &[String] {
        &self.allowed
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validator.is_valid(instance)
    }

    /// Validate an instance, returning every violation message.
    pub fn validate(&self, instance: &Value) -> Result<(), Vec<String>> {
        let errors: Vec<String> = self
            .validator
            .iter_errors(instance)
            .map(|e| e.to_string())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Minimal structurally valid instance: nothing detected.
    pub fn fallback(&self) -> Value {
        match &self.key {
            ContractKey::Categories => json!({
                "categories_present": [],
                "reasoning": ""
            }),
            ContractKey::Elements { category } => json!({
                "category": category,
                "elements": []
            }),
            ContractKey::Attributes { category, element } => json!({
                "category": category,
                "element": element,
                "element_sentiment": Sentiment::Neutral,
                "attributes": [],
                "sentiment_consensus": true
            }),
        }
    }

    /// Illustrative instance shown to the model in the output format section
    /// of a prompt.
    pub fn example(&self) -> Value {
        match &self.key {
            ContractKey::Categories => {
                let sample: Vec<&String> = self.allowed.iter().take(2).collect();
                json!({
                    "categories_present": sample,
                    "reasoning": "Brief explanation of why each category applies"
                })
            }
            ContractKey::Elements { category } => {
                let elements: Vec<Value> = self
                    .allowed
                    .first()
                    .map(|name| {
                        vec![json!({
                            "element": name,
                            "sentiment": Sentiment::Negative,
                            "confidence": 4,
                            "excerpt": "exact quote from the text",
                            "reasoning": "why this element applies"
                        })]
                    })
                    .unwrap_or_default();
                json!({ "category": category, "elements": elements })
            }
            ContractKey::Attributes { category, element } => {
                let attributes: Vec<Value> = self
                    .allowed
                    .first()
                    .map(|name| {
                        vec![json!({
                            "attribute": name,
                            "sentiment": Sentiment::Negative,
                            "confidence": 4,
                            "excerpt": "exact quote from the text",
                            "reasoning": "why this attribute applies"
                        })]
                    })
                    .unwrap_or_default();
                json!({
                    "category": category,
                    "element": element,
                    "element_sentiment": Sentiment::Negative,
                    "attributes": attributes,
                    "sentiment_consensus": true
                })
            }
        }
    }
}

impl fmt::Debug for OutputContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputContract")
            .field("key", &self.key)
            .field("allowed", &self.allowed)
            .finish_non_exhaustive()
    }
}
