use std::sync::Arc;

use moka::sync::Cache;
use serde_json::{json, Value};
use tracing::debug;

use crate::content::ContentProvider;

use super::contract::{ContractKey, OutputContract};
use super::types::{Sentiment, MAX_CONFIDENCE, MIN_CONFIDENCE};
use super::SchemaError;

/// Upper bound on cached contracts; one per category plus one per element.
const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

/// Builds output contracts from taxonomy content and caches them.
///
/// The cache has no staleness detection: when the content behind the
/// provider changes, callers must call [`SchemaFactory::invalidate`].
pub struct SchemaFactory {
    content: Arc<dyn ContentProvider>,
    cache: Cache<ContractKey, Arc<OutputContract>>,
}

impl SchemaFactory {
    pub fn new(content: Arc<dyn ContentProvider>) -> Self {
        Self::with_capacity(content, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(content: Arc<dyn ContentProvider>, capacity: u64) -> Self {
        Self {
            content,
            cache: Cache::new(capacity),
        }
    }

    pub fn content(&self) -> &Arc<dyn ContentProvider> {
        &self.content
    }

    /// Stage 1 contract over the full category list.
    pub fn categories(&self) -> Result<Arc<OutputContract>, SchemaError> {
        self.get(ContractKey::Categories)
    }

    /// Stage 2 contract over one category's elements.
    pub fn elements(&self, category: &str) -> Result<Arc<OutputContract>, SchemaError> {
        self.get(ContractKey::elements(category))
    }

    /// Stage 3 contract over one element's attributes.
    pub fn attributes(
        &self,
        category: &str,
        element: &str,
    ) -> Result<Arc<OutputContract>, SchemaError> {
        self.get(ContractKey::attributes(category, element))
    }

    pub fn get(&self, key: ContractKey) -> Result<Arc<OutputContract>, SchemaError> {
        self.cache
            .try_get_with(key.clone(), || self.build(key).map(Arc::new))
            .map_err(|e| (*e).clone())
    }

    /// Drop every cached contract.
    pub fn invalidate(&self) {
        self.cache.invalidate_all();
        debug!("Schema cache invalidated");
    }

    /// Build every contract the taxonomy currently defines. Returns the
    /// number of contracts now available.
    pub fn warm(&self) -> Result<usize, SchemaError> {
        let mut count = 0;
        self.categories()?;
        count += 1;

        for category in self.content.get_categories() {
            self.elements(&category.name)?;
            count += 1;
            for element in self.content.get_elements(&category.name) {
                self.attributes(&category.name, &element.name)?;
                count += 1;
            }
        }

        Ok(count)
    }

    fn build(&self, key: ContractKey) -> Result<OutputContract, SchemaError> {
        debug!(contract = %key, "Building output contract");

        let (allowed, schema) = match &key {
            ContractKey::Categories => {
                let allowed = self.content.category_names();
                let schema = category_schema(&allowed);
                (allowed, schema)
            }
            ContractKey::Elements { category } => {
                let allowed = self.content.element_names(category);
                let schema = element_schema(category, &allowed);
                (allowed, schema)
            }
            ContractKey::Attributes { category, element } => {
                let allowed = self.content.attribute_names(category, element);
                let schema = attribute_schema(category, element, &allowed);
                (allowed, schema)
            }
        };

        OutputContract::new(key, schema, allowed)
    }
}

fn sentiment_schema() -> Value {
    let values: Vec<&str> = Sentiment::ALL.iter().map(|s| s.as_str()).collect();
    json!({ "type": "string", "enum": values })
}

fn confidence_schema() -> Value {
    json!({ "type": "integer", "minimum": MIN_CONFIDENCE, "maximum": MAX_CONFIDENCE })
}

/// An array of detections whose name field is restricted to `allowed`.
/// With nothing allowed the array must stay empty.
fn detections_schema(name_field: &str, allowed: &[String]) -> Value {
    if allowed.is_empty() {
        return json!({ "type": "array", "maxItems": 0 });
    }
    detection_items(name_field, json!({ "type": "string", "enum": allowed }))
}

fn detection_items(name_field: &str, name: Value) -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                name_field: name,
                "sentiment": sentiment_schema(),
                "confidence": confidence_schema(),
                "excerpt": { "type": "string" },
                "reasoning": { "type": "string" }
            },
            "required": [name_field, "sentiment", "confidence"]
        }
    })
}

fn category_schema(allowed: &[String]) -> Value {
    let categories = if allowed.is_empty() {
        json!({ "type": "array", "maxItems": 0 })
    } else {
        json!({
            "type": "array",
            "items": { "type": "string", "enum": allowed },
            "uniqueItems": true
        })
    };

    json!({
        "title": "CategoryDetection",
        "type": "object",
        "properties": {
            "categories_present": categories,
            "reasoning": { "type": "string" }
        },
        "required": ["categories_present"]
    })
}

fn element_schema(category: &str, allowed: &[String]) -> Value {
    json!({
        "title": "ElementExtraction",
        "type": "object",
        "properties": {
            "category": { "type": "string", "const": category },
            "elements": detections_schema("element", allowed)
        },
        "required": ["elements"]
    })
}

fn attribute_schema(category: &str, element: &str, allowed: &[String]) -> Value {
    // An element without defined attributes leaves the name free but keeps
    // the shape of each detection.
    let attributes = if allowed.is_empty() {
        detection_items("attribute", json!({ "type": "string" }))
    } else {
        detections_schema("attribute", allowed)
    };

    json!({
        "title": "AttributeExtraction",
        "type": "object",
        "properties": {
            "category": { "type": "string", "const": category },
            "element": { "type": "string", "const": element },
            "element_sentiment": sentiment_schema(),
            "attributes": attributes,
            "sentiment_consensus": { "type": "boolean" }
        },
        "required": ["attributes"]
    })
}
