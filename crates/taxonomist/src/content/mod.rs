//! Taxonomy content access.
//!
//! A [`ContentProvider`] answers what the valid categories, elements and
//! attributes are, and which examples and rules support classifying into
//! them. Lookups for unknown names return empty lists; absence is never an
//! error.

pub mod composite;
pub mod error;
pub mod taxonomy;

use serde::{Deserialize, Serialize};

pub use composite::{CombinePolicy, CompositeContentProvider};
pub use error::ContentError;
pub use taxonomy::{StaticContentProvider, TaxonomyDocument};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryContent {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Child element names in taxonomy order.
    #[serde(default)]
    pub elements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementContent {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Child attribute names in taxonomy order.
    #[serde(default)]
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeContent {
    pub name: String,
    pub element: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// The (stage, category?, element?) scope supporting content is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentScope {
    pub stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
}

impl ContentScope {
    /// An item matches when its stage is equal and each of its optional
    /// category/element fields is either unset or equal to the query.
    pub fn matches(&self, stage: &str, category: Option<&str>, element: Option<&str>) -> bool {
        if self.stage != stage {
            return false;
        }
        let category_ok = match (&self.category, category) {
            (None, _) => true,
            (Some(own), Some(wanted)) => own == wanted,
            (Some(_), None) => false,
        };
        let element_ok = match (&self.element, element) {
            (None, _) => true,
            (Some(own), Some(wanted)) => own == wanted,
            (Some(_), None) => false,
        };
        category_ok && element_ok
    }
}

/// A worked classification example shown in prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub text: String,
    #[serde(default)]
    pub output: serde_json::Value,
    #[serde(default)]
    pub explanation: String,
    #[serde(flatten)]
    pub scope: ContentScope,
}

/// A classification guideline shown in prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub text: String,
    #[serde(flatten)]
    pub scope: ContentScope,
}

/// Source of taxonomy structure and supporting prompt content.
pub trait ContentProvider: Send + Sync {
    fn get_categories(&self) -> Vec<CategoryContent>;

    fn get_elements(&self, category: &str) -> Vec<ElementContent>;

    fn get_attributes(&self, category: &str, element: &str) -> Vec<AttributeContent>;

    fn get_examples(&self, stage: &str, category: Option<&str>, element: Option<&str>)
        -> Vec<Example>;

    fn get_rules(&self, stage: &str, category: Option<&str>, element: Option<&str>) -> Vec<Rule>;

    fn category_names(&self) -> Vec<String> {
        self.get_categories().into_iter().map(|c| c.name).collect()
    }

    fn element_names(&self, category: &str) -> Vec<String> {
        self.get_elements(category)
            .into_iter()
            .map(|e| e.name)
            .collect()
    }

    fn attribute_names(&self, category: &str, element: &str) -> Vec<String> {
        self.get_attributes(category, element)
            .into_iter()
            .map(|a| a.name)
            .collect()
    }
}
