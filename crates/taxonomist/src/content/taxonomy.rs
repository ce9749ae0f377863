use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    AttributeContent, CategoryContent, ContentError, ContentProvider, ElementContent, Example, Rule,
};

/// On-disk taxonomy: a nested category → element → attribute tree plus
/// supporting examples and rules.
///
/// ```yaml
/// categories:
///   - name: People
///     description: Feedback about people at the event
///     elements:
///       - name: Speakers/Presenters
///         attributes:
///           - name: Expertise
/// examples:
///   - stage: category_detection
///     text: "Great keynote"
///     output: { categories_present: [People] }
/// rules:
///   - stage: element_extraction
///     category: People
///     text: "Only tag staff when the comment names a role"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaxonomyDocument {
    #[serde(default)]
    pub categories: Vec<CategoryNode>,
    #[serde(default)]
    pub examples: Vec<Example>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryNode {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub elements: Vec<ElementNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementNode {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeNode {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl TaxonomyDocument {
    pub fn from_yaml_str(content: &str) -> Result<Self, ContentError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ContentError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load from a file; `.json` files are parsed as JSON, everything else
    /// as YAML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ContentError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ContentError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_yaml_str(&content),
        }
    }

    /// Names are the join key for every stored result, so they must be
    /// non-empty and unique within their parent scope.
    pub fn validate(&self) -> Result<(), ContentError> {
        let mut categories = HashSet::new();
        for category in &self.categories {
            check_name("category", &category.name, "taxonomy", &mut categories)?;

            let mut elements = HashSet::new();
            for element in &category.elements {
                let scope = format!("category '{}'", category.name);
                check_name("element", &element.name, &scope, &mut elements)?;

                let mut attributes = HashSet::new();
                for attribute in &element.attributes {
                    let scope = format!("element '{}::{}'", category.name, element.name);
                    check_name("attribute", &attribute.name, &scope, &mut attributes)?;
                }
            }
        }
        Ok(())
    }
}

fn check_name<'a>(
    kind: &'static str,
    name: &'a str,
    scope: &str,
    seen: &mut HashSet<&'a str>,
) -> Result<(), ContentError> {
    if name.trim().is_empty() {
        return Err(ContentError::EmptyName {
            kind,
            scope: scope.to_string(),
        });
    }
    if !seen.insert(name) {
        return Err(ContentError::DuplicateName {
            kind,
            name: name.to_string(),
            scope: scope.to_string(),
        });
    }
    Ok(())
}

/// In-memory provider over a validated [`TaxonomyDocument`].
#[derive(Debug, Clone, Default)]
pub struct StaticContentProvider {
    categories: Vec<CategoryContent>,
    elements: HashMap<String, Vec<ElementContent>>,
    attributes: HashMap<(String, String), Vec<AttributeContent>>,
    examples: Vec<Example>,
    rules: Vec<Rule>,
}

impl StaticContentProvider {
    pub fn from_document(document: TaxonomyDocument) -> Result<Self, ContentError> {
        document.validate()?;

        let mut provider = Self {
            examples: document.examples,
            rules: document.rules,
            ..Self::default()
        };

        for category in document.categories {
            let mut element_contents = Vec::with_capacity(category.elements.len());

            for element in category.elements {
                let attribute_contents: Vec<AttributeContent> = element
                    .attributes
                    .into_iter()
                    .map(|a| AttributeContent {
                        name: a.name,
                        element: element.name.clone(),
                        category: category.name.clone(),
                        description: a.description,
                        keywords: a.keywords,
                    })
                    .collect();

                element_contents.push(ElementContent {
                    name: element.name.clone(),
                    category: category.name.clone(),
                    description: element.description,
                    keywords: element.keywords,
                    attributes: attribute_contents.iter().map(|a| a.name.clone()).collect(),
                });
                provider.attributes.insert(
                    (category.name.clone(), element.name),
                    attribute_contents,
                );
            }

            provider.categories.push(CategoryContent {
                name: category.name.clone(),
                description: category.description,
                keywords: category.keywords,
                elements: element_contents.iter().map(|e| e.name.clone()).collect(),
            });
            provider.elements.insert(category.name, element_contents);
        }

        debug!(
            categories = provider.categories.len(),
            examples = provider.examples.len(),
            rules = provider.rules.len(),
            "Loaded taxonomy"
        );

        Ok(provider)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ContentError> {
        Self::from_document(TaxonomyDocument::from_yaml_str(content)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ContentError> {
        Self::from_document(TaxonomyDocument::from_path(path)?)
    }
}

impl ContentProvider for StaticContentProvider {
    fn get_categories(&self) -> Vec<CategoryContent> {
        self.categories.clone()
    }

    fn get_elements(&self, category: &str) -> Vec<ElementContent> {
        self.elements.get(category).cloned().unwrap_or_default()
    }

    fn get_attributes(&self, category: &str, element: &str) -> Vec<AttributeContent> {
        self.attributes
            .get(&(category.to_string(), element.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    fn get_examples(
        &self,
        stage: &str,
        category: Option<&str>,
        element: Option<&str>,
    ) -> Vec<Example> {
        self.examples
            .iter()
            .filter(|e| e.scope.matches(stage, category, element))
            .cloned()
            .collect()
    }

    fn get_rules(&self, stage: &str, category: Option<&str>, element: Option<&str>) -> Vec<Rule> {
        self.rules
            .iter()
            .filter(|r| r.scope.matches(stage, category, element))
            .cloned()
            .collect()
    }
}
