use std::collections::HashSet;
use std::sync::Arc;

use super::{
    AttributeContent, CategoryContent, ContentProvider, ElementContent, Example, Rule,
};

/// How a [`CompositeContentProvider`] combines the taxonomy structure of its
/// providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinePolicy {
    /// The first provider returning a non-empty list answers the lookup.
    #[default]
    FirstNonEmpty,
    /// Union of all providers by name. Later providers override earlier
    /// ones; an item keeps the position where its name first appeared.
    MergeWithOverride,
}

/// An ordered chain of providers combined under a [`CombinePolicy`].
///
/// Examples and rules are always concatenated across providers and
/// deduplicated by text, regardless of policy.
pub struct CompositeContentProvider {
    providers: Vec<Arc<dyn ContentProvider>>,
    policy: CombinePolicy,
}

impl CompositeContentProvider {
    pub fn new(providers: Vec<Arc<dyn ContentProvider>>, policy: CombinePolicy) -> Self {
        Self { providers, policy }
    }

    pub fn policy(&self) -> CombinePolicy {
        self.policy
    }

    fn combine<T, F, N>(&self, lookup: F, name_of: N) -> Vec<T>
    where
        F: Fn(&dyn ContentProvider) -> Vec<T>,
        N: Fn(&T) -> &str,
    {
        match self.policy {
            CombinePolicy::FirstNonEmpty => self
                .providers
                .iter()
                .map(|p| lookup(p.as_ref()))
                .find(|items| !items.is_empty())
                .unwrap_or_default(),
            CombinePolicy::MergeWithOverride => {
                let mut merged: Vec<T> = Vec::new();
                for provider in &self.providers {
                    for item in lookup(provider.as_ref()) {
                        match merged.iter().position(|m| name_of(m) == name_of(&item)) {
                            Some(idx) => merged[idx] = item,
                            None => merged.push(item),
                        }
                    }
                }
                merged
            }
        }
    }
}

fn dedup_by_text<T, F>(items: impl Iterator<Item = T>, text_of: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        if seen.insert(text_of(&item).to_string()) {
            out.push(item);
        }
    }
    out
}

impl ContentProvider for CompositeContentProvider {
    // Child name lists are rebuilt from the combined child lookups so they
    // always agree with `get_elements` / `get_attributes`.
    fn get_categories(&self) -> Vec<CategoryContent> {
        let mut categories = self.combine(|p| p.get_categories(), |c| c.name.as_str());
        for category in &mut categories {
            category.elements = self
                .get_elements(&category.name)
                .into_iter()
                .map(|e| e.name)
                .collect();
        }
        categories
    }

    fn get_elements(&self, category: &str) -> Vec<ElementContent> {
        let mut elements = self.combine(|p| p.get_elements(category), |e| e.name.as_str());
        for element in &mut elements {
            element.attributes = self
                .get_attributes(category, &element.name)
                .into_iter()
                .map(|a| a.name)
                .collect();
        }
        elements
    }

    fn get_attributes(&self, category: &str, element: &str) -> Vec<AttributeContent> {
        self.combine(|p| p.get_attributes(category, element), |a| a.name.as_str())
    }

    fn get_examples(
        &self,
        stage: &str,
        category: Option<&str>,
        element: Option<&str>,
    ) -> Vec<Example> {
        dedup_by_text(
            self.providers
                .iter()
                .flat_map(|p| p.get_examples(stage, category, element)),
            |e| e.text.as_str(),
        )
    }

    fn get_rules(&self, stage: &str, category: Option<&str>, element: Option<&str>) -> Vec<Rule> {
        dedup_by_text(
            self.providers
                .iter()
                .flat_map(|p| p.get_rules(stage, category, element)),
            |r| r.text.as_str(),
        )
    }
}
