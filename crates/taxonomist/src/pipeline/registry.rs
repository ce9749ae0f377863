use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use super::error::RegistryError;
use super::stage::Stage;

/// Explicitly registered stages, kept in registration order.
#[derive(Default)]
pub struct StageRegistry {
    stages: Vec<Arc<dyn Stage>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage. A duplicate name is rejected and leaves the existing
    /// registration untouched.
    pub fn register(&mut self, stage: Arc<dyn Stage>) -> Result<(), RegistryError> {
        if self.contains(stage.name()) {
            return Err(RegistryError::DuplicateStage(stage.name().to_string()));
        }
        debug!(stage = stage.name(), dependencies = ?stage.dependencies(), "Registered stage");
        self.stages.push(stage);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Stage>, RegistryError> {
        self.stages
            .iter()
            .find(|s| s.name() == name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownStage {
                name: name.to_string(),
                available: self.list_stages(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stages.iter().any(|s| s.name() == name)
    }

    /// Stage names in registration order.
    pub fn list_stages(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Execution order for `requested` (or every stage) closed under
    /// transitive dependencies.
    ///
    /// Kahn's algorithm over the closure; among stages that become runnable
    /// together, the earlier-registered one goes first.
    pub fn resolve_order(&self, requested: Option<&[String]>) -> Result<Vec<String>, RegistryError> {
        let closure = self.dependency_closure(requested)?;

        // Registration index stands in for the name inside the algorithm.
        let index: HashMap<&str, usize> = self
            .stages
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name(), i))
            .collect();

        let mut in_degree: HashMap<usize, usize> = HashMap::new();
        let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();

        for &node in &closure {
            let deps: HashSet<String> = self.stages[node].dependencies().into_iter().collect();
            in_degree.insert(node, deps.len());
            for dep in deps {
                // Every dependency is registered and in the closure by now.
                if let Some(&dep_idx) = index.get(dep.as_str()) {
                    dependents.entry(dep_idx).or_default().push(node);
                }
            }
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .filter(|&(_, &d)| d == 0)
            .map(|(&n, _)| n)
            .collect();
        let mut order = Vec::with_capacity(closure.len());

        while let Some(node) = ready.pop_first() {
            order.push(node);
            for &dependent in dependents.get(&node).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(d) = in_degree.get_mut(&dependent) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if order.len() < closure.len() {
            let emitted: HashSet<usize> = order.iter().copied().collect();
            let mut stages: Vec<String> = closure
                .iter()
                .copied()
                .filter(|n| !emitted.contains(n))
                .map(|n| self.stages[n].name().to_string())
                .collect();
            stages.sort();
            return Err(RegistryError::Cycle { stages });
        }

        Ok(order
            .into_iter()
            .map(|n| self.stages[n].name().to_string())
            .collect())
    }

    /// Registration indices of the requested stages plus everything they
    /// transitively depend on.
    fn dependency_closure(&self, requested: Option<&[String]>) -> Result<BTreeSet<usize>, RegistryError> {
        let position = |name: &str| self.stages.iter().position(|s| s.name() == name);

        let mut pending: Vec<usize> = match requested {
            None => (0..self.stages.len()).collect(),
            Some(names) => names
                .iter()
                .map(|name| {
                    position(name).ok_or_else(|| RegistryError::UnknownStage {
                        name: name.clone(),
                        available: self.list_stages(),
                    })
                })
                .collect::<Result<_, _>>()?,
        };

        let mut closure = BTreeSet::new();
        while let Some(node) = pending.pop() {
            if !closure.insert(node) {
                continue;
            }
            let stage = &self.stages[node];
            for dep in stage.dependencies() {
                let dep_idx = position(&dep).ok_or_else(|| RegistryError::MissingDependency {
                    stage: stage.name().to_string(),
                    dependency: dep.clone(),
                })?;
                pending.push(dep_idx);
            }
        }

        Ok(closure)
    }

    /// Non-fatal observations about the stage graph, plus any error that
    /// would make a full resolve fail.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let roots: Vec<&str> = self
            .stages
            .iter()
            .filter(|s| s.dependencies().is_empty())
            .map(|s| s.name())
            .collect();
        if roots.is_empty() && !self.stages.is_empty() {
            warnings.push("No root stage: every stage has dependencies".to_string());
        } else if roots.len() > 1 {
            warnings.push(format!("Multiple root stages: {}", roots.join(", ")));
        }

        if let Err(e) = self.resolve_order(None) {
            warnings.push(e.to_string());
        }

        warnings
    }
}
