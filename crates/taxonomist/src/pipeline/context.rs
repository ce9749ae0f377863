use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::stage::{StageOutput, StageResults};

/// Per-text view of every stage's raw output: text → stage name → output.
pub type MergedView = BTreeMap<String, BTreeMap<String, StageOutput>>;

/// Advisory bookkeeping for a run. Nothing downstream reads it.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Stages the caller asked for; `None` means all registered stages.
    pub stages_requested: Option<Vec<String>>,
    pub stages_executed: Vec<String>,
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for RunMetadata {
    fn default() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: None,
            finished_at: None,
            stages_requested: None,
            stages_executed: Vec::new(),
            extra: BTreeMap::new(),
        }
    }
}

/// Shared result store for one pipeline run, partitioned by stage name and
/// keyed by original input text.
pub struct PipelineContext {
    // Input, deduplicated in first-seen order
    texts: Vec<String>,

    // stage name -> text -> output
    results: HashMap<String, StageResults>,

    pub metadata: RunMetadata,
}

impl PipelineContext {
    /// Texts are the join key for every stage, so repeated texts collapse
    /// into one entry.
    pub fn new<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let texts = texts
            .into_iter()
            .map(Into::into)
            .filter(|t: &String| seen.insert(t.clone()))
            .collect();

        Self {
            texts,
            results: HashMap::new(),
            metadata: RunMetadata::default(),
        }
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn has_stage(&self, stage: &str) -> bool {
        self.results.contains_key(stage)
    }

    pub fn stage_results(&self, stage: &str) -> Option<&StageResults> {
        self.results.get(stage)
    }

    pub fn stage_result(&self, stage: &str, text: &str) -> Option<&StageOutput> {
        self.results.get(stage).and_then(|r| r.get(text))
    }

    /// Store a stage's whole section, replacing any previous one.
    pub fn set_stage_results(&mut self, stage: &str, results: StageResults) {
        self.results.insert(stage.to_string(), results);
    }

    /// Store a single text's output for a stage.
    pub fn set_stage_result(&mut self, stage: &str, text: &str, output: StageOutput) {
        self.results
            .entry(stage.to_string())
            .or_default()
            .insert(text.to_string(), output);
    }

    /// Raw per-text view across all stages, for inspection. Every input
    /// text gets an entry, even when no stage produced output for it.
    pub fn merged_view(&self) -> MergedView {
        self.texts
            .iter()
            .map(|text| {
                let per_stage = self
                    .results
                    .iter()
                    .filter_map(|(stage, results)| {
                        results.get(text).map(|out| (stage.clone(), out.clone()))
                    })
                    .collect();
                (text.clone(), per_stage)
            })
            .collect()
    }
}
