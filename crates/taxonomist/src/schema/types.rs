use serde::{Deserialize, Serialize};

/// Separator used to build the stage-3 result key from a category and element.
pub const KEY_SEPARATOR: &str = "::";

/// Composite key under which attribute extraction results are stored.
pub fn attribute_key(category: &str, element: &str) -> String {
    format!("{}{}{}", category, KEY_SEPARATOR, element)
}

/// Closed sentiment scale shared by elements and attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    Mixed,
}

impl Sentiment {
    pub const ALL: [Sentiment; 4] = [
        Sentiment::Positive,
        Sentiment::Negative,
        Sentiment::Neutral,
        Sentiment::Mixed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Mixed => "mixed",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowest and highest confidence an LLM may report.
pub const MIN_CONFIDENCE: u8 = 1;
pub const MAX_CONFIDENCE: u8 = 5;

// Stage 1 output

/// Categories detected in a single text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryDetection {
    pub categories_present: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

// Stage 2 output

/// One element detected within a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDetection {
    pub element: String,
    pub sentiment: Sentiment,
    pub confidence: u8,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub reasoning: String,
}

/// Elements detected for one (text, category) task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementExtraction {
    pub category: String,
    #[serde(default)]
    pub elements: Vec<ElementDetection>,
}

// Stage 3 output

/// One attribute detected for an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDetection {
    pub attribute: String,
    pub sentiment: Sentiment,
    pub confidence: u8,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub reasoning: String,
}

/// Attributes detected for one (text, category, element) task.
///
/// `sentiment_consensus` is reported by the model and taken as-is; it is
/// not recomputed from the attribute sentiments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeExtraction {
    pub category: String,
    pub element: String,
    pub element_sentiment: Sentiment,
    #[serde(default)]
    pub attributes: Vec<AttributeDetection>,
    #[serde(default = "default_true")]
    pub sentiment_consensus: bool,
}

fn default_true() -> bool {
    true
}
