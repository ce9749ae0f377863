//! The LLM collaborator boundary.
//!
//! Implementations guarantee two things the pipeline relies on without
//! re-checking: `batch_generate` returns exactly one response per request
//! in request order, and every `parsed` value satisfies its contract
//! (substituting the contract's fallback instance when the model output
//! cannot be used).

pub mod mock;
pub mod openai;
pub mod recording;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::schema::OutputContract;
use crate::secrets::SecretError;

pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use recording::RecordingLlmClient;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to resolve API key: {0}")]
    Secret(#[from] SecretError),

    #[error("LLM backend error: {0}")]
    Backend(String),
}

/// One prompt paired with the contract its response must satisfy.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub prompt: String,
    pub contract: Arc<OutputContract>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, contract: Arc<OutputContract>) -> Self {
        Self {
            prompt: prompt.into(),
            contract,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmResponse {
    /// Structured output; always satisfies the request's contract.
    pub parsed: Value,
    /// Raw model text, when there was one.
    pub raw_text: String,
    pub usage: Option<TokenUsage>,
    /// True when `parsed` is the contract fallback rather than model output.
    pub repaired: bool,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        contract: &OutputContract,
    ) -> Result<LlmResponse, LlmError>;

    /// Generate one response per request, in request order.
    async fn batch_generate(&self, requests: &[LlmRequest]) -> Result<Vec<LlmResponse>, LlmError> {
        let mut responses = Vec::with_capacity(requests.len());
        for request in requests {
            responses.push(self.generate(&request.prompt, &request.contract).await?);
        }
        Ok(responses)
    }
}

/// Accept `candidate` if it satisfies the contract, otherwise substitute the
/// contract's fallback instance.
pub(crate) fn conform(
    contract: &OutputContract,
    candidate: Option<Value>,
    raw_text: String,
    usage: Option<TokenUsage>,
) -> LlmResponse {
    match candidate {
        Some(value) => match contract.validate(&value) {
            Ok(()) => LlmResponse {
                parsed: value,
                raw_text,
                usage,
                repaired: false,
            },
            Err(errors) => {
                warn!(
                    contract = %contract.key(),
                    errors = %errors.join("; "),
                    "LLM output violates contract, using fallback"
                );
                fallback_response(contract, raw_text, usage)
            }
        },
        None => {
            warn!(contract = %contract.key(), "No JSON in LLM output, using fallback");
            fallback_response(contract, raw_text, usage)
        }
    }
}

fn fallback_response(
    contract: &OutputContract,
    raw_text: String,
    usage: Option<TokenUsage>,
) -> LlmResponse {
    LlmResponse {
        parsed: contract.fallback(),
        raw_text,
        usage,
        repaired: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::StaticContentProvider;
    use crate::schema::SchemaFactory;
    use serde_json::json;

    fn contract() -> Arc<OutputContract> {
        let content =
            StaticContentProvider::from_yaml_str("categories:\n  - name: A\n  - name: B\n").unwrap();
        SchemaFactory::new(Arc::new(content)).categories().unwrap()
    }

    #[test]
    fn test_conform_accepts_valid_output() {
        let c = contract();
        let value = json!({"categories_present": ["A"], "reasoning": "r"});
        let response = conform(&c, Some(value.clone()), "raw".into(), None);
        assert!(!response.repaired);
        assert_eq!(response.parsed, value);
        assert_eq!(response.raw_text, "raw");
    }

    #[test]
    fn test_conform_repairs_invalid_output() {
        let c = contract();
        let response = conform(&c, Some(json!({"categories_present": ["Z"]})), String::new(), None);
        assert!(response.repaired);
        assert_eq!(response.parsed, c.fallback());
    }

    #[test]
    fn test_conform_repairs_missing_output() {
        let c = contract();
        let response = conform(&c, None, "not json".into(), None);
        assert!(response.repaired);
        assert_eq!(response.raw_text, "not json");
    }
}
