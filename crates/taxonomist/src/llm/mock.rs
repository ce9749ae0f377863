use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::schema::{ContractKey, OutputContract};

use super::{conform, LlmClient, LlmError, LlmResponse};

struct ScriptedResponse {
    contract: Option<ContractKey>,
    prompt_contains: String,
    response: Value,
}

/// A call observed by [`MockLlmClient`].
#[derive(Debug, Clone)]
pub struct MockCall {
    pub prompt: String,
    pub contract: ContractKey,
    pub response: Value,
    pub repaired: bool,
}

/// Scripted, deterministic LLM collaborator.
///
/// Resolution order for each prompt:
/// 1. the first scripted response whose contract key (if set) matches and
///    whose substring occurs in the prompt;
/// 2. the next queued response;
/// 3. the default response;
/// 4. the contract's fallback instance.
///
/// Responses that violate the contract are replaced by the fallback, the
/// same way a real backend repairs bad model output.
#[derive(Default)]
pub struct MockLlmClient {
    scripted: Vec<ScriptedResponse>,
    queue: Mutex<VecDeque<Value>>,
    default_response: Option<Value>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond with `response` for prompts under `contract` containing
    /// `prompt_contains`.
    pub fn respond_to(
        mut self,
        contract: ContractKey,
        prompt_contains: impl Into<String>,
        response: Value,
    ) -> Self {
        self.scripted.push(ScriptedResponse {
            contract: Some(contract),
            prompt_contains: prompt_contains.into(),
            response,
        });
        self
    }

    /// Respond with `response` for any prompt containing `prompt_contains`.
    pub fn respond_when(mut self, prompt_contains: impl Into<String>, response: Value) -> Self {
        self.scripted.push(ScriptedResponse {
            contract: None,
            prompt_contains: prompt_contains.into(),
            response,
        });
        self
    }

    /// Queue a response handed out to the next unmatched prompt.
    pub fn enqueue(mut self, response: Value) -> Self {
        self.queue
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
        self
    }

    pub fn with_default(mut self, response: Value) -> Self {
        self.default_response = Some(response);
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn clear_history(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    fn pick(&self, prompt: &str, contract: &OutputContract) -> Result<Option<Value>, LlmError> {
        let scripted = self.scripted.iter().find(|s| {
            s.contract.as_ref().map_or(true, |k| k == contract.key())
                && prompt.contains(&s.prompt_contains)
        });
        if let Some(s) = scripted {
            return Ok(Some(s.response.clone()));
        }

        let queued = self
            .queue
            .lock()
            .map_err(|_| LlmError::Backend("mock response queue poisoned".to_string()))?
            .pop_front();
        if queued.is_some() {
            return Ok(queued);
        }

        Ok(self.default_response.clone())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(
        &self,
        prompt: &str,
        contract: &OutputContract,
    ) -> Result<LlmResponse, LlmError> {
        let response = match self.pick(prompt, contract)? {
            Some(value) => {
                let raw_text = value.to_string();
                conform(contract, Some(value), raw_text, None)
            }
            None => LlmResponse {
                parsed: contract.fallback(),
                raw_text: String::new(),
                usage: None,
                repaired: false,
            },
        };

        self.calls
            .lock()
            .map_err(|_| LlmError::Backend("mock call history poisoned".to_string()))?
            .push(MockCall {
                prompt: prompt.to_string(),
                contract: contract.key().clone(),
                response: response.parsed.clone(),
                repaired: response.repaired,
            });

        Ok(response)
    }
}
