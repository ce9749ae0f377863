use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;

use crate::schema::OutputContract;

use super::{LlmClient, LlmError, LlmRequest, LlmResponse};

/// One prompt/response exchange captured by [`RecordingLlmClient`].
#[derive(Debug, Clone, Serialize)]
pub struct Exchange {
    pub prompt: String,
    pub contract: String,
    pub response: LlmResponse,
}

/// Wraps another client and records every exchange, for inspecting what a
/// run actually sent to the model.
pub struct RecordingLlmClient {
    inner: Arc<dyn LlmClient>,
    exchanges: Mutex<Vec<Exchange>>,
}

impl RecordingLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>) -> Self {
        Self {
            inner,
            exchanges: Mutex::new(Vec::new()),
        }
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        self.exchanges
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut exchanges) = self.exchanges.lock() {
            exchanges.clear();
        }
    }

    fn record(&self, items: impl IntoIterator<Item = Exchange>) -> Result<(), LlmError> {
        self.exchanges
            .lock()
            .map_err(|_| LlmError::Backend("recording log poisoned".to_string()))?
            .extend(items);
        Ok(())
    }
}

#[async_trait]
impl LlmClient for RecordingLlmClient {
    async fn generate(
        &self,
        prompt: &str,
        contract: &OutputContract,
    ) -> Result<LlmResponse, LlmError> {
        let response = self.inner.generate(prompt, contract).await?;
        self.record([Exchange {
            prompt: prompt.to_string(),
            contract: contract.key().to_string(),
            response: response.clone(),
        }])?;
        Ok(response)
    }

    // Delegate as a batch so the inner client keeps its own scheduling.
    async fn batch_generate(&self, requests: &[LlmRequest]) -> Result<Vec<LlmResponse>, LlmError> {
        let responses = self.inner.batch_generate(requests).await?;
        self.record(requests.iter().zip(&responses).map(|(req, resp)| Exchange {
            prompt: req.prompt.clone(),
            contract: req.contract.key().to_string(),
            response: resp.clone(),
        }))?;
        Ok(responses)
    }
}
