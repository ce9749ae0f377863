use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, StreamExt, TryStreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info_span, Instrument};

use crate::config::LlmConfig;
use crate::schema::OutputContract;
use crate::secrets::SecretSource;

use super::{conform, LlmClient, LlmError, LlmRequest, LlmResponse, TokenUsage};

/// Client for any OpenAI-compatible `/chat/completions` endpoint (OpenAI,
/// vLLM, llama.cpp server).
///
/// The output contract is sent as a `json_schema` response format so
/// servers with guided decoding only emit valid taxonomy names. Replies
/// that still fail the contract are replaced by its fallback instance.
pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
    temperature: f32,
    max_tokens: u32,
    concurrency: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat<'a>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'static str,
    schema: &'a Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig, api_key: Option<SecretString>) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            concurrency: config.concurrency.max(1),
        })
    }

    /// Build a client, resolving the API key from the configured source.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = SecretSource::from(config).resolve_optional()?;
        Self::new(config, api_key)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body<'a>(&'a self, prompt: &'a str, contract: &'a OutputContract) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: contract.key().schema_name(),
                    schema: contract.schema(),
                },
            },
        }
    }
}

/// Turn a completion into a contract-conforming response.
fn interpret(chat: ChatResponse, contract: &OutputContract) -> LlmResponse {
    let raw_text = chat
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();

    let candidate = extract_json(&raw_text).and_then(|s| serde_json::from_str(s).ok());
    conform(contract, candidate, raw_text, chat.usage)
}

/// Returns the first balanced `{...}` object in `text`, skipping braces
/// inside string literals. Models often wrap JSON in prose or code fences.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(
        &self,
        prompt: &str,
        contract: &OutputContract,
    ) -> Result<LlmResponse, LlmError> {
        let body = self.request_body(prompt, contract);

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response.json().await?;
        Ok(interpret(chat, contract))
    }

    async fn batch_generate(&self, requests: &[LlmRequest]) -> Result<Vec<LlmResponse>, LlmError> {
        let span = info_span!(
            "llm_batch",
            requests = requests.len(),
            concurrency = self.concurrency
        );

        async {
            // `buffered` yields results in submission order regardless of
            // completion order.
            let pending: Vec<_> = requests
                .iter()
                .map(|r| self.generate(&r.prompt, &r.contract))
                .collect();
            let responses: Vec<LlmResponse> = stream::iter(pending)
                .buffered(self.concurrency)
                .try_collect()
                .await?;

            let repaired = responses.iter().filter(|r| r.repaired).count();
            debug!(responses = responses.len(), repaired, "Batch complete");
            Ok(responses)
        }
        .instrument(span)
        .await
    }
}
