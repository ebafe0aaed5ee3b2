use crate::config::LlmConfig;
use crate::error::{PlanError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// One completion call: an optional system prompt and a user prompt
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f32,
    /// Ask the provider to return a JSON object
    pub json_mode: bool,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            temperature: 0.7,
            json_mode: false,
            max_tokens: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Text completion backend. Output is untrusted and must be validated by
/// the caller.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// A chat message for the OpenAI-compatible API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// OpenAI-compatible chat completion request
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

fn build_chat_request(model: &str, request: CompletionRequest) -> ChatRequest {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = request.system {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: system,
        });
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: request.prompt,
    });

    ChatRequest {
        model: model.to_string(),
        messages,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        response_format: request
            .json_mode
            .then_some(ResponseFormat { kind: "json_object" }),
    }
}

fn first_choice_content(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| PlanError::LlmError("LLM returned empty choices".to_string()))
}

/// OpenAI-compatible chat-completions client
pub struct LlmClient {
    config: LlmConfig,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| PlanError::LlmError(e.to_string()))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl CompletionClient for LlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let body = build_chat_request(&self.config.model, request);

        tracing::debug!(
            model = %self.config.model,
            json_mode = body.response_format.is_some(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PlanError::LlmError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "(no body)".to_string());
            return Err(PlanError::LlmError(format!(
                "LLM API error (HTTP {}): {}",
                status, body
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| PlanError::LlmError(e.to_string()))?;

        first_choice_content(chat_response)
    }
}

/// Stand-in used when no LLM is configured; every call fails so callers
/// fall back to their degraded paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredClient;

#[async_trait]
impl CompletionClient for UnconfiguredClient {
    async fn complete(&self, _request: CompletionRequest) -> Result<String> {
        Err(PlanError::LlmNotConfigured)
    }
}

/// Pick the real client when configured, otherwise the failing stand-in
pub fn client_from_config(config: Option<LlmConfig>) -> Result<Arc<dyn CompletionClient>> {
    match config {
        Some(config) => Ok(Arc::new(LlmClient::new(config)?)),
        None => {
            tracing::warn!("LLM not configured; AI features will use fallbacks");
            Ok(Arc::new(UnconfiguredClient))
        },
    }
}

/// Strip markdown code fences and surrounding prose from a model reply,
/// leaving the outermost JSON object or array.
pub fn clean_json_response(text: &str) -> &str {
    let mut body = text.trim();

    if let Some(rest) = body.strip_prefix("```") {
        // Drop the info string (e.g. "json") on the opening fence line
        body = rest.split_once('\n').map(|(_, r)| r).unwrap_or("");
        body = body.trim_end();
        body = body.strip_suffix("```").unwrap_or(body).trim();
    }

    let start = match body.find(['{', '[']) {
        Some(start) => start,
        None => return body,
    };
    let closer = if body[start..].starts_with('{') { '}' } else { ']' };

    match body.rfind(closer) {
        Some(end) if end > start => &body[start..=end],
        _ => body,
    }
}
