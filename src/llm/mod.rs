//! Large-language-model completion access and structured-output parsing.

mod adapter;
pub mod payload;

pub use adapter::{ReasoningAdapter, DEFAULT_CONTEXT_BUDGET};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors from the LLM layer
///
/// Malformed payloads are a first-class, expected failure mode, not an
/// exceptional edge case.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Transport-level failure reaching the completion service
    #[error("Completion request failed: {0}")]
    Api(String),

    /// The model's response could not be parsed as the expected structure
    #[error("Format error: {0}")]
    Format(String),
}

/// One text-completion request
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub max_tokens: u32,
    pub prompt: String,
}

/// Completion service seam; injected into the adapter at construction time.
#[async_trait]
pub trait CompletionClient: Send + Sync + std::fmt::Debug {
    /// Run one completion and return the raw response text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Completion client backed by the Anthropic Messages API
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            api_key: api_key.into(),
            base_url: ANTHROPIC_MESSAGES_URL.to_string(),
        }
    }

    /// Override the endpoint (for tests against a local server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!(
                "completion service returned {}: {}",
                status, detail
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Api(format!("invalid completion response: {}", e)))?;

        parsed
            .content
            .into_iter()
            .map(|block| block.text)
            .reduce(|mut acc, text| {
                acc.push_str(&text);
                acc
            })
            .ok_or_else(|| LlmError::Format("completion response had no content".to_string()))
    }
}
