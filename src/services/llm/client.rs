//! HTTP chat client for OpenAI-compatible APIs
//!
//! Works against OpenAI, Azure OpenAI, DeepSeek, Ollama and other
//! `/chat/completions` endpoints.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ChatClient, ChatRequest};
use crate::config::LlmConfig;
use crate::error::CoreError;

pub struct HttpChatClient {
    http_client: Client,
    api_base: String,
    api_key: Option<String>,
    model_name: String,
}

impl HttpChatClient {
    pub fn from_config(config: &LlmConfig) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            model_name: config.model_name.clone(),
        }
    }
}

#[async_trait::async_trait]
impl ChatClient for HttpChatClient {
    async fn chat(&self, request: &ChatRequest) -> Result<String, CoreError> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(WireMessage { role: "system", content: request.system.clone() });
        for message in &request.messages {
            messages.push(WireMessage { role: message.role.as_str(), content: message.content.clone() });
        }

        let chat_request = ChatCompletionRequest {
            model: &self.model_name,
            messages,
            max_tokens: Some(request.max_tokens),
            temperature: Some(request.temperature),
        };

        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        tracing::debug!("Calling LLM API: {} with model {}", url, self.model_name);

        let mut builder = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .timeout(request.deadline)
            .json(&chat_request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                CoreError::Timeout(request.deadline.as_secs())
            } else {
                CoreError::UpstreamUnavailable { component: "llm", message: e.to_string() }
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(CoreError::UpstreamUnavailable {
                component: "llm",
                message: format!("rate limited, retry after {}s", retry_after),
            });
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CoreError::UpstreamUnavailable {
                component: "llm",
                message: format!("API error {}: {}", status, error_text),
            });
        }

        let chat_response: ChatCompletionResponse = response.json().await.map_err(|e| {
            CoreError::UpstreamUnavailable {
                component: "llm",
                message: format!("response parse: {}", e),
            }
        })?;

        if let Some(usage) = &chat_response.usage {
            tracing::info!(
                "LLM usage: {} prompt tokens, {} completion tokens",
                usage.prompt_tokens,
                usage.completion_tokens
            );
        }

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| CoreError::UpstreamUnavailable {
                component: "llm",
                message: "empty completion".to_string(),
            })
    }
}

// ============================================================================
// OpenAI API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: i32,
    completion_tokens: i32,
}
