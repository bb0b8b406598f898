//! LLM service
//!
//! One chat-completion port plus the gated service the orchestrator calls.
//! The provider (endpoint, model, limits) is fixed at startup from
//! configuration; concurrent calls are bounded by a semaphore and every call
//! carries an explicit deadline.

pub mod client;

pub use client::HttpChatClient;

use crate::config::LlmConfig;
use crate::error::CoreError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// One chat completion request. The system prompt is set by the core; the
/// caller cannot override it.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub deadline: Duration,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<String, CoreError>;
}

/// Semaphore-gated LLM access with config-driven limits.
pub struct LlmService {
    client: Arc<dyn ChatClient>,
    semaphore: Arc<Semaphore>,
    max_tokens: u32,
    temperature: f64,
    deadline: Duration,
    enabled: bool,
}

impl LlmService {
    pub fn new(client: Arc<dyn ChatClient>, config: &LlmConfig) -> Self {
        Self {
            client,
            semaphore: Arc::new(Semaphore::new(config.max_concurrency)),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            deadline: Duration::from_secs(config.timeout_seconds),
            enabled: config.enabled,
        }
    }

    pub fn is_available(&self) -> bool {
        self.enabled
    }

    /// One gated completion. Queueing for a permit counts against the
    /// deadline; a canceled caller never leaks a permit.
    pub async fn complete(&self, system: &str, user_content: String) -> Result<String, CoreError> {
        if !self.enabled {
            return Err(CoreError::UpstreamUnavailable {
                component: "llm",
                message: "disabled by configuration".to_string(),
            });
        }

        let request = ChatRequest {
            system: system.to_string(),
            messages: vec![ChatMessage { role: ChatRole::User, content: user_content }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            deadline: self.deadline,
        };

        let started = std::time::Instant::now();
        let result = tokio::time::timeout(self.deadline, async {
            let _permit = self
                .semaphore
                .acquire()
                .await
                .map_err(|_| CoreError::Canceled)?;
            self.client.chat(&request).await
        })
        .await;

        let latency_ms = started.elapsed().as_millis();
        match result {
            Ok(Ok(completion)) => {
                tracing::info!("LLM completion ok ({} ms, {} chars)", latency_ms, completion.len());
                Ok(completion)
            }
            Ok(Err(err)) => {
                tracing::warn!("LLM completion failed after {} ms: {}", latency_ms, err);
                Err(err)
            }
            Err(_) => {
                tracing::warn!("LLM completion hit the {}s deadline", self.deadline.as_secs());
                Err(CoreError::Timeout(self.deadline.as_secs()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoClient;

    #[async_trait]
    impl ChatClient for EchoClient {
        async fn chat(&self, request: &ChatRequest) -> Result<String, CoreError> {
            Ok(format!("echo: {}", request.messages[0].content))
        }
    }

    struct SlowClient;

    #[async_trait]
    impl ChatClient for SlowClient {
        async fn chat(&self, _request: &ChatRequest) -> Result<String, CoreError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".to_string())
        }
    }

    fn config(enabled: bool, timeout_seconds: u64) -> LlmConfig {
        LlmConfig { enabled, timeout_seconds, ..LlmConfig::default() }
    }

    #[tokio::test]
    async fn completion_passes_through() {
        let service = LlmService::new(Arc::new(EchoClient), &config(true, 30));
        let answer = service.complete("system", "hello".to_string()).await.unwrap();
        assert_eq!(answer, "echo: hello");
    }

    #[tokio::test]
    async fn disabled_service_reports_upstream_unavailable() {
        let service = LlmService::new(Arc::new(EchoClient), &config(false, 30));
        let err = service
            .complete("system", "hello".to_string())
            .await
            .expect_err("disabled");
        assert_eq!(err.kind(), "UPSTREAM_UNAVAILABLE");
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_turns_into_timeout() {
        let service = LlmService::new(Arc::new(SlowClient), &config(true, 1));
        let err = service
            .complete("system", "hello".to_string())
            .await
            .expect_err("deadline");
        assert_eq!(err.kind(), "TIMEOUT");
    }
}
