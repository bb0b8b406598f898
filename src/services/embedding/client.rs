//! HTTP embedding client for OpenAI-compatible `/embeddings` endpoints

use super::EmbeddingClient;
use crate::config::EmbeddingConfig;
use crate::error::CoreError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct HttpEmbeddingClient {
    http_client: Client,
    api_base: String,
    api_key: Option<String>,
    model_name: String,
    dimension: usize,
    timeout_seconds: u64,
}

impl HttpEmbeddingClient {
    /// Returns `None` when no API base is configured.
    pub fn from_config(config: &EmbeddingConfig) -> Option<Self> {
        let api_base = config.api_base.clone()?;
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Some(Self {
            http_client,
            api_base,
            api_key: config.api_key.clone(),
            model_name: config.model_name.clone(),
            dimension: config.dimension,
            timeout_seconds: config.timeout_seconds,
        })
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embedder_id(&self) -> &str {
        &self.model_name
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CoreError> {
        let url = format!("{}/embeddings", self.api_base.trim_end_matches('/'));
        let request = EmbeddingsRequest { model: &self.model_name, input: text };

        let mut builder = self.http_client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                CoreError::Timeout(self.timeout_seconds)
            } else {
                CoreError::UpstreamUnavailable { component: "embedder", message: e.to_string() }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CoreError::UpstreamUnavailable {
                component: "embedder",
                message: format!("API error {}: {}", status, error_text),
            });
        }

        let payload: EmbeddingsResponse = response.json().await.map_err(|e| {
            CoreError::UpstreamUnavailable {
                component: "embedder",
                message: format!("response parse: {}", e),
            }
        })?;

        let vector = payload
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| CoreError::UpstreamUnavailable {
                component: "embedder",
                message: "empty embeddings response".to_string(),
            })?;

        if vector.len() != self.dimension || vector.iter().any(|c| !c.is_finite()) {
            return Err(CoreError::UpstreamUnavailable {
                component: "embedder",
                message: format!(
                    "model returned {} components (expected {}) or non-finite values",
                    vector.len(),
                    self.dimension
                ),
            });
        }

        Ok(vector)
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
