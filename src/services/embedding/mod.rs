//! Embedding port
//!
//! Text goes in, a fixed-dimension vector comes out. The primary client talks
//! to an external embedding model; when it is missing or failing, the
//! deterministic hash-derived fallback keeps the operation total at reduced
//! quality.

pub mod client;
pub mod fallback;

pub use client::HttpEmbeddingClient;
pub use fallback::FallbackEmbedder;

use crate::error::CoreError;
use async_trait::async_trait;
use std::sync::Arc;

/// One produced embedding plus the identifier of the model that made it.
#[derive(Debug, Clone)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub embedder_id: String,
}

/// A client that can embed text into exactly `dimension()` finite components.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    fn dimension(&self) -> usize;

    fn embedder_id(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CoreError>;
}

/// Primary-with-fallback embedding service. `embed` never fails: any primary
/// error degrades to the fallback embedder with a warning.
pub struct EmbeddingService {
    primary: Option<Arc<dyn EmbeddingClient>>,
    fallback: FallbackEmbedder,
}

impl EmbeddingService {
    pub fn new(primary: Option<Arc<dyn EmbeddingClient>>, fallback: FallbackEmbedder) -> Self {
        if let Some(client) = &primary {
            assert_eq!(
                client.dimension(),
                fallback.dimension(),
                "primary and fallback embedders must agree on D"
            );
        }
        Self { primary, fallback }
    }

    pub fn fallback_only(fallback: FallbackEmbedder) -> Self {
        Self { primary: None, fallback }
    }

    pub fn dimension(&self) -> usize {
        self.fallback.dimension()
    }

    /// Embed text, degrading to the fallback on any primary failure.
    pub async fn embed(&self, text: &str) -> Embedding {
        if let Some(primary) = &self.primary {
            match primary.embed(text).await {
                Ok(vector) => {
                    return Embedding {
                        vector,
                        embedder_id: primary.embedder_id().to_string(),
                    };
                }
                Err(err) => {
                    tracing::warn!(
                        "Primary embedder failed ({}), degrading to fallback: {}",
                        primary.embedder_id(),
                        err
                    );
                }
            }
        }

        Embedding {
            vector: self.fallback.embed(text),
            embedder_id: self.fallback.embedder_id().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;

    struct FailingClient {
        dimension: usize,
    }

    #[async_trait]
    impl EmbeddingClient for FailingClient {
        fn dimension(&self) -> usize {
            self.dimension
        }

        fn embedder_id(&self) -> &str {
            "always-failing"
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, CoreError> {
            Err(CoreError::UpstreamUnavailable {
                component: "embedder",
                message: "connection refused".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn primary_failure_degrades_to_fallback() {
        let config = EmbeddingConfig::default();
        let fallback = FallbackEmbedder::new(&config);
        let service = EmbeddingService::new(
            Some(Arc::new(FailingClient { dimension: config.dimension })),
            fallback,
        );

        let embedding = service.embed("how many OLTs are in HOBO").await;
        assert_eq!(embedding.vector.len(), config.dimension);
        assert_eq!(embedding.embedder_id, "hash-fallback-v1");
    }

    #[tokio::test]
    async fn fallback_only_service_is_total() {
        let service = EmbeddingService::fallback_only(FallbackEmbedder::new(
            &EmbeddingConfig::default(),
        ));
        let embedding = service.embed("").await;
        assert_eq!(embedding.vector.len(), 384);
        assert!(embedding.vector.iter().all(|c| c.is_finite()));
    }
}
