pub mod analyzer;
pub mod context_builder;
pub mod data_source;
pub mod document_store;
pub mod embedding;
pub mod health;
pub mod llm;
pub mod orchestrator;
pub mod quality;
pub mod schema_registry;
pub mod vector_store;

pub use analyzer::{AnalysisType, Confidence, Guidance, RagFusionAnalyzer};
pub use context_builder::{SchemaAwareContext, SchemaAwareContextBuilder};
pub use data_source::{DeviceBatch, DeviceDataSource, MockDataSource};
pub use document_store::DocumentService;
pub use embedding::{EmbeddingService, FallbackEmbedder, HttpEmbeddingClient};
pub use health::{HealthReport, HealthRuleEngine, HealthStatus, builtin_rules};
pub use llm::{HttpChatClient, LlmService};
pub use orchestrator::{QueryFlags, QueryOrchestrator};
pub use quality::{DataSample, QualityAssessor, QualityBand, QualityScores};
pub use schema_registry::SchemaRegistry;
pub use vector_store::{SqliteVectorStore, VectorStore};
