//! Lumen library
//!
//! Core modules for the network fleet query service: document corpus,
//! vector retrieval, schema-aware data quality, health scoring and the
//! query orchestration pipeline.

use sqlx::SqlitePool;
use std::sync::Arc;

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::Config;
pub use error::CoreError;
pub use services::{
    DocumentService, LlmService, QueryOrchestrator, RagFusionAnalyzer, SchemaAwareContextBuilder,
    SchemaRegistry,
};

/// Application shared state
///
/// Design Philosophy: Keep it simple - Rust's type system IS our DI container.
/// All services are wrapped in Arc for cheap cloning and thread safety; the
/// orchestrator owns its collaborators and nothing calls back into it.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,

    pub registry: Arc<SchemaRegistry>,
    pub documents: Arc<DocumentService>,
    pub orchestrator: Arc<QueryOrchestrator>,
    pub llm: Arc<LlmService>,
}
