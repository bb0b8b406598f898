use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use fleet_rag::config::Config;
use fleet_rag::services::data_source::{DeviceDataSource, MockDataSource};
use fleet_rag::services::embedding::{
    EmbeddingClient, EmbeddingService, FallbackEmbedder, HttpEmbeddingClient,
};
use fleet_rag::services::health::{HealthRuleEngine, builtin_rules};
use fleet_rag::services::llm::{HttpChatClient, LlmService};
use fleet_rag::services::vector_store::{SqliteVectorStore, VectorStore};
use fleet_rag::services::{
    DocumentService, QueryOrchestrator, RagFusionAnalyzer, SchemaAwareContextBuilder,
    SchemaRegistry,
};
use fleet_rag::{AppState, db, handlers, models};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::tools::get_status,
        handlers::tools::network_query,
        handlers::tools::list_network_devices,
        handlers::tools::get_device_details,

        handlers::documents::create_document,
        handlers::documents::get_document,
        handlers::documents::touch_document,
        handlers::documents::search_documents,
    ),
    components(
        schemas(
            handlers::tools::StatusResponse,
            handlers::tools::ToolResponse,
            handlers::tools::NetworkQueryRequest,
            handlers::tools::ListDevicesRequest,
            handlers::tools::DeviceDetailsRequest,
            handlers::documents::SearchDocumentsRequest,
            models::Document,
            models::DocumentKind,
            models::DocumentHit,
            models::CreateDocumentRequest,
            models::DeviceRecord,
            models::DeviceFilters,
        )
    ),
    tags(
        (name = "Tools", description = "Externally-callable query operations"),
        (name = "Documents", description = "Operational documentation corpus"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);
    let registry = tracing_subscriber::registry().with(log_filter);

    if let Some(log_file) = &config.logging.file {
        let log_path = std::path::Path::new(log_file);
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let log_dir = log_path.parent().and_then(|p| p.to_str()).unwrap_or("logs");
        let file_name = log_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("lumen.log");
        let file_prefix = file_name.strip_suffix(".log").unwrap_or(file_name);

        let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
        let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    tracing::info!("Lumen starting up");

    let pool = db::create_pool(&config.database.url).await?;
    db::init_schema(&pool).await?;
    tracing::info!("Database pool created and schema verified");

    // Embedding: external model when configured, hash fallback otherwise
    let fallback = FallbackEmbedder::new(&config.embedding);
    let primary: Option<Arc<dyn EmbeddingClient>> = HttpEmbeddingClient::from_config(
        &config.embedding,
    )
    .map(|client| Arc::new(client) as Arc<dyn EmbeddingClient>);
    if primary.is_none() {
        tracing::warn!("No embedding endpoint configured; using the hash fallback embedder");
    }
    let embedding = Arc::new(EmbeddingService::new(primary, fallback));

    let vector_store: Arc<dyn VectorStore> = {
        let store = SqliteVectorStore::new(pool.clone(), config.embedding.dimension);
        let loaded = store.load().await?;
        tracing::info!("Vector index rebuilt with {} records", loaded);
        Arc::new(store)
    };

    let schema_registry = Arc::new(SchemaRegistry::new());

    let documents = Arc::new(DocumentService::new(
        pool.clone(),
        Arc::clone(&embedding),
        Arc::clone(&vector_store),
        &config.retrieval,
        &config.quality,
    ));

    let data_source: Arc<dyn DeviceDataSource> =
        Arc::new(MockDataSource::with_seed_fleet(Arc::clone(&schema_registry)));

    let health_engine = Arc::new(HealthRuleEngine::new(
        builtin_rules(),
        Arc::clone(&embedding),
        Arc::clone(&vector_store),
    )?);
    health_engine.index_rules().await?;

    let analyzer = Arc::new(RagFusionAnalyzer::new(
        Arc::clone(&documents),
        Arc::clone(&schema_registry),
        config.retrieval.docs_per_rephrasing,
    ));

    let context_builder = Arc::new(SchemaAwareContextBuilder::new(
        Arc::clone(&schema_registry),
        Arc::clone(&data_source),
        &config.quality,
        &config.orchestrator,
    ));

    let llm = Arc::new(LlmService::new(
        Arc::new(HttpChatClient::from_config(&config.llm)),
        &config.llm,
    ));
    tracing::info!(
        "LLM service initialized (model {}, enabled: {})",
        config.llm.model_name,
        config.llm.enabled
    );

    let orchestrator = Arc::new(QueryOrchestrator::new(
        analyzer,
        context_builder,
        health_engine,
        Arc::clone(&data_source),
        Arc::clone(&documents),
        Arc::clone(&llm),
        Arc::clone(&schema_registry),
        config.orchestrator.clone(),
    ));

    let app_state = Arc::new(AppState {
        db: pool,
        registry: schema_registry,
        documents,
        orchestrator,
        llm,
    });

    let api_routes = Router::new()
        .route("/api/status", get(handlers::tools::get_status))
        .route("/api/tools/network_query", post(handlers::tools::network_query))
        .route(
            "/api/tools/list_network_devices",
            post(handlers::tools::list_network_devices),
        )
        .route(
            "/api/tools/get_device_details",
            post(handlers::tools::get_device_details),
        )
        .route(
            "/api/documents",
            post(handlers::documents::create_document),
        )
        .route("/api/documents/search", post(handlers::documents::search_documents))
        .route("/api/documents/:id", get(handlers::documents::get_document))
        .route("/api/documents/:id/touch", post(handlers::documents::touch_document))
        .with_state(Arc::clone(&app_state));

    let health_routes = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check));

    let app = Router::new()
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_routes)
        .merge(health_routes)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API documentation available at http://{}/api-docs", addr);
    tracing::info!("Lumen is ready to serve requests");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn ready_check() -> &'static str {
    "READY"
}
