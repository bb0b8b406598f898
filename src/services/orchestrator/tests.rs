//! End-to-end orchestrator scenarios
//!
//! Full pipeline against the seeded mock data source, the fallback embedder
//! and a scripted chat client.

use super::response::render_markdown;
use super::*;
use crate::config::Config;
use crate::db;
use crate::models::{CreateDocumentRequest, DocumentKind};
use crate::services::analyzer::{AnalysisType, Confidence, RagFusionAnalyzer};
use crate::services::context_builder::SchemaAwareContextBuilder;
use crate::services::data_source::MockDataSource;
use crate::services::embedding::{EmbeddingService, FallbackEmbedder};
use crate::services::health::{HealthRuleEngine, HealthStatus, builtin_rules};
use crate::services::llm::{ChatClient, ChatRequest, LlmService};
use crate::services::vector_store::{SqliteVectorStore, VectorStore};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;

// ============================================================================
// Harness
// ============================================================================

struct ScriptedChat {
    reply: Option<&'static str>,
}

#[async_trait]
impl ChatClient for ScriptedChat {
    async fn chat(&self, _request: &ChatRequest) -> Result<String, crate::error::CoreError> {
        match self.reply {
            Some(reply) => Ok(reply.to_string()),
            None => Err(crate::error::CoreError::UpstreamUnavailable {
                component: "llm",
                message: "connection refused".to_string(),
            }),
        }
    }
}

struct Harness {
    orchestrator: QueryOrchestrator,
    source: Arc<MockDataSource>,
}

async fn harness(llm_up: bool, seed_fleet: bool, seed_corpus: bool) -> Harness {
    let config = Config::default();
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    db::init_schema(&pool).await.unwrap();

    let registry = Arc::new(crate::services::schema_registry::SchemaRegistry::new());
    let embedding = Arc::new(EmbeddingService::fallback_only(FallbackEmbedder::new(
        &config.embedding,
    )));
    let vector_store: Arc<dyn VectorStore> =
        Arc::new(SqliteVectorStore::new(pool.clone(), config.embedding.dimension));

    let documents = Arc::new(crate::services::document_store::DocumentService::new(
        pool,
        Arc::clone(&embedding),
        Arc::clone(&vector_store),
        &config.retrieval,
        &config.quality,
    ));

    if seed_corpus {
        documents
            .create(CreateDocumentRequest {
                title: "list_network_devices tool".to_string(),
                body: "The list_network_devices tool enumerates OLT devices per region and \
                       environment, applying health scoring to every device in the fleet."
                    .to_string(),
                kind: DocumentKind::ToolHelp,
                usefulness: 0.9,
                keywords: None,
            })
            .await
            .unwrap();
    }

    let source = if seed_fleet {
        Arc::new(MockDataSource::with_seed_fleet(Arc::clone(&registry)))
    } else {
        Arc::new(MockDataSource::empty(Arc::clone(&registry)))
    };

    let health_engine = Arc::new(
        HealthRuleEngine::new(builtin_rules(), Arc::clone(&embedding), Arc::clone(&vector_store))
            .unwrap(),
    );
    health_engine.index_rules().await.unwrap();

    let analyzer = Arc::new(RagFusionAnalyzer::new(
        Arc::clone(&documents),
        Arc::clone(&registry),
        config.retrieval.docs_per_rephrasing,
    ));
    let context_builder = Arc::new(SchemaAwareContextBuilder::new(
        Arc::clone(&registry),
        source.clone() as Arc<dyn crate::services::data_source::DeviceDataSource>,
        &config.quality,
        &config.orchestrator,
    ));

    let chat: Arc<dyn ChatClient> = Arc::new(ScriptedChat {
        reply: llm_up.then_some("The fleet answer, grounded in the provided data."),
    });
    let llm = Arc::new(LlmService::new(chat, &config.llm));

    let orchestrator = QueryOrchestrator::new(
        analyzer,
        context_builder,
        health_engine,
        source.clone(),
        documents,
        llm,
        registry,
        config.orchestrator.clone(),
    );

    Harness { orchestrator, source }
}

fn listing(outcome: &QueryOutcome) -> (&str, &Vec<DeviceAssessment>, &Vec<(String, usize)>) {
    match &outcome.result {
        StructuredResult::Listing { schema_name, devices, region_counts } => {
            (schema_name, devices, region_counts)
        }
        other => panic!("expected a listing, got {:?}", other),
    }
}

// ============================================================================
// Seed scenarios
// ============================================================================

#[tokio::test]
async fn scenario_1_counting_ftth_olts() {
    let harness = harness(true, true, true).await;
    let outcome = harness
        .orchestrator
        .execute("How many FTTH OLTs are there?", &QueryFlags::default())
        .await
        .unwrap();

    assert_eq!(outcome.analysis_type, AnalysisType::DeviceListing);
    assert!(outcome.guidance.confidence >= Confidence::Medium);

    let (schema, devices, regions) = listing(&outcome);
    assert_eq!(schema, "olt");
    assert_eq!(devices.len(), 7);
    assert_eq!(regions.len(), 3);
    assert!(devices.iter().any(|d| d.health.status == HealthStatus::Critical));
    assert!(devices.iter().any(|d| d.health.status == HealthStatus::Healthy));

    let markdown = render_markdown(&outcome, true);
    assert!(markdown.contains("7 olt device(s)"));
    assert!(markdown.contains("HOBO: 4"));
    assert!(markdown.contains("GENT: 2"));
    assert!(markdown.contains("ROES: 1"));
}

#[tokio::test]
async fn scenario_2_device_details() {
    let harness = harness(true, true, true).await;
    let outcome = harness
        .orchestrator
        .execute("Show me OLT17PROP01 configuration", &QueryFlags::default())
        .await
        .unwrap();

    assert_eq!(outcome.analysis_type, AnalysisType::DeviceDetails);
    let StructuredResult::Details { device } = &outcome.result else {
        panic!("expected details");
    };
    // complete_config, managed, service_count >= 50 -> perfect score
    assert_eq!(device.health.status, HealthStatus::Healthy);
    assert_eq!(device.health.score, 100);

    let markdown = render_markdown(&outcome, true);
    assert!(markdown.contains("OLT17PROP01"));
    assert!(markdown.contains("HOBO"));
    assert!(markdown.contains("score 100"));
}

#[tokio::test]
async fn scenario_3_hobo_listing_reference_scores() {
    let harness = harness(true, true, true).await;
    let outcome = harness
        .orchestrator
        .execute("Show me FTTH OLTs in HOBO region", &QueryFlags::default())
        .await
        .unwrap();

    assert_eq!(outcome.analysis_type, AnalysisType::DeviceListing);
    let (_, devices, _) = listing(&outcome);
    assert_eq!(devices.len(), 4);

    let expectations = [
        ("OLT17PROP01", 100, HealthStatus::Healthy),
        ("OLT18HOBO02", 30, HealthStatus::Critical),
        ("OLT19HOBO03", 10, HealthStatus::Critical),
        ("OLT20HOBO04", 100, HealthStatus::Healthy),
    ];
    for (name, score, status) in expectations {
        let device = devices
            .iter()
            .find(|d| d.record.display_name() == name)
            .unwrap_or_else(|| panic!("{} missing from listing", name));
        assert_eq!(device.health.score, score, "{}", name);
        assert_eq!(device.health.status, status, "{}", name);
    }
}

#[tokio::test]
async fn scenario_4_unknown_entity_does_not_invent_devices() {
    let harness = harness(true, true, true).await;
    let outcome = harness
        .orchestrator
        .execute("What happens if CINMECHA01 fails?", &QueryFlags::default())
        .await
        .unwrap();

    assert!(matches!(
        outcome.analysis_type,
        AnalysisType::ComplexAnalysis | AnalysisType::GeneralSearch
    ));
    let StructuredResult::Narrative { notes } = &outcome.result else {
        panic!("expected a narrative");
    };
    assert!(!notes.is_empty());
    assert!(
        outcome
            .recommendations
            .iter()
            .any(|r| r.contains("missing") || r.contains("No record")),
        "recommendations must mention the missing data: {:?}",
        outcome.recommendations
    );

    let markdown = render_markdown(&outcome, true);
    assert!(!markdown.is_empty());
    // The response must not claim the unknown device exists
    assert!(!markdown.contains("CINMECHA01 is HEALTHY"));
}

#[tokio::test]
async fn scenario_5_llm_outage_keeps_structured_result() {
    let harness = harness(false, true, true).await;
    let outcome = harness
        .orchestrator
        .execute("Show me FTTH OLTs in HOBO region", &QueryFlags::default())
        .await
        .expect("LLM outage must not fail the call");

    let (_, devices, _) = listing(&outcome);
    assert_eq!(devices.len(), 4);
    assert!(outcome.llm_answer.is_none());
    let note = outcome.llm_note.as_deref().expect("visible note");
    assert!(note.contains("LLM was unavailable"));

    let markdown = render_markdown(&outcome, true);
    assert!(markdown.contains("LLM was unavailable"));
    assert!(markdown.contains("OLT18HOBO02"));
}

#[tokio::test]
async fn scenario_6_red_quality_coerces_to_general_search() {
    let harness = harness(true, false, true).await;
    let outcome = harness
        .orchestrator
        .execute("list olts", &QueryFlags::default())
        .await
        .unwrap();

    // The analyzer wanted a listing, but the empty red-band sample wins
    assert_eq!(outcome.guidance.analysis_type, AnalysisType::DeviceListing);
    assert_eq!(outcome.analysis_type, AnalysisType::GeneralSearch);
    assert!(!outcome.caveats.is_empty());
    assert!(
        outcome
            .recommendations
            .iter()
            .any(|r| r.contains("refresh_network_data"))
    );

    let markdown = render_markdown(&outcome, true);
    assert!(markdown.contains("general_search"));
    assert!(markdown.contains("🔴"));
}

// ============================================================================
// Boundary behavior
// ============================================================================

#[tokio::test]
async fn empty_corpus_still_answers_from_live_data() {
    let harness = harness(true, true, false).await;
    let outcome = harness
        .orchestrator
        .execute("How many FTTH OLTs are there?", &QueryFlags::default())
        .await
        .unwrap();

    assert!(outcome.guidance.cited_documents.is_empty());
    let (_, devices, _) = listing(&outcome);
    assert_eq!(devices.len(), 7);
}

#[tokio::test]
async fn empty_query_degrades_gracefully() {
    let harness = harness(true, true, true).await;
    let outcome = harness
        .orchestrator
        .execute("", &QueryFlags::default())
        .await
        .unwrap();

    assert_eq!(outcome.analysis_type, AnalysisType::GeneralSearch);
    assert_eq!(outcome.guidance.confidence, Confidence::Low);
    assert!(outcome.guidance.cited_documents.is_empty());
}

#[tokio::test]
async fn listing_respects_explicit_limit() {
    let harness = harness(true, true, true).await;
    let flags = QueryFlags { include_recommendations: true, limit: Some(2) };
    let outcome = harness
        .orchestrator
        .execute("list all olts", &flags)
        .await
        .unwrap();

    let (_, devices, _) = listing(&outcome);
    assert_eq!(devices.len(), 2);
}

#[tokio::test]
async fn details_for_absent_device_is_a_soft_miss() {
    let harness = harness(true, true, true).await;
    harness.source.clear("olt");

    let outcome = harness
        .orchestrator
        .execute("Show me OLT17PROP01 configuration", &QueryFlags::default())
        .await
        .unwrap();

    let StructuredResult::Narrative { notes } = &outcome.result else {
        panic!("expected a narrative for the missing device");
    };
    assert!(notes.iter().any(|n| n.contains("OLT17PROP01")));
}

#[test]
fn filter_lexicon_extraction() {
    let filters = extract_filters("Show me FTTH OLTs in HOBO region");
    assert_eq!(filters.region.as_deref(), Some("HOBO"));
    assert!(filters.environment.is_none());

    let filters = extract_filters("list UAT devices in gent");
    assert_eq!(filters.region.as_deref(), Some("GENT"));
    assert_eq!(filters.environment.as_deref(), Some("UAT"));

    let filters = extract_filters("list everything");
    assert!(filters.is_empty());
}
