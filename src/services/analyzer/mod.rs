//! RAG fusion analyzer
//!
//! Turns a raw query into structured guidance: which analysis to run, which
//! tool to lean on, with what confidence. Fuses four query rephrasings worth
//! of document retrieval with deterministic pattern scoring over the query
//! itself; retrieval failures degrade to `general_search` instead of
//! erroring.

pub mod patterns;

pub use patterns::{QueryScores, Tally, ToolBucket};

use crate::models::DocumentHit;
use crate::services::document_store::DocumentService;
use crate::services::schema_registry::SchemaRegistry;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    DeviceListing,
    DeviceDetails,
    ComplexAnalysis,
    GeneralSearch,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeviceListing => "device_listing",
            Self::DeviceDetails => "device_details",
            Self::ComplexAnalysis => "complex_analysis",
            Self::GeneralSearch => "general_search",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

/// The analyzer's structured output.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Guidance {
    pub analysis_type: AnalysisType,
    pub confidence: Confidence,
    pub tool_recommendation: Option<String>,
    pub reasoning: String,
    pub extracted_terms: Vec<String>,
    /// Top-k cited document ids, best business value first
    pub cited_documents: Vec<String>,
}

pub struct RagFusionAnalyzer {
    documents: Arc<DocumentService>,
    registry: Arc<SchemaRegistry>,
    docs_per_rephrasing: usize,
}

impl RagFusionAnalyzer {
    pub fn new(
        documents: Arc<DocumentService>,
        registry: Arc<SchemaRegistry>,
        docs_per_rephrasing: usize,
    ) -> Self {
        Self { documents, registry, docs_per_rephrasing }
    }

    /// The four retrieval rephrasings. Pure, language-neutral templates.
    fn rephrasings(query: &str) -> [String; 4] {
        [
            format!("which tool should answer: {}", query),
            format!("step by step procedure for: {}", query),
            format!("network protocol details relevant to: {}", query),
            format!("fiber access network operations: {}", query),
        ]
    }

    /// Analyze one query. Total: never returns an error.
    pub async fn analyze(&self, query: &str) -> Guidance {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Guidance {
                analysis_type: AnalysisType::GeneralSearch,
                confidence: Confidence::Low,
                tool_recommendation: None,
                reasoning: "Empty query; nothing to analyze".to_string(),
                extracted_terms: vec![],
                cited_documents: vec![],
            };
        }

        // Multi-strategy retrieval, deduplicated by id keeping the best hit
        let mut retrieved: HashMap<String, DocumentHit> = HashMap::new();
        let mut failed_searches = 0usize;
        for rephrasing in Self::rephrasings(trimmed) {
            match self.retrieve(&rephrasing).await {
                Ok(hits) => {
                    for hit in hits {
                        let id = hit.document.id.clone();
                        match retrieved.get(&id) {
                            Some(existing) if existing.business_value >= hit.business_value => {}
                            _ => {
                                retrieved.insert(id, hit);
                            }
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!("Analyzer retrieval leg failed: {}", err);
                    failed_searches += 1;
                }
            }
        }

        if failed_searches == 4 {
            return Guidance {
                analysis_type: AnalysisType::GeneralSearch,
                confidence: Confidence::Low,
                tool_recommendation: None,
                reasoning: "Degraded mode: document retrieval is unavailable, \
                            falling back to a general search over live data"
                    .to_string(),
                extracted_terms: vec![],
                cited_documents: vec![],
            };
        }

        // Deterministic pattern scoring over the query itself
        let mut scores = patterns::score_query(trimmed, &self.registry);

        // Tool-name mentions in retrieved documents, at half weight
        for hit in retrieved.values() {
            patterns::score_document_mentions(&mut scores.tool, &hit.document.title);
            patterns::score_document_mentions(&mut scores.tool, &hit.document.body);
        }

        let mut cited: Vec<&DocumentHit> = retrieved.values().collect();
        cited.sort_by(|a, b| {
            b.business_value
                .partial_cmp(&a.business_value)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });
        let cited_documents: Vec<String> =
            cited.iter().map(|hit| hit.document.id.clone()).collect();

        // No query cues at all means there is nothing to dispatch on, no
        // matter what the retrieved documents mention
        if scores.analysis.total() == 0.0 {
            return Guidance {
                analysis_type: AnalysisType::GeneralSearch,
                confidence: Confidence::Low,
                tool_recommendation: None,
                reasoning: format!(
                    "No tool or analysis cues matched; {} document(s) retrieved",
                    cited_documents.len()
                ),
                extracted_terms: scores.terms,
                cited_documents,
            };
        }

        let (tool_bucket, tool_margin) = scores.tool.argmax();
        let (analysis_bucket, _) = scores.analysis.argmax();

        let analysis_type = match analysis_bucket {
            ToolBucket::List => AnalysisType::DeviceListing,
            ToolBucket::Detail => AnalysisType::DeviceDetails,
            ToolBucket::Complex => AnalysisType::ComplexAnalysis,
        };

        let confidence = if tool_margin >= 3.0 && !cited_documents.is_empty() {
            Confidence::High
        } else if tool_margin >= 1.0 || scores.strong_cue {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        let reasoning = format!(
            "Cues [{}] favour {} (margin {:.1}); {} document(s) cited{}",
            scores.terms.join(", "),
            tool_bucket.tool_name(),
            tool_margin,
            cited_documents.len(),
            if failed_searches > 0 {
                format!("; {} retrieval leg(s) degraded", failed_searches)
            } else {
                String::new()
            }
        );

        Guidance {
            analysis_type,
            confidence,
            tool_recommendation: Some(tool_bucket.tool_name().to_string()),
            reasoning,
            extracted_terms: scores.terms,
            cited_documents,
        }
    }

    /// One retrieval leg: vector search first, keyword scan when the vector
    /// space has nothing above the similarity floor.
    async fn retrieve(&self, rephrasing: &str) -> Result<Vec<DocumentHit>, crate::error::CoreError> {
        let hits = self
            .documents
            .search(rephrasing, self.docs_per_rephrasing, true)
            .await?;
        if !hits.is_empty() {
            return Ok(hits);
        }
        self.documents
            .search(rephrasing, self.docs_per_rephrasing, false)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingConfig, QualityConfig, RetrievalConfig};
    use crate::db;
    use crate::models::{CreateDocumentRequest, DocumentKind};
    use crate::services::embedding::{EmbeddingService, FallbackEmbedder};
    use crate::services::vector_store::{SqliteVectorStore, VectorStore};
    use sqlx::SqlitePool;

    async fn analyzer_with_corpus(documents: &[(&str, &str)]) -> RagFusionAnalyzer {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        db::init_schema(&pool).await.unwrap();

        let embedding_config = EmbeddingConfig::default();
        let embedding = Arc::new(EmbeddingService::fallback_only(FallbackEmbedder::new(
            &embedding_config,
        )));
        let vector_store: Arc<dyn VectorStore> =
            Arc::new(SqliteVectorStore::new(pool.clone(), embedding_config.dimension));
        let service = Arc::new(DocumentService::new(
            pool,
            embedding,
            vector_store,
            &RetrievalConfig::default(),
            &QualityConfig::default(),
        ));

        for (title, body) in documents {
            service
                .create(CreateDocumentRequest {
                    title: title.to_string(),
                    body: body.to_string(),
                    kind: DocumentKind::ToolHelp,
                    usefulness: 0.9,
                    keywords: None,
                })
                .await
                .unwrap();
        }

        RagFusionAnalyzer::new(service, Arc::new(SchemaRegistry::new()), 3)
    }

    const LIST_TOOL_DOC: (&str, &str) = (
        "list_network_devices tool",
        "The list_network_devices tool enumerates OLT devices per region and \
         environment with health scoring applied to every device in the fleet.",
    );

    #[tokio::test]
    async fn counting_query_yields_listing_guidance() {
        let analyzer = analyzer_with_corpus(&[LIST_TOOL_DOC]).await;
        let guidance = analyzer.analyze("How many FTTH OLTs are there?").await;

        assert_eq!(guidance.analysis_type, AnalysisType::DeviceListing);
        assert!(guidance.confidence >= Confidence::Medium);
        assert_eq!(
            guidance.tool_recommendation.as_deref(),
            Some("list_network_devices")
        );
    }

    #[tokio::test]
    async fn device_identifier_yields_detail_guidance() {
        let analyzer = analyzer_with_corpus(&[LIST_TOOL_DOC]).await;
        let guidance = analyzer.analyze("Show me OLT17PROP01 configuration").await;

        assert_eq!(guidance.analysis_type, AnalysisType::DeviceDetails);
        assert_eq!(
            guidance.tool_recommendation.as_deref(),
            Some("get_device_details")
        );
        assert!(guidance.extracted_terms.iter().any(|t| t == "OLT17PROP01"));
    }

    #[tokio::test]
    async fn impact_query_yields_complex_guidance() {
        let analyzer = analyzer_with_corpus(&[]).await;
        let guidance = analyzer.analyze("What happens if CINMECHA01 fails?").await;
        assert_eq!(guidance.analysis_type, AnalysisType::ComplexAnalysis);
    }

    #[tokio::test]
    async fn empty_query_falls_back_to_general_search() {
        let analyzer = analyzer_with_corpus(&[LIST_TOOL_DOC]).await;
        let guidance = analyzer.analyze("   ").await;

        assert_eq!(guidance.analysis_type, AnalysisType::GeneralSearch);
        assert_eq!(guidance.confidence, Confidence::Low);
        assert!(guidance.cited_documents.is_empty());
    }

    #[tokio::test]
    async fn empty_corpus_still_produces_guidance() {
        let analyzer = analyzer_with_corpus(&[]).await;
        let guidance = analyzer.analyze("how many olts do we have").await;

        // No citations, but cues still steer the analysis type
        assert_eq!(guidance.analysis_type, AnalysisType::DeviceListing);
        assert!(guidance.cited_documents.is_empty());
        assert!(guidance.confidence <= Confidence::Medium);
    }

    #[tokio::test]
    async fn cueless_query_is_general_search() {
        let analyzer = analyzer_with_corpus(&[LIST_TOOL_DOC]).await;
        let guidance = analyzer.analyze("hello there").await;
        assert_eq!(guidance.analysis_type, AnalysisType::GeneralSearch);
        assert_eq!(guidance.confidence, Confidence::Low);
    }
}
