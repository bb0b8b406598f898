//! Document store
//!
//! Authoritative storage for the operational documentation corpus. Creation
//! validates shape, extracts keywords, embeds the body and writes document
//! plus vector record together; search ranks hits by business value.

use crate::config::{QualityConfig, RetrievalConfig};
use crate::error::CoreError;
use crate::models::{
    CreateDocumentRequest, Document, DocumentHit, DocumentKind, MAX_KEYWORDS, MIN_BODY_LEN,
    MIN_TITLE_LEN,
};
use crate::services::embedding::EmbeddingService;
use crate::services::vector_store::{VectorKind, VectorMeta, VectorStore};
use chrono::{DateTime, Duration, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Hits below this usefulness never surface in search results.
const MIN_SEARCH_USEFULNESS: f64 = 0.3;

// ============================================================================
// Repository
// ============================================================================

pub struct DocumentRepository {
    pool: SqlitePool,
}

impl DocumentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Document>, CoreError> {
        let row = sqlx::query(
            "SELECT id, title, body, kind, keywords_json, usefulness, views, created_at, updated_at \
             FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_document).transpose()
    }

    pub async fn list_all(&self) -> Result<Vec<Document>, CoreError> {
        let rows = sqlx::query(
            "SELECT id, title, body, kind, keywords_json, usefulness, views, created_at, updated_at \
             FROM documents ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_document).collect()
    }

    pub async fn insert(&self, doc: &Document) -> Result<(), CoreError> {
        sqlx::query(
            r#"INSERT INTO documents
               (id, title, body, kind, keywords_json, usefulness, views, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   title = excluded.title,
                   body = excluded.body,
                   kind = excluded.kind,
                   keywords_json = excluded.keywords_json,
                   usefulness = excluded.usefulness,
                   updated_at = excluded.updated_at"#,
        )
        .bind(&doc.id)
        .bind(&doc.title)
        .bind(&doc.body)
        .bind(doc.kind.as_str())
        .bind(serde_json::to_string(&doc.keywords)?)
        .bind(doc.usefulness)
        .bind(doc.views)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Increment the view counter and bump `updated_at`.
    pub async fn touch(&self, id: &str) -> Result<Document, CoreError> {
        let result = sqlx::query("UPDATE documents SET views = views + 1, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("document {}", id)));
        }

        self.get(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("document {}", id)))
    }
}

fn row_to_document(row: sqlx::sqlite::SqliteRow) -> Result<Document, CoreError> {
    Ok(Document {
        id: row.get("id"),
        title: row.get("title"),
        body: row.get("body"),
        kind: DocumentKind::parse_kind(row.get::<String, _>("kind").as_str()),
        keywords: serde_json::from_str(row.get::<String, _>("keywords_json").as_str())?,
        usefulness: row.get("usefulness"),
        views: row.get("views"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// Service
// ============================================================================

pub struct DocumentService {
    repository: DocumentRepository,
    embedding: Arc<EmbeddingService>,
    vector_store: Arc<dyn VectorStore>,
    min_similarity: f32,
    recency_window: Duration,
    search_timeout: std::time::Duration,
    document_timeout: std::time::Duration,
}

impl DocumentService {
    pub fn new(
        pool: SqlitePool,
        embedding: Arc<EmbeddingService>,
        vector_store: Arc<dyn VectorStore>,
        retrieval: &RetrievalConfig,
        quality: &QualityConfig,
    ) -> Self {
        Self {
            repository: DocumentRepository::new(pool),
            embedding,
            vector_store,
            min_similarity: retrieval.min_similarity,
            recency_window: Duration::days(quality.recency_window_days),
            search_timeout: std::time::Duration::from_secs(retrieval.search_timeout_seconds),
            document_timeout: std::time::Duration::from_secs(retrieval.document_timeout_seconds),
        }
    }

    /// Create (or re-ingest) a document: validate, extract keywords, embed the
    /// body, write document and vector record together.
    pub async fn create(&self, req: CreateDocumentRequest) -> Result<Document, CoreError> {
        if req.title.trim().len() < MIN_TITLE_LEN {
            return Err(CoreError::Validation(format!(
                "title must be at least {} characters",
                MIN_TITLE_LEN
            )));
        }
        if req.body.trim().len() < MIN_BODY_LEN {
            return Err(CoreError::Validation(format!(
                "body must be at least {} characters",
                MIN_BODY_LEN
            )));
        }
        if !(0.0..=1.0).contains(&req.usefulness) {
            return Err(CoreError::Validation("usefulness must be in [0, 1]".to_string()));
        }

        let keywords = match req.keywords {
            Some(explicit) if !explicit.is_empty() => {
                explicit.into_iter().take(MAX_KEYWORDS).collect()
            }
            _ => extract_keywords(&req.body, MAX_KEYWORDS),
        };

        let now = Utc::now();
        let doc = Document {
            id: Uuid::new_v4().to_string(),
            title: req.title.trim().to_string(),
            body: req.body,
            kind: req.kind,
            keywords,
            usefulness: req.usefulness,
            views: 0,
            created_at: now,
            updated_at: now,
        };

        let embedding = self.embedding.embed(&doc.body).await;

        // Document and vector record live or die together: roll the document
        // back if the vector write fails
        self.repository.insert(&doc).await?;
        let upserted = self
            .vector_store
            .upsert(
                &doc.id,
                embedding.vector,
                VectorMeta {
                    record_kind: VectorKind::Document,
                    doc_kind: Some(doc.kind),
                    keywords: doc.keywords.clone(),
                    usefulness: doc.usefulness,
                    embedder_id: Some(embedding.embedder_id),
                },
            )
            .await;
        if let Err(err) = upserted {
            self.repository.delete(&doc.id).await?;
            return Err(err);
        }

        tracing::debug!("Ingested document {} ({})", doc.id, doc.title);
        Ok(doc)
    }

    pub async fn get(&self, id: &str) -> Result<Document, CoreError> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("document {}", id)))
    }

    pub async fn touch(&self, id: &str) -> Result<Document, CoreError> {
        self.repository.touch(id).await
    }

    /// Search the corpus. With `use_vector` the query is embedded and matched
    /// by cosine similarity; otherwise a substring/keyword scan is used. Hits
    /// are ranked by business value and low-usefulness documents are dropped.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        use_vector: bool,
    ) -> Result<Vec<DocumentHit>, CoreError> {
        if limit == 0 {
            return Ok(vec![]);
        }
        let now = Utc::now();

        let mut hits = if use_vector {
            let embedding = self.embedding.embed(query).await;
            let results = tokio::time::timeout(
                self.search_timeout,
                self.vector_store.search(
                    &embedding.vector,
                    limit * 4,
                    self.min_similarity,
                    Some(VectorKind::Document),
                ),
            )
            .await
            .map_err(|_| CoreError::Timeout(self.search_timeout.as_secs()))??;

            let mut hits = Vec::with_capacity(results.len());
            for result in results {
                if let Some(doc) = self.repository.get(&result.id).await? {
                    let business_value = self.business_value(&doc, result.similarity, now);
                    hits.push(DocumentHit { document: doc, similarity: result.similarity, business_value });
                }
            }
            hits
        } else {
            let needle = query.to_lowercase();
            tokio::time::timeout(self.document_timeout, self.repository.list_all())
                .await
                .map_err(|_| CoreError::Timeout(self.document_timeout.as_secs()))??
                .into_iter()
                .filter(|doc| {
                    doc.title.to_lowercase().contains(&needle)
                        || doc.body.to_lowercase().contains(&needle)
                        || doc.keywords.iter().any(|k| needle.contains(&k.to_lowercase()))
                })
                .map(|doc| {
                    let business_value = self.business_value(&doc, 0.0, now);
                    DocumentHit { document: doc, similarity: 0.0, business_value }
                })
                .collect()
        };

        hits.retain(|hit| hit.document.usefulness >= MIN_SEARCH_USEFULNESS);
        hits.sort_by(|a, b| {
            b.business_value
                .partial_cmp(&a.business_value)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });
        hits.truncate(limit);

        Ok(hits)
    }

    fn business_value(&self, doc: &Document, similarity: f32, now: DateTime<Utc>) -> f64 {
        let recency = if now - doc.updated_at <= self.recency_window { 1.0 } else { 0.5 };
        0.5 * f64::from(similarity) + 0.3 * doc.usefulness + 0.2 * recency
    }
}

// ============================================================================
// Keyword extraction
// ============================================================================

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "how", "in",
    "is", "it", "its", "of", "on", "or", "that", "the", "this", "to", "was", "what", "when",
    "where", "which", "will", "with", "you", "your",
];

/// Deterministic frequency heuristic: most frequent non-stopword tokens,
/// ties broken by first appearance.
pub fn extract_keywords(text: &str, max: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut order = 0usize;

    for raw in text.split(|c: char| !c.is_alphanumeric() && c != '_') {
        let token = raw.to_lowercase();
        if token.len() < 3 || STOPWORDS.contains(&token.as_str()) {
            continue;
        }
        let entry = counts.entry(token).or_insert_with(|| {
            order += 1;
            (0, order)
        });
        entry.0 += 1;
    }

    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.0.cmp(&a.1.0).then_with(|| a.1.1.cmp(&b.1.1)));
    ranked.into_iter().take(max).map(|(token, _)| token).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingConfig, QualityConfig, RetrievalConfig};
    use crate::db;
    use crate::services::embedding::FallbackEmbedder;
    use crate::services::vector_store::SqliteVectorStore;

    async fn service() -> DocumentService {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        db::init_schema(&pool).await.unwrap();

        let embedding_config = EmbeddingConfig::default();
        let embedding = Arc::new(EmbeddingService::fallback_only(FallbackEmbedder::new(
            &embedding_config,
        )));
        let vector_store: Arc<dyn VectorStore> =
            Arc::new(SqliteVectorStore::new(pool.clone(), embedding_config.dimension));

        DocumentService::new(
            pool,
            embedding,
            vector_store,
            &RetrievalConfig::default(),
            &QualityConfig::default(),
        )
    }

    fn request(title: &str, body: &str) -> CreateDocumentRequest {
        CreateDocumentRequest {
            title: title.to_string(),
            body: body.to_string(),
            kind: DocumentKind::Guide,
            usefulness: 0.8,
            keywords: None,
        }
    }

    const VALID_BODY: &str =
        "The list_network_devices tool enumerates OLT devices per region with health scoring.";

    #[tokio::test]
    async fn create_then_get_roundtrip() {
        let service = service().await;
        let created = service
            .create(request("Listing OLT devices", VALID_BODY))
            .await
            .expect("create");

        let fetched = service.get(&created.id).await.expect("get");
        assert_eq!(fetched.title, created.title);
        assert_eq!(fetched.body, created.body);
        assert_eq!(fetched.kind, created.kind);
        assert_eq!(fetched.keywords, created.keywords);
        assert!(fetched.updated_at >= fetched.created_at);
    }

    #[tokio::test]
    async fn short_body_is_rejected_at_the_boundary() {
        let service = service().await;
        let body_49 = "x".repeat(49);
        let err = service
            .create(request("Valid title", &body_49))
            .await
            .expect_err("49 chars must fail");
        assert_eq!(err.kind(), "INVALID_ARGUMENT");

        let body_50 = "x".repeat(50);
        service
            .create(request("Valid title", &body_50))
            .await
            .expect("50 chars must pass");
    }

    #[tokio::test]
    async fn short_title_is_rejected() {
        let service = service().await;
        let err = service
            .create(request("abcd", VALID_BODY))
            .await
            .expect_err("4-char title");
        assert_eq!(err.kind(), "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn touch_bumps_views_and_updated() {
        let service = service().await;
        let created = service
            .create(request("Listing OLT devices", VALID_BODY))
            .await
            .unwrap();

        let touched = service.touch(&created.id).await.expect("touch");
        assert_eq!(touched.views, created.views + 1);
        assert!(touched.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn touch_missing_is_not_found() {
        let service = service().await;
        let err = service.touch("no-such-id").await.expect_err("missing doc");
        assert_eq!(err.kind(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn low_usefulness_documents_are_dropped_from_search() {
        let service = service().await;
        let mut low = request("Rarely useful page", VALID_BODY);
        low.usefulness = 0.1;
        service.create(low).await.unwrap();

        let hits = service.search("list_network_devices", 10, false).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn search_ranks_by_business_value() {
        let service = service().await;
        let mut useful = request("Primary OLT listing guide", VALID_BODY);
        useful.usefulness = 0.9;
        service.create(useful).await.unwrap();

        let mut weaker = request("Secondary OLT listing note", VALID_BODY);
        weaker.usefulness = 0.4;
        service.create(weaker).await.unwrap();

        let hits = service.search("OLT listing", 10, false).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].business_value >= hits[1].business_value);
        assert_eq!(hits[0].document.usefulness, 0.9);
    }

    #[test]
    fn keyword_extraction_is_deterministic_and_bounded() {
        let text = "OLT health scoring uses OLT service counts. Scoring reads OLT config.";
        let first = extract_keywords(text, 8);
        let second = extract_keywords(text, 8);
        assert_eq!(first, second);
        assert!(first.len() <= 8);
        assert_eq!(first[0], "olt");
        assert!(!first.iter().any(|k| k == "the"));
    }
}
