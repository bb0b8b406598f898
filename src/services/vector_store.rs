//! Vector store port and SQLite-backed implementation
//!
//! The store keeps one vector record per document (or health rule), persists
//! them as JSON rows and serves cosine searches from an in-memory index that
//! is rebuilt from SQLite at startup. The corpus is operational
//! documentation, small enough that a full scan per search is the simplest
//! correct index.

use crate::error::CoreError;
use crate::models::DocumentKind;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use sqlx::Row;

/// What a vector record points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorKind {
    Document,
    HealthRule,
}

impl VectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::HealthRule => "health_rule",
        }
    }

    pub fn parse_kind(s: &str) -> Self {
        match s {
            "health_rule" => Self::HealthRule,
            _ => Self::Document,
        }
    }
}

/// Denormalized metadata stored next to each vector for filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMeta {
    pub record_kind: VectorKind,
    pub doc_kind: Option<DocumentKind>,
    pub keywords: Vec<String>,
    pub usefulness: f64,
    pub embedder_id: Option<String>,
}

/// One search hit, ordered by descending similarity.
#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    pub id: String,
    pub meta: VectorMeta,
    pub similarity: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Idempotent per id: a second upsert replaces the previous record.
    async fn upsert(&self, id: &str, vector: Vec<f32>, meta: VectorMeta) -> Result<(), CoreError>;

    /// Cosine search. Returns at most `limit` records with similarity >=
    /// `min_similarity`, sorted descending.
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        min_similarity: f32,
        filter: Option<VectorKind>,
    ) -> Result<Vec<VectorSearchResult>, CoreError>;

    async fn remove(&self, id: &str) -> Result<(), CoreError>;
}

/// Cosine similarity; exactly 0 when either operand has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

struct IndexedVector {
    vector: Vec<f32>,
    meta: VectorMeta,
}

pub struct SqliteVectorStore {
    pool: SqlitePool,
    index: DashMap<String, IndexedVector>,
    dimension: usize,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool, dimension: usize) -> Self {
        Self { pool, index: DashMap::new(), dimension }
    }

    /// Rebuild the in-memory index from SQLite. Called once at startup.
    pub async fn load(&self) -> Result<usize, CoreError> {
        let rows = sqlx::query(
            "SELECT doc_id, record_kind, vector_json, kind, keywords_json, usefulness, embedder_id \
             FROM vector_records",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut loaded = 0usize;
        for row in rows {
            let doc_id: String = row.get("doc_id");
            let vector: Vec<f32> = serde_json::from_str(row.get::<String, _>("vector_json").as_str())?;
            if vector.len() != self.dimension {
                tracing::warn!(
                    "Skipping vector record {} with stale dimension {} (expected {})",
                    doc_id,
                    vector.len(),
                    self.dimension
                );
                continue;
            }
            let meta = VectorMeta {
                record_kind: VectorKind::parse_kind(row.get::<String, _>("record_kind").as_str()),
                doc_kind: {
                    let kind: String = row.get("kind");
                    if kind.is_empty() { None } else { Some(DocumentKind::parse_kind(&kind)) }
                },
                keywords: serde_json::from_str(row.get::<String, _>("keywords_json").as_str())?,
                usefulness: row.get("usefulness"),
                embedder_id: row.get("embedder_id"),
            };
            self.index.insert(doc_id, IndexedVector { vector, meta });
            loaded += 1;
        }

        Ok(loaded)
    }

    fn validate(&self, vector: &[f32]) -> Result<(), CoreError> {
        if vector.len() != self.dimension {
            return Err(CoreError::InvalidInput(format!(
                "vector has {} components, store expects {}",
                vector.len(),
                self.dimension
            )));
        }
        if vector.iter().any(|c| !c.is_finite()) {
            return Err(CoreError::InvalidInput("vector has non-finite components".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, id: &str, vector: Vec<f32>, meta: VectorMeta) -> Result<(), CoreError> {
        self.validate(&vector)?;

        sqlx::query(
            r#"
            INSERT INTO vector_records
                (doc_id, record_kind, vector_json, kind, keywords_json, usefulness, embedder_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(doc_id) DO UPDATE SET
                record_kind = excluded.record_kind,
                vector_json = excluded.vector_json,
                kind = excluded.kind,
                keywords_json = excluded.keywords_json,
                usefulness = excluded.usefulness,
                embedder_id = excluded.embedder_id
            "#,
        )
        .bind(id)
        .bind(meta.record_kind.as_str())
        .bind(serde_json::to_string(&vector)?)
        .bind(meta.doc_kind.map(|k| k.as_str()).unwrap_or(""))
        .bind(serde_json::to_string(&meta.keywords)?)
        .bind(meta.usefulness)
        .bind(&meta.embedder_id)
        .execute(&self.pool)
        .await?;

        self.index.insert(id.to_string(), IndexedVector { vector, meta });
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        min_similarity: f32,
        filter: Option<VectorKind>,
    ) -> Result<Vec<VectorSearchResult>, CoreError> {
        self.validate(vector)?;

        let mut results: Vec<VectorSearchResult> = self
            .index
            .iter()
            .filter(|entry| filter.is_none_or(|kind| entry.value().meta.record_kind == kind))
            .filter_map(|entry| {
                let similarity = cosine_similarity(vector, &entry.value().vector);
                if similarity >= min_similarity {
                    Some(VectorSearchResult {
                        id: entry.key().clone(),
                        meta: entry.value().meta.clone(),
                        similarity,
                    })
                } else {
                    None
                }
            })
            .collect();

        // Descending similarity; ties broken by id so results are stable
        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(limit);

        Ok(results)
    }

    async fn remove(&self, id: &str) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM vector_records WHERE doc_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.index.remove(id);
        Ok(())
    }
}
