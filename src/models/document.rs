//! Operational documentation corpus models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Minimum title length accepted at ingest
pub const MIN_TITLE_LEN: usize = 5;
/// Minimum body length accepted at ingest
pub const MIN_BODY_LEN: usize = 50;
/// Maximum keywords stored per document
pub const MAX_KEYWORDS: usize = 8;

/// Document category, used for retrieval filtering and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Guide,
    Troubleshooting,
    Reference,
    ToolHelp,
    Other,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guide => "guide",
            Self::Troubleshooting => "troubleshooting",
            Self::Reference => "reference",
            Self::ToolHelp => "tool_help",
            Self::Other => "other",
        }
    }

    pub fn parse_kind(s: &str) -> Self {
        match s {
            "guide" => Self::Guide,
            "troubleshooting" => Self::Troubleshooting,
            "reference" => Self::Reference,
            "tool_help" => Self::ToolHelp,
            _ => Self::Other,
        }
    }
}

/// A stored operational document. Title and body are never empty after
/// creation and `updated_at >= created_at`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub body: String,
    pub kind: DocumentKind,
    pub keywords: Vec<String>,
    /// Editorial usefulness in [0, 1]
    pub usefulness: f64,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One retrieval hit, ranked by business value.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DocumentHit {
    pub document: Document,
    /// Cosine similarity against the query vector (0 for keyword hits)
    pub similarity: f32,
    /// 0.5 * similarity + 0.3 * usefulness + 0.2 * recency
    pub business_value: f64,
}

/// Request payload for document ingestion.
#[derive(Debug, Clone, Deserialize, ToSchema, validator::Validate)]
pub struct CreateDocumentRequest {
    #[validate(length(min = 5))]
    pub title: String,
    #[validate(length(min = 50))]
    pub body: String,
    pub kind: DocumentKind,
    #[serde(default = "default_usefulness")]
    pub usefulness: f64,
    /// Optional explicit keywords; extracted from the body when omitted
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
}

fn default_usefulness() -> f64 {
    0.5
}
