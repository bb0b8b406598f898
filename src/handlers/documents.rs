//! Document management handlers
//!
//! REST endpoints for maintaining the operational documentation corpus.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::AppState;
use crate::error::CoreError;
use crate::models::CreateDocumentRequest;

/// Ingest a document
/// POST /api/documents
#[utoipa::path(
    post,
    path = "/api/documents",
    request_body = CreateDocumentRequest,
    responses(
        (status = 201, description = "Document created", body = crate::models::Document),
        (status = 400, description = "Validation failure")
    ),
    tag = "Documents"
)]
pub async fn create_document(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateDocumentRequest>,
) -> Result<impl IntoResponse, CoreError> {
    let doc = state.documents.create(req).await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

/// Get a document by id
/// GET /api/documents/:id
#[utoipa::path(
    get,
    path = "/api/documents/{id}",
    params(("id" = String, Path, description = "Document id")),
    responses(
        (status = 200, description = "The document", body = crate::models::Document),
        (status = 404, description = "No such document")
    ),
    tag = "Documents"
)]
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, CoreError> {
    let doc = state.documents.get(&id).await?;
    Ok(Json(doc))
}

/// Record a read of a document (bumps the view counter)
/// POST /api/documents/:id/touch
#[utoipa::path(
    post,
    path = "/api/documents/{id}/touch",
    params(("id" = String, Path, description = "Document id")),
    responses(
        (status = 200, description = "The updated document", body = crate::models::Document),
        (status = 404, description = "No such document")
    ),
    tag = "Documents"
)]
pub async fn touch_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, CoreError> {
    let doc = state.documents.touch(&id).await?;
    Ok(Json(doc))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchDocumentsRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_use_vector")]
    pub use_vector: bool,
}

fn default_limit() -> usize {
    10
}

fn default_use_vector() -> bool {
    true
}

/// Search the corpus, ranked by business value
/// POST /api/documents/search
#[utoipa::path(
    post,
    path = "/api/documents/search",
    request_body = SearchDocumentsRequest,
    responses((status = 200, description = "Ranked hits", body = [crate::models::DocumentHit])),
    tag = "Documents"
)]
pub async fn search_documents(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchDocumentsRequest>,
) -> Result<impl IntoResponse, CoreError> {
    if req.query.trim().is_empty() {
        return Err(CoreError::InvalidInput("query must not be empty".to_string()));
    }
    if req.limit == 0 || req.limit > 100 {
        return Err(CoreError::InvalidInput("limit must be in 1..=100".to_string()));
    }
    let hits = state
        .documents
        .search(&req.query, req.limit, req.use_vector)
        .await?;
    Ok(Json(hits))
}
