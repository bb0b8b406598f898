//! Tool surface handlers
//!
//! The three externally-callable operations. Each returns a single string
//! payload inside a small envelope; the envelope's `error_kind` field is the
//! out-of-band error channel. All three are total over malformed input: a
//! bad request produces a structured error string, never a panic or a bare
//! 500.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

use crate::AppState;
use crate::error::CoreError;
use crate::models::DeviceFilters;
use crate::services::orchestrator::response::render_markdown;
use crate::services::orchestrator::{DeviceAssessment, QueryFlags};

/// Envelope shared by every tool operation.
#[derive(Debug, Serialize, ToSchema)]
pub struct ToolResponse {
    pub success: bool,
    /// Markdown (or structured error text when `success` is false)
    pub content: String,
    /// Out-of-band error kind: INVALID_ARGUMENT, NOT_FOUND, ...
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

impl ToolResponse {
    fn ok(content: String) -> Self {
        Self { success: true, content, error_kind: None }
    }

    fn err(err: &CoreError) -> Self {
        Self { success: false, content: err.render(), error_kind: Some(err.kind()) }
    }
}

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub llm_enabled: bool,
    pub schemas: Vec<String>,
    pub document_count: i64,
}

/// Service status
/// GET /api/status
#[utoipa::path(
    get,
    path = "/api/status",
    responses((status = 200, description = "Service status", body = StatusResponse)),
    tag = "Tools"
)]
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, CoreError> {
    let (document_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM documents")
        .fetch_one(&state.db)
        .await?;

    Ok(Json(StatusResponse {
        llm_enabled: state.llm.is_available(),
        schemas: state.registry.all().iter().map(|s| s.name.to_string()).collect(),
        document_count,
    }))
}

// ============================================================================
// network_query
// ============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct NetworkQueryRequest {
    #[validate(length(min = 1, max = 2000))]
    pub query: String,
    #[serde(default = "default_true")]
    pub include_recommendations: bool,
}

fn default_true() -> bool {
    true
}

/// Answer a natural-language question about the fleet
/// POST /api/tools/network_query
#[utoipa::path(
    post,
    path = "/api/tools/network_query",
    request_body = NetworkQueryRequest,
    responses((status = 200, description = "Tool result envelope", body = ToolResponse)),
    tag = "Tools"
)]
pub async fn network_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NetworkQueryRequest>,
) -> Json<ToolResponse> {
    if let Err(err) = req.validate() {
        return Json(ToolResponse::err(&CoreError::InvalidInput(err.to_string())));
    }

    let flags = QueryFlags { include_recommendations: req.include_recommendations, limit: None };
    match state.orchestrator.execute(&req.query, &flags).await {
        Ok(outcome) => Json(ToolResponse::ok(render_markdown(
            &outcome,
            req.include_recommendations,
        ))),
        Err(err) => Json(ToolResponse::err(&err)),
    }
}

// ============================================================================
// list_network_devices
// ============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ListDevicesRequest {
    #[serde(default = "default_device_type")]
    pub device_type: String,
    pub region: Option<String>,
    pub environment: Option<String>,
    /// Free-text name prefix filter
    pub filter: Option<String>,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 500))]
    pub limit: usize,
}

fn default_device_type() -> String {
    "all".to_string()
}

fn default_limit() -> usize {
    50
}

/// Direct device listing with health scoring, bypassing the analyzer
/// POST /api/tools/list_network_devices
#[utoipa::path(
    post,
    path = "/api/tools/list_network_devices",
    request_body = ListDevicesRequest,
    responses((status = 200, description = "Tool result envelope", body = ToolResponse)),
    tag = "Tools"
)]
pub async fn list_network_devices(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ListDevicesRequest>,
) -> Json<ToolResponse> {
    match list_devices_inner(&state, &req).await {
        Ok(content) => Json(ToolResponse::ok(content)),
        Err(err) => Json(ToolResponse::err(&err)),
    }
}

async fn list_devices_inner(
    state: &AppState,
    req: &ListDevicesRequest,
) -> Result<String, CoreError> {
    req.validate()
        .map_err(|err| CoreError::InvalidInput(err.to_string()))?;

    let schema_names: Vec<String> = if req.device_type == "all" {
        state.registry.all().iter().map(|s| s.name.to_string()).collect()
    } else {
        let schema = state
            .registry
            .get(&req.device_type)
            .ok_or_else(|| CoreError::InvalidInput(format!("unknown device_type {}", req.device_type)))?;
        vec![schema.name.to_string()]
    };

    if let Some(region) = &req.region {
        if !crate::services::schema_registry::OLT_REGIONS.contains(&region.as_str()) {
            return Err(CoreError::InvalidInput(format!("unknown region {}", region)));
        }
    }
    if let Some(environment) = &req.environment {
        if !crate::services::schema_registry::OLT_ENVIRONMENTS.contains(&environment.as_str()) {
            return Err(CoreError::InvalidInput(format!("unknown environment {}", environment)));
        }
    }

    let filters = DeviceFilters {
        region: req.region.clone(),
        environment: req.environment.clone(),
        name_prefix: req.filter.clone(),
        name_equals: None,
    };

    let mut out = String::from("# Network Devices\n\n");
    let mut caveats = Vec::new();
    for schema_name in schema_names {
        let batch = state
            .orchestrator
            .fetch_bounded(&schema_name, &filters, req.limit)
            .await?;
        let assessments = state.orchestrator.assess_all(batch.records, &mut caveats).await;
        render_device_section(&mut out, &schema_name, &assessments);
    }

    for caveat in caveats {
        out.push_str(&format!("\n> ⚠️ {}\n", caveat));
    }

    Ok(out)
}

fn render_device_section(out: &mut String, schema_name: &str, assessments: &[DeviceAssessment]) {
    out.push_str(&format!("## {} ({})\n\n", schema_name, assessments.len()));
    if assessments.is_empty() {
        out.push_str("No devices matched.\n\n");
        return;
    }
    out.push_str("| Device | Status | Score |\n|---|---|---|\n");
    for assessment in assessments {
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            assessment.record.display_name(),
            assessment.health.status.as_str(),
            assessment.health.score
        ));
    }
    out.push('\n');
}

// ============================================================================
// get_device_details
// ============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DeviceDetailsRequest {
    #[validate(length(min = 1, max = 128))]
    pub device_name: String,
    #[serde(default = "default_olt")]
    pub device_type: String,
}

fn default_olt() -> String {
    "olt".to_string()
}

/// Direct fetch of one device with health scoring
/// POST /api/tools/get_device_details
#[utoipa::path(
    post,
    path = "/api/tools/get_device_details",
    request_body = DeviceDetailsRequest,
    responses((status = 200, description = "Tool result envelope", body = ToolResponse)),
    tag = "Tools"
)]
pub async fn get_device_details(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeviceDetailsRequest>,
) -> Json<ToolResponse> {
    match device_details_inner(&state, &req).await {
        Ok(content) => Json(ToolResponse::ok(content)),
        Err(err) => Json(ToolResponse::err(&err)),
    }
}

async fn device_details_inner(
    state: &AppState,
    req: &DeviceDetailsRequest,
) -> Result<String, CoreError> {
    req.validate()
        .map_err(|err| CoreError::InvalidInput(err.to_string()))?;

    let schema = state
        .registry
        .get(&req.device_type)
        .ok_or_else(|| CoreError::InvalidInput(format!("unknown device_type {}", req.device_type)))?;

    let batch = state
        .orchestrator
        .fetch_bounded(schema.name, &DeviceFilters::by_name(&req.device_name), 1)
        .await?;

    let Some(record) = batch.records.into_iter().next() else {
        // Soft failure: a descriptive message, not an error
        return Ok(format!(
            "No {} device named {} was found. Check the identifier or refresh the inventory.",
            schema.name, req.device_name
        ));
    };

    let mut caveats = Vec::new();
    let assessment = state.orchestrator.assess_one(record, &mut caveats).await;

    let mut out = format!(
        "# {}\n\n**Health:** {} (score {})\n\n",
        assessment.record.display_name(),
        assessment.health.status.as_str(),
        assessment.health.score
    );
    for (field, value) in &assessment.health.summary {
        out.push_str(&format!("- **{}**: {}\n", field, value));
    }
    if !assessment.health.recommendations.is_empty() {
        out.push_str("\n**Recommendations:**\n");
        for recommendation in &assessment.health.recommendations {
            out.push_str(&format!(
                "- [{}] {}\n",
                recommendation.priority.as_str(),
                recommendation.message
            ));
        }
    }
    for caveat in caveats {
        out.push_str(&format!("\n> ⚠️ {}\n", caveat));
    }

    Ok(out)
}
