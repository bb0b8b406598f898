//! Query orchestrator
//!
//! Ties the pipeline together: analyzer and context builder run
//! concurrently, quality findings may degrade the analysis type, the
//! selected strategy fetches live data and scores device health, and the
//! LLM turns the assembled context into prose. LLM and retrieval failures
//! degrade visibly instead of failing the request.

pub mod prompts;
pub mod response;

#[cfg(test)]
mod tests;

use crate::config::OrchestratorConfig;
use crate::error::CoreError;
use crate::models::{DeviceFilters, DeviceRecord, Document};
use crate::services::analyzer::{AnalysisType, Guidance, RagFusionAnalyzer};
use crate::services::context_builder::{SchemaAwareContext, SchemaAwareContextBuilder};
use crate::services::data_source::DeviceDataSource;
use crate::services::document_store::DocumentService;
use crate::services::health::{HealthReport, HealthRuleEngine};
use crate::services::llm::LlmService;
use crate::services::schema_registry::{OLT_ENVIRONMENTS, OLT_REGIONS, SchemaRegistry};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

/// Caller-supplied knobs for one `execute` call.
#[derive(Debug, Clone)]
pub struct QueryFlags {
    pub include_recommendations: bool,
    pub limit: Option<usize>,
}

impl Default for QueryFlags {
    fn default() -> Self {
        Self { include_recommendations: true, limit: None }
    }
}

/// One device plus its health assessment.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeviceAssessment {
    pub record: DeviceRecord,
    pub health: HealthReport,
}

/// The structured (pre-LLM) result of a query.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StructuredResult {
    Listing {
        schema_name: String,
        devices: Vec<DeviceAssessment>,
        #[schema(value_type = Vec<Vec<String>>)]
        region_counts: Vec<(String, usize)>,
    },
    Details {
        device: DeviceAssessment,
    },
    Narrative {
        notes: Vec<String>,
    },
}

/// Everything `execute` produced for one query.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub query: String,
    pub guidance: Guidance,
    /// Possibly coerced away from the analyzer's suggestion
    pub analysis_type: AnalysisType,
    pub context: SchemaAwareContext,
    pub result: StructuredResult,
    pub llm_answer: Option<String>,
    pub llm_note: Option<String>,
    pub caveats: Vec<String>,
    pub recommendations: Vec<String>,
}

pub struct QueryOrchestrator {
    analyzer: Arc<RagFusionAnalyzer>,
    context_builder: Arc<SchemaAwareContextBuilder>,
    health_engine: Arc<HealthRuleEngine>,
    data_source: Arc<dyn DeviceDataSource>,
    documents: Arc<DocumentService>,
    llm: Arc<LlmService>,
    registry: Arc<SchemaRegistry>,
    config: OrchestratorConfig,
}

impl QueryOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        analyzer: Arc<RagFusionAnalyzer>,
        context_builder: Arc<SchemaAwareContextBuilder>,
        health_engine: Arc<HealthRuleEngine>,
        data_source: Arc<dyn DeviceDataSource>,
        documents: Arc<DocumentService>,
        llm: Arc<LlmService>,
        registry: Arc<SchemaRegistry>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            analyzer,
            context_builder,
            health_engine,
            data_source,
            documents,
            llm,
            registry,
            config,
        }
    }

    /// Run the full pipeline under the overall deadline.
    pub async fn execute(
        &self,
        query: &str,
        flags: &QueryFlags,
    ) -> Result<QueryOutcome, CoreError> {
        let overall = Duration::from_secs(self.config.overall_timeout_seconds);
        match tokio::time::timeout(overall, self.execute_inner(query, flags)).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::Timeout(self.config.overall_timeout_seconds)),
        }
    }

    async fn execute_inner(
        &self,
        query: &str,
        flags: &QueryFlags,
    ) -> Result<QueryOutcome, CoreError> {
        // Analyzer and context builder have no ordering relationship; both
        // must complete before dispatch
        let (guidance, context) =
            tokio::join!(self.analyzer.analyze(query), self.context_builder.build(query));

        let mut caveats = Vec::new();
        let mut analysis_type = guidance.analysis_type;

        if let Some(min_quality) = context.min_overall_quality() {
            if min_quality < 0.5 {
                caveats.push(format!(
                    "Live data quality is low (worst overall score {:.2}); treat counts and \
                     device states as indicative, not authoritative.",
                    min_quality
                ));
            }
        }

        let refresh_recommended = context.needs_refresh()
            || guidance
                .tool_recommendation
                .as_deref()
                .is_some_and(|tool| tool.contains("refresh"));
        if refresh_recommended && analysis_type != AnalysisType::GeneralSearch {
            caveats.push(format!(
                "Analysis degraded from {} to general_search until the data is refreshed.",
                analysis_type.as_str()
            ));
            analysis_type = AnalysisType::GeneralSearch;
        }

        let mut recommendations: Vec<String> = context.recommendations.clone();

        let result = match analysis_type {
            AnalysisType::DeviceListing => {
                self.run_listing(query, &context, flags, &mut caveats, &mut recommendations)
                    .await
            }
            AnalysisType::DeviceDetails => {
                self.run_details(query, &mut caveats, &mut recommendations).await
            }
            AnalysisType::ComplexAnalysis | AnalysisType::GeneralSearch => {
                self.run_narrative(&guidance, &context, &mut recommendations).await
            }
        };

        let mut outcome = QueryOutcome {
            query: query.to_string(),
            guidance,
            analysis_type,
            context,
            result,
            llm_answer: None,
            llm_note: None,
            caveats,
            recommendations,
        };

        let cited = self.resolve_citations(&outcome.guidance).await;
        let user_content =
            prompts::build_user_content(&outcome, &cited, self.config.context_char_budget);

        match self.llm.complete(prompts::SYSTEM_INSTRUCTION, user_content).await {
            Ok(answer) => outcome.llm_answer = Some(answer),
            Err(err @ (CoreError::Timeout(_) | CoreError::UpstreamUnavailable { .. })) => {
                // Recovered: the structured result stands on its own
                outcome.llm_note = Some(format!(
                    "LLM was unavailable ({}); this answer was generated from structured data only.",
                    err.kind()
                ));
            }
            Err(other) => return Err(other),
        }

        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Dispatch strategies
    // ------------------------------------------------------------------

    async fn run_listing(
        &self,
        query: &str,
        context: &SchemaAwareContext,
        flags: &QueryFlags,
        caveats: &mut Vec<String>,
        recommendations: &mut Vec<String>,
    ) -> StructuredResult {
        let schema_name = context
            .schema_names
            .first()
            .map(String::as_str)
            .unwrap_or("olt")
            .to_string();
        let filters = extract_filters(query);
        let limit = flags.limit.unwrap_or(self.config.default_limit);

        let batch = match self.fetch_bounded(&schema_name, &filters, limit).await {
            Ok(batch) => batch,
            Err(err) => {
                caveats.push(format!(
                    "Device listing degraded: the data source was unavailable ({}).",
                    err.kind()
                ));
                return StructuredResult::Narrative {
                    notes: vec![format!(
                        "Live {} data could not be fetched; no listing is available.",
                        schema_name
                    )],
                };
            }
        };

        let devices = self.assess_all(batch.records, caveats).await;
        push_health_recommendations(&devices, recommendations);

        let region_counts = count_by_region(&devices);
        StructuredResult::Listing { schema_name, devices, region_counts }
    }

    async fn run_details(
        &self,
        query: &str,
        caveats: &mut Vec<String>,
        recommendations: &mut Vec<String>,
    ) -> StructuredResult {
        let Some((schema, name)) = self.registry.extract_device_name(query) else {
            caveats.push("No device identifier matching a known schema was found in the query.".to_string());
            return StructuredResult::Narrative {
                notes: vec!["The query asked for device details but named no known device.".to_string()],
            };
        };

        let batch = match self
            .fetch_bounded(schema.name, &DeviceFilters::by_name(name), 1)
            .await
        {
            Ok(batch) => batch,
            Err(err) => {
                caveats.push(format!(
                    "Device lookup degraded: the data source was unavailable ({}).",
                    err.kind()
                ));
                return StructuredResult::Narrative {
                    notes: vec![format!("Live data for {} could not be fetched.", name)],
                };
            }
        };

        let Some(record) = batch.records.into_iter().next() else {
            recommendations.push(format!(
                "No record found for {}; verify the identifier or refresh the inventory data.",
                name
            ));
            return StructuredResult::Narrative {
                notes: vec![format!(
                    "No {} record named {} exists in the current data.",
                    schema.name, name
                )],
            };
        };

        let assessment = self.assess_one(record, caveats).await;
        push_health_recommendations(std::slice::from_ref(&assessment), recommendations);
        StructuredResult::Details { device: assessment }
    }

    async fn run_narrative(
        &self,
        guidance: &Guidance,
        context: &SchemaAwareContext,
        recommendations: &mut Vec<String>,
    ) -> StructuredResult {
        let mut notes = Vec::new();

        for schema_name in &context.schema_names {
            if let Some(sample) = context.samples.get(schema_name) {
                notes.push(format!(
                    "{} sample: {} record(s), quality {} ({:.2})",
                    schema_name,
                    sample.records.len(),
                    sample.scores.band().emoji(),
                    sample.scores.overall
                ));
            }
        }

        if notes.is_empty() {
            notes.push("No live device records matched this query.".to_string());
            recommendations.push(
                "The requested entity is missing from the inventory data; check the identifier \
                 or ingest the relevant records."
                    .to_string(),
            );
        }

        if !guidance.cited_documents.is_empty() {
            notes.push(format!(
                "{} documentation article(s) were consulted.",
                guidance.cited_documents.len()
            ));
        }

        StructuredResult::Narrative { notes }
    }

    // ------------------------------------------------------------------
    // Shared helpers (also used by the direct tool endpoints)
    // ------------------------------------------------------------------

    /// Fetch with the per-call data-source timeout applied.
    pub async fn fetch_bounded(
        &self,
        schema_name: &str,
        filters: &DeviceFilters,
        limit: usize,
    ) -> Result<crate::services::data_source::DeviceBatch, CoreError> {
        let timeout = Duration::from_secs(self.config.data_fetch_timeout_seconds);
        match tokio::time::timeout(timeout, self.data_source.fetch(schema_name, filters, limit))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(CoreError::Timeout(self.config.data_fetch_timeout_seconds)),
        }
    }

    /// Health-score a batch. Rule-engine failures label the device UNKNOWN
    /// and never abort the batch.
    pub async fn assess_all(
        &self,
        records: Vec<DeviceRecord>,
        caveats: &mut Vec<String>,
    ) -> Vec<DeviceAssessment> {
        let mut assessments = Vec::with_capacity(records.len());
        for record in records {
            assessments.push(self.assess_one(record, caveats).await);
        }
        assessments
    }

    pub async fn assess_one(
        &self,
        record: DeviceRecord,
        caveats: &mut Vec<String>,
    ) -> DeviceAssessment {
        match self.health_engine.evaluate(&record).await {
            Ok(health) => DeviceAssessment { record, health },
            Err(err) => {
                tracing::error!(
                    "Health evaluation failed for {}: {}",
                    record.display_name(),
                    err
                );
                caveats.push(format!(
                    "Health for {} could not be evaluated and is reported as UNKNOWN.",
                    record.display_name()
                ));
                DeviceAssessment { record, health: HealthReport::unknown(&err.to_string()) }
            }
        }
    }

    async fn resolve_citations(&self, guidance: &Guidance) -> Vec<Document> {
        let mut cited = Vec::new();
        for id in guidance.cited_documents.iter().take(5) {
            match self.documents.get(id).await {
                Ok(doc) => cited.push(doc),
                Err(err) => tracing::warn!("Cited document {} unavailable: {}", id, err),
            }
        }
        cited
    }
}

/// Region/environment extraction from the query, via a fixed lexicon.
pub fn extract_filters(query: &str) -> DeviceFilters {
    let upper = query.to_uppercase();
    let tokens: Vec<&str> = upper
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .collect();

    let region = OLT_REGIONS
        .iter()
        .find(|r| tokens.contains(*r))
        .map(|r| r.to_string());
    let environment = OLT_ENVIRONMENTS
        .iter()
        .find(|e| tokens.contains(*e))
        .map(|e| e.to_string());

    DeviceFilters { region, environment, ..DeviceFilters::default() }
}

fn count_by_region(devices: &[DeviceAssessment]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for assessment in devices {
        let Some(region) = assessment.record.str_field("region") else {
            continue;
        };
        match counts.iter_mut().find(|(name, _)| name == region) {
            Some((_, count)) => *count += 1,
            None => counts.push((region.to_string(), 1)),
        }
    }
    counts.sort_by(|a, b| a.0.cmp(&b.0));
    counts
}

fn push_health_recommendations(devices: &[DeviceAssessment], out: &mut Vec<String>) {
    for assessment in devices {
        for recommendation in &assessment.health.recommendations {
            let line = format!(
                "[{}] {}: {}",
                recommendation.priority.as_str(),
                assessment.record.display_name(),
                recommendation.message
            );
            if !out.contains(&line) {
                out.push(line);
            }
        }
    }
}
