//! Schema-aware context builder
//!
//! For a query, picks the candidate schemas, samples live data for each,
//! runs the quality assessor and renders a compact context block the LLM
//! (and the orchestrator's dispatch logic) can consume. Data-source
//! failures degrade to empty samples instead of erroring.

use crate::config::{OrchestratorConfig, QualityConfig};
use crate::models::DeviceFilters;
use crate::services::data_source::DeviceDataSource;
use crate::services::quality::{DataSample, QualityAssessor, QualityBand};
use crate::services::schema_registry::SchemaRegistry;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

/// Everything the orchestrator needs to ground an answer in live data.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SchemaAwareContext {
    pub query: String,
    pub schema_names: Vec<String>,
    pub samples: HashMap<String, DataSample>,
    /// Rendered field lists for the selected schemas
    pub schema_summary: String,
    pub business_context: String,
    /// Quality-band recommendations, worst band first
    pub recommendations: Vec<String>,
    /// Schemas whose fetch failed or timed out
    pub failed_schemas: Vec<String>,
    pub built_at: DateTime<Utc>,
}

impl SchemaAwareContext {
    /// Lowest overall quality score across the samples, if any were taken.
    pub fn min_overall_quality(&self) -> Option<f64> {
        self.samples
            .values()
            .map(|s| s.scores.overall)
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// True when any sample landed in the red band.
    pub fn needs_refresh(&self) -> bool {
        self.samples.values().any(|s| s.scores.band() == QualityBand::Red)
    }
}

pub struct SchemaAwareContextBuilder {
    registry: Arc<SchemaRegistry>,
    data_source: Arc<dyn DeviceDataSource>,
    assessor: QualityAssessor,
    sample_size: usize,
    fetch_timeout: Duration,
}

impl SchemaAwareContextBuilder {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        data_source: Arc<dyn DeviceDataSource>,
        quality: &QualityConfig,
        orchestrator: &OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            data_source,
            assessor: QualityAssessor::new(quality),
            sample_size: quality.sample_size,
            fetch_timeout: Duration::from_secs(orchestrator.data_fetch_timeout_seconds),
        }
    }

    /// Build context for one query. Total: fetch failures degrade to empty
    /// samples and are listed in `failed_schemas`.
    pub async fn build(&self, query: &str) -> SchemaAwareContext {
        let schemas = self.registry.schemas_for_query(query);
        let now = Utc::now();

        let mut samples = HashMap::new();
        let mut failed_schemas = Vec::new();

        for schema in &schemas {
            let fetch = tokio::time::timeout(
                self.fetch_timeout,
                self.data_source
                    .fetch(schema.name, &DeviceFilters::default(), self.sample_size),
            )
            .await;

            let (records, generated_at) = match fetch {
                Ok(Ok(batch)) => (batch.records, batch.generated_at),
                Ok(Err(err)) => {
                    tracing::warn!("Data fetch for schema {} failed: {}", schema.name, err);
                    failed_schemas.push(schema.name.to_string());
                    (vec![], now)
                }
                Err(_) => {
                    tracing::warn!("Data fetch for schema {} timed out", schema.name);
                    failed_schemas.push(schema.name.to_string());
                    (vec![], now)
                }
            };

            let scores = self.assessor.assess(schema, &records, generated_at, now);
            samples.insert(
                schema.name.to_string(),
                DataSample {
                    schema_name: schema.name.to_string(),
                    records,
                    generated_at,
                    queried_at: now,
                    scores,
                },
            );
        }

        let schema_summary = schemas
            .iter()
            .map(|s| s.describe())
            .collect::<Vec<_>>()
            .join("\n");

        let recommendations = Self::quality_recommendations(&samples);

        SchemaAwareContext {
            query: query.to_string(),
            schema_names: schemas.iter().map(|s| s.name.to_string()).collect(),
            samples,
            schema_summary,
            business_context: "Fiber access fleet: OLTs serve FTTH subscribers per region; \
                               LAGs aggregate uplinks; mobile modems carry LTE fallback; \
                               teams own operational follow-up. Health scores reflect \
                               provisioning and configuration-management state."
                .to_string(),
            recommendations,
            failed_schemas,
            built_at: now,
        }
    }

    /// Band-driven recommendations, worst band first; deterministic order
    /// within a band by schema name.
    fn quality_recommendations(samples: &HashMap<String, DataSample>) -> Vec<String> {
        let mut ranked: Vec<(&DataSample, QualityBand)> =
            samples.values().map(|s| (s, s.scores.band())).collect();
        ranked.sort_by_key(|(sample, band)| {
            let band_rank = match band {
                QualityBand::Red => 0,
                QualityBand::Amber => 1,
                QualityBand::Green => 2,
            };
            (band_rank, sample.schema_name.clone())
        });

        ranked
            .into_iter()
            .map(|(sample, band)| match band {
                QualityBand::Red => format!(
                    "{} {}: data quality is poor (overall {:.2}) — run the refresh_network_data \
                     tool before relying on this answer",
                    band.emoji(),
                    sample.schema_name,
                    sample.scores.overall
                ),
                QualityBand::Amber => format!(
                    "{} {}: proceed with a data-quality caveat (overall {:.2})",
                    band.emoji(),
                    sample.schema_name,
                    sample.scores.overall
                ),
                QualityBand::Green => format!(
                    "{} {}: data quality is good (overall {:.2}); proceed",
                    band.emoji(),
                    sample.schema_name,
                    sample.scores.overall
                ),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OrchestratorConfig, QualityConfig};
    use crate::services::data_source::MockDataSource;
    use chrono::Duration as ChronoDuration;

    fn builder(source: Arc<MockDataSource>) -> SchemaAwareContextBuilder {
        SchemaAwareContextBuilder::new(
            Arc::new(SchemaRegistry::new()),
            source,
            &QualityConfig::default(),
            &OrchestratorConfig::default(),
        )
    }

    #[tokio::test]
    async fn builds_samples_for_matching_schemas() {
        let registry = Arc::new(SchemaRegistry::new());
        let source = Arc::new(MockDataSource::with_seed_fleet(registry));
        let context = builder(source).build("How many FTTH OLTs are there?").await;

        assert_eq!(context.schema_names, vec!["olt"]);
        let sample = context.samples.get("olt").expect("olt sample");
        assert_eq!(sample.records.len(), 7);
        assert!(context.schema_summary.contains("Optical Line Terminal"));
        assert!(context.failed_schemas.is_empty());
    }

    #[tokio::test]
    async fn fresh_seed_fleet_is_green_and_proceeds() {
        let registry = Arc::new(SchemaRegistry::new());
        let source = Arc::new(MockDataSource::with_seed_fleet(registry));
        let context = builder(source).build("list olts").await;

        assert!(!context.needs_refresh());
        assert_eq!(context.recommendations.len(), 1);
        assert!(context.recommendations[0].contains("🟢"));
    }

    #[tokio::test]
    async fn empty_sample_recommends_refresh() {
        let registry = Arc::new(SchemaRegistry::new());
        let source = Arc::new(MockDataSource::empty(registry));
        let context = builder(source).build("list olts").await;

        assert!(context.needs_refresh());
        assert_eq!(context.min_overall_quality(), Some(0.0));
        assert!(context.recommendations[0].contains("refresh_network_data"));
    }

    #[tokio::test]
    async fn stale_data_lowers_quality() {
        let registry = Arc::new(SchemaRegistry::new());
        let source = Arc::new(MockDataSource::with_seed_fleet(registry));
        source.set_generated_at(Utc::now() - ChronoDuration::days(2));
        let context = builder(source).build("list olts").await;

        let sample = context.samples.get("olt").unwrap();
        assert_eq!(sample.scores.freshness, 0.0);
        assert!(sample.scores.overall < 0.80);
    }

    #[tokio::test]
    async fn query_without_schema_intent_builds_empty_context() {
        let registry = Arc::new(SchemaRegistry::new());
        let source = Arc::new(MockDataSource::with_seed_fleet(registry));
        let context = builder(source).build("what is the meaning of life").await;

        assert!(context.schema_names.is_empty());
        assert!(context.samples.is_empty());
        assert!(context.recommendations.is_empty());
    }
}
