//! Data quality assessment
//!
//! Scores a bounded sample of live device records on completeness,
//! freshness, consistency and accuracy, and folds the four axes into an
//! overall score with a coarse traffic-light band.

use crate::config::QualityConfig;
use crate::models::DeviceRecord;
use crate::services::schema_registry::DeviceSchema;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Coarse quality label derived from the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QualityBand {
    Green,
    Amber,
    Red,
}

impl QualityBand {
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Green => "🟢",
            Self::Amber => "🟡",
            Self::Red => "🔴",
        }
    }

    pub fn from_score(score: f64) -> Self {
        if score >= 0.80 {
            Self::Green
        } else if score >= 0.50 {
            Self::Amber
        } else {
            Self::Red
        }
    }
}

/// The four quality axes plus their weighted mean. All values in [0, 1].
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct QualityScores {
    pub completeness: f64,
    pub freshness: f64,
    pub consistency: f64,
    pub accuracy: f64,
    pub overall: f64,
}

impl QualityScores {
    pub fn band(&self) -> QualityBand {
        QualityBand::from_score(self.overall)
    }
}

/// A sampled slice of live data for one schema, with its assessment.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DataSample {
    pub schema_name: String,
    pub records: Vec<DeviceRecord>,
    /// When the data source says this data was generated
    pub generated_at: DateTime<Utc>,
    /// When the sample was taken
    pub queried_at: DateTime<Utc>,
    pub scores: QualityScores,
}

pub struct QualityAssessor {
    fresh_window: Duration,
    stale_horizon: Duration,
    assessment_cap: usize,
    weight_completeness: f64,
    weight_freshness: f64,
    weight_consistency: f64,
    weight_accuracy: f64,
}

impl QualityAssessor {
    pub fn new(config: &QualityConfig) -> Self {
        Self {
            fresh_window: Duration::minutes(config.fresh_window_minutes),
            stale_horizon: Duration::hours(config.stale_after_hours),
            assessment_cap: config.assessment_cap,
            weight_completeness: config.weight_completeness,
            weight_freshness: config.weight_freshness,
            weight_consistency: config.weight_consistency,
            weight_accuracy: config.weight_accuracy,
        }
    }

    /// Assess a sample against its schema. An empty sample scores zero on
    /// every axis.
    pub fn assess(
        &self,
        schema: &DeviceSchema,
        records: &[DeviceRecord],
        generated_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> QualityScores {
        if records.is_empty() {
            return QualityScores {
                completeness: 0.0,
                freshness: 0.0,
                consistency: 0.0,
                accuracy: 0.0,
                overall: 0.0,
            };
        }

        let sample = &records[..records.len().min(self.assessment_cap)];
        let count = sample.len() as f64;

        let completeness =
            sample.iter().map(|r| schema.completeness(r)).sum::<f64>() / count;
        let consistency =
            sample.iter().filter(|r| schema.is_consistent(r)).count() as f64 / count;
        let accuracy =
            sample.iter().filter(|r| schema.is_accurate(r)).count() as f64 / count;
        let freshness = self.freshness(generated_at, now);

        let overall = self.weight_completeness * completeness
            + self.weight_freshness * freshness
            + self.weight_consistency * consistency
            + self.weight_accuracy * accuracy;

        QualityScores { completeness, freshness, consistency, accuracy, overall }
    }

    /// 1.0 within the fresh window, linear decay to 0 at the stale horizon.
    fn freshness(&self, generated_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let age = now - generated_at;
        if age <= self.fresh_window {
            return 1.0;
        }
        if age >= self.stale_horizon {
            return 0.0;
        }
        let span = (self.stale_horizon - self.fresh_window).num_seconds() as f64;
        let past = (age - self.fresh_window).num_seconds() as f64;
        1.0 - past / span
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::schema_registry::SchemaRegistry;
    use serde_json::{Value, json};

    fn assessor() -> QualityAssessor {
        QualityAssessor::new(&QualityConfig::default())
    }

    fn olt(region: &str, service_count: i64, complete: bool, managed: bool) -> DeviceRecord {
        let Value::Object(fields) = json!({
            "name": "OLT10GENT01",
            "region": region,
            "environment": "PRODUCTION",
            "bandwidth_gbps": 40,
            "service_count": service_count,
            "managed_by_inmanta": managed,
            "complete_config": complete,
        }) else {
            unreachable!()
        };
        DeviceRecord::new("olt", fields)
    }

    #[test]
    fn empty_sample_scores_zero_and_bands_red() {
        let registry = SchemaRegistry::new();
        let schema = registry.get("olt").unwrap();
        let now = Utc::now();

        let scores = assessor().assess(schema, &[], now, now);
        assert_eq!(scores.completeness, 0.0);
        assert_eq!(scores.freshness, 0.0);
        assert_eq!(scores.consistency, 0.0);
        assert_eq!(scores.accuracy, 0.0);
        assert_eq!(scores.overall, 0.0);
        assert_eq!(scores.band(), QualityBand::Red);
    }

    #[test]
    fn pristine_fresh_sample_is_green() {
        let registry = SchemaRegistry::new();
        let schema = registry.get("olt").unwrap();
        let now = Utc::now();

        let records = vec![olt("HOBO", 80, true, true), olt("GENT", 120, true, true)];
        let scores = assessor().assess(schema, &records, now, now);
        assert!((scores.overall - 1.0).abs() < 1e-9);
        assert_eq!(scores.band(), QualityBand::Green);
    }

    #[test]
    fn freshness_decays_linearly() {
        let registry = SchemaRegistry::new();
        let schema = registry.get("olt").unwrap();
        let now = Utc::now();
        let records = vec![olt("HOBO", 80, true, true)];
        let assessor = assessor();

        let fresh = assessor.assess(schema, &records, now - Duration::minutes(10), now);
        assert_eq!(fresh.freshness, 1.0);

        let old = assessor.assess(schema, &records, now - Duration::hours(25), now);
        assert_eq!(old.freshness, 0.0);

        // Halfway between 15 minutes and 24 hours
        let midpoint = now - Duration::seconds((15 * 60 + 24 * 3600) / 2);
        let half = assessor.assess(schema, &records, midpoint, now);
        assert!((half.freshness - 0.5).abs() < 0.01);
    }

    #[test]
    fn inconsistent_and_inaccurate_records_lower_their_axes() {
        let registry = SchemaRegistry::new();
        let schema = registry.get("olt").unwrap();
        let now = Utc::now();

        let mut bad_region = olt("HOBO", 80, true, true);
        bad_region.fields.insert("region".to_string(), json!("OSLO"));
        // complete_config without services breaks the accuracy invariant
        let broken_invariant = olt("GENT", 0, true, true);
        let clean = olt("ROES", 80, true, true);

        let records = vec![bad_region, broken_invariant, clean];
        let scores = assessor().assess(schema, &records, now, now);

        assert!((scores.consistency - 2.0 / 3.0).abs() < 1e-9);
        assert!((scores.accuracy - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(scores.completeness, 1.0);
    }

    #[test]
    fn weights_match_contract() {
        let registry = SchemaRegistry::new();
        let schema = registry.get("olt").unwrap();
        let now = Utc::now();

        // Fully stale but otherwise perfect sample: overall = 1 - freshness weight
        let records = vec![olt("HOBO", 80, true, true)];
        let scores = assessor().assess(schema, &records, now - Duration::days(3), now);
        assert!((scores.overall - 0.75).abs() < 1e-9);
        assert_eq!(scores.band(), QualityBand::Amber);
    }
}
