//! Seeded mock data source
//!
//! Serves a deterministic fleet for development and tests. Inserts go
//! through the same boundary validation a live source adapter would apply:
//! the schema must be registered and every present field must satisfy its
//! declared constraint.

use super::{DeviceBatch, DeviceDataSource};
use crate::error::CoreError;
use crate::models::{DeviceFilters, DeviceRecord};
use crate::services::schema_registry::SchemaRegistry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub struct MockDataSource {
    registry: Arc<SchemaRegistry>,
    fleet: RwLock<HashMap<String, Vec<DeviceRecord>>>,
    generated_at: RwLock<DateTime<Utc>>,
}

impl MockDataSource {
    pub fn empty(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            fleet: RwLock::new(HashMap::new()),
            generated_at: RwLock::new(Utc::now()),
        }
    }

    /// The standard development fleet: seven OLTs across three regions, two
    /// LAGs, three modems and two teams.
    pub fn with_seed_fleet(registry: Arc<SchemaRegistry>) -> Self {
        let source = Self::empty(registry);
        for (schema, record) in seed_fleet() {
            source
                .insert(schema, record)
                .expect("seed fleet must pass boundary validation");
        }
        source
    }

    /// Insert one raw record, validating it at the boundary.
    pub fn insert(&self, schema_name: &str, raw: Value) -> Result<(), CoreError> {
        let schema = self
            .registry
            .get(schema_name)
            .ok_or_else(|| CoreError::NotFound(format!("schema {}", schema_name)))?;

        let Value::Object(fields) = raw else {
            return Err(CoreError::InvalidInput("device record must be a JSON object".to_string()));
        };

        let record = DeviceRecord::new(schema_name, fields);
        if !schema.is_consistent(&record) {
            return Err(CoreError::InvalidInput(format!(
                "record {} violates schema {} constraints",
                record.display_name(),
                schema_name
            )));
        }

        self.fleet
            .write()
            .expect("fleet lock")
            .entry(schema_name.to_string())
            .or_default()
            .push(record);
        Ok(())
    }

    /// Drop every record of one schema (used to simulate source outages).
    pub fn clear(&self, schema_name: &str) {
        self.fleet.write().expect("fleet lock").remove(schema_name);
    }

    /// Override the reported generation timestamp (used to simulate staleness).
    pub fn set_generated_at(&self, at: DateTime<Utc>) {
        *self.generated_at.write().expect("timestamp lock") = at;
    }
}

#[async_trait]
impl DeviceDataSource for MockDataSource {
    async fn fetch(
        &self,
        schema_name: &str,
        filters: &DeviceFilters,
        limit: usize,
    ) -> Result<DeviceBatch, CoreError> {
        if self.registry.get(schema_name).is_none() {
            return Err(CoreError::NotFound(format!("schema {}", schema_name)));
        }

        let fleet = self.fleet.read().expect("fleet lock");
        let records = fleet
            .get(schema_name)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| filters.matches(r))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(DeviceBatch {
            records,
            generated_at: *self.generated_at.read().expect("timestamp lock"),
        })
    }
}

fn seed_fleet() -> Vec<(&'static str, Value)> {
    vec![
        // HOBO region, the reference scoring quartet
        (
            "olt",
            json!({
                "name": "OLT17PROP01", "region": "HOBO", "environment": "PRODUCTION",
                "bandwidth_gbps": 100, "service_count": 200,
                "managed_by_inmanta": true, "complete_config": true,
                "esi": "ESI-0017",
            }),
        ),
        (
            "olt",
            json!({
                "name": "OLT18HOBO02", "region": "HOBO", "environment": "PRODUCTION",
                "bandwidth_gbps": 40, "service_count": 150,
                "managed_by_inmanta": false, "complete_config": false,
            }),
        ),
        (
            "olt",
            json!({
                "name": "OLT19HOBO03", "region": "HOBO", "environment": "PRODUCTION",
                "bandwidth_gbps": 10, "service_count": 0,
                "managed_by_inmanta": true, "complete_config": false,
            }),
        ),
        (
            "olt",
            json!({
                "name": "OLT20HOBO04", "region": "HOBO", "environment": "PRODUCTION",
                "bandwidth_gbps": 100, "service_count": 50,
                "managed_by_inmanta": true, "complete_config": true,
            }),
        ),
        // GENT region
        (
            "olt",
            json!({
                "name": "OLT21GENT01", "region": "GENT", "environment": "PRODUCTION",
                "bandwidth_gbps": 100, "service_count": 300,
                "managed_by_inmanta": true, "complete_config": true,
                "esi": "ESI-0021",
            }),
        ),
        (
            "olt",
            json!({
                "name": "OLT22GENT02", "region": "GENT", "environment": "UAT",
                "bandwidth_gbps": 100, "service_count": 30,
                "managed_by_inmanta": true, "complete_config": true,
            }),
        ),
        // ROES region
        (
            "olt",
            json!({
                "name": "OLT23ROES01", "region": "ROES", "environment": "PRODUCTION",
                "bandwidth_gbps": 40, "service_count": 75,
                "managed_by_inmanta": true, "complete_config": false,
            }),
        ),
        // Link aggregation groups
        (
            "lag",
            json!({
                "name": "LAG-HOBO-CORE-01", "lag_id": 101,
                "description": "Core uplink towards the HOBO headend",
                "admin_key": 4096,
            }),
        ),
        (
            "lag",
            json!({
                "name": "LAG-GENT-EDGE-02", "lag_id": 102,
                "admin_key": 8192,
            }),
        ),
        // Mobile modems
        (
            "mobile_modem",
            json!({
                "serial": "LPL2301A7F", "hardware_type": "GPON-HGU-5",
                "subscriber_id": "SUB-88412",
            }),
        ),
        (
            "mobile_modem",
            json!({
                "serial": "LPL2302B9C", "hardware_type": "LEGACY",
                "subscriber_id": "SUB-11003",
            }),
        ),
        (
            "mobile_modem",
            json!({
                "serial": "LPL2399XX1", "hardware_type": "GPON-HGU-5",
            }),
        ),
        // Teams
        ("team", json!({ "name": "FIBER_OPS", "id": 1 })),
        ("team", json!({ "name": "MOBILE_NOC", "id": 2 })),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> MockDataSource {
        MockDataSource::with_seed_fleet(Arc::new(SchemaRegistry::new()))
    }

    #[tokio::test]
    async fn seed_fleet_has_seven_olts_across_three_regions() {
        let source = source();
        let batch = source.fetch("olt", &DeviceFilters::default(), 50).await.unwrap();
        assert_eq!(batch.records.len(), 7);

        let regions: std::collections::HashSet<&str> = batch
            .records
            .iter()
            .filter_map(|r| r.str_field("region"))
            .collect();
        assert_eq!(regions.len(), 3);
    }

    #[tokio::test]
    async fn region_filter_returns_the_hobo_quartet() {
        let source = source();
        let filters = DeviceFilters { region: Some("HOBO".to_string()), ..Default::default() };
        let batch = source.fetch("olt", &filters, 50).await.unwrap();
        assert_eq!(batch.records.len(), 4);
    }

    #[tokio::test]
    async fn name_filter_finds_one_device() {
        let source = source();
        let batch = source
            .fetch("olt", &DeviceFilters::by_name("OLT17PROP01"), 50)
            .await
            .unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].int_field("service_count"), Some(200));
    }

    #[tokio::test]
    async fn limit_is_respected() {
        let source = source();
        let batch = source.fetch("olt", &DeviceFilters::default(), 3).await.unwrap();
        assert_eq!(batch.records.len(), 3);
    }

    #[tokio::test]
    async fn unknown_schema_is_not_found() {
        let source = source();
        let err = source
            .fetch("router", &DeviceFilters::default(), 10)
            .await
            .expect_err("unknown schema");
        assert_eq!(err.kind(), "NOT_FOUND");
    }

    #[test]
    fn boundary_validation_rejects_bad_enum_values() {
        let source = source();
        let err = source
            .insert(
                "olt",
                json!({
                    "name": "OLT30GENT09", "region": "PARIS", "environment": "PRODUCTION",
                    "bandwidth_gbps": 10, "service_count": 5,
                    "managed_by_inmanta": true, "complete_config": false,
                }),
            )
            .expect_err("bad region");
        assert_eq!(err.kind(), "INVALID_ARGUMENT");
    }

    #[test]
    fn boundary_validation_allows_missing_fields() {
        // Missing fields are a data-quality concern, not a validation error
        let source = source();
        source
            .insert("mobile_modem", json!({ "serial": "LPL9000AAA" }))
            .expect("partial record");
    }
}
