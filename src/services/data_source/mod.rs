//! Device data source port
//!
//! The orchestration pipeline only depends on this fetch/filter contract.
//! Records are validated against the schema registry once, at this boundary;
//! everything downstream sees tagged, validated `DeviceRecord`s.

pub mod mock;

pub use mock::MockDataSource;

use crate::error::CoreError;
use crate::models::{DeviceFilters, DeviceRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One fetch result: the matching records plus the generation timestamp the
/// source reports for its data.
#[derive(Debug, Clone)]
pub struct DeviceBatch {
    pub records: Vec<DeviceRecord>,
    pub generated_at: DateTime<Utc>,
}

#[async_trait]
pub trait DeviceDataSource: Send + Sync {
    /// Fetch at most `limit` records of a known schema. Unknown schema names
    /// are `NotFound`; unknown filter keys were already dropped when the
    /// `DeviceFilters` was built.
    async fn fetch(
        &self,
        schema_name: &str,
        filters: &DeviceFilters,
        limit: usize,
    ) -> Result<DeviceBatch, CoreError>;
}
