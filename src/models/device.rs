//! Validated device records and fetch filters
//!
//! Device data enters the system as untyped JSON from the data source. The
//! source boundary validates each object against its registered schema and
//! tags it; everything downstream reads through the typed accessors here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use utoipa::ToSchema;

/// A device record validated against a named schema.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeviceRecord {
    pub schema_name: String,
    #[schema(value_type = Object)]
    pub fields: Map<String, Value>,
}

impl DeviceRecord {
    pub fn new(schema_name: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self { schema_name: schema_name.into(), fields }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.get(name).map(|v| !v.is_null()).unwrap_or(false)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_str())
    }

    pub fn int_field(&self, name: &str) -> Option<i64> {
        self.fields.get(name).and_then(|v| v.as_i64())
    }

    pub fn bool_field(&self, name: &str) -> Option<bool> {
        self.fields.get(name).and_then(|v| v.as_bool())
    }

    /// Human-facing identifier: `name` for most schemas, `serial` for modems.
    pub fn display_name(&self) -> &str {
        self.str_field("name")
            .or_else(|| self.str_field("serial"))
            .unwrap_or("<unnamed>")
    }
}

/// Fetch filters understood by every data source. Unknown keys in the wire
/// mapping are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeviceFilters {
    pub region: Option<String>,
    pub environment: Option<String>,
    pub name_prefix: Option<String>,
    pub name_equals: Option<String>,
}

impl DeviceFilters {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self { name_equals: Some(name.into()), ..Self::default() }
    }

    /// Build from an untyped mapping, keeping only the reserved keys.
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        Self {
            region: map.get("region").cloned(),
            environment: map.get("environment").cloned(),
            name_prefix: map.get("name_prefix").cloned(),
            name_equals: map.get("name_equals").cloned(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.region.is_none()
            && self.environment.is_none()
            && self.name_prefix.is_none()
            && self.name_equals.is_none()
    }

    /// Whether a record passes this filter set.
    pub fn matches(&self, record: &DeviceRecord) -> bool {
        if let Some(region) = &self.region {
            if record.str_field("region") != Some(region.as_str()) {
                return false;
            }
        }
        if let Some(environment) = &self.environment {
            if record.str_field("environment") != Some(environment.as_str()) {
                return false;
            }
        }
        let name = record.display_name();
        if let Some(prefix) = &self.name_prefix {
            if !name.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(exact) = &self.name_equals {
            if name != exact {
                return false;
            }
        }
        true
    }
}
