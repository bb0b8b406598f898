//! Schema registry
//!
//! Declarative descriptions of the device record shapes the service knows
//! about, plus the intent keywords that map a natural-language query onto
//! them. Read-only after initialization; every lookup is a pure function.

use crate::models::DeviceRecord;
use crate::services::health::predicate::Predicate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static OLT_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^OLT\d+[A-Z]{3,4}\d+$").expect("olt name pattern"));
static MODEM_SERIAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^LPL\d+[A-Z0-9]+$").expect("modem serial pattern"));
/// Team names are underscore-segmented (FIBER_OPS, MOBILE_NOC). The segment
/// requirement keeps bare uppercase acronyms (PON, FTTH, UAT, region codes)
/// from being mistaken for team identifiers.
static TEAM_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9]*(_[A-Z0-9]+)+$").expect("team name pattern"));

/// Semantic type of one schema field.
#[derive(Debug, Clone)]
pub enum FieldType {
    Str,
    Bool,
    Integer,
    Enum(Vec<&'static str>),
    Pattern(Regex),
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
}

impl FieldSpec {
    fn required(name: &'static str, field_type: FieldType) -> Self {
        Self { name, field_type, required: true }
    }

    fn optional(name: &'static str, field_type: FieldType) -> Self {
        Self { name, field_type, required: false }
    }

    /// Whether a present value satisfies this field's declared type.
    fn value_ok(&self, value: &Value) -> bool {
        match &self.field_type {
            FieldType::Str => value.is_string(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Integer => value.as_i64().map(|n| n >= 0).unwrap_or(false),
            FieldType::Enum(values) => value
                .as_str()
                .map(|s| values.contains(&s))
                .unwrap_or(false),
            FieldType::Pattern(regex) => {
                value.as_str().map(|s| regex.is_match(s)).unwrap_or(false)
            }
        }
    }
}

/// One registered device schema.
#[derive(Debug, Clone)]
pub struct DeviceSchema {
    pub name: &'static str,
    pub display_name: &'static str,
    pub fields: Vec<FieldSpec>,
    /// Lowercased query tokens that select this schema
    pub intent_keywords: Vec<&'static str>,
    /// Cross-field invariants checked by the quality assessor
    pub invariants: Vec<Predicate>,
}

impl DeviceSchema {
    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Pattern constraining the record's display-name field, when declared.
    pub fn name_pattern(&self) -> Option<&Regex> {
        for candidate in ["name", "serial"] {
            if let Some(FieldSpec { field_type: FieldType::Pattern(regex), .. }) =
                self.field(candidate)
            {
                return Some(regex);
            }
        }
        None
    }

    /// Every present field satisfies its declared enum/pattern/type constraint.
    pub fn is_consistent(&self, record: &DeviceRecord) -> bool {
        self.fields.iter().all(|spec| match record.fields.get(spec.name) {
            None | Some(Value::Null) => true,
            Some(value) => spec.value_ok(value),
        })
    }

    /// Every declared cross-field invariant holds.
    pub fn is_accurate(&self, record: &DeviceRecord) -> bool {
        self.invariants.iter().all(|inv| inv.eval(record))
    }

    /// Fraction of required fields present and non-empty.
    pub fn completeness(&self, record: &DeviceRecord) -> f64 {
        let required: Vec<&FieldSpec> = self.required_fields().collect();
        if required.is_empty() {
            return 1.0;
        }
        let present = required
            .iter()
            .filter(|spec| match record.fields.get(spec.name) {
                None | Some(Value::Null) => false,
                Some(Value::String(s)) => !s.is_empty(),
                Some(_) => true,
            })
            .count();
        present as f64 / required.len() as f64
    }

    /// Short human-readable rendering for LLM context.
    pub fn describe(&self) -> String {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|spec| {
                let ty = match &spec.field_type {
                    FieldType::Str => "string".to_string(),
                    FieldType::Bool => "bool".to_string(),
                    FieldType::Integer => "integer".to_string(),
                    FieldType::Enum(values) => format!("enum[{}]", values.join("|")),
                    FieldType::Pattern(regex) => format!("pattern[{}]", regex.as_str()),
                };
                let marker = if spec.required { "" } else { "?" };
                format!("{}{}: {}", spec.name, marker, ty)
            })
            .collect();
        format!("{} ({}): {}", self.display_name, self.name, fields.join(", "))
    }
}

/// Static registry. Registration order is the tie-break order for
/// `schemas_for_query`.
pub struct SchemaRegistry {
    schemas: Vec<DeviceSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self { schemas: builtin_schemas() }
    }

    pub fn all(&self) -> &[DeviceSchema] {
        &self.schemas
    }

    pub fn get(&self, name: &str) -> Option<&DeviceSchema> {
        self.schemas.iter().find(|s| s.name == name)
    }

    /// Schemas whose intent keywords intersect the lowercased query tokens,
    /// in registration order.
    pub fn schemas_for_query(&self, query: &str) -> Vec<&DeviceSchema> {
        let tokens: Vec<String> = query
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        self.schemas
            .iter()
            .filter(|schema| {
                schema
                    .intent_keywords
                    .iter()
                    .any(|kw| tokens.iter().any(|t| t == kw))
            })
            .collect()
    }

    /// Find the first schema whose name pattern matches a query token.
    /// Used to pull a concrete device identifier out of free text.
    pub fn extract_device_name<'a>(&self, query: &'a str) -> Option<(&DeviceSchema, &'a str)> {
        for token in query.split(|c: char| c.is_whitespace() || ",;:!?\"'()".contains(c)) {
            if token.is_empty() {
                continue;
            }
            for schema in &self.schemas {
                if let Some(pattern) = schema.name_pattern() {
                    if pattern.is_match(token) {
                        return Some((schema, token));
                    }
                }
            }
        }
        None
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub const OLT_REGIONS: &[&str] = &["HOBO", "GENT", "ROES", "ASSE"];
pub const OLT_ENVIRONMENTS: &[&str] = &["PRODUCTION", "UAT", "TEST"];

fn builtin_schemas() -> Vec<DeviceSchema> {
    vec![
        DeviceSchema {
            name: "olt",
            display_name: "Optical Line Terminal",
            fields: vec![
                FieldSpec::required("name", FieldType::Pattern(OLT_NAME_RE.clone())),
                FieldSpec::required("region", FieldType::Enum(OLT_REGIONS.to_vec())),
                FieldSpec::required("environment", FieldType::Enum(OLT_ENVIRONMENTS.to_vec())),
                FieldSpec::required("bandwidth_gbps", FieldType::Integer),
                FieldSpec::required("service_count", FieldType::Integer),
                FieldSpec::required("managed_by_inmanta", FieldType::Bool),
                FieldSpec::required("complete_config", FieldType::Bool),
                FieldSpec::optional("esi", FieldType::Str),
            ],
            intent_keywords: vec!["olt", "olts", "fiber", "ftth", "optical", "pon"],
            invariants: vec![Predicate::implies(
                Predicate::eq("complete_config", true),
                Predicate::all(vec![
                    Predicate::eq("managed_by_inmanta", true),
                    Predicate::gt("service_count", 0),
                ]),
            )],
        },
        DeviceSchema {
            name: "lag",
            display_name: "Link Aggregation Group",
            fields: vec![
                FieldSpec::required("name", FieldType::Str),
                FieldSpec::required("lag_id", FieldType::Integer),
                FieldSpec::optional("description", FieldType::Str),
                FieldSpec::required("admin_key", FieldType::Integer),
            ],
            intent_keywords: vec!["lag", "lags", "aggregation", "trunk", "bundle"],
            invariants: vec![],
        },
        DeviceSchema {
            name: "mobile_modem",
            display_name: "Mobile Modem",
            fields: vec![
                FieldSpec::required("serial", FieldType::Pattern(MODEM_SERIAL_RE.clone())),
                FieldSpec::required("hardware_type", FieldType::Str),
                FieldSpec::required("subscriber_id", FieldType::Str),
            ],
            intent_keywords: vec!["modem", "modems", "mobile", "lte", "sim"],
            invariants: vec![],
        },
        DeviceSchema {
            name: "team",
            display_name: "Operational Team",
            fields: vec![
                FieldSpec::required("name", FieldType::Pattern(TEAM_NAME_RE.clone())),
                FieldSpec::required("id", FieldType::Integer),
            ],
            intent_keywords: vec!["team", "teams", "crew", "department"],
            invariants: vec![],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn olt_record(overrides: Value) -> DeviceRecord {
        let mut base = json!({
            "name": "OLT17PROP01",
            "region": "HOBO",
            "environment": "PRODUCTION",
            "bandwidth_gbps": 100,
            "service_count": 80,
            "managed_by_inmanta": true,
            "complete_config": true,
        });
        if let (Value::Object(base_map), Value::Object(over)) = (&mut base, overrides) {
            for (k, v) in over {
                base_map.insert(k, v);
            }
        }
        let Value::Object(fields) = base else { unreachable!() };
        DeviceRecord::new("olt", fields)
    }

    #[test]
    fn intent_keywords_select_schemas_in_registration_order() {
        let registry = SchemaRegistry::new();

        let schemas = registry.schemas_for_query("How many FTTH OLTs are there?");
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "olt");

        let schemas = registry.schemas_for_query("show modem and lag inventory");
        let names: Vec<&str> = schemas.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["lag", "mobile_modem"]);

        assert!(registry.schemas_for_query("what is the weather").is_empty());
    }

    #[test]
    fn device_name_extraction_uses_schema_patterns() {
        let registry = SchemaRegistry::new();

        let (schema, name) = registry
            .extract_device_name("Show me OLT17PROP01 configuration")
            .expect("olt token");
        assert_eq!(schema.name, "olt");
        assert_eq!(name, "OLT17PROP01");

        let (schema, serial) = registry
            .extract_device_name("diagnose LPL2301A7F please")
            .expect("modem token");
        assert_eq!(schema.name, "mobile_modem");
        assert_eq!(serial, "LPL2301A7F");

        assert!(registry.extract_device_name("list everything").is_none());
    }

    #[test]
    fn uppercase_acronyms_are_not_device_names() {
        let registry = SchemaRegistry::new();
        // Technology, region and environment tokens must not read as
        // identifiers, or listing queries get misrouted to detail lookups
        for query in [
            "Show me all PON devices",
            "list FTTH gear in HOBO",
            "count UAT devices",
            "LTE coverage per region",
        ] {
            assert!(
                registry.extract_device_name(query).is_none(),
                "spurious identifier in {:?}",
                query
            );
        }
    }

    #[test]
    fn segmented_team_names_are_extracted() {
        let registry = SchemaRegistry::new();
        let (schema, name) = registry
            .extract_device_name("who is on FIBER_OPS today")
            .expect("team token");
        assert_eq!(schema.name, "team");
        assert_eq!(name, "FIBER_OPS");
    }

    #[test]
    fn consistency_checks_enums_and_patterns() {
        let registry = SchemaRegistry::new();
        let schema = registry.get("olt").unwrap();

        assert!(schema.is_consistent(&olt_record(json!({}))));
        assert!(!schema.is_consistent(&olt_record(json!({"region": "OSLO"}))));
        assert!(!schema.is_consistent(&olt_record(json!({"name": "not-an-olt"}))));
        assert!(!schema.is_consistent(&olt_record(json!({"service_count": -3}))));
        // Absent optional field is fine
        assert!(schema.is_consistent(&olt_record(json!({"esi": null}))));
    }

    #[test]
    fn accuracy_checks_cross_field_invariants() {
        let registry = SchemaRegistry::new();
        let schema = registry.get("olt").unwrap();

        assert!(schema.is_accurate(&olt_record(json!({}))));
        // complete_config without management breaks the invariant
        assert!(!schema.is_accurate(&olt_record(json!({"managed_by_inmanta": false}))));
        assert!(!schema.is_accurate(&olt_record(json!({"service_count": 0}))));
        // Incomplete config may look any way it likes
        assert!(schema.is_accurate(&olt_record(json!({
            "complete_config": false,
            "managed_by_inmanta": false,
            "service_count": 0,
        }))));
    }

    #[test]
    fn completeness_counts_required_fields() {
        let registry = SchemaRegistry::new();
        let schema = registry.get("olt").unwrap();

        assert_eq!(schema.completeness(&olt_record(json!({}))), 1.0);

        let mut partial = olt_record(json!({}));
        partial.fields.remove("bandwidth_gbps");
        partial.fields.remove("service_count");
        // 5 of 7 required fields remain
        let completeness = schema.completeness(&partial);
        assert!((completeness - 5.0 / 7.0).abs() < 1e-9);
    }
}
