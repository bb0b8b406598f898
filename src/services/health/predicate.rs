//! Predicate grammar for health rules and schema invariants
//!
//! A small total expression language over one device record: equality,
//! ordered comparison, negation, conjunction and field-existence. No loops,
//! no I/O, no mutation. Missing fields evaluate to a distinguished absent
//! value and every comparison against absent is false, so evaluation never
//! fails.

use crate::models::DeviceRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Predicate {
    /// Field is present and non-null
    Exists { field: String },
    /// Compare a field against a literal
    Cmp { field: String, op: CompareOp, value: Value },
    Not { inner: Box<Predicate> },
    /// Conjunction; the empty conjunction is true
    All { preds: Vec<Predicate> },
}

impl Predicate {
    pub fn exists(field: &str) -> Self {
        Self::Exists { field: field.to_string() }
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::Cmp { field: field.to_string(), op: CompareOp::Eq, value: value.into() }
    }

    pub fn lt(field: &str, value: impl Into<Value>) -> Self {
        Self::Cmp { field: field.to_string(), op: CompareOp::Lt, value: value.into() }
    }

    pub fn le(field: &str, value: impl Into<Value>) -> Self {
        Self::Cmp { field: field.to_string(), op: CompareOp::Le, value: value.into() }
    }

    pub fn gt(field: &str, value: impl Into<Value>) -> Self {
        Self::Cmp { field: field.to_string(), op: CompareOp::Gt, value: value.into() }
    }

    pub fn ge(field: &str, value: impl Into<Value>) -> Self {
        Self::Cmp { field: field.to_string(), op: CompareOp::Ge, value: value.into() }
    }

    pub fn not(inner: Predicate) -> Self {
        Self::Not { inner: Box::new(inner) }
    }

    pub fn all(preds: Vec<Predicate>) -> Self {
        Self::All { preds }
    }

    /// Unconditionally true (the empty conjunction).
    pub fn always() -> Self {
        Self::All { preds: vec![] }
    }

    /// `antecedent => consequent`, expressed with negation and conjunction.
    pub fn implies(antecedent: Predicate, consequent: Predicate) -> Self {
        Self::not(Self::all(vec![antecedent, Self::not(consequent)]))
    }

    /// Total evaluation against one record.
    pub fn eval(&self, record: &DeviceRecord) -> bool {
        match self {
            Self::Exists { field } => record.has_field(field),
            Self::Cmp { field, op, value } => match record.fields.get(field) {
                None | Some(Value::Null) => false,
                Some(actual) => compare(actual, *op, value),
            },
            Self::Not { inner } => !inner.eval(record),
            Self::All { preds } => preds.iter().all(|p| p.eval(record)),
        }
    }

    /// Every field name this predicate reads.
    pub fn referenced_fields(&self, out: &mut Vec<String>) {
        match self {
            Self::Exists { field } | Self::Cmp { field, .. } => {
                if !out.contains(field) {
                    out.push(field.clone());
                }
            }
            Self::Not { inner } => inner.referenced_fields(out),
            Self::All { preds } => {
                for pred in preds {
                    pred.referenced_fields(out);
                }
            }
        }
    }
}

fn compare(actual: &Value, op: CompareOp, expected: &Value) -> bool {
    match op {
        CompareOp::Eq => actual == expected,
        _ => {
            // Ordered comparison is defined for numbers only
            let (Some(a), Some(b)) = (actual.as_f64(), expected.as_f64()) else {
                return false;
            };
            match op {
                CompareOp::Lt => a < b,
                CompareOp::Le => a <= b,
                CompareOp::Gt => a > b,
                CompareOp::Ge => a >= b,
                CompareOp::Eq => unreachable!(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> DeviceRecord {
        let Value::Object(fields) = json!({
            "name": "OLT17PROP01",
            "service_count": 120,
            "managed_by_inmanta": true,
            "complete_config": false,
        }) else {
            unreachable!()
        };
        DeviceRecord::new("olt", fields)
    }

    #[test]
    fn equality_and_ordering() {
        let record = record();
        assert!(Predicate::eq("name", "OLT17PROP01").eval(&record));
        assert!(Predicate::eq("managed_by_inmanta", true).eval(&record));
        assert!(Predicate::gt("service_count", 100).eval(&record));
        assert!(Predicate::ge("service_count", 120).eval(&record));
        assert!(!Predicate::lt("service_count", 120).eval(&record));
    }

    #[test]
    fn absent_fields_compare_false() {
        let record = record();
        assert!(!Predicate::eq("bandwidth_gbps", 100).eval(&record));
        assert!(!Predicate::gt("bandwidth_gbps", 0).eval(&record));
        assert!(!Predicate::exists("bandwidth_gbps").eval(&record));
        // Negation of an absent comparison is true by totality
        assert!(Predicate::not(Predicate::gt("bandwidth_gbps", 0)).eval(&record));
    }

    #[test]
    fn ordered_comparison_on_non_numbers_is_false() {
        let record = record();
        assert!(!Predicate::gt("name", 5).eval(&record));
    }

    #[test]
    fn conjunction_and_implication() {
        let record = record();
        assert!(Predicate::always().eval(&record));
        assert!(
            Predicate::all(vec![
                Predicate::exists("name"),
                Predicate::gt("service_count", 0),
            ])
            .eval(&record)
        );

        // complete_config => managed && service_count > 0
        let invariant = Predicate::implies(
            Predicate::eq("complete_config", true),
            Predicate::all(vec![
                Predicate::eq("managed_by_inmanta", true),
                Predicate::gt("service_count", 0),
            ]),
        );
        // complete_config is false here, so the implication holds vacuously
        assert!(invariant.eval(&record));
    }

    #[test]
    fn serde_roundtrip() {
        let pred = Predicate::all(vec![
            Predicate::eq("region", "HOBO"),
            Predicate::not(Predicate::lt("service_count", 50)),
        ]);
        let raw = serde_json::to_string(&pred).unwrap();
        let back: Predicate = serde_json::from_str(&raw).unwrap();
        assert_eq!(pred, back);
    }

    #[test]
    fn referenced_fields_are_collected_once() {
        let pred = Predicate::all(vec![
            Predicate::eq("region", "HOBO"),
            Predicate::exists("region"),
            Predicate::gt("service_count", 0),
        ]);
        let mut fields = Vec::new();
        pred.referenced_fields(&mut fields);
        assert_eq!(fields, vec!["region".to_string(), "service_count".to_string()]);
    }
}
