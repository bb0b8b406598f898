//! Health rule engine
//!
//! Declarative per-device-kind rules: severity conditions, signed scoring
//! adjustments and prioritized recommendations, all written in the predicate
//! grammar. The engine looks the rule up through the vector store and applies
//! it deterministically.

pub mod engine;
pub mod predicate;
pub mod rules;


pub use engine::HealthRuleEngine;
pub use predicate::{CompareOp, Predicate};
pub use rules::builtin_rules;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============================================================================
// Rule definition
// ============================================================================

/// Severity class of a rule condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConditionSeverity {
    Critical,
    Warning,
    Healthy,
}

/// A labelled condition inside one severity group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCondition {
    pub severity: ConditionSeverity,
    pub label: String,
    pub predicate: Predicate,
}

/// One signed scoring adjustment, applied when its predicate holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringAdjustment {
    pub predicate: Predicate,
    pub impact: i32,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecommendationPriority {
    High = 0,
    Medium = 1,
    Low = 2,
}

impl RecommendationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleRecommendation {
    pub predicate: Predicate,
    pub message: String,
    pub priority: RecommendationPriority,
}

/// A declarative health rule for one device kind. At most one rule exists
/// per (device_kind, version).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthRule {
    pub id: String,
    pub device_kind: String,
    pub version: u32,
    pub keywords: Vec<String>,
    pub conditions: Vec<RuleCondition>,
    pub adjustments: Vec<ScoringAdjustment>,
    pub recommendations: Vec<RuleRecommendation>,
    /// Record fields echoed into the report
    pub summary_fields: Vec<String>,
}

impl HealthRule {
    /// The phrase embedded for rule lookup. Matches the engine's query shape
    /// so the matching kind ranks first even under the fallback embedder.
    pub fn lookup_text(&self) -> String {
        format!("health analysis {} monitoring diagnostics", self.device_kind)
    }
}

// ============================================================================
// Evaluation result
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    /// Rule evaluation failed; the device could not be assessed
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "HEALTHY",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Status implied by a score alone, before condition overrides.
    pub fn from_score(score: i32) -> Self {
        if score >= 80 {
            Self::Healthy
        } else if score >= 50 {
            Self::Warning
        } else {
            Self::Critical
        }
    }
}

/// An adjustment that fired during evaluation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FiredAdjustment {
    pub impact: i32,
    pub reason: String,
}

/// A recommendation that fired during evaluation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FiredRecommendation {
    pub message: String,
    pub priority: RecommendationPriority,
}

/// The result of evaluating one device against its best-matching rule.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthReport {
    /// Clamped to [0, 100]
    pub score: i32,
    pub status: HealthStatus,
    pub rule_id: String,
    pub adjustments: Vec<FiredAdjustment>,
    pub recommendations: Vec<FiredRecommendation>,
    /// (field, rendered value) pairs named by the rule's summary list
    #[schema(value_type = Vec<Vec<String>>)]
    pub summary: Vec<(String, String)>,
}

impl HealthReport {
    /// Placeholder report for a device whose evaluation failed.
    pub fn unknown(note: &str) -> Self {
        Self {
            score: 0,
            status: HealthStatus::Unknown,
            rule_id: String::new(),
            adjustments: vec![],
            recommendations: vec![FiredRecommendation {
                message: format!("Health evaluation unavailable: {}", note),
                priority: RecommendationPriority::High,
            }],
            summary: vec![],
        }
    }
}
