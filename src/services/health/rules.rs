//! Built-in health rule definitions
//!
//! One rule per device kind. These definitions are the single authority for
//! scoring impacts, recommendation text and priorities; the engine only
//! interprets them.

use super::{
    ConditionSeverity, HealthRule, Predicate, RecommendationPriority, RuleCondition,
    RuleRecommendation, ScoringAdjustment,
};

fn condition(severity: ConditionSeverity, label: &str, predicate: Predicate) -> RuleCondition {
    RuleCondition { severity, label: label.to_string(), predicate }
}

fn adjustment(predicate: Predicate, impact: i32, reason: &str) -> ScoringAdjustment {
    ScoringAdjustment { predicate, impact, reason: reason.to_string() }
}

fn recommendation(
    predicate: Predicate,
    priority: RecommendationPriority,
    message: &str,
) -> RuleRecommendation {
    RuleRecommendation { predicate, message: message.to_string(), priority }
}

pub fn builtin_rules() -> Vec<HealthRule> {
    vec![olt_rule(), lag_rule(), mobile_modem_rule(), team_rule()]
}

fn olt_rule() -> HealthRule {
    let not_managed = Predicate::eq("managed_by_inmanta", false);
    let incomplete = Predicate::eq("complete_config", false);
    let no_services = Predicate::eq("service_count", 0);
    let low_services = Predicate::all(vec![
        Predicate::gt("service_count", 0),
        Predicate::lt("service_count", 50),
    ]);

    HealthRule {
        id: "H-OLT-001".to_string(),
        device_kind: "olt".to_string(),
        version: 1,
        keywords: vec![
            "olt".to_string(),
            "fiber".to_string(),
            "provisioning".to_string(),
            "inmanta".to_string(),
        ],
        conditions: vec![
            condition(ConditionSeverity::Critical, "no active services", no_services.clone()),
            condition(ConditionSeverity::Warning, "not under automated management", not_managed.clone()),
            condition(ConditionSeverity::Warning, "configuration incomplete", incomplete.clone()),
            condition(
                ConditionSeverity::Healthy,
                "fully managed with complete configuration",
                Predicate::all(vec![
                    Predicate::eq("managed_by_inmanta", true),
                    Predicate::eq("complete_config", true),
                    Predicate::ge("service_count", 50),
                ]),
            ),
        ],
        adjustments: vec![
            adjustment(no_services.clone(), -50, "No active services provisioned"),
            adjustment(not_managed.clone(), -30, "Not managed by Inmanta"),
            adjustment(incomplete.clone(), -40, "Device configuration is incomplete"),
            adjustment(low_services.clone(), -20, "Low service count"),
            adjustment(Predicate::ge("bandwidth_gbps", 100), 10, "High-capacity uplink"),
        ],
        recommendations: vec![
            recommendation(
                no_services,
                RecommendationPriority::High,
                "Verify provisioning: the device reports zero active services",
            ),
            recommendation(
                not_managed,
                RecommendationPriority::High,
                "Onboard the device into Inmanta configuration management",
            ),
            recommendation(
                incomplete,
                RecommendationPriority::Medium,
                "Push the remaining configuration to complete the device setup",
            ),
            recommendation(
                low_services,
                RecommendationPriority::Low,
                "Review subscriber allocation; utilization is below 50 services",
            ),
            recommendation(
                Predicate::lt("bandwidth_gbps", 100),
                RecommendationPriority::Low,
                "Consider an uplink upgrade before adding subscribers",
            ),
        ],
        summary_fields: vec![
            "name".to_string(),
            "region".to_string(),
            "environment".to_string(),
            "bandwidth_gbps".to_string(),
            "service_count".to_string(),
            "managed_by_inmanta".to_string(),
            "complete_config".to_string(),
        ],
    }
}

fn lag_rule() -> HealthRule {
    let missing_admin_key = Predicate::not(Predicate::exists("admin_key"));
    let missing_description = Predicate::not(Predicate::exists("description"));

    HealthRule {
        id: "H-LAG-001".to_string(),
        device_kind: "lag".to_string(),
        version: 1,
        keywords: vec!["lag".to_string(), "aggregation".to_string(), "lacp".to_string()],
        conditions: vec![
            condition(ConditionSeverity::Critical, "no LACP admin key", missing_admin_key.clone()),
            condition(ConditionSeverity::Warning, "undocumented purpose", missing_description.clone()),
        ],
        adjustments: vec![
            adjustment(missing_admin_key.clone(), -60, "LACP admin key is not set"),
            adjustment(missing_description.clone(), -10, "No description recorded"),
        ],
        recommendations: vec![
            recommendation(
                missing_admin_key,
                RecommendationPriority::High,
                "Set the 802.3ad admin key so member ports can negotiate",
            ),
            recommendation(
                missing_description,
                RecommendationPriority::Medium,
                "Document the LAG purpose in its description field",
            ),
        ],
        summary_fields: vec![
            "name".to_string(),
            "lag_id".to_string(),
            "description".to_string(),
            "admin_key".to_string(),
        ],
    }
}

fn mobile_modem_rule() -> HealthRule {
    let orphaned = Predicate::not(Predicate::exists("subscriber_id"));
    let legacy_hw = Predicate::eq("hardware_type", "LEGACY");

    HealthRule {
        id: "H-MODEM-001".to_string(),
        device_kind: "mobile_modem".to_string(),
        version: 1,
        keywords: vec!["modem".to_string(), "mobile".to_string(), "subscriber".to_string()],
        conditions: vec![
            condition(ConditionSeverity::Critical, "no subscriber attached", orphaned.clone()),
            condition(ConditionSeverity::Warning, "legacy hardware revision", legacy_hw.clone()),
        ],
        adjustments: vec![
            adjustment(orphaned.clone(), -60, "No subscriber attached to this modem"),
            adjustment(legacy_hw.clone(), -20, "Legacy hardware revision"),
        ],
        recommendations: vec![
            recommendation(
                orphaned,
                RecommendationPriority::High,
                "Reclaim or re-assign the modem; it has no subscriber",
            ),
            recommendation(
                legacy_hw,
                RecommendationPriority::Medium,
                "Schedule a hardware swap for the legacy revision",
            ),
        ],
        summary_fields: vec![
            "serial".to_string(),
            "hardware_type".to_string(),
            "subscriber_id".to_string(),
        ],
    }
}

fn team_rule() -> HealthRule {
    let unnamed = Predicate::not(Predicate::exists("name"));

    HealthRule {
        id: "H-TEAM-001".to_string(),
        device_kind: "team".to_string(),
        version: 1,
        keywords: vec!["team".to_string(), "operations".to_string()],
        conditions: vec![condition(ConditionSeverity::Warning, "missing team name", unnamed.clone())],
        adjustments: vec![adjustment(unnamed.clone(), -30, "Team record has no name")],
        recommendations: vec![recommendation(
            unnamed,
            RecommendationPriority::Medium,
            "Fill in the team name in the staffing directory",
        )],
        summary_fields: vec!["name".to_string(), "id".to_string()],
    }
}
