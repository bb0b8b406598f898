//! Rule lookup and evaluation
//!
//! Rule definitions are embedded into the vector store at startup under
//! their lookup phrase; evaluation embeds the same phrase for the record's
//! kind, picks the highest-similarity rule and applies it. Application
//! itself is pure and synchronous, with no yield points.

use super::{
    ConditionSeverity, FiredAdjustment, FiredRecommendation, HealthReport, HealthRule,
    HealthStatus,
};
use crate::error::CoreError;
use crate::models::DeviceRecord;
use crate::services::embedding::EmbeddingService;
use crate::services::vector_store::{VectorKind, VectorMeta, VectorStore};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

const RULE_ID_PREFIX: &str = "rule:";
/// Similarities closer than this are a tie and fall through to version/id.
const SIMILARITY_TIE_EPS: f32 = 1e-6;

pub struct HealthRuleEngine {
    rules: HashMap<String, Arc<HealthRule>>,
    embedding: Arc<EmbeddingService>,
    vector_store: Arc<dyn VectorStore>,
}

impl HealthRuleEngine {
    /// Build the engine. Rejects duplicate (kind, version) pairs.
    pub fn new(
        rules: Vec<HealthRule>,
        embedding: Arc<EmbeddingService>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Result<Self, CoreError> {
        let mut seen: HashMap<(String, u32), String> = HashMap::new();
        let mut by_id = HashMap::new();

        for rule in rules {
            let key = (rule.device_kind.clone(), rule.version);
            if let Some(existing) = seen.get(&key) {
                return Err(CoreError::InvalidInput(format!(
                    "rules {} and {} both target ({}, v{})",
                    existing, rule.id, key.0, key.1
                )));
            }
            seen.insert(key, rule.id.clone());
            by_id.insert(rule.id.clone(), Arc::new(rule));
        }

        Ok(Self { rules: by_id, embedding, vector_store })
    }

    /// Embed and upsert every rule's lookup phrase. Called once at startup;
    /// idempotent because the vector store upsert is.
    pub async fn index_rules(&self) -> Result<usize, CoreError> {
        for rule in self.rules.values() {
            let embedding = self.embedding.embed(&rule.lookup_text()).await;
            self.vector_store
                .upsert(
                    &format!("{}{}", RULE_ID_PREFIX, rule.id),
                    embedding.vector,
                    VectorMeta {
                        record_kind: VectorKind::HealthRule,
                        doc_kind: None,
                        keywords: rule.keywords.clone(),
                        usefulness: 1.0,
                        embedder_id: Some(embedding.embedder_id),
                    },
                )
                .await?;
        }
        tracing::info!("Indexed {} health rules", self.rules.len());
        Ok(self.rules.len())
    }

    /// Evaluate one device against the best-matching rule.
    pub async fn evaluate(&self, record: &DeviceRecord) -> Result<HealthReport, CoreError> {
        let query = format!("health analysis {} monitoring diagnostics", record.schema_name);
        let embedding = self.embedding.embed(&query).await;

        let hits = self
            .vector_store
            .search(&embedding.vector, 16, -1.0, Some(VectorKind::HealthRule))
            .await?;

        let mut best: Option<(f32, Arc<HealthRule>)> = None;
        for hit in hits {
            let Some(rule_id) = hit.id.strip_prefix(RULE_ID_PREFIX) else {
                continue;
            };
            let Some(rule) = self.rules.get(rule_id) else {
                tracing::warn!("Vector store knows rule {} but the engine does not", rule_id);
                continue;
            };

            best = match best {
                None => Some((hit.similarity, Arc::clone(rule))),
                Some((best_sim, best_rule)) => {
                    if hit.similarity > best_sim + SIMILARITY_TIE_EPS {
                        Some((hit.similarity, Arc::clone(rule)))
                    } else if (hit.similarity - best_sim).abs() <= SIMILARITY_TIE_EPS {
                        // Tie: higher version wins, then lexicographic id
                        let candidate_wins = rule.version > best_rule.version
                            || (rule.version == best_rule.version && rule.id < best_rule.id);
                        if candidate_wins {
                            Some((best_sim, Arc::clone(rule)))
                        } else {
                            Some((best_sim, best_rule))
                        }
                    } else {
                        Some((best_sim, best_rule))
                    }
                }
            };
        }

        let (_, rule) = best.ok_or_else(|| {
            CoreError::Internal("no health rules are registered in the vector store".to_string())
        })?;

        Ok(Self::apply(&rule, record))
    }

    /// Pure application of one rule to one record.
    pub fn apply(rule: &HealthRule, record: &DeviceRecord) -> HealthReport {
        let mut score: i32 = 100;
        let mut fired = Vec::new();
        for adjustment in &rule.adjustments {
            if adjustment.predicate.eval(record) {
                score = score.saturating_add(adjustment.impact);
                fired.push(FiredAdjustment {
                    impact: adjustment.impact,
                    reason: adjustment.reason.clone(),
                });
            }
        }
        let score = score.clamp(0, 100);

        let mut status = HealthStatus::from_score(score);
        let critical_holds = rule
            .conditions
            .iter()
            .any(|c| c.severity == ConditionSeverity::Critical && c.predicate.eval(record));
        let warning_holds = rule
            .conditions
            .iter()
            .any(|c| c.severity == ConditionSeverity::Warning && c.predicate.eval(record));

        if critical_holds {
            status = HealthStatus::Critical;
        } else if warning_holds && status == HealthStatus::Healthy {
            status = HealthStatus::Warning;
        }

        let mut recommendations: Vec<FiredRecommendation> = rule
            .recommendations
            .iter()
            .filter(|r| r.predicate.eval(record))
            .map(|r| FiredRecommendation { message: r.message.clone(), priority: r.priority })
            .collect();
        // Stable sort keeps declaration order inside each priority block
        recommendations.sort_by_key(|r| r.priority);

        let summary = rule
            .summary_fields
            .iter()
            .map(|field| (field.clone(), render_field(record.fields.get(field))))
            .collect();

        HealthReport {
            score,
            status,
            rule_id: rule.id.clone(),
            adjustments: fired,
            recommendations,
            summary,
        }
    }
}

fn render_field(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
