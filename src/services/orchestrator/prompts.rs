//! LLM prompt assembly
//!
//! The system instruction is fixed; the user content is assembled from the
//! query, the analyzer's reasoning, the structured data block, quality
//! banding and cited document snippets, bounded to a configurable character
//! budget.

use super::{QueryOutcome, StructuredResult};
use crate::models::Document;

pub const SYSTEM_INSTRUCTION: &str = "You are a network operations assistant for a fiber access \
fleet. Answer the operator's question using ONLY the structured device data, quality notes and \
documentation excerpts provided. Be concise and factual, reference device names exactly as \
given, and never invent devices, counts or configuration values. If the data is insufficient, \
say so explicitly.";

/// Maximum characters taken from one cited document body.
const SNIPPET_LEN: usize = 400;

/// Assemble the user-role content for the final LLM call.
pub fn build_user_content(
    outcome: &QueryOutcome,
    cited: &[Document],
    char_budget: usize,
) -> String {
    let mut sections: Vec<String> = Vec::new();

    sections.push(format!("## Question\n{}", outcome.query));
    sections.push(format!(
        "## Analysis guidance\n{} (analysis: {}, confidence: {})",
        outcome.guidance.reasoning,
        outcome.analysis_type.as_str(),
        outcome.guidance.confidence.as_str()
    ));

    sections.push(format!("## Structured data\n{}", render_structured(&outcome.result)));

    if !outcome.context.recommendations.is_empty() {
        sections.push(format!(
            "## Data quality\n{}",
            outcome.context.recommendations.join("\n")
        ));
    }

    if !outcome.context.schema_summary.is_empty() {
        sections.push(format!("## Schemas\n{}", outcome.context.schema_summary));
    }

    sections.push(format!("## Business context\n{}", outcome.context.business_context));

    if !cited.is_empty() {
        let snippets: Vec<String> = cited
            .iter()
            .map(|doc| {
                let body: String = doc.body.chars().take(SNIPPET_LEN).collect();
                format!("### {}\n{}", doc.title, body)
            })
            .collect();
        sections.push(format!("## Documentation excerpts\n{}", snippets.join("\n\n")));
    }

    let mut content = sections.join("\n\n");
    if content.len() > char_budget {
        // Truncate on a char boundary
        let mut cut = char_budget;
        while !content.is_char_boundary(cut) {
            cut -= 1;
        }
        content.truncate(cut);
        content.push_str("\n[context truncated]");
    }
    content
}

/// Plain-text rendering of the structured block for the LLM.
fn render_structured(result: &StructuredResult) -> String {
    match result {
        StructuredResult::Listing { schema_name, devices, region_counts } => {
            let mut lines = vec![format!(
                "{} {} device(s) matched",
                devices.len(),
                schema_name
            )];
            if !region_counts.is_empty() {
                let counts: Vec<String> = region_counts
                    .iter()
                    .map(|(region, count)| format!("{}: {}", region, count))
                    .collect();
                lines.push(format!("per region: {}", counts.join(", ")));
            }
            for assessment in devices {
                lines.push(format!(
                    "- {} [{} {}]",
                    assessment.record.display_name(),
                    assessment.health.status.as_str(),
                    assessment.health.score
                ));
            }
            lines.join("\n")
        }
        StructuredResult::Details { device } => {
            let mut lines = vec![format!(
                "{}: status {} score {}",
                device.record.display_name(),
                device.health.status.as_str(),
                device.health.score
            )];
            for (field, value) in &device.health.summary {
                lines.push(format!("- {}: {}", field, value));
            }
            for adjustment in &device.health.adjustments {
                lines.push(format!("- adjustment {:+}: {}", adjustment.impact, adjustment.reason));
            }
            lines.join("\n")
        }
        StructuredResult::Narrative { notes } => notes.join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::analyzer::{AnalysisType, Confidence, Guidance};
    use crate::services::context_builder::SchemaAwareContext;
    use chrono::Utc;
    use std::collections::HashMap;

    fn outcome() -> QueryOutcome {
        QueryOutcome {
            query: "how many olts".to_string(),
            guidance: Guidance {
                analysis_type: AnalysisType::DeviceListing,
                confidence: Confidence::High,
                tool_recommendation: Some("list_network_devices".to_string()),
                reasoning: "counting cues".to_string(),
                extracted_terms: vec![],
                cited_documents: vec![],
            },
            analysis_type: AnalysisType::DeviceListing,
            context: SchemaAwareContext {
                query: "how many olts".to_string(),
                schema_names: vec![],
                samples: HashMap::new(),
                schema_summary: String::new(),
                business_context: "fleet".to_string(),
                recommendations: vec![],
                failed_schemas: vec![],
                built_at: Utc::now(),
            },
            result: StructuredResult::Narrative { notes: vec!["note".to_string()] },
            llm_answer: None,
            llm_note: None,
            caveats: vec![],
            recommendations: vec![],
        }
    }

    #[test]
    fn content_respects_char_budget() {
        let mut outcome = outcome();
        outcome.result = StructuredResult::Narrative {
            notes: vec!["x".repeat(50_000)],
        };
        let content = build_user_content(&outcome, &[], 16_384);
        assert!(content.len() <= 16_384 + "\n[context truncated]".len());
        assert!(content.ends_with("[context truncated]"));
    }

    #[test]
    fn content_contains_query_and_guidance() {
        let outcome = outcome();
        let content = build_user_content(&outcome, &[], 16_384);
        assert!(content.contains("how many olts"));
        assert!(content.contains("counting cues"));
        assert!(content.contains("device_listing"));
    }
}
