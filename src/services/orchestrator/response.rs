//! Markdown rendering of a query outcome
//!
//! One formatter for the tool surface: title, query, analysis type and
//! confidence, data context, structured result, the LLM prose (or its
//! deterministic fallback) and optional recommendations.

use super::{QueryOutcome, StructuredResult};

pub fn render_markdown(outcome: &QueryOutcome, include_recommendations: bool) -> String {
    let mut out = String::new();

    out.push_str("# Network Fleet Query\n\n");
    out.push_str(&format!("**Query:** {}\n\n", outcome.query));
    out.push_str(&format!(
        "**Analysis:** {} (confidence: {})\n\n",
        outcome.analysis_type.as_str(),
        outcome.guidance.confidence.as_str()
    ));

    if !outcome.caveats.is_empty() {
        out.push_str("## Caveats\n\n");
        for caveat in &outcome.caveats {
            out.push_str(&format!("> ⚠️ {}\n", caveat));
        }
        out.push('\n');
    }

    out.push_str("## Data Context\n\n");
    if outcome.context.recommendations.is_empty() {
        out.push_str("No live data samples were taken for this query.\n\n");
    } else {
        for line in &outcome.context.recommendations {
            out.push_str(&format!("- {}\n", line));
        }
        out.push('\n');
    }

    out.push_str("## Result\n\n");
    out.push_str(&render_result(&outcome.result));
    out.push('\n');

    out.push_str("## Answer\n\n");
    match &outcome.llm_answer {
        Some(answer) => {
            out.push_str(answer);
            out.push('\n');
        }
        None => {
            out.push_str(&fallback_answer(outcome));
            out.push('\n');
        }
    }
    if let Some(note) = &outcome.llm_note {
        out.push_str(&format!("\n_{}_\n", note));
    }

    if include_recommendations && !outcome.recommendations.is_empty() {
        out.push_str("\n## Recommendations\n\n");
        for recommendation in &outcome.recommendations {
            out.push_str(&format!("- {}\n", recommendation));
        }
    }

    out
}

fn render_result(result: &StructuredResult) -> String {
    match result {
        StructuredResult::Listing { schema_name, devices, region_counts } => {
            let mut out = format!("**Total:** {} {} device(s)\n\n", devices.len(), schema_name);
            if !region_counts.is_empty() {
                out.push_str("**Per region:**\n");
                for (region, count) in region_counts {
                    out.push_str(&format!("- {}: {}\n", region, count));
                }
                out.push('\n');
            }
            if !devices.is_empty() {
                out.push_str("| Device | Status | Score |\n|---|---|---|\n");
                for assessment in devices {
                    out.push_str(&format!(
                        "| {} | {} | {} |\n",
                        assessment.record.display_name(),
                        assessment.health.status.as_str(),
                        assessment.health.score
                    ));
                }
            }
            out
        }
        StructuredResult::Details { device } => {
            let mut out = format!(
                "**{}** — health: {} (score {})\n\n",
                device.record.display_name(),
                device.health.status.as_str(),
                device.health.score
            );
            for (field, value) in &device.health.summary {
                out.push_str(&format!("- **{}**: {}\n", field, value));
            }
            if !device.health.adjustments.is_empty() {
                out.push_str("\n**Scoring adjustments:**\n");
                for adjustment in &device.health.adjustments {
                    out.push_str(&format!("- {:+}: {}\n", adjustment.impact, adjustment.reason));
                }
            }
            out
        }
        StructuredResult::Narrative { notes } => {
            let mut out = String::new();
            for note in notes {
                out.push_str(&format!("- {}\n", note));
            }
            if notes.is_empty() {
                out.push_str("No structured data matched this query.\n");
            }
            out
        }
    }
}

/// Deterministic prose used when the LLM leg is unavailable. Summarizes the
/// structured result so the response stands on its own.
fn fallback_answer(outcome: &QueryOutcome) -> String {
    match &outcome.result {
        StructuredResult::Listing { schema_name, devices, region_counts } => {
            let healthy = devices
                .iter()
                .filter(|d| d.health.status == crate::services::health::HealthStatus::Healthy)
                .count();
            let critical = devices
                .iter()
                .filter(|d| d.health.status == crate::services::health::HealthStatus::Critical)
                .count();
            let regions: Vec<String> = region_counts
                .iter()
                .map(|(region, count)| format!("{} in {}", count, region))
                .collect();
            format!(
                "{} {} device(s) matched{}. {} healthy, {} critical.",
                devices.len(),
                schema_name,
                if regions.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", regions.join(", "))
                },
                healthy,
                critical
            )
        }
        StructuredResult::Details { device } => format!(
            "{} is {} with a health score of {}.",
            device.record.display_name(),
            device.health.status.as_str(),
            device.health.score
        ),
        StructuredResult::Narrative { notes } => {
            if notes.is_empty() {
                "No matching structured data was found for this query.".to_string()
            } else {
                notes.join(" ")
            }
        }
    }
}
