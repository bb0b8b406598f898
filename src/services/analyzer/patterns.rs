//! Deterministic pattern scoring for query analysis
//!
//! Two tallies are kept per query: which tool fits (list / detail / complex)
//! and which analysis type fits. The same cues feed both with different
//! weights; tool-name mentions inside retrieved documents contribute at half
//! the weight of a query cue.

use crate::services::schema_registry::SchemaRegistry;

/// The three tool buckets the analyzer scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolBucket {
    List,
    Detail,
    Complex,
}

impl ToolBucket {
    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::List => "list_network_devices",
            Self::Detail => "get_device_details",
            Self::Complex => "analyze_network_impact",
        }
    }
}

/// A tally over the three buckets. `argmax` breaks ties by the priority
/// order list > detail > complex.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tally {
    pub list: f64,
    pub detail: f64,
    pub complex: f64,
}

impl Tally {
    pub fn add(&mut self, bucket: ToolBucket, weight: f64) {
        match bucket {
            ToolBucket::List => self.list += weight,
            ToolBucket::Detail => self.detail += weight,
            ToolBucket::Complex => self.complex += weight,
        }
    }

    pub fn total(&self) -> f64 {
        self.list + self.detail + self.complex
    }

    /// Winning bucket and its margin over the runner-up. Exact ties resolve
    /// by the priority order list > detail > complex.
    pub fn argmax(&self) -> (ToolBucket, f64) {
        let ordered = [
            (ToolBucket::List, self.list),
            (ToolBucket::Detail, self.detail),
            (ToolBucket::Complex, self.complex),
        ];
        let mut winner = ordered[0];
        for candidate in &ordered[1..] {
            if candidate.1 > winner.1 {
                winner = *candidate;
            }
        }
        let runner_up = ordered
            .iter()
            .filter(|(bucket, _)| *bucket != winner.0)
            .map(|(_, score)| *score)
            .fold(0.0f64, f64::max);
        (winner.0, winner.1 - runner_up)
    }
}

/// Everything the cue scan produced for one query.
#[derive(Debug, Clone, Default)]
pub struct QueryScores {
    pub tool: Tally,
    pub analysis: Tally,
    /// At least one strong cue matched
    pub strong_cue: bool,
    /// Terms that contributed, for the guidance record
    pub terms: Vec<String>,
}

struct Cue {
    phrase: &'static str,
    bucket: ToolBucket,
    tool_weight: f64,
    analysis_weight: f64,
    strong: bool,
}

const CUES: &[Cue] = &[
    // Listing cues
    Cue { phrase: "how many", bucket: ToolBucket::List, tool_weight: 3.0, analysis_weight: 3.0, strong: true },
    Cue { phrase: "list", bucket: ToolBucket::List, tool_weight: 3.0, analysis_weight: 3.0, strong: true },
    Cue { phrase: "count", bucket: ToolBucket::List, tool_weight: 2.0, analysis_weight: 2.0, strong: false },
    Cue { phrase: "inventory", bucket: ToolBucket::List, tool_weight: 2.0, analysis_weight: 2.0, strong: false },
    Cue { phrase: "overview", bucket: ToolBucket::List, tool_weight: 1.0, analysis_weight: 1.0, strong: false },
    Cue { phrase: "all devices", bucket: ToolBucket::List, tool_weight: 2.0, analysis_weight: 2.0, strong: false },
    // Detail cues
    Cue { phrase: "configuration", bucket: ToolBucket::Detail, tool_weight: 2.0, analysis_weight: 2.0, strong: false },
    Cue { phrase: "details", bucket: ToolBucket::Detail, tool_weight: 2.0, analysis_weight: 2.0, strong: false },
    Cue { phrase: "status of", bucket: ToolBucket::Detail, tool_weight: 1.0, analysis_weight: 1.0, strong: false },
    // Complex-analysis cues
    Cue { phrase: "impact", bucket: ToolBucket::Complex, tool_weight: 3.0, analysis_weight: 3.0, strong: true },
    Cue { phrase: "depends on", bucket: ToolBucket::Complex, tool_weight: 3.0, analysis_weight: 3.0, strong: true },
    Cue { phrase: "dependency", bucket: ToolBucket::Complex, tool_weight: 2.0, analysis_weight: 2.0, strong: false },
    Cue { phrase: "what happens if", bucket: ToolBucket::Complex, tool_weight: 3.0, analysis_weight: 3.0, strong: true },
    Cue { phrase: "path from", bucket: ToolBucket::Complex, tool_weight: 3.0, analysis_weight: 3.0, strong: true },
    Cue { phrase: "affect", bucket: ToolBucket::Complex, tool_weight: 2.0, analysis_weight: 2.0, strong: false },
    Cue { phrase: "fail", bucket: ToolBucket::Complex, tool_weight: 2.0, analysis_weight: 2.0, strong: false },
    Cue { phrase: "root cause", bucket: ToolBucket::Complex, tool_weight: 2.0, analysis_weight: 2.0, strong: false },
];

/// Regional markers lean towards listings (fleet slices per region).
const REGION_MARKERS: &[&str] = &["hobo", "gent", "roes", "asse"];

/// Plural device nouns lean towards listings.
const PLURAL_DEVICE_NOUNS: &[&str] = &["olts", "lags", "modems", "teams", "devices"];

/// Scan the query for cues. Pure function.
pub fn score_query(query: &str, registry: &SchemaRegistry) -> QueryScores {
    let lowered = query.to_lowercase();
    let mut scores = QueryScores::default();

    for cue in CUES {
        if lowered.contains(cue.phrase) {
            scores.tool.add(cue.bucket, cue.tool_weight);
            scores.analysis.add(cue.bucket, cue.analysis_weight);
            scores.strong_cue |= cue.strong;
            scores.terms.push(cue.phrase.to_string());
        }
    }

    for marker in REGION_MARKERS {
        if lowered.contains(marker) {
            scores.tool.add(ToolBucket::List, 2.0);
            scores.analysis.add(ToolBucket::List, 2.0);
            scores.terms.push(marker.to_string());
        }
    }

    for noun in PLURAL_DEVICE_NOUNS {
        if lowered.contains(noun) {
            scores.tool.add(ToolBucket::List, 2.0);
            scores.analysis.add(ToolBucket::List, 2.0);
            scores.terms.push(noun.to_string());
        }
    }

    // A concrete device identifier is the strongest detail signal
    if let Some((schema, name)) = registry.extract_device_name(query) {
        scores.tool.add(ToolBucket::Detail, 4.0);
        scores.analysis.add(ToolBucket::Detail, 4.0);
        scores.strong_cue = true;
        scores.terms.push(name.to_string());
        scores.terms.push(schema.name.to_string());
    }

    scores
}

/// Count tool-name mentions in retrieved document text and fold them into
/// the tool tally at half weight.
pub fn score_document_mentions(tool: &mut Tally, text: &str) {
    let lowered = text.to_lowercase();
    for bucket in [ToolBucket::List, ToolBucket::Detail, ToolBucket::Complex] {
        let mentions = lowered.matches(bucket.tool_name()).count();
        if mentions > 0 {
            tool.add(bucket, 0.5 * mentions as f64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new()
    }

    #[test]
    fn counting_question_scores_listing() {
        let scores = score_query("How many FTTH OLTs are there?", &registry());
        let (bucket, margin) = scores.tool.argmax();
        assert_eq!(bucket, ToolBucket::List);
        assert!(margin >= 3.0);
        assert!(scores.strong_cue);
    }

    #[test]
    fn device_identifier_scores_detail() {
        let scores = score_query("Show me OLT17PROP01 configuration", &registry());
        let (bucket, _) = scores.tool.argmax();
        assert_eq!(bucket, ToolBucket::Detail);
        assert!(scores.terms.iter().any(|t| t == "OLT17PROP01"));
    }

    #[test]
    fn impact_question_scores_complex() {
        let scores = score_query("What happens if CINMECHA01 fails?", &registry());
        let (bucket, _) = scores.tool.argmax();
        assert_eq!(bucket, ToolBucket::Complex);
        assert!(scores.strong_cue);
    }

    #[test]
    fn empty_query_scores_nothing() {
        let scores = score_query("", &registry());
        assert_eq!(scores.tool.total(), 0.0);
        assert_eq!(scores.analysis.total(), 0.0);
        assert!(!scores.strong_cue);
    }

    #[test]
    fn exact_tie_resolves_by_priority_order() {
        let mut tally = Tally::default();
        tally.add(ToolBucket::Detail, 2.0);
        tally.add(ToolBucket::List, 2.0);
        let (bucket, margin) = tally.argmax();
        assert_eq!(bucket, ToolBucket::List);
        assert_eq!(margin, 0.0);
    }

    #[test]
    fn document_mentions_count_at_half_weight() {
        let mut tally = Tally::default();
        score_document_mentions(
            &mut tally,
            "Use list_network_devices for counting. list_network_devices accepts filters.",
        );
        assert_eq!(tally.list, 1.0);
        assert_eq!(tally.detail, 0.0);
    }

    #[test]
    fn uppercase_acronyms_do_not_score_detail() {
        let scores = score_query("Show me all PON devices", &registry());
        let (bucket, _) = scores.tool.argmax();
        assert_eq!(bucket, ToolBucket::List);
        assert_eq!(scores.tool.detail, 0.0);
        assert!(!scores.terms.iter().any(|t| t == "PON"));
    }

    #[test]
    fn region_markers_lean_listing() {
        let scores = score_query("Show me FTTH OLTs in HOBO region", &registry());
        let (bucket, _) = scores.tool.argmax();
        assert_eq!(bucket, ToolBucket::List);
    }
}
