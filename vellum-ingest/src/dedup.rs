//! Jaccard-similarity deduplication against existing memories of the same
//! type for the same user.

use std::collections::HashSet;

use vellum_core::{Memory, MemoryType};
use vellum_store::tokenize;

/// Jaccard similarity between the lowercased word-sets of two strings.
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    let set_a: HashSet<String> = tokenize(a).into_iter().collect();
    let set_b: HashSet<String> = tokenize(b).into_iter().collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Find the highest-similarity existing memory of the same type, if any
/// meets or exceeds `threshold`. `candidates` should already be filtered to
/// the same user and memory type by the caller.
pub fn most_similar(
    content: &str,
    memory_type: MemoryType,
    candidates: &[Memory],
    threshold: f32,
) -> Option<(Memory, f32)> {
    candidates
        .iter()
        .filter(|m| m.memory_type == memory_type && m.is_live())
        .map(|m| (m.clone(), jaccard_similarity(content, &m.content)))
        .filter(|(_, sim)| *sim >= threshold)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_sentences_score_one() {
        assert_eq!(jaccard_similarity("the team uses postgres", "the team uses postgres"), 1.0);
    }

    #[test]
    fn disjoint_sentences_score_zero() {
        assert_eq!(jaccard_similarity("alpha beta gamma", "delta epsilon zeta"), 0.0);
    }

    #[test]
    fn near_duplicate_scores_above_threshold() {
        let sim = jaccard_similarity(
            "the team decided to use postgres for storage",
            "the team decided to use postgres for the storage layer",
        );
        assert!(sim > 0.6, "expected high similarity, got {sim}");
    }
}
