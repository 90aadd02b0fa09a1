//! Stage 2 of hybrid retrieval: merge BM25 and vector candidate lists with
//! Reciprocal Rank Fusion, then apply recency/confidence/scope tie-breakers.
//!
//! Kept as two free functions, independent of any I/O, so the scoring
//! weights can be unit tested without a store or an embedder in the loop.

use std::cmp::Ordering;
use std::collections::HashMap;

use vellum_core::{Memory, MemoryId, RankWeights, RrfConfig, Scope, Timestamp};
use vellum_store::{Bm25Hit, VectorHit};

/// One memory's position in the fused ranking, before tie-breaking. Carries
/// the per-source rank/score so callers can render them for debuggability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedCandidate {
    pub memory_id: MemoryId,
    pub fused_score: f32,
    pub bm25_rank: Option<usize>,
    pub bm25_score: Option<f32>,
    pub vector_rank: Option<usize>,
    pub vector_score: Option<f32>,
}

/// Merge two per-source top-N lists by Reciprocal Rank Fusion:
/// `score(d) = Σ w_i / (k + rank_i(d))`, rank 0-based. Sorted descending by
/// fused score; ties broken by memory id for determinism.
pub fn reciprocal_rank_fuse(bm25: &[Bm25Hit], vector: &[VectorHit], rrf: &RrfConfig) -> Vec<FusedCandidate> {
    let mut merged: HashMap<MemoryId, FusedCandidate> = HashMap::new();

    for (rank, hit) in bm25.iter().enumerate() {
        let entry = merged.entry(hit.memory_id).or_insert(FusedCandidate {
            memory_id: hit.memory_id,
            fused_score: 0.0,
            bm25_rank: None,
            bm25_score: None,
            vector_rank: None,
            vector_score: None,
        });
        entry.fused_score += rrf.weight_bm25 / (rrf.k + rank as f32);
        entry.bm25_rank = Some(rank);
        entry.bm25_score = Some(hit.score);
    }

    for (rank, hit) in vector.iter().enumerate() {
        let entry = merged.entry(hit.memory_id).or_insert(FusedCandidate {
            memory_id: hit.memory_id,
            fused_score: 0.0,
            bm25_rank: None,
            bm25_score: None,
            vector_rank: None,
            vector_score: None,
        });
        entry.fused_score += rrf.weight_vector / (rrf.k + rank as f32);
        entry.vector_rank = Some(rank);
        entry.vector_score = Some(hit.score);
    }

    let mut results: Vec<FusedCandidate> = merged.into_values().collect();
    results.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.memory_id.cmp(&b.memory_id))
    });
    results
}

/// A fused candidate joined against its memory, with the final tie-broken
/// score attached.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedMemory {
    pub memory: Memory,
    pub final_score: f32,
    pub bm25_rank: Option<usize>,
    pub bm25_score: Option<f32>,
    pub vector_rank: Option<usize>,
    pub vector_score: Option<f32>,
}

/// Scope preference used as a tie-breaker, narrowest-wins: a memory scoped
/// to the caller's own user is preferred over one shared at project, team,
/// or global scope when everything else is equal. `AgentPrivate` memories
/// should never reach retrieval under another agent's query, but rank last
/// here rather than panicking if one slips through.
fn scope_preference_rank(scope: Scope) -> u8 {
    match scope {
        Scope::User => 0,
        Scope::Project => 1,
        Scope::Team => 2,
        Scope::Global => 3,
        Scope::AgentPrivate => 4,
    }
}

/// Join fused candidates against their memories and compute the final
/// score: `similarity_weight * fused_score + recency_weight * decay +
/// confidence_weight * memory.confidence`, where `decay =
/// exp(-decay_lambda * days_since_access)`. Candidates missing from
/// `memories` (e.g. deleted between search and join) are dropped silently.
/// Ties in final score are broken by scope preference, then by
/// `last_access_at` descending.
pub fn apply_tie_breakers(
    candidates: Vec<FusedCandidate>,
    memories: &HashMap<MemoryId, Memory>,
    weights: &RankWeights,
    decay_lambda: f32,
    now: Timestamp,
) -> Vec<RetrievedMemory> {
    let mut results: Vec<RetrievedMemory> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let memory = memories.get(&candidate.memory_id)?.clone();
            let days_since_access = (now - memory.last_access_at).num_seconds().max(0) as f32 / 86_400.0;
            let decay = (-decay_lambda * days_since_access).exp();
            let final_score = weights.similarity * candidate.fused_score
                + weights.recency * decay
                + weights.confidence * memory.confidence;
            Some(RetrievedMemory {
                memory,
                final_score,
                bm25_rank: candidate.bm25_rank,
                bm25_score: candidate.bm25_score,
                vector_rank: candidate.vector_rank,
                vector_score: candidate.vector_score,
            })
        })
        .collect();

    results.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                scope_preference_rank(a.memory.scope).cmp(&scope_preference_rank(b.memory.scope))
            })
            .then_with(|| b.memory.last_access_at.cmp(&a.memory.last_access_at))
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vellum_core::{MemoryType, UserId, Validity};

    fn rrf() -> RrfConfig {
        RrfConfig {
            k: 60.0,
            weight_bm25: 1.0,
            weight_vector: 1.0,
        }
    }

    fn weights() -> RankWeights {
        RankWeights {
            similarity: 0.5,
            recency: 0.3,
            confidence: 0.2,
        }
    }

    fn sample_memory(id: MemoryId, confidence: f32, scope: Scope, last_access_at: Timestamp) -> Memory {
        Memory {
            id,
            user_id: UserId::now_v7(),
            project_id: None,
            tenant_id: None,
            content: "content".to_string(),
            memory_type: MemoryType::Fact,
            confidence,
            source: "conversation".to_string(),
            raw_source: String::new(),
            extraction_version: 1,
            created_at: last_access_at,
            last_access_at,
            expires_at: None,
            embedding: None,
            validity: Validity::Live,
            scope,
            metadata: serde_json::json!({}),
        }
    }

    #[test]
    fn item_in_both_lists_outranks_single_source_items() {
        let a = MemoryId::now_v7();
        let b = MemoryId::now_v7();
        let c = MemoryId::now_v7();

        let bm25 = vec![
            Bm25Hit { memory_id: a, score: 2.0 },
            Bm25Hit { memory_id: b, score: 1.5 },
        ];
        let vector = vec![
            VectorHit { memory_id: a, score: 0.9 },
            VectorHit { memory_id: c, score: 0.8 },
        ];

        let fused = reciprocal_rank_fuse(&bm25, &vector, &rrf());
        assert_eq!(fused[0].memory_id, a);
        assert!(fused[0].bm25_rank.is_some() && fused[0].vector_rank.is_some());
    }

    #[test]
    fn fusion_is_sorted_descending_and_total() {
        let a = MemoryId::now_v7();
        let b = MemoryId::now_v7();
        let bm25 = vec![Bm25Hit { memory_id: a, score: 3.0 }, Bm25Hit { memory_id: b, score: 1.0 }];
        let fused = reciprocal_rank_fuse(&bm25, &[], &rrf());
        assert_eq!(fused.len(), 2);
        assert!(fused[0].fused_score >= fused[1].fused_score);
    }

    #[test]
    fn tie_breakers_prefer_higher_confidence_at_equal_fused_score() {
        let now = Utc::now();
        let a = MemoryId::now_v7();
        let b = MemoryId::now_v7();
        let candidates = vec![
            FusedCandidate {
                memory_id: a,
                fused_score: 0.5,
                bm25_rank: Some(0),
                bm25_score: Some(1.0),
                vector_rank: None,
                vector_score: None,
            },
            FusedCandidate {
                memory_id: b,
                fused_score: 0.5,
                bm25_rank: Some(1),
                bm25_score: Some(0.9),
                vector_rank: None,
                vector_score: None,
            },
        ];
        let mut memories = HashMap::new();
        memories.insert(a, sample_memory(a, 0.9, Scope::User, now));
        memories.insert(b, sample_memory(b, 0.2, Scope::User, now));

        let ranked = apply_tie_breakers(candidates, &memories, &weights(), 0.05, now);
        assert_eq!(ranked[0].memory.id, a);
    }

    #[test]
    fn tie_breakers_prefer_narrower_scope_at_equal_score() {
        let now = Utc::now();
        let a = MemoryId::now_v7();
        let b = MemoryId::now_v7();
        let candidates = vec![
            FusedCandidate {
                memory_id: a,
                fused_score: 0.5,
                bm25_rank: Some(0),
                bm25_score: Some(1.0),
                vector_rank: None,
                vector_score: None,
            },
            FusedCandidate {
                memory_id: b,
                fused_score: 0.5,
                bm25_rank: Some(0),
                bm25_score: Some(1.0),
                vector_rank: None,
                vector_score: None,
            },
        ];
        let mut memories = HashMap::new();
        memories.insert(a, sample_memory(a, 0.5, Scope::Global, now));
        memories.insert(b, sample_memory(b, 0.5, Scope::User, now));

        let ranked = apply_tie_breakers(candidates, &memories, &weights(), 0.05, now);
        assert_eq!(ranked[0].memory.id, b);
    }

    #[test]
    fn older_last_access_decays_toward_zero() {
        let now = Utc::now();
        let recent = MemoryId::now_v7();
        let stale = MemoryId::now_v7();
        let candidates = vec![
            FusedCandidate {
                memory_id: recent,
                fused_score: 0.1,
                bm25_rank: Some(0),
                bm25_score: Some(1.0),
                vector_rank: None,
                vector_score: None,
            },
            FusedCandidate {
                memory_id: stale,
                fused_score: 0.1,
                bm25_rank: Some(0),
                bm25_score: Some(1.0),
                vector_rank: None,
                vector_score: None,
            },
        ];
        let mut memories = HashMap::new();
        memories.insert(recent, sample_memory(recent, 0.5, Scope::User, now));
        memories.insert(stale, sample_memory(stale, 0.5, Scope::User, now - chrono::Duration::days(365)));

        let ranked = apply_tie_breakers(candidates, &memories, &weights(), 0.05, now);
        assert_eq!(ranked[0].memory.id, recent);
    }

    #[test]
    fn candidate_missing_from_memory_map_is_dropped() {
        let now = Utc::now();
        let ghost = MemoryId::now_v7();
        let candidates = vec![FusedCandidate {
            memory_id: ghost,
            fused_score: 1.0,
            bm25_rank: Some(0),
            bm25_score: Some(1.0),
            vector_rank: None,
            vector_score: None,
        }];
        let ranked = apply_tie_breakers(candidates, &HashMap::new(), &weights(), 0.05, now);
        assert!(ranked.is_empty());
    }
}
