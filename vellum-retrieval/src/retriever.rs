//! Orchestrates the two-stage hybrid retrieval: parallel BM25 + dense
//! candidate generation, RRF fusion, scope-aware broadening, optional
//! cross-encoder rerank, and retrieval-provenance tracking.

use std::collections::HashMap;

use vellum_core::{EngineConfig, EngineResult, Memory, MemoryId, Scope, UserId};
use vellum_llm::{EmbeddingProvider, RerankCandidate, Reranker};
use vellum_provenance::ProvenanceStore;
use vellum_store::MemoryProvider;

use crate::fusion::{apply_tie_breakers, reciprocal_rank_fuse, RetrievedMemory};
use crate::rewrite::rewrite_query_for_bm25;

/// Top-N candidates considered per source before fusion, per spec.
const CANDIDATES_PER_SOURCE: usize = 50;

/// Everything `retrieve` needs beyond the query itself.
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub owner: UserId,
    pub query: String,
    pub starting_scope: Scope,
    pub top_k: usize,
}

/// Run hybrid retrieval for one query. Degrades rather than fails when a
/// single source errors: a BM25 failure still returns vector-only results
/// (and vice versa), logged at `warn`. Only a failure of both sources, or a
/// failure to fetch the fused candidates themselves, surfaces as an error.
pub async fn retrieve(
    store: &dyn MemoryProvider,
    embedder: &dyn EmbeddingProvider,
    reranker: Option<&dyn Reranker>,
    provenance: Option<&ProvenanceStore>,
    request: &RetrievalRequest,
    config: &EngineConfig,
) -> EngineResult<Vec<RetrievedMemory>> {
    let rewritten_query = rewrite_query_for_bm25(&request.query);

    let bm25_hits = match store.search_bm25(request.owner, &rewritten_query, CANDIDATES_PER_SOURCE).await {
        Ok(hits) => hits,
        Err(err) => {
            tracing::warn!(error = %err, "bm25 search failed, continuing with vector results only");
            Vec::new()
        }
    };

    let vector_hits = match embed_and_search(store, embedder, request.owner, &request.query).await {
        Ok(hits) => hits,
        Err(err) => {
            tracing::warn!(error = %err, "vector search failed, continuing with bm25 results only");
            Vec::new()
        }
    };

    if bm25_hits.is_empty() && vector_hits.is_empty() {
        return Ok(Vec::new());
    }

    let fused = reciprocal_rank_fuse(&bm25_hits, &vector_hits, &config.rrf);
    let memories = fetch_candidates(store, request.owner, &fused).await;

    let ranked = broaden_until_satisfied(fused, &memories, request.starting_scope, request.top_k, config);

    let reranked = maybe_rerank(reranker, &request.query, ranked, config).await;

    let results: Vec<RetrievedMemory> = reranked.into_iter().take(request.top_k).collect();

    if let Some(provenance) = provenance {
        for result in &results {
            let score = result.final_score.clamp(0.0, 1.0);
            if let Err(err) = provenance.track_retrieval(
                result.memory.id,
                score,
                &request.owner.to_string(),
                chrono::Utc::now(),
            ) {
                tracing::warn!(error = %err, memory_id = %result.memory.id, "failed to record retrieval provenance");
            }
        }
    }

    Ok(results)
}

async fn embed_and_search(
    store: &dyn MemoryProvider,
    embedder: &dyn EmbeddingProvider,
    owner: UserId,
    query: &str,
) -> EngineResult<Vec<vellum_store::VectorHit>> {
    let embedding = embedder.embed(query).await?;
    store.search_vector(owner, &embedding.data, CANDIDATES_PER_SOURCE).await
}

async fn fetch_candidates(
    store: &dyn MemoryProvider,
    owner: UserId,
    fused: &[crate::fusion::FusedCandidate],
) -> HashMap<MemoryId, Memory> {
    let mut memories = HashMap::with_capacity(fused.len());
    for candidate in fused {
        match store.get(candidate.memory_id, owner).await {
            Ok(memory) => {
                memories.insert(candidate.memory_id, memory);
            }
            Err(err) => {
                tracing::warn!(error = %err, memory_id = %candidate.memory_id, "candidate vanished between search and fetch");
            }
        }
    }
    memories
}

/// Filter fused candidates to the visible scope set, widening one step at a
/// time while the result count is short of `top_k` and a wider scope still
/// exists. Re-filters the same fused/memory set on each step rather than
/// re-querying the store — the store-side search already returned every
/// in-budget candidate regardless of scope.
fn broaden_until_satisfied(
    fused: Vec<crate::fusion::FusedCandidate>,
    memories: &HashMap<MemoryId, Memory>,
    starting_scope: Scope,
    top_k: usize,
    config: &EngineConfig,
) -> Vec<RetrievedMemory> {
    let mut visible_scope = starting_scope;
    loop {
        let in_scope: Vec<_> = fused
            .iter()
            .filter(|c| {
                memories
                    .get(&c.memory_id)
                    .map(|m| visible_scope.can_read(m.scope))
                    .unwrap_or(false)
            })
            .copied()
            .collect();

        let ranked = apply_tie_breakers(
            in_scope,
            memories,
            &config.rank_weights,
            config.decay_lambda,
            chrono::Utc::now(),
        );

        if ranked.len() >= top_k {
            return ranked;
        }
        match visible_scope.broaden() {
            Some(wider) => visible_scope = wider,
            None => return ranked,
        }
    }
}

async fn maybe_rerank(
    reranker: Option<&dyn Reranker>,
    query: &str,
    ranked: Vec<RetrievedMemory>,
    config: &EngineConfig,
) -> Vec<RetrievedMemory> {
    let Some(reranker) = reranker else {
        return ranked;
    };
    if !config.rerank_enabled {
        return ranked;
    }

    let n = config.rerank_top_n.min(CANDIDATES_PER_SOURCE).min(ranked.len());
    let (head, tail) = ranked.split_at(n);
    let candidates: Vec<RerankCandidate> = head
        .iter()
        .map(|r| RerankCandidate {
            id: r.memory.id.to_string(),
            content: r.memory.content.clone(),
        })
        .collect();

    let scores = match reranker.rerank(query, &candidates).await {
        Ok(scores) => scores,
        Err(err) => {
            tracing::warn!(error = %err, "rerank failed, keeping fusion order");
            return ranked;
        }
    };

    let score_by_id: HashMap<String, f32> = scores.into_iter().map(|s| (s.id, s.score)).collect();
    let mut reordered: Vec<RetrievedMemory> = head.to_vec();
    reordered.sort_by(|a, b| {
        let sa = score_by_id.get(&a.memory.id.to_string()).copied().unwrap_or(f32::MIN);
        let sb = score_by_id.get(&b.memory.id.to_string()).copied().unwrap_or(f32::MIN);
        sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
    });
    reordered.extend_from_slice(tail);
    reordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Arc;
    use vellum_audit::AuditLogger;
    use vellum_core::{Bm25Config, CapacityConfig, MemoryType, Validity};
    use vellum_llm::MockEmbeddingProvider;
    use vellum_store::InMemoryProvider;

    fn capacity() -> CapacityConfig {
        CapacityConfig {
            max_memories_per_user: 1_000,
            max_memories_total: 10_000,
            max_provenance_history_per_memory: 100,
            max_audit_events: 1_000,
            agents: 100,
            sessions: 100,
            pools: 10,
            members_per_pool: 10,
            shared_per_pool: 100,
            handoffs: 100,
            pending_per_target: 10,
            review_queue_per_user: 10,
            review_queue_total: 100,
            review_history_total: 100,
        }
    }

    fn new_memory(owner: UserId, content: &str, scope: Scope) -> Memory {
        let now = Utc::now();
        Memory {
            id: MemoryId::now_v7(),
            user_id: owner,
            project_id: None,
            tenant_id: None,
            content: content.to_string(),
            memory_type: MemoryType::Fact,
            confidence: 0.8,
            source: "conversation".to_string(),
            raw_source: String::new(),
            extraction_version: 1,
            created_at: now,
            last_access_at: now,
            expires_at: None,
            embedding: None,
            validity: Validity::Live,
            scope,
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn returns_memories_matching_bm25_terms() {
        let store = InMemoryProvider::new(
            64 * 1024,
            64 * 1024,
            capacity(),
            Bm25Config { k1: 1.2, b: 0.75 },
        );
        let owner = UserId::now_v7();
        store.store(new_memory(owner, "the team uses postgres for storage", Scope::User)).await.unwrap();
        store.store(new_memory(owner, "unrelated note about lunch", Scope::User)).await.unwrap();

        let embedder = MockEmbeddingProvider::new("mock", 8);
        let config = EngineConfig::reference();
        let request = RetrievalRequest {
            owner,
            query: "postgres storage".to_string(),
            starting_scope: Scope::Global,
            top_k: 5,
        };

        let results = retrieve(&store, &embedder, None, None, &request, &config).await.unwrap();
        assert!(!results.is_empty());
        assert!(results[0].memory.content.contains("postgres"));
    }

    #[tokio::test]
    async fn scope_narrower_than_memory_excludes_it_until_broadened() {
        let store = InMemoryProvider::new(
            64 * 1024,
            64 * 1024,
            capacity(),
            Bm25Config { k1: 1.2, b: 0.75 },
        );
        let owner = UserId::now_v7();
        store.store(new_memory(owner, "project wide decision about postgres", Scope::Project)).await.unwrap();

        let embedder = MockEmbeddingProvider::new("mock", 8);
        let config = EngineConfig::reference();

        let narrow_request = RetrievalRequest {
            owner,
            query: "postgres decision".to_string(),
            starting_scope: Scope::AgentPrivate,
            top_k: 1,
        };
        let narrow_results = retrieve(&store, &embedder, None, None, &narrow_request, &config).await.unwrap();
        assert!(narrow_results.is_empty());

        let broad_request = RetrievalRequest {
            owner,
            query: "postgres decision".to_string(),
            starting_scope: Scope::Project,
            top_k: 1,
        };
        let broad_results = retrieve(&store, &embedder, None, None, &broad_request, &config).await.unwrap();
        assert_eq!(broad_results.len(), 1);
    }

    #[tokio::test]
    async fn empty_store_returns_no_results_without_error() {
        let store = InMemoryProvider::new(
            64 * 1024,
            64 * 1024,
            capacity(),
            Bm25Config { k1: 1.2, b: 0.75 },
        );
        let owner = UserId::now_v7();
        let embedder = MockEmbeddingProvider::new("mock", 8);
        let config = EngineConfig::reference();
        let request = RetrievalRequest {
            owner,
            query: "anything".to_string(),
            starting_scope: Scope::Global,
            top_k: 5,
        };

        let results = retrieve(&store, &embedder, None, None, &request, &config).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn records_retrieval_provenance_when_store_is_attached() {
        let store = InMemoryProvider::new(
            64 * 1024,
            64 * 1024,
            capacity(),
            Bm25Config { k1: 1.2, b: 0.75 },
        );
        let owner = UserId::now_v7();
        let memory_id = store
            .store(new_memory(owner, "we use kubernetes for deployment", Scope::User))
            .await
            .unwrap();

        let embedder = MockEmbeddingProvider::new("mock", 8);
        let config = EngineConfig::reference();
        let audit = Arc::new(AuditLogger::new(100));
        let provenance = ProvenanceStore::new(100, 10).with_audit_log(audit);
        let request = RetrievalRequest {
            owner,
            query: "kubernetes deployment".to_string(),
            starting_scope: Scope::Global,
            top_k: 5,
        };

        let results = retrieve(&store, &embedder, None, Some(&provenance), &request, &config)
            .await
            .unwrap();
        assert!(!results.is_empty());
        let history = provenance.get_provenance(memory_id);
        assert!(history.iter().any(|r| r.kind == vellum_core::ProvenanceEventKind::Retrieval));
    }

    struct FailingReranker;

    #[async_trait]
    impl Reranker for FailingReranker {
        async fn rerank(&self, _query: &str, _candidates: &[RerankCandidate]) -> EngineResult<Vec<vellum_llm::RerankScore>> {
            Err(vellum_core::EngineError::Llm(vellum_core::LlmError::ProviderError {
                provider: "fake".to_string(),
                message: "boom".to_string(),
            }))
        }
    }

    #[tokio::test]
    async fn rerank_failure_degrades_to_fusion_order() {
        let store = InMemoryProvider::new(
            64 * 1024,
            64 * 1024,
            capacity(),
            Bm25Config { k1: 1.2, b: 0.75 },
        );
        let owner = UserId::now_v7();
        store.store(new_memory(owner, "redis cache layer", Scope::User)).await.unwrap();
        store.store(new_memory(owner, "redis cluster configuration", Scope::User)).await.unwrap();

        let embedder = MockEmbeddingProvider::new("mock", 8);
        let mut config = EngineConfig::reference();
        config.rerank_enabled = true;
        let reranker = FailingReranker;
        let request = RetrievalRequest {
            owner,
            query: "redis".to_string(),
            starting_scope: Scope::Global,
            top_k: 5,
        };

        let results = retrieve(&store, &embedder, Some(&reranker), None, &request, &config)
            .await
            .unwrap();
        assert!(!results.is_empty());
    }
}
