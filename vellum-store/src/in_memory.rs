//! Reference `MemoryProvider` implementation: per-user partitions held in
//! memory, each with its own BM25 and vector index.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use vellum_core::{
    AuditEventKind, AuditOutcome, CapacityConfig, Bm25Config, EngineError, EngineResult, Memory,
    MemoryFilter, MemoryId, MemoryPatch, StorageError, UserId, Validity,
};
use vellum_audit::AuditLogger;

use crate::bm25::Bm25Index;
use crate::provider::{Bm25Hit, MemoryProvider, VectorHit};
use crate::vector::{HnswIndex, VectorIndex};

struct Partition {
    memories: HashMap<MemoryId, Memory>,
    bm25: Bm25Index,
    vectors: HnswIndex,
}

impl Partition {
    fn new() -> Self {
        Self {
            memories: HashMap::new(),
            bm25: Bm25Index::new(),
            vectors: HnswIndex::new(16, 64),
        }
    }

    fn live_count(&self) -> usize {
        self.memories.values().filter(|m| m.is_live()).count()
    }
}

/// In-memory reference provider. Intended for tests and local development;
/// production deployments plug in a `durable_local` or `external`
/// implementation of the same trait.
pub struct InMemoryProvider {
    max_content_bytes: usize,
    max_raw_source_bytes: usize,
    capacity: CapacityConfig,
    bm25_config: Bm25Config,
    partitions: RwLock<HashMap<UserId, Partition>>,
    audit: Option<Arc<AuditLogger>>,
}

impl InMemoryProvider {
    pub fn new(
        max_content_bytes: usize,
        max_raw_source_bytes: usize,
        capacity: CapacityConfig,
        bm25_config: Bm25Config,
    ) -> Self {
        Self {
            max_content_bytes,
            max_raw_source_bytes,
            capacity,
            bm25_config,
            partitions: RwLock::new(HashMap::new()),
            audit: None,
        }
    }

    pub fn with_audit_log(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    fn audit_event(&self, kind: AuditEventKind, actor: &str, resource: &str, action: &str, outcome: AuditOutcome) {
        if let Some(ref audit) = self.audit {
            audit.record(kind, actor, resource, action, outcome, serde_json::json!({}));
        }
    }
}

#[async_trait]
impl MemoryProvider for InMemoryProvider {
    async fn store(&self, mut memory: Memory) -> EngineResult<MemoryId> {
        if memory.content.len() > self.max_content_bytes {
            return Err(EngineError::Storage(StorageError::InvalidMemory {
                reason: format!(
                    "content is {} bytes, exceeds {}",
                    memory.content.len(),
                    self.max_content_bytes
                ),
            }));
        }
        if memory.raw_source.len() > self.max_raw_source_bytes {
            return Err(EngineError::Storage(StorageError::InvalidMemory {
                reason: format!(
                    "raw source is {} bytes, exceeds {}",
                    memory.raw_source.len(),
                    self.max_raw_source_bytes
                ),
            }));
        }
        if !(0.0..=1.0).contains(&memory.confidence) {
            return Err(EngineError::Storage(StorageError::InvalidMemory {
                reason: format!("confidence {} out of [0, 1]", memory.confidence),
            }));
        }
        if memory.created_at > memory.last_access_at {
            return Err(EngineError::Storage(StorageError::InvalidMemory {
                reason: "created_at must be <= last_access_at".to_string(),
            }));
        }
        if let Some(expires_at) = memory.expires_at {
            if expires_at <= memory.created_at {
                return Err(EngineError::Storage(StorageError::InvalidMemory {
                    reason: "expires_at must be after created_at".to_string(),
                }));
            }
        }

        let mut partitions = self.partitions.write().expect("store lock poisoned");
        let total_live: usize = partitions.values().map(Partition::live_count).sum();
        if total_live >= self.capacity.max_memories_total {
            self.audit_event(
                AuditEventKind::MemoryWrite,
                &memory.user_id.to_string(),
                &memory.id.to_string(),
                "store",
                AuditOutcome::Denied,
            );
            return Err(EngineError::Storage(StorageError::CapacityExceeded));
        }

        let partition = partitions.entry(memory.user_id).or_insert_with(Partition::new);
        if partition.live_count() >= self.capacity.max_memories_per_user {
            self.audit_event(
                AuditEventKind::MemoryWrite,
                &memory.user_id.to_string(),
                &memory.id.to_string(),
                "store",
                AuditOutcome::Denied,
            );
            return Err(EngineError::Storage(StorageError::CapacityExceeded));
        }

        if memory.id == MemoryId::nil() {
            memory.id = MemoryId::now_v7();
        }
        partition.bm25.index(memory.id, &memory.content);
        if let Some(ref embedding) = memory.embedding {
            partition.vectors.insert(memory.id, embedding.data.clone());
        }
        let memory_id = memory.id;
        let owner = memory.user_id;
        partition.memories.insert(memory_id, memory);

        self.audit_event(
            AuditEventKind::MemoryWrite,
            &owner.to_string(),
            &memory_id.to_string(),
            "store",
            AuditOutcome::Success,
        );
        Ok(memory_id)
    }

    async fn get(&self, memory_id: MemoryId, owner: UserId) -> EngineResult<Memory> {
        let partitions = self.partitions.read().expect("store lock poisoned");
        partitions
            .get(&owner)
            .and_then(|p| p.memories.get(&memory_id))
            .filter(|m| m.user_id == owner)
            .cloned()
            .ok_or(EngineError::Storage(StorageError::NotFound(memory_id)))
    }

    async fn search_bm25(&self, owner: UserId, query: &str, limit: usize) -> EngineResult<Vec<Bm25Hit>> {
        let partitions = self.partitions.read().expect("store lock poisoned");
        let Some(partition) = partitions.get(&owner) else {
            return Ok(Vec::new());
        };
        Ok(partition
            .bm25
            .search(query, self.bm25_config)
            .into_iter()
            .filter(|(id, _)| partition.memories.get(id).map(|m| m.is_live()).unwrap_or(false))
            .take(limit)
            .map(|(memory_id, score)| Bm25Hit { memory_id, score })
            .collect())
    }

    async fn search_vector(
        &self,
        owner: UserId,
        query_embedding: &[f32],
        limit: usize,
    ) -> EngineResult<Vec<VectorHit>> {
        let partitions = self.partitions.read().expect("store lock poisoned");
        let Some(partition) = partitions.get(&owner) else {
            return Ok(Vec::new());
        };
        Ok(partition
            .vectors
            .search(query_embedding, limit * 2)
            .into_iter()
            .filter(|(id, _)| partition.memories.get(id).map(|m| m.is_live()).unwrap_or(false))
            .take(limit)
            .map(|(memory_id, score)| VectorHit { memory_id, score })
            .collect())
    }

    async fn search(&self, owner: UserId, filter: &MemoryFilter, limit: usize) -> EngineResult<Vec<Memory>> {
        let partitions = self.partitions.read().expect("store lock poisoned");
        let Some(partition) = partitions.get(&owner) else {
            return Ok(Vec::new());
        };
        let mut results: Vec<Memory> = partition
            .memories
            .values()
            .filter(|m| m.user_id == owner && filter.matches(m))
            .cloned()
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        results.truncate(limit);
        Ok(results)
    }

    async fn update(&self, memory_id: MemoryId, owner: UserId, patch: MemoryPatch) -> EngineResult<Memory> {
        let mut partitions = self.partitions.write().expect("store lock poisoned");
        let partition = partitions
            .get_mut(&owner)
            .ok_or(EngineError::Storage(StorageError::NotFound(memory_id)))?;
        let memory = partition
            .memories
            .get_mut(&memory_id)
            .filter(|m| m.user_id == owner)
            .ok_or(EngineError::Storage(StorageError::NotFound(memory_id)))?;

        if !memory.is_live() {
            return Err(EngineError::Storage(StorageError::Invalidated(memory_id)));
        }

        if let Some(content) = patch.content {
            if content.len() > self.max_content_bytes {
                return Err(EngineError::Storage(StorageError::InvalidMemory {
                    reason: format!("content is {} bytes, exceeds {}", content.len(), self.max_content_bytes),
                }));
            }
            memory.content = content;
        }
        if let Some(confidence) = patch.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(EngineError::Storage(StorageError::InvalidMemory {
                    reason: format!("confidence {confidence} out of [0, 1]"),
                }));
            }
            memory.confidence = confidence;
        }
        if let Some(scope) = patch.scope {
            memory.scope = scope;
        }
        if let Some(metadata) = patch.metadata {
            memory.metadata = metadata;
        }
        memory.extraction_version += 1;

        let updated = memory.clone();
        partition.bm25.index(memory_id, &updated.content);

        self.audit_event(
            AuditEventKind::MemoryWrite,
            &owner.to_string(),
            &memory_id.to_string(),
            "update",
            AuditOutcome::Success,
        );
        Ok(updated)
    }

    async fn invalidate(&self, memory_id: MemoryId, owner: UserId, reason: &str) -> EngineResult<()> {
        let mut partitions = self.partitions.write().expect("store lock poisoned");
        let partition = partitions
            .get_mut(&owner)
            .ok_or(EngineError::Storage(StorageError::NotFound(memory_id)))?;
        let memory = partition
            .memories
            .get_mut(&memory_id)
            .filter(|m| m.user_id == owner)
            .ok_or(EngineError::Storage(StorageError::NotFound(memory_id)))?;

        // Idempotent: invalidating an already-invalid memory is a no-op success.
        memory.validity = Validity::Invalidated {
            reason: reason.to_string(),
        };

        self.audit_event(
            AuditEventKind::MemoryInvalidate,
            &owner.to_string(),
            &memory_id.to_string(),
            "invalidate",
            AuditOutcome::Success,
        );
        Ok(())
    }

    async fn delete(&self, memory_id: MemoryId, owner: UserId) -> EngineResult<()> {
        let mut partitions = self.partitions.write().expect("store lock poisoned");
        let partition = partitions
            .get_mut(&owner)
            .ok_or(EngineError::Storage(StorageError::NotFound(memory_id)))?;
        let existed = partition
            .memories
            .get(&memory_id)
            .filter(|m| m.user_id == owner)
            .is_some();
        if !existed {
            return Err(EngineError::Storage(StorageError::NotFound(memory_id)));
        }
        partition.memories.remove(&memory_id);
        partition.bm25.remove(memory_id);
        partition.vectors.remove(memory_id);

        self.audit_event(
            AuditEventKind::MemoryWrite,
            &owner.to_string(),
            &memory_id.to_string(),
            "delete",
            AuditOutcome::Success,
        );
        Ok(())
    }

    async fn total_count(&self) -> usize {
        let partitions = self.partitions.read().expect("store lock poisoned");
        partitions.values().map(Partition::live_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vellum_core::{MemoryType, Scope};

    fn provider() -> InMemoryProvider {
        InMemoryProvider::new(
            64 * 1024,
            64 * 1024,
            CapacityConfig {
                max_memories_per_user: 10,
                max_memories_total: 100,
                max_provenance_history_per_memory: 100,
                max_audit_events: 1000,
                agents: 100,
                sessions: 100,
                pools: 100,
                members_per_pool: 100,
                shared_per_pool: 100,
                handoffs: 100,
                pending_per_target: 10,
                review_queue_per_user: 10,
                review_queue_total: 100,
                review_history_total: 100,
            },
            Bm25Config { k1: 1.2, b: 0.75 },
        )
    }

    fn memory(user_id: UserId, content: &str) -> Memory {
        let now = Utc::now();
        Memory {
            id: MemoryId::nil(),
            user_id,
            project_id: None,
            tenant_id: None,
            content: content.to_string(),
            memory_type: MemoryType::Fact,
            confidence: 0.9,
            source: "manual".to_string(),
            raw_source: content.to_string(),
            extraction_version: 1,
            created_at: now,
            last_access_at: now,
            expires_at: None,
            embedding: None,
            validity: Validity::Live,
            scope: Scope::User,
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn store_then_get_round_trips() {
        let provider = provider();
        let user = UserId::now_v7();
        let id = provider.store(memory(user, "the team uses postgres")).await.unwrap();
        let fetched = provider.get(id, user).await.unwrap();
        assert_eq!(fetched.content, "the team uses postgres");
    }

    #[tokio::test]
    async fn get_with_wrong_owner_returns_not_found() {
        let provider = provider();
        let user = UserId::now_v7();
        let other = UserId::now_v7();
        let id = provider.store(memory(user, "secret")).await.unwrap();
        let result = provider.get(id, other).await;
        assert!(matches!(result, Err(EngineError::Storage(StorageError::NotFound(_)))));
    }

    #[tokio::test]
    async fn per_user_capacity_exceeded_returns_error() {
        let provider = provider();
        let user = UserId::now_v7();
        for i in 0..10 {
            provider.store(memory(user, &format!("fact {i}"))).await.unwrap();
        }
        let result = provider.store(memory(user, "one too many")).await;
        assert!(matches!(result, Err(EngineError::Storage(StorageError::CapacityExceeded))));
    }

    #[tokio::test]
    async fn invalidate_is_idempotent_and_excludes_from_search() {
        let provider = provider();
        let user = UserId::now_v7();
        let id = provider.store(memory(user, "decision to deprecate v1")).await.unwrap();
        provider.invalidate(id, user, "superseded").await.unwrap();
        provider.invalidate(id, user, "superseded again").await.unwrap();

        let hits = provider.search_bm25(user, "deprecate", 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn update_bumps_extraction_version() {
        let provider = provider();
        let user = UserId::now_v7();
        let id = provider.store(memory(user, "v1 content")).await.unwrap();
        let patch = MemoryPatch {
            content: Some("v2 content".to_string()),
            ..Default::default()
        };
        let updated = provider.update(id, user, patch).await.unwrap();
        assert_eq!(updated.extraction_version, 2);
        assert_eq!(updated.content, "v2 content");
    }

    #[tokio::test]
    async fn update_on_invalidated_memory_fails() {
        let provider = provider();
        let user = UserId::now_v7();
        let id = provider.store(memory(user, "content")).await.unwrap();
        provider.invalidate(id, user, "reason").await.unwrap();
        let result = provider.update(id, user, MemoryPatch::default()).await;
        assert!(matches!(result, Err(EngineError::Storage(StorageError::Invalidated(_)))));
    }

    #[tokio::test]
    async fn delete_removes_from_all_indexes() {
        let provider = provider();
        let user = UserId::now_v7();
        let id = provider.store(memory(user, "ephemeral note")).await.unwrap();
        provider.delete(id, user).await.unwrap();
        let result = provider.get(id, user).await;
        assert!(result.is_err());
    }
}
