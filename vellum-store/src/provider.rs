//! The `MemoryProvider` trait: authoritative per-user-partitioned storage
//! plus the BM25 and vector indexes that support hybrid retrieval.

use async_trait::async_trait;
use vellum_core::{EngineResult, Memory, MemoryFilter, MemoryId, MemoryPatch, UserId};

/// A single BM25 match: the memory identifier plus its raw BM25 score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Hit {
    pub memory_id: MemoryId,
    pub score: f32,
}

/// A single dense-vector match: the memory identifier plus cosine similarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorHit {
    pub memory_id: MemoryId,
    pub score: f32,
}

/// Authoritative store for memories. Every operation that takes an `owner`
/// enforces `memory.user_id == owner` before anything else; a mismatch and a
/// genuinely missing memory both surface as `StorageError::NotFound`.
#[async_trait]
pub trait MemoryProvider: Send + Sync {
    /// Validate, timestamp, assign an identifier, and register the memory in
    /// every index. Fails with `InvalidMemory` on bound violations and
    /// `CapacityExceeded` at configured per-user or global caps.
    async fn store(&self, memory: Memory) -> EngineResult<MemoryId>;

    /// Fetch a single memory, enforcing ownership. Returns `NotFound` both
    /// when the memory does not exist and when it exists but is owned by
    /// someone else.
    async fn get(&self, memory_id: MemoryId, owner: UserId) -> EngineResult<Memory>;

    /// BM25-ranked keyword search over the owner's partition only.
    async fn search_bm25(&self, owner: UserId, query: &str, limit: usize) -> EngineResult<Vec<Bm25Hit>>;

    /// Dense nearest-neighbour search over the owner's partition only.
    async fn search_vector(
        &self,
        owner: UserId,
        query_embedding: &[f32],
        limit: usize,
    ) -> EngineResult<Vec<VectorHit>>;

    /// Typed-filter search composed with the mandatory owner predicate.
    async fn search(&self, owner: UserId, filter: &MemoryFilter, limit: usize) -> EngineResult<Vec<Memory>>;

    /// Apply a patch. Bumps `extraction_version`. Fails if the memory is
    /// invalidated or not owned by `owner`.
    async fn update(&self, memory_id: MemoryId, owner: UserId, patch: MemoryPatch) -> EngineResult<Memory>;

    /// Idempotent soft-delete: sets `validity = Invalidated`, keeps the
    /// memory retrievable via `get_provenance` but excludes it from search.
    async fn invalidate(&self, memory_id: MemoryId, owner: UserId, reason: &str) -> EngineResult<()>;

    /// Hard delete. Provenance is retained by the caller (the provider does
    /// not own the provenance store) in a tombstone bounded by the audit cap.
    async fn delete(&self, memory_id: MemoryId, owner: UserId) -> EngineResult<()>;

    /// Total number of live memories across all users, for capacity checks
    /// and test assertions.
    async fn total_count(&self) -> usize;
}
