//! Vellum Retrieval - hybrid BM25 + dense vector retrieval.
//!
//! Two stages: parallel candidate generation against a user's partition,
//! then Reciprocal Rank Fusion with recency/confidence/scope tie-breakers
//! and an optional cross-encoder rerank pass. Scope-aware: callers get
//! results visible at their starting scope, widened one step at a time
//! until `top_k` is satisfied or there's nowhere wider left to look.

mod fusion;
mod retriever;
mod rewrite;

pub use fusion::{apply_tie_breakers, reciprocal_rank_fuse, FusedCandidate, RetrievedMemory};
pub use retriever::{retrieve, RetrievalRequest};
pub use rewrite::rewrite_query_for_bm25;
