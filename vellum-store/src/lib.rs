//! Vellum Store - authoritative, per-user-partitioned memory storage with
//! keyword (BM25) and dense (vector) indexes.

mod bm25;
mod in_memory;
mod provider;
mod recall;
mod vector;

pub use bm25::{tokenize, Bm25Index};
pub use in_memory::InMemoryProvider;
pub use provider::{Bm25Hit, MemoryProvider, VectorHit};
pub use recall::{RecallHealthMonitor, RecallSample};
pub use vector::{FlatVectorIndex, HnswIndex, VectorIndex};
