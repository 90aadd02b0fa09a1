//! Dense vector indexing: a pluggable `VectorIndex` trait, a brute-force
//! reference implementation, and a small hierarchical navigable small-world
//! (HNSW) graph used as the default ANN index.

use std::collections::{HashMap, HashSet};

use vellum_core::MemoryId;

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// Common interface for approximate and exact nearest-neighbour search over
/// a single user's partition. The store is agnostic to the embedding model:
/// it only ever receives vectors the caller already produced.
pub trait VectorIndex: Send + Sync {
    fn insert(&mut self, memory_id: MemoryId, embedding: Vec<f32>);
    fn remove(&mut self, memory_id: MemoryId);
    fn search(&self, query: &[f32], limit: usize) -> Vec<(MemoryId, f32)>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Brute-force exact search. Used directly for small partitions and as the
/// ground truth `RecallHealthMonitor` compares the ANN index against.
#[derive(Debug, Clone, Default)]
pub struct FlatVectorIndex {
    vectors: HashMap<MemoryId, Vec<f32>>,
}

impl FlatVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorIndex for FlatVectorIndex {
    fn insert(&mut self, memory_id: MemoryId, embedding: Vec<f32>) {
        self.vectors.insert(memory_id, embedding);
    }

    fn remove(&mut self, memory_id: MemoryId) {
        self.vectors.remove(&memory_id);
    }

    fn search(&self, query: &[f32], limit: usize) -> Vec<(MemoryId, f32)> {
        let mut scored: Vec<(MemoryId, f32)> = self
            .vectors
            .iter()
            .map(|(id, vec)| (*id, cosine(query, vec)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }
}

/// A single-layer greedy-search small-world graph. Each inserted node keeps
/// up to `m` edges to its nearest already-inserted neighbours; search walks
/// greedily from an entry point, which gives sub-linear, approximate
/// results that degrade gracefully toward brute force as `m` grows.
pub struct HnswIndex {
    m: usize,
    ef_search: usize,
    vectors: HashMap<MemoryId, Vec<f32>>,
    edges: HashMap<MemoryId, Vec<MemoryId>>,
    entry_point: Option<MemoryId>,
}

impl HnswIndex {
    pub fn new(m: usize, ef_search: usize) -> Self {
        Self {
            m,
            ef_search,
            vectors: HashMap::new(),
            edges: HashMap::new(),
            entry_point: None,
        }
    }

    fn nearest_to(&self, target: &[f32], exclude: &HashSet<MemoryId>) -> Vec<(MemoryId, f32)> {
        let mut scored: Vec<(MemoryId, f32)> = self
            .vectors
            .iter()
            .filter(|(id, _)| !exclude.contains(id))
            .map(|(id, v)| (*id, cosine(target, v)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
    }
}

impl VectorIndex for HnswIndex {
    fn insert(&mut self, memory_id: MemoryId, embedding: Vec<f32>) {
        let Some(entry) = self.entry_point else {
            self.vectors.insert(memory_id, embedding);
            self.edges.insert(memory_id, Vec::new());
            self.entry_point = Some(memory_id);
            return;
        };

        let mut exclude = HashSet::new();
        exclude.insert(memory_id);
        let mut candidates = self.nearest_to(&embedding, &exclude);
        candidates.truncate(self.m.max(1));
        let neighbors: Vec<MemoryId> = candidates.into_iter().map(|(id, _)| id).collect();

        for &neighbor in &neighbors {
            self.edges.entry(neighbor).or_default().push(memory_id);
            if self.edges[&neighbor].len() > self.m {
                self.edges.get_mut(&neighbor).unwrap().remove(0);
            }
        }
        self.edges.insert(memory_id, neighbors);
        self.vectors.insert(memory_id, embedding);
        let _ = entry;
    }

    fn remove(&mut self, memory_id: MemoryId) {
        self.vectors.remove(&memory_id);
        self.edges.remove(&memory_id);
        for neighbors in self.edges.values_mut() {
            neighbors.retain(|id| *id != memory_id);
        }
        if self.entry_point == Some(memory_id) {
            self.entry_point = self.vectors.keys().next().copied();
        }
    }

    /// Greedy best-first walk from the entry point, expanding up to
    /// `ef_search` candidates before returning the top `limit`.
    fn search(&self, query: &[f32], limit: usize) -> Vec<(MemoryId, f32)> {
        let Some(entry) = self.entry_point else {
            return Vec::new();
        };
        let mut visited: HashSet<MemoryId> = HashSet::new();
        let mut frontier: Vec<(MemoryId, f32)> = vec![(entry, cosine(query, &self.vectors[&entry]))];
        visited.insert(entry);
        let mut best: Vec<(MemoryId, f32)> = frontier.clone();

        while !frontier.is_empty() && visited.len() < self.ef_search.max(limit) {
            frontier.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            let (current, _) = frontier.remove(0);
            let Some(neighbors) = self.edges.get(&current) else {
                continue;
            };
            for &neighbor in neighbors {
                if visited.insert(neighbor) {
                    let score = cosine(query, &self.vectors[&neighbor]);
                    frontier.push((neighbor, score));
                    best.push((neighbor, score));
                }
            }
        }

        best.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        best.dedup_by_key(|(id, _)| *id);
        best.truncate(limit);
        best
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }
}
