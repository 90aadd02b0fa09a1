//! Samples ANN queries against brute-force ground truth and triggers an
//! atomic rebuild when Recall@k drops below a configured threshold.

use std::collections::HashSet;

use crate::vector::{FlatVectorIndex, VectorIndex};

/// Result of one recall sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecallSample {
    pub recall_at_k: f32,
    pub k: usize,
}

/// Tracks a rolling window of recall samples and decides when the ANN index
/// needs to be rebuilt. Does not own the index itself: `sample` is handed
/// both the ANN results and ground truth for a query, and reports whether a
/// rebuild should fire.
pub struct RecallHealthMonitor {
    threshold: f32,
    window: usize,
    samples: Vec<f32>,
}

impl RecallHealthMonitor {
    pub fn new(threshold: f32, window: usize) -> Self {
        Self {
            threshold,
            window: window.max(1),
            samples: Vec::new(),
        }
    }

    /// Record one sampled query's ANN result set against ground truth
    /// (brute force over the same partition), returning the sample's
    /// recall@k and whether the rolling average has now dropped below the
    /// configured threshold.
    pub fn sample<A: VectorIndex>(
        &mut self,
        ann: &A,
        flat: &FlatVectorIndex,
        query: &[f32],
        k: usize,
    ) -> (RecallSample, bool) {
        let ann_hits: HashSet<_> = ann.search(query, k).into_iter().map(|(id, _)| id).collect();
        let truth_hits: HashSet<_> = flat.search(query, k).into_iter().map(|(id, _)| id).collect();

        let recall = if truth_hits.is_empty() {
            1.0
        } else {
            ann_hits.intersection(&truth_hits).count() as f32 / truth_hits.len() as f32
        };

        self.samples.push(recall);
        if self.samples.len() > self.window {
            self.samples.remove(0);
        }

        let rolling_avg = self.samples.iter().sum::<f32>() / self.samples.len() as f32;
        let should_rebuild = rolling_avg < self.threshold;

        (RecallSample { recall_at_k: recall, k }, should_rebuild)
    }

    pub fn rolling_average(&self) -> f32 {
        if self.samples.is_empty() {
            1.0
        } else {
            self.samples.iter().sum::<f32>() / self.samples.len() as f32
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}
