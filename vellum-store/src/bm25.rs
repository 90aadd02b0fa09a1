//! Per-partition BM25 keyword index.
//!
//! Tokenizes on unicode word boundaries, lowercases, strips a small
//! stop-word set. Scoring is classic Okapi BM25.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use vellum_core::{Bm25Config, MemoryId};

static WORD_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").unwrap());

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "of", "in", "on",
        "at", "to", "for", "and", "or", "but", "with", "as", "by", "it", "this", "that", "from",
    ]
    .into_iter()
    .collect()
});

/// Split text into lowercased tokens, dropping stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    WORD_BOUNDARY
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|t| !STOP_WORDS.contains(t.as_str()))
        .collect()
}

#[derive(Debug, Clone, Default)]
struct Posting {
    /// document id -> term frequency
    docs: HashMap<MemoryId, u32>,
}

/// BM25 index over a single user's partition.
#[derive(Debug, Clone, Default)]
pub struct Bm25Index {
    postings: HashMap<String, Posting>,
    doc_lengths: HashMap<MemoryId, u32>,
    total_doc_length: u64,
}

impl Bm25Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn doc_count(&self) -> usize {
        self.doc_lengths.len()
    }

    fn avg_doc_len(&self) -> f32 {
        if self.doc_lengths.is_empty() {
            0.0
        } else {
            self.total_doc_length as f32 / self.doc_lengths.len() as f32
        }
    }

    /// Index (or re-index) a document's content under this identifier.
    pub fn index(&mut self, memory_id: MemoryId, content: &str) {
        self.remove(memory_id);
        let tokens = tokenize(content);
        let len = tokens.len() as u32;
        self.doc_lengths.insert(memory_id, len);
        self.total_doc_length += len as u64;

        let mut tf: HashMap<String, u32> = HashMap::new();
        for token in tokens {
            *tf.entry(token).or_insert(0) += 1;
        }
        for (token, freq) in tf {
            self.postings
                .entry(token)
                .or_default()
                .docs
                .insert(memory_id, freq);
        }
    }

    /// Remove a document from the index entirely.
    pub fn remove(&mut self, memory_id: MemoryId) {
        if let Some(len) = self.doc_lengths.remove(&memory_id) {
            self.total_doc_length = self.total_doc_length.saturating_sub(len as u64);
        }
        for posting in self.postings.values_mut() {
            posting.docs.remove(&memory_id);
        }
    }

    /// Rank every document that shares at least one query term, highest
    /// score first.
    pub fn search(&self, query: &str, config: Bm25Config) -> Vec<(MemoryId, f32)> {
        let query_tokens: Vec<String> = {
            let mut seen = HashSet::new();
            tokenize(query).into_iter().filter(|t| seen.insert(t.clone())).collect()
        };
        if query_tokens.is_empty() || self.doc_lengths.is_empty() {
            return Vec::new();
        }

        let n = self.doc_lengths.len() as f32;
        let avg_len = self.avg_doc_len();
        let mut scores: HashMap<MemoryId, f32> = HashMap::new();

        for token in &query_tokens {
            let Some(posting) = self.postings.get(token) else {
                continue;
            };
            let df = posting.docs.len() as f32;
            if df == 0.0 {
                continue;
            }
            // BM25 idf with the +1 floor so that terms present in every
            // document still contribute a small positive weight.
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for (&doc_id, &freq) in &posting.docs {
                let doc_len = *self.doc_lengths.get(&doc_id).unwrap_or(&0) as f32;
                let tf = freq as f32;
                let denom = tf + config.k1 * (1.0 - config.b + config.b * doc_len / avg_len.max(1.0));
                let term_score = idf * (tf * (config.k1 + 1.0)) / denom.max(1e-6);
                *scores.entry(doc_id).or_insert(0.0) += term_score;
            }
        }

        let mut results: Vec<(MemoryId, f32)> = scores.into_iter().collect();
        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_strips_stop_words() {
        let tokens = tokenize("The Quick Brown Fox is Fast");
        assert_eq!(tokens, vec!["quick", "brown", "fox", "fast"]);
    }

    #[test]
    fn search_ranks_by_term_overlap() {
        let mut index = Bm25Index::new();
        let m1 = MemoryId::now_v7();
        let m2 = MemoryId::now_v7();
        index.index(m1, "the team decided to use postgres for storage");
        index.index(m2, "unrelated note about lunch");

        let hits = index.search("postgres storage", Bm25Config { k1: 1.2, b: 0.75 });
        assert_eq!(hits[0].0, m1);
    }

    #[test]
    fn remove_drops_document_from_postings() {
        let mut index = Bm25Index::new();
        let m1 = MemoryId::now_v7();
        index.index(m1, "postgres storage decision");
        index.remove(m1);
        assert_eq!(index.doc_count(), 0);
        let hits = index.search("postgres", Bm25Config { k1: 1.2, b: 0.75 });
        assert!(hits.is_empty());
    }
}
