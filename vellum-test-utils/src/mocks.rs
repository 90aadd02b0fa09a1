//! Deterministic mock implementations of the `vellum-llm` provider traits.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use vellum_core::{EmbeddingVector, EngineError, EngineResult, LlmError};
use vellum_llm::{ContradictionDetector, RerankCandidate, RerankScore, Reranker, SummarizeConfig, Summarizer};

/// Deterministic embedding provider: hashes bytes into a fixed-dimension
/// vector and L2-normalizes it, so identical text always embeds identically
/// and similar text embeds nearby, without pulling in a real model.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    model_id: String,
    dimensions: i32,
}

impl MockEmbeddingProvider {
    pub fn new(model_id: impl Into<String>, dimensions: i32) -> Self {
        Self {
            model_id: model_id.into(),
            dimensions,
        }
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        let mut data = vec![0.0f32; self.dimensions as usize];
        for (i, byte) in text.bytes().enumerate() {
            let idx = i % self.dimensions as usize;
            data[idx] += (byte as f32) / 255.0;
        }
        let norm: f32 = data.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut data {
                *x /= norm;
            }
        }
        data
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new("mock-embed-v1", 128)
    }
}

#[async_trait]
impl vellum_llm::EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> EngineResult<EmbeddingVector> {
        Ok(EmbeddingVector::new(self.generate(text), self.model_id.clone()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> EngineResult<Vec<EmbeddingVector>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> i32 {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Truncating mock summarizer: joins turns and clips to the configured
/// token budget at a 4-bytes-per-token approximation. Good enough to
/// exercise the history-compression waterfall without a real model.
#[derive(Debug, Clone, Default)]
pub struct MockSummarizer {
    pub fail: bool,
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(&self, content: &str, config: &SummarizeConfig) -> EngineResult<String> {
        if self.fail {
            return Err(EngineError::Llm(LlmError::ProviderError {
                provider: "mock".to_string(),
                message: "summarization forced to fail".to_string(),
            }));
        }
        let budget_bytes = (config.max_tokens.max(0) as usize) * 4;
        if content.len() <= budget_bytes {
            return Ok(content.to_string());
        }
        let mut end = budget_bytes.min(content.len());
        while end > 0 && !content.is_char_boundary(end) {
            end -= 1;
        }
        Ok(format!("{}...", &content[..end]))
    }
}

/// Mock reranker that scores candidates by term overlap with the query,
/// giving deterministic, reasoning-free relevance ordering for tests.
#[derive(Debug, Clone, Default)]
pub struct MockReranker;

#[async_trait]
impl Reranker for MockReranker {
    async fn rerank(&self, query: &str, candidates: &[RerankCandidate]) -> EngineResult<Vec<RerankScore>> {
        let query_terms: std::collections::HashSet<String> =
            query.to_lowercase().split_whitespace().map(str::to_string).collect();
        Ok(candidates
            .iter()
            .map(|c| {
                let candidate_terms: std::collections::HashSet<String> =
                    c.content.to_lowercase().split_whitespace().map(str::to_string).collect();
                let overlap = query_terms.intersection(&candidate_terms).count() as f32;
                RerankScore {
                    id: c.id.clone(),
                    score: overlap,
                }
            })
            .collect())
    }
}

/// Mock contradiction detector that always reports a fixed verdict,
/// regardless of content. Useful for isolating the janitor's clustering and
/// resolution logic from contradiction detection itself.
pub struct MockContradictionDetector {
    verdict: AtomicBool,
}

impl MockContradictionDetector {
    pub fn always(verdict: bool) -> Self {
        Self {
            verdict: AtomicBool::new(verdict),
        }
    }
}

#[async_trait]
impl ContradictionDetector for MockContradictionDetector {
    async fn detect_contradiction(&self, _a: &str, _b: &str) -> EngineResult<bool> {
        Ok(self.verdict.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_llm::EmbeddingProvider;

    #[tokio::test]
    async fn embedding_provider_is_deterministic() {
        let provider = MockEmbeddingProvider::default();
        let a = provider.embed("hello world").await.unwrap();
        let b = provider.embed("hello world").await.unwrap();
        assert_eq!(a.data, b.data);
    }

    #[tokio::test]
    async fn summarizer_respects_token_budget() {
        let summarizer = MockSummarizer::new();
        let long = "word ".repeat(1000);
        let config = SummarizeConfig {
            max_tokens: 10,
            style: vellum_llm::SummarizeStyle::Brief,
        };
        let summary = summarizer.summarize(&long, &config).await.unwrap();
        assert!(summary.len() <= 44);
    }
}
