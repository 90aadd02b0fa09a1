//! The `Extractor` trait and a deterministic rule-based reference
//! implementation.
//!
//! A production deployment plugs in an LLM-backed extractor running at
//! temperature zero against a pinned prompt/model generation; that model is
//! out of scope here. What's in scope is the trait boundary and a stub
//! concrete enough to make the pipeline runnable end to end: sentence
//! splitting plus keyword tagging, same `extraction_version` every run.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use vellum_core::{MemoryType, UserId};

/// The version of whatever produced candidates below. Bumped whenever the
/// extraction logic (prompt, model, or in the reference case the keyword
/// tables) changes, so memories can be flagged for reprocessing.
pub const REFERENCE_EXTRACTION_VERSION: i32 = 1;

/// Raw material handed to an extractor: the conversational text plus the
/// user it belongs to. Kept around by the caller (not the extractor) so
/// reprocessing never needs to re-obtain the conversation.
#[derive(Debug, Clone)]
pub struct ExtractionInput {
    pub raw_text: String,
    pub user_id: UserId,
}

/// One candidate claim pulled out of the raw text, ready for the ingestion
/// pipeline's tier decision.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedCandidate {
    pub content: String,
    pub memory_type: MemoryType,
    pub confidence: f32,
}

/// Pluggable extraction backend. Implementations must be deterministic for
/// a given `extraction_version` — same input, same output — since the
/// engine relies on that to make reprocessing meaningful.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, input: &ExtractionInput) -> Vec<ExtractedCandidate>;

    /// The prompt/model generation this extractor implements.
    fn extraction_version(&self) -> i32;
}

static SENTENCE_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+\s+|[.!?]+$").unwrap());

const DECISION_MARKERS: &[&str] = &["decided", "we will", "we'll", "going with", "chose", "chosen"];
const PREFERENCE_MARKERS: &[&str] = &["prefer", "always use", "never use", "like to", "want to", "rather"];

/// Deterministic, rule-based stub. Splits raw text on sentence boundaries,
/// tags each sentence's `MemoryType` by keyword match (decision markers
/// beat preference markers beat the `Fact` default), and assigns a
/// confidence from how strong the match was. Sentences under 8 characters
/// are dropped as noise.
#[derive(Debug, Default)]
pub struct RuleBasedExtractor;

impl RuleBasedExtractor {
    pub fn new() -> Self {
        Self
    }

    fn classify(sentence: &str) -> (MemoryType, f32) {
        let lower = sentence.to_lowercase();
        if DECISION_MARKERS.iter().any(|m| lower.contains(m)) {
            (MemoryType::Decision, 0.75)
        } else if PREFERENCE_MARKERS.iter().any(|m| lower.contains(m)) {
            (MemoryType::Preference, 0.7)
        } else {
            (MemoryType::Fact, 0.5)
        }
    }
}

#[async_trait]
impl Extractor for RuleBasedExtractor {
    async fn extract(&self, input: &ExtractionInput) -> Vec<ExtractedCandidate> {
        SENTENCE_BOUNDARY
            .split(&input.raw_text)
            .map(str::trim)
            .filter(|s| s.len() >= 8)
            .map(|sentence| {
                let (memory_type, confidence) = Self::classify(sentence);
                ExtractedCandidate {
                    content: sentence.to_string(),
                    memory_type,
                    confidence,
                }
            })
            .collect()
    }

    fn extraction_version(&self) -> i32 {
        REFERENCE_EXTRACTION_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(text: &str) -> ExtractionInput {
        ExtractionInput {
            raw_text: text.to_string(),
            user_id: UserId::now_v7(),
        }
    }

    #[tokio::test]
    async fn splits_on_sentence_boundaries() {
        let extractor = RuleBasedExtractor::new();
        let candidates = extractor
            .extract(&input("We use Postgres for storage. The team decided to deprecate v1."))
            .await;
        assert_eq!(candidates.len(), 2);
    }

    #[tokio::test]
    async fn decision_marker_tags_decision_type() {
        let extractor = RuleBasedExtractor::new();
        let candidates = extractor.extract(&input("We decided to use Kubernetes for deployment.")).await;
        assert_eq!(candidates[0].memory_type, MemoryType::Decision);
    }

    #[tokio::test]
    async fn preference_marker_tags_preference_type() {
        let extractor = RuleBasedExtractor::new();
        let candidates = extractor.extract(&input("The team prefers tabs over spaces in this repo.")).await;
        assert_eq!(candidates[0].memory_type, MemoryType::Preference);
    }

    #[tokio::test]
    async fn unmatched_sentence_defaults_to_fact() {
        let extractor = RuleBasedExtractor::new();
        let candidates = extractor.extract(&input("The service runs on port 8080 in staging.")).await;
        assert_eq!(candidates[0].memory_type, MemoryType::Fact);
    }

    #[tokio::test]
    async fn short_fragments_are_dropped() {
        let extractor = RuleBasedExtractor::new();
        let candidates = extractor.extract(&input("Ok. Sure thing. We decided to use Redis for caching.")).await;
        assert!(candidates.iter().all(|c| c.content.len() >= 8));
    }

    #[tokio::test]
    async fn extraction_version_is_stable() {
        let extractor = RuleBasedExtractor::new();
        assert_eq!(extractor.extraction_version(), REFERENCE_EXTRACTION_VERSION);
        assert_eq!(extractor.extraction_version(), REFERENCE_EXTRACTION_VERSION);
    }
}
