//! Engine configuration.
//!
//! Every safety-relevant threshold is a required field — there is no
//! `Default` for `EngineConfig` itself. Nothing about dedup thresholds,
//! capacity caps, or token budgets should be invented by a constructor the
//! caller didn't read.

use crate::{ConfigError, EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// Token budget allocation across the five context blocks plus reserved
/// allocations, per §4.8.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TokenBudgetConfig {
    pub system: i32,
    pub project: i32,
    pub task: i32,
    pub history: i32,
    pub knowledge: i32,
    pub user_query: i32,
    pub response: i32,
    pub safety: i32,
}

impl TokenBudgetConfig {
    pub fn total(&self) -> i32 {
        self.system
            + self.project
            + self.task
            + self.history
            + self.knowledge
            + self.user_query
            + self.response
            + self.safety
    }
}

/// Bounded-resource capacity limits, per §4.2, §4.3, §4.6, §4.9, §4.10.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CapacityConfig {
    pub max_memories_per_user: usize,
    pub max_memories_total: usize,
    pub max_provenance_history_per_memory: usize,
    pub max_audit_events: usize,
    pub agents: usize,
    pub sessions: usize,
    pub pools: usize,
    pub members_per_pool: usize,
    pub shared_per_pool: usize,
    pub handoffs: usize,
    pub pending_per_target: usize,
    pub review_queue_per_user: usize,
    pub review_queue_total: usize,
    pub review_history_total: usize,
}

/// BM25 scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Bm25Config {
    pub k1: f32,
    pub b: f32,
}

/// Reciprocal Rank Fusion parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RrfConfig {
    pub k: f32,
    pub weight_bm25: f32,
    pub weight_vector: f32,
}

/// Tie-breaker weights applied after fusion/rerank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RankWeights {
    pub similarity: f32,
    pub recency: f32,
    pub confidence: f32,
}

/// Reference citation verifier configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CitationVerifierConfig {
    pub adr_path_glob: String,
    pub git_dir: String,
    pub http_timeout_ms: i64,
    pub issue_endpoint: Option<String>,
}

/// Suspension-point timeouts, per §5.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TimeoutConfig {
    pub extract_ms: i64,
    pub embed_ms: i64,
    pub rerank_ms: i64,
    pub http_ms: i64,
}

/// Master configuration struct. All values are required — no defaults
/// anywhere for safety-relevant thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EngineConfig {
    pub max_memory_content_bytes: usize,
    pub max_raw_source_bytes: usize,
    pub capacity: CapacityConfig,
    pub bm25: Bm25Config,
    pub rrf: RrfConfig,
    pub rank_weights: RankWeights,
    pub decay_lambda: f32,
    pub dedup_threshold_ingest: f32,
    pub dedup_threshold_janitor: f32,
    pub token_budget: TokenBudgetConfig,
    pub rerank_enabled: bool,
    pub rerank_top_n: usize,
    pub citation_verifiers: CitationVerifierConfig,
    pub timeouts: TimeoutConfig,
}

impl EngineConfig {
    /// The reference configuration matching every explicit default called
    /// out in the external interface's configuration table. Intended for
    /// tests and local development, not as an implicit fallback in
    /// production code paths.
    pub fn reference() -> Self {
        Self {
            max_memory_content_bytes: 64 * 1024,
            max_raw_source_bytes: 64 * 1024,
            capacity: CapacityConfig {
                max_memories_per_user: 100_000,
                max_memories_total: 10_000_000,
                max_provenance_history_per_memory: 1_000,
                max_audit_events: 1_000_000,
                agents: 10_000,
                sessions: 50_000,
                pools: 10_000,
                members_per_pool: 1_000,
                shared_per_pool: 100_000,
                handoffs: 50_000,
                pending_per_target: 100,
                review_queue_per_user: 100,
                review_queue_total: 10_000,
                review_history_total: 10_000,
            },
            bm25: Bm25Config { k1: 1.2, b: 0.75 },
            rrf: RrfConfig {
                k: 60.0,
                weight_bm25: 1.0,
                weight_vector: 1.0,
            },
            rank_weights: RankWeights {
                similarity: 0.5,
                recency: 0.3,
                confidence: 0.2,
            },
            decay_lambda: 0.05,
            dedup_threshold_ingest: 0.92,
            dedup_threshold_janitor: 0.85,
            token_budget: TokenBudgetConfig {
                system: 500,
                project: 1000,
                task: 500,
                history: 1000,
                knowledge: 2000,
                user_query: 1000,
                response: 2000,
                safety: 192,
            },
            rerank_enabled: false,
            rerank_top_n: 50,
            citation_verifiers: CitationVerifierConfig {
                adr_path_glob: "docs/adr/*.md".to_string(),
                git_dir: ".git".to_string(),
                http_timeout_ms: 5_000,
                issue_endpoint: None,
            },
            timeouts: TimeoutConfig {
                extract_ms: 30_000,
                embed_ms: 5_000,
                rerank_ms: 30_000,
                http_ms: 5_000,
            },
        }
    }

    /// Parse from a TOML document, then validate.
    pub fn from_toml_str(s: &str) -> EngineResult<Self> {
        let config: EngineConfig = toml::from_str(s).map_err(|e| {
            EngineError::Config(ConfigError::InvalidValue {
                field: "<document>".to_string(),
                value: String::new(),
                reason: e.to_string(),
            })
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all numeric and proportion invariants.
    pub fn validate(&self) -> EngineResult<()> {
        let fail = |field: &str, value: String, reason: &str| {
            Err(EngineError::Config(ConfigError::InvalidValue {
                field: field.to_string(),
                value,
                reason: reason.to_string(),
            }))
        };

        if self.max_memory_content_bytes == 0 {
            return fail(
                "max_memory_content_bytes",
                self.max_memory_content_bytes.to_string(),
                "must be greater than 0",
            );
        }
        if self.max_raw_source_bytes == 0 {
            return fail(
                "max_raw_source_bytes",
                self.max_raw_source_bytes.to_string(),
                "must be greater than 0",
            );
        }
        if !(0.0..=1.0).contains(&self.dedup_threshold_ingest) {
            return fail(
                "dedup_threshold_ingest",
                self.dedup_threshold_ingest.to_string(),
                "must be in [0.0, 1.0]",
            );
        }
        if !(0.0..=1.0).contains(&self.dedup_threshold_janitor) {
            return fail(
                "dedup_threshold_janitor",
                self.dedup_threshold_janitor.to_string(),
                "must be in [0.0, 1.0]",
            );
        }
        if self.decay_lambda < 0.0 {
            return fail(
                "decay_lambda",
                self.decay_lambda.to_string(),
                "must be non-negative",
            );
        }
        if self.bm25.k1 <= 0.0 {
            return fail("bm25.k1", self.bm25.k1.to_string(), "must be positive");
        }
        if !(0.0..=1.0).contains(&self.bm25.b) {
            return fail("bm25.b", self.bm25.b.to_string(), "must be in [0.0, 1.0]");
        }
        if self.rrf.k <= 0.0 {
            return fail("rrf.k", self.rrf.k.to_string(), "must be positive");
        }
        let weight_sum =
            self.rank_weights.similarity + self.rank_weights.recency + self.rank_weights.confidence;
        if (weight_sum - 1.0).abs() > 1e-3 {
            return fail(
                "rank_weights",
                weight_sum.to_string(),
                "similarity + recency + confidence must sum to 1.0",
            );
        }
        if self.token_budget.system <= 0 {
            return fail(
                "token_budget.system",
                self.token_budget.system.to_string(),
                "must be greater than 0",
            );
        }
        if self.rerank_top_n == 0 {
            return fail(
                "rerank_top_n",
                self.rerank_top_n.to_string(),
                "must be greater than 0",
            );
        }
        for (field, v) in [
            ("timeouts.extract_ms", self.timeouts.extract_ms),
            ("timeouts.embed_ms", self.timeouts.embed_ms),
            ("timeouts.rerank_ms", self.timeouts.rerank_ms),
            ("timeouts.http_ms", self.timeouts.http_ms),
        ] {
            if v <= 0 {
                return fail(field, v.to_string(), "must be positive");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_config_validates() {
        EngineConfig::reference().validate().expect("reference config must be valid");
    }

    #[test]
    fn rejects_out_of_range_dedup_threshold() {
        let mut config = EngineConfig::reference();
        config.dedup_threshold_ingest = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_rank_weights_not_summing_to_one() {
        let mut config = EngineConfig::reference();
        config.rank_weights.similarity = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn token_budget_total_sums_all_fields() {
        let budget = EngineConfig::reference().token_budget;
        assert_eq!(
            budget.total(),
            500 + 1000 + 500 + 1000 + 2000 + 1000 + 2000 + 192
        );
    }
}
