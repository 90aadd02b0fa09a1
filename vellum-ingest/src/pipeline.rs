//! Tier decision: the core of the ingestion pipeline. First-match-wins
//! classification, then a combine step that can still downgrade a Tier-1
//! candidate to Tier 2 or 3.

use vellum_core::{HedgeClass, Memory, MemoryFilter, MemoryType, Tier};

use crate::citation::{detect, CitationVerifier};
use crate::dedup::most_similar;
use crate::hedge;

const TRUSTED_SOURCES: &[&str] = &["user", "documentation", "adr", "commit", "manual"];

/// Everything the tier decision needs about the candidate claim.
#[derive(Debug, Clone)]
pub struct IngestionCandidate {
    pub content: String,
    pub memory_type: MemoryType,
    pub source: String,
}

/// Why a tier was assigned, for audit and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierReason {
    HedgeBlock,
    DuplicateOf { similarity_milli: u32 },
    DedupDetectorFailed,
    VerifiedCitation,
    TrustedSource,
    TypedContext,
    HedgeReview,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierDecision {
    pub tier: Tier,
    pub reason: TierReason,
}

/// Decide the tier for a candidate claim against the user's existing
/// memories of the same type. `verifier` confirms detected citations.
pub async fn decide_tier(
    candidate: &IngestionCandidate,
    existing_same_type: &[Memory],
    dedup_threshold: f32,
    verifier: &dyn CitationVerifier,
) -> TierDecision {
    let hedge_class = hedge::classify(&candidate.content);
    if hedge_class == HedgeClass::Block {
        return TierDecision {
            tier: Tier::Tier3,
            reason: TierReason::HedgeBlock,
        };
    }

    if let Some((_, similarity)) = most_similar(
        &candidate.content,
        candidate.memory_type,
        existing_same_type,
        dedup_threshold,
    ) {
        return TierDecision {
            tier: Tier::Tier3,
            reason: TierReason::DuplicateOf {
                similarity_milli: (similarity * 1000.0) as u32,
            },
        };
    }

    let mut candidate_tier1 = false;
    let mut reason = TierReason::Default;

    let citations = detect(&candidate.content);
    let mut any_verified = false;
    for citation in &citations {
        if verifier.verify(citation).await {
            any_verified = true;
            break;
        }
    }
    if any_verified {
        candidate_tier1 = true;
        reason = TierReason::VerifiedCitation;
    } else if TRUSTED_SOURCES.contains(&candidate.source.as_str()) {
        candidate_tier1 = true;
        reason = TierReason::TrustedSource;
    } else if (candidate.memory_type == MemoryType::Decision && candidate.source == "conversation")
        || (candidate.memory_type == MemoryType::Preference
            && matches!(candidate.source.as_str(), "conversation" | "chat"))
    {
        candidate_tier1 = true;
        reason = TierReason::TypedContext;
    }

    if hedge_class == HedgeClass::Review {
        return TierDecision {
            tier: Tier::Tier2,
            reason: TierReason::HedgeReview,
        };
    }

    if candidate_tier1 {
        TierDecision {
            tier: Tier::Tier1,
            reason,
        }
    } else {
        TierDecision {
            tier: Tier::Tier2,
            reason: TierReason::Default,
        }
    }
}

/// On dedup-detector error (not a similarity result, an actual failure to
/// compute one), the caller should fall through to this fail-closed
/// decision rather than calling `decide_tier` at all.
pub fn dedup_detector_failed() -> TierDecision {
    TierDecision {
        tier: Tier::Tier2,
        reason: TierReason::DedupDetectorFailed,
    }
}

/// Filter for fetching "existing memories of the same type for this user"
/// ahead of a `decide_tier` call.
pub fn same_type_filter(memory_type: MemoryType) -> MemoryFilter {
    MemoryFilter {
        memory_type: Some(memory_type),
        valid_only: true,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citation::FakeCitationVerifier;

    fn candidate(content: &str, memory_type: MemoryType, source: &str) -> IngestionCandidate {
        IngestionCandidate {
            content: content.to_string(),
            memory_type,
            source: source.to_string(),
        }
    }

    #[tokio::test]
    async fn personal_speculation_blocks_to_tier3() {
        let verifier = FakeCitationVerifier::new(vec![]);
        let decision = decide_tier(
            &candidate("I think we should use Redis", MemoryType::Fact, "conversation"),
            &[],
            0.92,
            &verifier,
        )
        .await;
        assert_eq!(decision.tier, Tier::Tier3);
        assert_eq!(decision.reason, TierReason::HedgeBlock);
    }

    #[tokio::test]
    async fn technical_hedge_forces_tier2_even_with_citation() {
        let verifier = FakeCitationVerifier::new(vec!["ADR-003".to_string()]);
        let decision = decide_tier(
            &candidate("This may change per ADR-003", MemoryType::Fact, "documentation"),
            &[],
            0.92,
            &verifier,
        )
        .await;
        assert_eq!(decision.tier, Tier::Tier2);
        assert_eq!(decision.reason, TierReason::HedgeReview);
    }

    #[tokio::test]
    async fn verified_citation_promotes_to_tier1() {
        let verifier = FakeCitationVerifier::new(vec!["ADR-003".to_string()]);
        let decision = decide_tier(
            &candidate("Per ADR-003 we use Postgres", MemoryType::Fact, "conversation"),
            &[],
            0.92,
            &verifier,
        )
        .await;
        assert_eq!(decision.tier, Tier::Tier1);
        assert_eq!(decision.reason, TierReason::VerifiedCitation);
    }

    #[tokio::test]
    async fn trusted_source_promotes_to_tier1() {
        let verifier = FakeCitationVerifier::new(vec![]);
        let decision = decide_tier(
            &candidate("We use Postgres for storage", MemoryType::Fact, "documentation"),
            &[],
            0.92,
            &verifier,
        )
        .await;
        assert_eq!(decision.tier, Tier::Tier1);
        assert_eq!(decision.reason, TierReason::TrustedSource);
    }

    #[tokio::test]
    async fn decision_from_conversation_promotes_to_tier1() {
        let verifier = FakeCitationVerifier::new(vec![]);
        let decision = decide_tier(
            &candidate("We decided to deprecate v1", MemoryType::Decision, "conversation"),
            &[],
            0.92,
            &verifier,
        )
        .await;
        assert_eq!(decision.tier, Tier::Tier1);
        assert_eq!(decision.reason, TierReason::TypedContext);
    }

    #[tokio::test]
    async fn untrusted_unverified_unrecognized_falls_to_tier2() {
        let verifier = FakeCitationVerifier::new(vec![]);
        let decision = decide_tier(
            &candidate("Random note with no signal", MemoryType::Fact, "conversation"),
            &[],
            0.92,
            &verifier,
        )
        .await;
        assert_eq!(decision.tier, Tier::Tier2);
    }

    #[tokio::test]
    async fn near_duplicate_blocks_to_tier3() {
        let verifier = FakeCitationVerifier::new(vec![]);
        let existing = Memory {
            id: vellum_core::MemoryId::now_v7(),
            user_id: vellum_core::UserId::now_v7(),
            project_id: None,
            tenant_id: None,
            content: "the team uses postgres for storage".to_string(),
            memory_type: MemoryType::Fact,
            confidence: 0.9,
            source: "manual".to_string(),
            raw_source: String::new(),
            extraction_version: 1,
            created_at: chrono::Utc::now(),
            last_access_at: chrono::Utc::now(),
            expires_at: None,
            embedding: None,
            validity: vellum_core::Validity::Live,
            scope: vellum_core::Scope::User,
            metadata: serde_json::json!({}),
        };
        let decision = decide_tier(
            &candidate("the team uses postgres for storage", MemoryType::Fact, "manual"),
            &[existing],
            0.92,
            &verifier,
        )
        .await;
        assert_eq!(decision.tier, Tier::Tier3);
    }
}
