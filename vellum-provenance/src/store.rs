//! The provenance store itself: append-only history per memory, bounded by
//! an LRU over memories (not over individual records).

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use vellum_audit::AuditLogger;
use vellum_core::{
    AuditEventKind, AuditOutcome, ConfidenceLabel, EngineError, EngineResult, Evidence, MemoryId,
    ProvenanceError, ProvenanceEventKind, ProvenanceId, ProvenanceRecord, Timestamp,
};

use crate::validation::{validate_identifier, validate_metadata};

/// Append-only, bounded provenance store keyed by memory identifier.
///
/// `max_memories` bounds the number of distinct memories with any history at
/// all; when a new memory's first record would exceed that cap, the least
/// recently updated memory's entire history is evicted. `max_history_per_memory`
/// bounds each individual history; overflow evicts that memory's oldest record.
pub struct ProvenanceStore {
    max_memories: usize,
    max_history_per_memory: usize,
    inner: RwLock<Inner>,
    audit: Option<std::sync::Arc<AuditLogger>>,
}

struct Inner {
    histories: HashMap<MemoryId, VecDeque<ProvenanceRecord>>,
    /// Least-recently-updated first.
    lru: VecDeque<MemoryId>,
}

impl ProvenanceStore {
    pub fn new(max_memories: usize, max_history_per_memory: usize) -> Self {
        Self {
            max_memories,
            max_history_per_memory,
            inner: RwLock::new(Inner {
                histories: HashMap::new(),
                lru: VecDeque::new(),
            }),
            audit: None,
        }
    }

    pub fn with_audit_log(mut self, audit: std::sync::Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Build a validated `Evidence` object from ingestion-supplied fields.
    /// Does not attach it to any memory yet.
    pub fn create_provenance(
        &self,
        source_id: Option<String>,
        confidence_label: ConfidenceLabel,
        claim: String,
        captured_at: Timestamp,
        metadata: serde_json::Value,
    ) -> EngineResult<Evidence> {
        if let Some(ref id) = source_id {
            validate_identifier(id)?;
        }
        let deep_copy = metadata.clone();
        validate_metadata(&deep_copy)?;
        Ok(Evidence {
            claim,
            captured_at,
            confidence_label,
            source_id,
            validity_horizon: None,
            metadata: deep_copy,
        })
    }

    /// Attach evidence to a memory as a `Create` provenance event.
    pub fn attach_to_memory(
        &self,
        memory_id: MemoryId,
        actor_id: &str,
        evidence: &Evidence,
    ) -> EngineResult<ProvenanceId> {
        validate_identifier(actor_id)?;
        let record = ProvenanceRecord {
            id: ProvenanceId::now_v7(),
            memory_id,
            kind: ProvenanceEventKind::Create,
            actor_id: actor_id.to_string(),
            timestamp: evidence.captured_at,
            score: None,
            metadata: evidence.metadata.clone(),
        };
        self.append(memory_id, record.clone())?;
        self.audit_event(memory_id, actor_id, "attach_to_memory", AuditOutcome::Success);
        Ok(record.id)
    }

    /// Record an `update` or `invalidate` event directly.
    pub fn record_event(
        &self,
        memory_id: MemoryId,
        actor_id: &str,
        kind: ProvenanceEventKind,
        timestamp: Timestamp,
        metadata: serde_json::Value,
    ) -> EngineResult<ProvenanceId> {
        validate_identifier(actor_id)?;
        let deep_copy = metadata.clone();
        validate_metadata(&deep_copy)?;
        let record = ProvenanceRecord {
            id: ProvenanceId::now_v7(),
            memory_id,
            kind,
            actor_id: actor_id.to_string(),
            timestamp,
            score: None,
            metadata: deep_copy,
        };
        self.append(memory_id, record.clone())?;
        let action = match kind {
            ProvenanceEventKind::Update => "update",
            ProvenanceEventKind::Invalidate => "invalidate",
            ProvenanceEventKind::Create => "create",
            ProvenanceEventKind::Retrieval => "retrieval",
        };
        self.audit_event(memory_id, actor_id, action, AuditOutcome::Success);
        Ok(record.id)
    }

    /// Record a retrieval event carrying a relevance score in `[0, 1]`.
    pub fn track_retrieval(
        &self,
        memory_id: MemoryId,
        score: f32,
        retrieved_by: &str,
        timestamp: Timestamp,
    ) -> EngineResult<ProvenanceId> {
        validate_identifier(retrieved_by)?;
        if !(0.0..=1.0).contains(&score) {
            return Err(EngineError::InvalidInput(format!(
                "retrieval score {score} out of [0, 1]"
            )));
        }
        let record = ProvenanceRecord {
            id: ProvenanceId::now_v7(),
            memory_id,
            kind: ProvenanceEventKind::Retrieval,
            actor_id: retrieved_by.to_string(),
            timestamp,
            score: Some(score),
            metadata: serde_json::json!({}),
        };
        self.append(memory_id, record.clone())?;
        Ok(record.id)
    }

    /// Return the full recorded history for a memory, oldest first.
    pub fn get_provenance(&self, memory_id: MemoryId) -> Vec<ProvenanceRecord> {
        let inner = self.inner.read().expect("provenance store lock poisoned");
        inner
            .histories
            .get(&memory_id)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn memories_tracked(&self) -> usize {
        self.inner.read().expect("provenance store lock poisoned").histories.len()
    }

    fn append(&self, memory_id: MemoryId, record: ProvenanceRecord) -> EngineResult<()> {
        let mut inner = self.inner.write().expect("provenance store lock poisoned");

        if !inner.histories.contains_key(&memory_id) && inner.histories.len() >= self.max_memories {
            if let Some(evicted) = inner.lru.pop_front() {
                inner.histories.remove(&evicted);
            } else {
                return Err(EngineError::Provenance(ProvenanceError::CapacityExceeded));
            }
        }

        let history = inner.histories.entry(memory_id).or_insert_with(VecDeque::new);
        if history.len() >= self.max_history_per_memory {
            history.pop_front();
        }
        history.push_back(record);

        inner.lru.retain(|id| *id != memory_id);
        inner.lru.push_back(memory_id);

        Ok(())
    }

    fn audit_event(&self, memory_id: MemoryId, actor_id: &str, action: &str, outcome: AuditOutcome) {
        if let Some(ref audit) = self.audit {
            audit.record(
                AuditEventKind::MemoryWrite,
                actor_id,
                memory_id.to_string(),
                action,
                outcome,
                serde_json::json!({}),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn evidence() -> Evidence {
        Evidence {
            claim: "the team uses postgres".to_string(),
            captured_at: Utc::now(),
            confidence_label: ConfidenceLabel::High,
            source_id: Some("ADR-003".to_string()),
            validity_horizon: None,
            metadata: serde_json::json!({}),
        }
    }

    #[test]
    fn attach_then_get_returns_single_create_event() {
        let store = ProvenanceStore::new(100, 10);
        let memory_id = MemoryId::now_v7();
        store.attach_to_memory(memory_id, "user-1", &evidence()).unwrap();
        let history = store.get_provenance(memory_id);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, ProvenanceEventKind::Create);
    }

    #[test]
    fn history_overflow_evicts_oldest_record() {
        let store = ProvenanceStore::new(100, 2);
        let memory_id = MemoryId::now_v7();
        for _ in 0..3 {
            store
                .record_event(
                    memory_id,
                    "user-1",
                    ProvenanceEventKind::Update,
                    Utc::now(),
                    serde_json::json!({}),
                )
                .unwrap();
        }
        let history = store.get_provenance(memory_id);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn memory_capacity_overflow_evicts_least_recently_updated() {
        let store = ProvenanceStore::new(2, 10);
        let m1 = MemoryId::now_v7();
        let m2 = MemoryId::now_v7();
        let m3 = MemoryId::now_v7();
        store.attach_to_memory(m1, "u", &evidence()).unwrap();
        store.attach_to_memory(m2, "u", &evidence()).unwrap();
        store.attach_to_memory(m3, "u", &evidence()).unwrap();
        assert!(store.get_provenance(m1).is_empty());
        assert_eq!(store.get_provenance(m2).len(), 1);
        assert_eq!(store.get_provenance(m3).len(), 1);
    }

    #[test]
    fn track_retrieval_rejects_out_of_range_score() {
        let store = ProvenanceStore::new(100, 10);
        let memory_id = MemoryId::now_v7();
        let result = store.track_retrieval(memory_id, 1.5, "agent-1", Utc::now());
        assert!(result.is_err());
    }

    #[test]
    fn create_provenance_rejects_oversize_identifier() {
        let store = ProvenanceStore::new(100, 10);
        let result = store.create_provenance(
            Some("x".repeat(300)),
            ConfidenceLabel::Medium,
            "claim".to_string(),
            Utc::now(),
            serde_json::json!({}),
        );
        assert!(result.is_err());
    }
}
