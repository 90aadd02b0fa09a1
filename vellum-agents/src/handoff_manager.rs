//! The handoff manager: `pending → accepted → completed`, or `rejected`, or
//! `expired` on TTL. TTL expiry is checked lazily on every read/transition
//! attempt rather than through a background sweep; `sweep_expired` is an
//! additional bulk convenience a scheduled job (e.g. the janitor) may call,
//! not something the spec requires.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use vellum_core::{
    AgentId, Capability, EngineError, EngineResult, EntityIdType, Handoff, HandoffData, HandoffError,
    HandoffId, HandoffStatus, MemoryId, Pending, StoredHandoff,
};
use vellum_core::{AuditEventKind, AuditOutcome};
use vellum_audit::AuditLogger;

use crate::audit_event;
use crate::registry::AgentRegistry;

pub struct HandoffManager {
    max_handoffs: usize,
    max_pending_per_target: usize,
    handoffs: RwLock<HashMap<HandoffId, StoredHandoff>>,
    pending_by_target: RwLock<HashMap<AgentId, HashSet<HandoffId>>>,
    audit: Option<Arc<AuditLogger>>,
}

impl HandoffManager {
    pub fn new(max_handoffs: usize, max_pending_per_target: usize) -> Self {
        Self {
            max_handoffs,
            max_pending_per_target,
            handoffs: RwLock::new(HashMap::new()),
            pending_by_target: RwLock::new(HashMap::new()),
            audit: None,
        }
    }

    pub fn with_audit_log(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn initiate_handoff(
        &self,
        source: AgentId,
        target: AgentId,
        task_description: String,
        current_state: String,
        relevant_memory_ids: Vec<MemoryId>,
        relevant_file_ids: Vec<String>,
        ttl_ms: i64,
        registry: &AgentRegistry,
    ) -> EngineResult<HandoffId> {
        registry.require_capability(source, Capability::HandoffInitiate)?;

        let mut handoffs = self.handoffs.write().expect("handoff map lock poisoned");
        if handoffs.len() >= self.max_handoffs {
            return Err(EngineError::Handoff(HandoffError::CapacityExceeded));
        }

        let mut pending_by_target = self.pending_by_target.write().expect("pending index lock poisoned");
        let pending_for_target = pending_by_target.entry(target).or_default();
        if pending_for_target.len() >= self.max_pending_per_target {
            return Err(EngineError::Handoff(HandoffError::PendingCapacityExceeded));
        }

        let id = HandoffId::now_v7();
        let data = HandoffData {
            handoff_id: id,
            source_agent: source,
            target_agent: target,
            task_description,
            current_state,
            relevant_memory_ids,
            relevant_file_ids,
            created_at: Utc::now(),
            ttl_ms,
            accepted_at: None,
            completed_at: None,
            rejection_reason: None,
            result: None,
        };
        let stored: StoredHandoff = Handoff::<Pending>::new(data).into();
        handoffs.insert(id, stored);
        pending_for_target.insert(id);
        drop(pending_by_target);
        drop(handoffs);

        audit_event(
            &self.audit,
            AuditEventKind::Handoff,
            &source.to_string(),
            &id.to_string(),
            "initiate_handoff",
            AuditOutcome::Success,
        );
        Ok(id)
    }

    pub fn accept_handoff(&self, handoff_id: HandoffId, acting_agent: AgentId, registry: &AgentRegistry) -> EngineResult<()> {
        registry.require_capability(acting_agent, Capability::HandoffReceive)?;

        let mut handoffs = self.handoffs.write().expect("handoff map lock poisoned");
        let stored = handoffs
            .get(&handoff_id)
            .cloned()
            .ok_or(EngineError::Handoff(HandoffError::NotFound(handoff_id.to_string())))?;

        let stored = self.expire_if_overdue(stored);
        if stored.status() != HandoffStatus::Pending {
            handoffs.insert(handoff_id, stored.clone());
            return Err(EngineError::Handoff(HandoffError::IllegalTransition {
                from: stored.status().to_string(),
                action: "accept".to_string(),
            }));
        }
        if acting_agent != stored.data().target_agent {
            return Err(EngineError::Handoff(HandoffError::WrongActor));
        }

        let pending = stored.into_pending().map_err(|_| {
            EngineError::Handoff(HandoffError::IllegalTransition {
                from: "unknown".to_string(),
                action: "accept".to_string(),
            })
        })?;
        let accepted = pending.accept(acting_agent, Utc::now());
        handoffs.insert(handoff_id, accepted.into());
        drop(handoffs);

        audit_event(
            &self.audit,
            AuditEventKind::Handoff,
            &acting_agent.to_string(),
            &handoff_id.to_string(),
            "accept_handoff",
            AuditOutcome::Success,
        );
        Ok(())
    }

    pub fn complete_handoff(
        &self,
        handoff_id: HandoffId,
        acting_agent: AgentId,
        result: Option<serde_json::Value>,
        registry: &AgentRegistry,
    ) -> EngineResult<()> {
        registry.require_capability(acting_agent, Capability::HandoffReceive)?;

        let mut handoffs = self.handoffs.write().expect("handoff map lock poisoned");
        let stored = handoffs
            .get(&handoff_id)
            .cloned()
            .ok_or(EngineError::Handoff(HandoffError::NotFound(handoff_id.to_string())))?;

        let stored = self.expire_if_overdue(stored);
        if stored.status() != HandoffStatus::Accepted {
            handoffs.insert(handoff_id, stored.clone());
            return Err(EngineError::Handoff(HandoffError::IllegalTransition {
                from: stored.status().to_string(),
                action: "complete".to_string(),
            }));
        }
        if acting_agent != stored.data().target_agent {
            return Err(EngineError::Handoff(HandoffError::WrongActor));
        }

        let accepted = stored.into_accepted().map_err(|_| {
            EngineError::Handoff(HandoffError::IllegalTransition {
                from: "unknown".to_string(),
                action: "complete".to_string(),
            })
        })?;
        let completed = accepted.complete(Utc::now(), result);
        handoffs.insert(handoff_id, completed.into());
        drop(handoffs);
        self.release_pending(handoff_id);

        audit_event(
            &self.audit,
            AuditEventKind::Handoff,
            &acting_agent.to_string(),
            &handoff_id.to_string(),
            "complete_handoff",
            AuditOutcome::Success,
        );
        Ok(())
    }

    /// Either the source or the target may reject a pending handoff; only
    /// the target may reject one already accepted.
    pub fn reject_handoff(&self, handoff_id: HandoffId, acting_agent: AgentId, reason: String) -> EngineResult<()> {
        let mut handoffs = self.handoffs.write().expect("handoff map lock poisoned");
        let stored = handoffs
            .get(&handoff_id)
            .cloned()
            .ok_or(EngineError::Handoff(HandoffError::NotFound(handoff_id.to_string())))?;

        let stored = self.expire_if_overdue(stored);
        let data = stored.data().clone();
        let is_party = acting_agent == data.source_agent || acting_agent == data.target_agent;
        if !is_party {
            return Err(EngineError::Handoff(HandoffError::WrongActor));
        }

        let rejected = match stored.status() {
            HandoffStatus::Pending => stored.into_pending().unwrap().reject(reason),
            HandoffStatus::Accepted if acting_agent == data.target_agent => {
                stored.into_accepted().unwrap().reject(reason)
            }
            other => {
                handoffs.insert(handoff_id, stored.clone());
                return Err(EngineError::Handoff(HandoffError::IllegalTransition {
                    from: other.to_string(),
                    action: "reject".to_string(),
                }));
            }
        };
        handoffs.insert(handoff_id, rejected.into());
        drop(handoffs);
        self.release_pending(handoff_id);

        audit_event(
            &self.audit,
            AuditEventKind::Handoff,
            &acting_agent.to_string(),
            &handoff_id.to_string(),
            "reject_handoff",
            AuditOutcome::Success,
        );
        Ok(())
    }

    /// Deep copies of every pending handoff addressed to `target`, lazily
    /// expiring any that are overdue before returning them.
    pub fn get_pending_handoffs(&self, target: AgentId) -> Vec<HandoffData> {
        let ids: Vec<HandoffId> = self
            .pending_by_target
            .read()
            .expect("pending index lock poisoned")
            .get(&target)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .collect();

        let mut out = Vec::new();
        let mut handoffs = self.handoffs.write().expect("handoff map lock poisoned");
        for id in ids {
            if let Some(stored) = handoffs.get(&id).cloned() {
                let stored = self.expire_if_overdue(stored);
                if stored.status() == HandoffStatus::Pending {
                    out.push(stored.data().clone());
                } else {
                    handoffs.insert(id, stored);
                }
            }
        }
        drop(handoffs);
        // Any entries flipped to expired above are no longer pending;
        // reconcile the per-target index accordingly.
        self.reconcile_pending_index(target);
        out
    }

    /// Bulk convenience sweep over every still-pending/accepted handoff,
    /// expiring any past its TTL. Not required by the transition rules
    /// above (those already expire lazily), but useful for a scheduled job
    /// that wants a point-in-time count of newly-expired handoffs.
    pub fn sweep_expired(&self) -> usize {
        let mut handoffs = self.handoffs.write().expect("handoff map lock poisoned");
        let mut expired = 0;
        let ids: Vec<HandoffId> = handoffs.keys().copied().collect();
        for id in ids {
            let stored = handoffs.get(&id).cloned().unwrap();
            let before = stored.status();
            let after = self.expire_if_overdue(stored);
            if before != HandoffStatus::Expired && after.status() == HandoffStatus::Expired {
                expired += 1;
            }
            handoffs.insert(id, after);
        }
        drop(handoffs);
        expired
    }

    /// Removes a terminal handoff from the map, freeing its capacity slot.
    pub fn cleanup_terminal(&self, handoff_id: HandoffId) -> EngineResult<()> {
        let mut handoffs = self.handoffs.write().expect("handoff map lock poisoned");
        let stored = handoffs
            .get(&handoff_id)
            .ok_or(EngineError::Handoff(HandoffError::NotFound(handoff_id.to_string())))?;
        if !stored.status().is_terminal() {
            return Err(EngineError::Handoff(HandoffError::IllegalTransition {
                from: stored.status().to_string(),
                action: "cleanup".to_string(),
            }));
        }
        handoffs.remove(&handoff_id);
        Ok(())
    }

    fn expire_if_overdue(&self, stored: StoredHandoff) -> StoredHandoff {
        if matches!(stored.status(), HandoffStatus::Pending | HandoffStatus::Accepted)
            && Utc::now() > stored.data().deadline()
        {
            match stored.into_typed() {
                vellum_core::LoadedHandoff::Pending(h) => h.expire().into(),
                vellum_core::LoadedHandoff::Accepted(h) => h.expire().into(),
                vellum_core::LoadedHandoff::Completed(h) => h.into(),
                vellum_core::LoadedHandoff::Rejected(h) => h.into(),
                vellum_core::LoadedHandoff::Expired(h) => h.into(),
            }
        } else {
            stored
        }
    }

    fn release_pending(&self, handoff_id: HandoffId) {
        let mut index = self.pending_by_target.write().expect("pending index lock poisoned");
        for set in index.values_mut() {
            set.remove(&handoff_id);
        }
    }

    fn reconcile_pending_index(&self, target: AgentId) {
        let handoffs = self.handoffs.read().expect("handoff map lock poisoned");
        let mut index = self.pending_by_target.write().expect("pending index lock poisoned");
        if let Some(set) = index.get_mut(&target) {
            set.retain(|id| {
                handoffs
                    .get(id)
                    .map(|h| h.status() == HandoffStatus::Pending)
                    .unwrap_or(false)
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet as StdHashSet;
    use vellum_core::{AgentType, UserId};

    fn harness() -> (HandoffManager, AgentRegistry, AgentId, AgentId) {
        let registry = AgentRegistry::new(10, 10);
        let source = registry
            .register(AgentType::ClaudeCode, UserId::now_v7(), StdHashSet::from([Capability::HandoffInitiate]))
            .unwrap();
        let target = registry
            .register(AgentType::ClaudeCode, UserId::now_v7(), StdHashSet::from([Capability::HandoffReceive]))
            .unwrap();
        (HandoffManager::new(10, 10), registry, source, target)
    }

    #[test]
    fn full_lifecycle_accept_then_complete() {
        let (manager, registry, source, target) = harness();
        let id = manager
            .initiate_handoff(source, target, "migrate".into(), "designed".into(), vec![], vec![], 60_000, &registry)
            .unwrap();

        manager.accept_handoff(id, target, &registry).unwrap();
        manager
            .complete_handoff(id, target, Some(serde_json::json!({"ok": true})), &registry)
            .unwrap();

        let pending = manager.get_pending_handoffs(target);
        assert!(pending.is_empty());
    }

    #[test]
    fn complete_fails_once_receive_capability_is_revoked() {
        let (manager, registry, source, target) = harness();
        let id = manager
            .initiate_handoff(source, target, "migrate".into(), "designed".into(), vec![], vec![], 60_000, &registry)
            .unwrap();

        manager.accept_handoff(id, target, &registry).unwrap();
        registry.unregister(target).unwrap();

        let err = manager
            .complete_handoff(id, target, None, &registry)
            .unwrap_err();
        assert_eq!(err.as_code(), vellum_core::ErrorCode::PermissionDenied);
    }

    #[test]
    fn wrong_actor_cannot_accept() {
        let (manager, registry, source, target) = harness();
        let id = manager
            .initiate_handoff(source, target, "migrate".into(), "designed".into(), vec![], vec![], 60_000, &registry)
            .unwrap();
        let result = manager.accept_handoff(id, source, &registry);
        assert!(matches!(result, Err(EngineError::Handoff(HandoffError::WrongActor))));
    }

    #[test]
    fn accept_after_ttl_fails_with_illegal_transition() {
        let (manager, registry, source, target) = harness();
        let id = manager
            .initiate_handoff(source, target, "migrate".into(), "designed".into(), vec![], vec![], -1, &registry)
            .unwrap();
        let result = manager.accept_handoff(id, target, &registry);
        assert!(matches!(result, Err(EngineError::Handoff(HandoffError::IllegalTransition { .. }))));
    }

    #[test]
    fn reject_before_accept_by_source() {
        let (manager, registry, source, target) = harness();
        let id = manager
            .initiate_handoff(source, target, "migrate".into(), "designed".into(), vec![], vec![], 60_000, &registry)
            .unwrap();
        manager.reject_handoff(id, source, "changed my mind".into()).unwrap();
        assert!(manager.get_pending_handoffs(target).is_empty());
    }

    #[test]
    fn pending_capacity_per_target_is_enforced() {
        let registry = AgentRegistry::new(10, 10);
        let source = registry
            .register(AgentType::ClaudeCode, UserId::now_v7(), StdHashSet::from([Capability::HandoffInitiate]))
            .unwrap();
        let target = registry
            .register(AgentType::ClaudeCode, UserId::now_v7(), StdHashSet::from([Capability::HandoffReceive]))
            .unwrap();
        let manager = HandoffManager::new(10, 1);
        manager
            .initiate_handoff(source, target, "a".into(), "s".into(), vec![], vec![], 60_000, &registry)
            .unwrap();
        let result = manager.initiate_handoff(source, target, "b".into(), "s".into(), vec![], vec![], 60_000, &registry);
        assert!(matches!(result, Err(EngineError::Handoff(HandoffError::PendingCapacityExceeded))));
    }
}
