//! Bounded Review Queue for Tier-2 claims.
//!
//! Approval removes the entry and only then invokes the store callback, so
//! a concurrent `get_by_id`/`approve` race never observes a half-applied
//! entry.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use vellum_core::{
    EngineError, EngineResult, IngestionError, MemoryType, ReviewQueueId, Timestamp, UserId,
};

/// A claim awaiting human review.
#[derive(Debug, Clone)]
pub struct ReviewEntry {
    pub id: ReviewQueueId,
    pub owner: UserId,
    pub content: String,
    pub memory_type: MemoryType,
    pub source: String,
    pub submitted_at: Timestamp,
}

/// An approve/reject decision, retained for audit.
#[derive(Debug, Clone)]
pub struct ReviewDecision {
    pub queue_id: ReviewQueueId,
    pub owner: UserId,
    pub approved: bool,
    pub reason: Option<String>,
    pub decided_at: Timestamp,
}

struct Inner {
    pending: HashMap<ReviewQueueId, ReviewEntry>,
    per_user_count: HashMap<UserId, usize>,
    history: Vec<ReviewDecision>,
}

/// Bounded review queue: per-user limit and a global limit, plus a capped
/// history of decisions.
pub struct ReviewQueue {
    per_user_limit: usize,
    global_limit: usize,
    history_limit: usize,
    inner: Mutex<Inner>,
}

impl ReviewQueue {
    pub fn new(per_user_limit: usize, global_limit: usize, history_limit: usize) -> Self {
        Self {
            per_user_limit,
            global_limit,
            history_limit,
            inner: Mutex::new(Inner {
                pending: HashMap::new(),
                per_user_count: HashMap::new(),
                history: Vec::new(),
            }),
        }
    }

    pub fn submit(
        &self,
        owner: UserId,
        content: String,
        memory_type: MemoryType,
        source: String,
    ) -> EngineResult<ReviewQueueId> {
        let mut inner = self.inner.lock().expect("review queue lock poisoned");
        if inner.pending.len() >= self.global_limit {
            return Err(EngineError::Ingestion(IngestionError::CapacityExceeded));
        }
        let count = inner.per_user_count.get(&owner).copied().unwrap_or(0);
        if count >= self.per_user_limit {
            return Err(EngineError::Ingestion(IngestionError::CapacityExceeded));
        }

        let id = ReviewQueueId::now_v7();
        inner.pending.insert(
            id,
            ReviewEntry {
                id,
                owner,
                content,
                memory_type,
                source,
                submitted_at: Utc::now(),
            },
        );
        *inner.per_user_count.entry(owner).or_insert(0) += 1;
        Ok(id)
    }

    /// Owner-checked fetch; prevents IDOR on queue identifiers.
    pub fn get_by_id(&self, queue_id: ReviewQueueId, reviewer: UserId) -> EngineResult<ReviewEntry> {
        let inner = self.inner.lock().expect("review queue lock poisoned");
        inner
            .pending
            .get(&queue_id)
            .filter(|e| e.owner == reviewer)
            .cloned()
            .ok_or(EngineError::Ingestion(IngestionError::ReviewEntryNotFound(
                queue_id.to_string(),
            )))
    }

    /// Remove the entry atomically and return it so the caller can run its
    /// store callback *after* this returns, never before.
    pub fn approve(&self, queue_id: ReviewQueueId, reviewer: UserId) -> EngineResult<ReviewEntry> {
        let mut inner = self.inner.lock().expect("review queue lock poisoned");
        let entry = inner
            .pending
            .get(&queue_id)
            .ok_or(EngineError::Ingestion(IngestionError::ReviewEntryNotFound(
                queue_id.to_string(),
            )))?;
        if entry.owner != reviewer {
            return Err(EngineError::Ingestion(IngestionError::PermissionDenied(
                queue_id.to_string(),
            )));
        }
        let entry = inner.pending.remove(&queue_id).expect("checked above");
        if let Some(count) = inner.per_user_count.get_mut(&entry.owner) {
            *count = count.saturating_sub(1);
        }
        self.record_decision(&mut inner, queue_id, reviewer, true, None);
        Ok(entry)
    }

    pub fn reject(&self, queue_id: ReviewQueueId, reviewer: UserId, reason: &str) -> EngineResult<()> {
        let mut inner = self.inner.lock().expect("review queue lock poisoned");
        let entry = inner
            .pending
            .get(&queue_id)
            .ok_or(EngineError::Ingestion(IngestionError::ReviewEntryNotFound(
                queue_id.to_string(),
            )))?;
        if entry.owner != reviewer {
            return Err(EngineError::Ingestion(IngestionError::PermissionDenied(
                queue_id.to_string(),
            )));
        }
        let entry = inner.pending.remove(&queue_id).expect("checked above");
        if let Some(count) = inner.per_user_count.get_mut(&entry.owner) {
            *count = count.saturating_sub(1);
        }
        self.record_decision(&mut inner, queue_id, reviewer, false, Some(reason.to_string()));
        Ok(())
    }

    fn record_decision(
        &self,
        inner: &mut Inner,
        queue_id: ReviewQueueId,
        reviewer: UserId,
        approved: bool,
        reason: Option<String>,
    ) {
        if inner.history.len() >= self.history_limit {
            inner.history.remove(0);
        }
        inner.history.push(ReviewDecision {
            queue_id,
            owner: reviewer,
            approved,
            reason,
            decided_at: Utc::now(),
        });
    }

    pub fn history(&self) -> Vec<ReviewDecision> {
        self.inner.lock().expect("review queue lock poisoned").history.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().expect("review queue lock poisoned").pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_then_approve_removes_entry_before_returning() {
        let queue = ReviewQueue::new(100, 1000, 1000);
        let owner = UserId::now_v7();
        let id = queue
            .submit(owner, "claim".to_string(), MemoryType::Fact, "conversation".to_string())
            .unwrap();
        let entry = queue.approve(id, owner).unwrap();
        assert_eq!(entry.content, "claim");
        assert_eq!(queue.pending_count(), 0);
        assert!(queue.get_by_id(id, owner).is_err());
    }

    #[test]
    fn get_by_id_rejects_wrong_reviewer() {
        let queue = ReviewQueue::new(100, 1000, 1000);
        let owner = UserId::now_v7();
        let stranger = UserId::now_v7();
        let id = queue
            .submit(owner, "claim".to_string(), MemoryType::Fact, "conversation".to_string())
            .unwrap();
        assert!(queue.get_by_id(id, stranger).is_err());
    }

    #[test]
    fn per_user_limit_is_enforced() {
        let queue = ReviewQueue::new(2, 1000, 1000);
        let owner = UserId::now_v7();
        queue.submit(owner, "a".to_string(), MemoryType::Fact, "conversation".to_string()).unwrap();
        queue.submit(owner, "b".to_string(), MemoryType::Fact, "conversation".to_string()).unwrap();
        let result = queue.submit(owner, "c".to_string(), MemoryType::Fact, "conversation".to_string());
        assert!(result.is_err());
    }

    #[test]
    fn reject_discards_entry_and_records_history() {
        let queue = ReviewQueue::new(100, 1000, 1000);
        let owner = UserId::now_v7();
        let id = queue
            .submit(owner, "claim".to_string(), MemoryType::Fact, "conversation".to_string())
            .unwrap();
        queue.reject(id, owner, "too speculative").unwrap();
        assert_eq!(queue.pending_count(), 0);
        assert_eq!(queue.history().len(), 1);
        assert!(!queue.history()[0].approved);
    }
}
