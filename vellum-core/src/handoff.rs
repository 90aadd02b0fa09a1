//! Handoff typestate for compile-time safety of the handoff lifecycle.
//!
//! Uses the typestate pattern to make invalid state transitions uncompilable
//! for in-process callers; the `StoredHandoff`/`LoadedHandoff` pair handles
//! the dynamic form at the persistence boundary, where the state is only
//! known at runtime.
//!
//! ```text
//! pending ──accept──▶ accepted ──complete──▶ completed
//!   │                    │
//!   ├──reject───────────┤──reject──▶ rejected
//!   └──expire(TTL)──────┴──expire──▶ expired
//! ```

use crate::{AgentId, DurationMs, HandoffId, HandoffStatus, MemoryId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

// ============================================================================
// HANDOFF DATA (internal storage, state-independent)
// ============================================================================

/// Internal data storage for a handoff, independent of typestate. This is
/// what gets persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HandoffData {
    pub handoff_id: HandoffId,
    pub source_agent: AgentId,
    pub target_agent: AgentId,
    pub task_description: String,
    pub current_state: String,
    pub relevant_memory_ids: Vec<MemoryId>,
    pub relevant_file_ids: Vec<String>,
    pub created_at: Timestamp,
    pub ttl_ms: DurationMs,
    pub accepted_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub rejection_reason: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub result: Option<serde_json::Value>,
}

impl HandoffData {
    pub fn deadline(&self) -> Timestamp {
        self.created_at + chrono::Duration::milliseconds(self.ttl_ms)
    }
}

// ============================================================================
// TYPESTATE MARKERS
// ============================================================================

/// Marker trait for handoff states.
pub trait HandoffTypestate: private::Sealed + Send + Sync {
    const STATUS: HandoffStatus;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pending;
impl HandoffTypestate for Pending {
    const STATUS: HandoffStatus = HandoffStatus::Pending;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted;
impl HandoffTypestate for Accepted {
    const STATUS: HandoffStatus = HandoffStatus::Accepted;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completed;
impl HandoffTypestate for Completed {
    const STATUS: HandoffStatus = HandoffStatus::Completed;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected;
impl HandoffTypestate for Rejected {
    const STATUS: HandoffStatus = HandoffStatus::Rejected;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expired;
impl HandoffTypestate for Expired {
    const STATUS: HandoffStatus = HandoffStatus::Expired;
}

mod private {
    pub trait Sealed {}
    impl Sealed for super::Pending {}
    impl Sealed for super::Accepted {}
    impl Sealed for super::Completed {}
    impl Sealed for super::Rejected {}
    impl Sealed for super::Expired {}
}

// ============================================================================
// HANDOFF TYPESTATE WRAPPER
// ============================================================================

/// A handoff with compile-time state tracking. The type parameter `S`
/// indicates the current state; transition methods consume `self` and
/// return the wrapper at the new state, so a stale handle cannot be
/// transitioned twice.
#[derive(Debug, Clone)]
pub struct Handoff<S: HandoffTypestate> {
    data: HandoffData,
    _state: PhantomData<S>,
}

impl<S: HandoffTypestate> Handoff<S> {
    pub fn data(&self) -> &HandoffData {
        &self.data
    }

    pub fn handoff_id(&self) -> HandoffId {
        self.data.handoff_id
    }

    pub fn status(&self) -> HandoffStatus {
        S::STATUS
    }

    pub fn into_data(self) -> HandoffData {
        self.data
    }
}

impl Handoff<Pending> {
    pub fn new(data: HandoffData) -> Self {
        Handoff {
            data,
            _state: PhantomData,
        }
    }

    /// `acting_agent` must equal `target_agent` — enforced by the caller
    /// (`vellum-agents::HandoffManager`), which also checks `handoff_receive`
    /// capability before calling this.
    pub fn accept(mut self, acting_agent: AgentId, accepted_at: Timestamp) -> Handoff<Accepted> {
        debug_assert_eq!(acting_agent, self.data.target_agent);
        self.data.accepted_at = Some(accepted_at);
        Handoff {
            data: self.data,
            _state: PhantomData,
        }
    }

    /// Either party may reject a pending handoff.
    pub fn reject(mut self, reason: String) -> Handoff<Rejected> {
        self.data.rejection_reason = Some(reason);
        Handoff {
            data: self.data,
            _state: PhantomData,
        }
    }

    pub fn expire(self) -> Handoff<Expired> {
        Handoff {
            data: self.data,
            _state: PhantomData,
        }
    }
}

impl Handoff<Accepted> {
    pub fn accepted_at(&self) -> Timestamp {
        self.data
            .accepted_at
            .expect("accepted handoff must have accepted_at")
    }

    pub fn complete(
        mut self,
        completed_at: Timestamp,
        result: Option<serde_json::Value>,
    ) -> Handoff<Completed> {
        self.data.completed_at = Some(completed_at);
        self.data.result = result;
        Handoff {
            data: self.data,
            _state: PhantomData,
        }
    }

    pub fn reject(mut self, reason: String) -> Handoff<Rejected> {
        self.data.rejection_reason = Some(reason);
        Handoff {
            data: self.data,
            _state: PhantomData,
        }
    }

    pub fn expire(self) -> Handoff<Expired> {
        Handoff {
            data: self.data,
            _state: PhantomData,
        }
    }
}

impl Handoff<Rejected> {
    pub fn rejection_reason(&self) -> &str {
        self.data
            .rejection_reason
            .as_deref()
            .unwrap_or("no reason provided")
    }
}

impl Handoff<Completed> {
    pub fn completed_at(&self) -> Timestamp {
        self.data
            .completed_at
            .expect("completed handoff must have completed_at")
    }
}

// ============================================================================
// PERSISTENCE BOUNDARY: STORED HANDOFF
// ============================================================================

/// A handoff as held by the registry, status-tagged rather than
/// type-tagged, since the registry must hold handoffs of every status in
/// one bounded map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredHandoff {
    pub data: HandoffData,
    pub status: HandoffStatus,
}

/// All possible runtime states of a handoff loaded from the registry.
#[derive(Debug, Clone)]
pub enum LoadedHandoff {
    Pending(Handoff<Pending>),
    Accepted(Handoff<Accepted>),
    Completed(Handoff<Completed>),
    Rejected(Handoff<Rejected>),
    Expired(Handoff<Expired>),
}

impl StoredHandoff {
    pub fn into_typed(self) -> LoadedHandoff {
        match self.status {
            HandoffStatus::Pending => LoadedHandoff::Pending(Handoff {
                data: self.data,
                _state: PhantomData,
            }),
            HandoffStatus::Accepted => LoadedHandoff::Accepted(Handoff {
                data: self.data,
                _state: PhantomData,
            }),
            HandoffStatus::Completed => LoadedHandoff::Completed(Handoff {
                data: self.data,
                _state: PhantomData,
            }),
            HandoffStatus::Rejected => LoadedHandoff::Rejected(Handoff {
                data: self.data,
                _state: PhantomData,
            }),
            HandoffStatus::Expired => LoadedHandoff::Expired(Handoff {
                data: self.data,
                _state: PhantomData,
            }),
        }
    }

    pub fn into_pending(self) -> Result<Handoff<Pending>, HandoffStateError> {
        if self.status != HandoffStatus::Pending {
            return Err(HandoffStateError::WrongState {
                handoff_id: self.data.handoff_id,
                expected: HandoffStatus::Pending,
                actual: self.status,
            });
        }
        Ok(Handoff {
            data: self.data,
            _state: PhantomData,
        })
    }

    pub fn into_accepted(self) -> Result<Handoff<Accepted>, HandoffStateError> {
        if self.status != HandoffStatus::Accepted {
            return Err(HandoffStateError::WrongState {
                handoff_id: self.data.handoff_id,
                expected: HandoffStatus::Accepted,
                actual: self.status,
            });
        }
        Ok(Handoff {
            data: self.data,
            _state: PhantomData,
        })
    }

    pub fn data(&self) -> &HandoffData {
        &self.data
    }

    pub fn status(&self) -> HandoffStatus {
        self.status
    }
}

impl<S: HandoffTypestate> From<Handoff<S>> for StoredHandoff {
    fn from(h: Handoff<S>) -> Self {
        StoredHandoff {
            data: h.data,
            status: S::STATUS,
        }
    }
}

/// Errors when transitioning handoff states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffStateError {
    WrongState {
        handoff_id: HandoffId,
        expected: HandoffStatus,
        actual: HandoffStatus,
    },
}

impl fmt::Display for HandoffStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandoffStateError::WrongState {
                handoff_id,
                expected,
                actual,
            } => write!(
                f,
                "handoff {} is in state {} but expected {}",
                handoff_id, actual, expected
            ),
        }
    }
}

impl std::error::Error for HandoffStateError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityIdType;
    use chrono::Utc;

    fn make_handoff_data() -> HandoffData {
        let now = Utc::now();
        HandoffData {
            handoff_id: HandoffId::now_v7(),
            source_agent: AgentId::now_v7(),
            target_agent: AgentId::now_v7(),
            task_description: "migrate storage backend".to_string(),
            current_state: "design approved".to_string(),
            relevant_memory_ids: vec![],
            relevant_file_ids: vec![],
            created_at: now,
            ttl_ms: 60_000,
            accepted_at: None,
            completed_at: None,
            rejection_reason: None,
            result: None,
        }
    }

    #[test]
    fn accept_then_complete() {
        let now = Utc::now();
        let data = make_handoff_data();
        let target = data.target_agent;
        let handoff = Handoff::<Pending>::new(data);

        let accepted = handoff.accept(target, now);
        assert_eq!(accepted.accepted_at(), now);

        let completed = accepted.complete(now, Some(serde_json::json!({"ok": true})));
        assert_eq!(completed.completed_at(), now);
        assert_eq!(completed.status(), HandoffStatus::Completed);
    }

    #[test]
    fn reject_before_accept() {
        let data = make_handoff_data();
        let handoff = Handoff::<Pending>::new(data);
        let rejected = handoff.reject("target unavailable".to_string());
        assert_eq!(rejected.rejection_reason(), "target unavailable");
    }

    #[test]
    fn stored_handoff_wrong_state_rejected() {
        let data = make_handoff_data();
        let stored = StoredHandoff {
            data,
            status: HandoffStatus::Accepted,
        };
        assert!(matches!(
            stored.into_pending(),
            Err(HandoffStateError::WrongState { .. })
        ));
    }

    #[test]
    fn expire_reachable_from_pending_and_accepted() {
        let now = Utc::now();
        let data = make_handoff_data();
        let target = data.target_agent;
        let expired_from_pending = Handoff::<Pending>::new(data.clone()).expire();
        assert_eq!(expired_from_pending.status(), HandoffStatus::Expired);

        let expired_from_accepted = Handoff::<Pending>::new(data)
            .accept(target, now)
            .expire();
        assert_eq!(expired_from_accepted.status(), HandoffStatus::Expired);
    }
}
