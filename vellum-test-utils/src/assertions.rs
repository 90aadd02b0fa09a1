//! Custom assertions for `EngineResult`, grouped by the domain error they
//! expect — mirrors the shape of `vellum_core::EngineError`'s variants so a
//! failing assertion message names the mismatch precisely.

use vellum_core::{AgentError, EngineError, EngineResult, HandoffError, IngestionError, RetrievalError, StorageError};

#[track_caller]
pub fn assert_ok<T: std::fmt::Debug>(result: &EngineResult<T>) {
    assert!(result.is_ok(), "expected Ok, got Err: {:?}", result);
}

#[track_caller]
pub fn assert_err<T: std::fmt::Debug>(result: &EngineResult<T>) {
    assert!(result.is_err(), "expected Err, got Ok: {:?}", result);
}

#[track_caller]
pub fn assert_storage_error<T: std::fmt::Debug>(result: &EngineResult<T>) {
    match result {
        Err(EngineError::Storage(_)) => {}
        other => panic!("expected a storage error, got: {:?}", other),
    }
}

#[track_caller]
pub fn assert_not_found<T: std::fmt::Debug>(result: &EngineResult<T>) {
    match result {
        Err(EngineError::Storage(StorageError::NotFound(_))) | Err(EngineError::NotFound) => {}
        other => panic!("expected a not-found error, got: {:?}", other),
    }
}

#[track_caller]
pub fn assert_capacity_exceeded<T: std::fmt::Debug>(result: &EngineResult<T>) {
    let hit = matches!(
        result,
        Err(EngineError::Storage(StorageError::CapacityExceeded))
            | Err(EngineError::Agent(AgentError::RegistryCapacityExceeded))
            | Err(EngineError::Agent(AgentError::SessionCapacityExceeded))
            | Err(EngineError::Agent(AgentError::PoolCapacityExceeded))
            | Err(EngineError::Agent(AgentError::MemberCapacityExceeded))
            | Err(EngineError::Agent(AgentError::SharedCapacityExceeded))
            | Err(EngineError::Handoff(HandoffError::CapacityExceeded))
            | Err(EngineError::Handoff(HandoffError::PendingCapacityExceeded))
            | Err(EngineError::Ingestion(IngestionError::CapacityExceeded))
    );
    assert!(hit, "expected a capacity-exceeded error, got: {:?}", result);
}

#[track_caller]
pub fn assert_duplicate_claim<T: std::fmt::Debug>(result: &EngineResult<T>) {
    match result {
        Err(EngineError::Ingestion(IngestionError::DuplicateClaim { .. })) => {}
        other => panic!("expected a duplicate-claim error, got: {:?}", other),
    }
}

#[track_caller]
pub fn assert_illegal_handoff_transition<T: std::fmt::Debug>(result: &EngineResult<T>) {
    match result {
        Err(EngineError::Handoff(HandoffError::IllegalTransition { .. })) => {}
        other => panic!("expected an illegal handoff transition, got: {:?}", other),
    }
}

#[track_caller]
pub fn assert_retrieval_error<T: std::fmt::Debug>(result: &EngineResult<T>) {
    match result {
        Err(EngineError::Retrieval(_)) => {}
        other => panic!("expected a retrieval error, got: {:?}", other),
    }
}

#[track_caller]
pub fn assert_timeout<T: std::fmt::Debug>(result: &EngineResult<T>) {
    match result {
        Err(EngineError::Retrieval(RetrievalError::Timeout)) => {}
        other => panic!("expected a timeout error, got: {:?}", other),
    }
}

#[track_caller]
pub fn assert_permission_denied<T: std::fmt::Debug>(result: &EngineResult<T>) {
    let hit = matches!(
        result,
        Err(EngineError::PermissionDenied)
            | Err(EngineError::Agent(AgentError::InsufficientPoolPermission(_)))
            | Err(EngineError::Agent(AgentError::MissingCapability(_)))
            | Err(EngineError::Ingestion(IngestionError::PermissionDenied(_)))
    );
    assert!(hit, "expected a permission-denied error, got: {:?}", result);
}
