//! Error types for memory engine operations

use crate::{MemoryId, PoolId};
use thiserror::Error;

/// Stable numeric error code surfaced across crate boundaries. A downstream
/// transport maps these 1:1 onto its own wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    InvalidInput = 1,
    NotFound = 2,
    PermissionDenied = 3,
    CapacityExceeded = 4,
    InvalidProvenance = 5,
    DuplicateClaim = 6,
    CitationVerificationFailed = 7,
    IllegalHandoffTransition = 8,
    Timeout = 9,
    Cancelled = 10,
    Internal = 11,
}

/// Storage layer errors (`vellum-store`).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("memory content or raw source exceeds configured byte bound")]
    InvalidMemory { reason: String },

    #[error("memory {0} not found")]
    NotFound(MemoryId),

    #[error("per-user or global memory capacity exceeded")]
    CapacityExceeded,

    #[error("memory {0} is invalidated and cannot be updated")]
    Invalidated(MemoryId),
}

/// Provenance service errors (`vellum-provenance`).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProvenanceError {
    #[error("provenance metadata violates bound: {reason}")]
    InvalidMetadata { reason: String },

    #[error("provenance store capacity exceeded")]
    CapacityExceeded,
}

/// Ingestion pipeline errors (`vellum-ingest`).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IngestionError {
    #[error("content blocked by hedge detection: {reason}")]
    Blocked { reason: String },

    #[error("duplicate claim detected (jaccard similarity {similarity:.3})")]
    DuplicateClaim { similarity: f32 },

    #[error("citation verification failed: {reason}")]
    CitationVerificationFailed { reason: String },

    #[error("review queue entry {0:?} not found")]
    ReviewEntryNotFound(String),

    #[error("caller is not the owner of review queue entry {0:?}")]
    PermissionDenied(String),

    #[error("review queue capacity exceeded")]
    CapacityExceeded,
}

/// Extraction pipeline errors (`vellum-extract`).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("extraction worker pool queue is full")]
    CapacityExceeded,

    #[error("extraction job {0} not found")]
    JobNotFound(String),

    #[error("extraction job {0} timed out")]
    Timeout(String),

    #[error("extraction job {0} was cancelled")]
    Cancelled(String),
}

/// Hybrid retrieval errors (`vellum-retrieval`).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetrievalError {
    #[error("embedding provider failed: {reason}")]
    EmbedFailed { reason: String },

    #[error("reranker failed: {reason}")]
    RerankFailed { reason: String },

    #[error("retrieval operation timed out")]
    Timeout,
}

/// Agent registry / pool errors (`vellum-agents`).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("agent registry capacity exceeded")]
    RegistryCapacityExceeded,

    #[error("agent session capacity exceeded")]
    SessionCapacityExceeded,

    #[error("agent not registered")]
    NotRegistered,

    #[error("pool capacity exceeded")]
    PoolCapacityExceeded,

    #[error("pool {0} not found")]
    PoolNotFound(PoolId),

    #[error("pool member capacity exceeded")]
    MemberCapacityExceeded,

    #[error("pool shared-memory capacity exceeded")]
    SharedCapacityExceeded,

    #[error("agent lacks required capability: {0:?}")]
    MissingCapability(String),

    #[error("agent lacks required pool permission: {0:?}")]
    InsufficientPoolPermission(String),

    #[error("memory scope exceeds pool scope")]
    ScopeViolation,

    #[error("pool member {0:?} is not registered in the agent registry")]
    IntegrityViolation(String),
}

/// Handoff manager errors (`vellum-agents`).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandoffError {
    #[error("handoff global capacity exceeded")]
    CapacityExceeded,

    #[error("per-target pending handoff capacity exceeded")]
    PendingCapacityExceeded,

    #[error("illegal handoff transition from {from} via {action}")]
    IllegalTransition { from: String, action: String },

    #[error("handoff {0} not found")]
    NotFound(String),

    #[error("acting agent is not the expected party for this transition")]
    WrongActor,
}

/// Pluggable-model provider errors (`vellum-llm`), surfaced by every
/// embedding/summarization/reranking adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("provider {provider} request failed: {message}")]
    ProviderError { provider: String, message: String },

    #[error("provider {provider} rate limit exceeded")]
    RateLimited { provider: String },

    #[error("provider {provider} rejected the configured API key")]
    InvalidApiKey { provider: String },

    #[error("no provider registered for capability {0:?}")]
    NoProviderAvailable(String),

    #[error("circuit open for provider {provider}")]
    CircuitOpen { provider: String },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: i32, actual: i32 },
}

/// Configuration validation errors, raised by `EngineConfig::validate`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type aggregating every domain error into one enum with a
/// stable `ErrorCode` mapping.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("provenance error: {0}")]
    Provenance(#[from] ProvenanceError),

    #[error("ingestion error: {0}")]
    Ingestion(#[from] IngestionError),

    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("handoff error: {0}")]
    Handoff(#[from] HandoffError),

    #[error("llm provider error: {0}")]
    Llm(#[from] LlmError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("not found")]
    NotFound,

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Map to the stable numeric error code of the external interface.
    pub fn as_code(&self) -> ErrorCode {
        match self {
            EngineError::Storage(StorageError::InvalidMemory { .. }) => ErrorCode::InvalidInput,
            EngineError::Storage(StorageError::NotFound(_)) => ErrorCode::NotFound,
            EngineError::Storage(StorageError::CapacityExceeded) => ErrorCode::CapacityExceeded,
            EngineError::Storage(StorageError::Invalidated(_)) => ErrorCode::InvalidInput,

            EngineError::Provenance(ProvenanceError::InvalidMetadata { .. }) => {
                ErrorCode::InvalidProvenance
            }
            EngineError::Provenance(ProvenanceError::CapacityExceeded) => {
                ErrorCode::CapacityExceeded
            }

            EngineError::Ingestion(IngestionError::Blocked { .. }) => ErrorCode::InvalidInput,
            EngineError::Ingestion(IngestionError::DuplicateClaim { .. }) => {
                ErrorCode::DuplicateClaim
            }
            EngineError::Ingestion(IngestionError::CitationVerificationFailed { .. }) => {
                ErrorCode::CitationVerificationFailed
            }
            EngineError::Ingestion(IngestionError::ReviewEntryNotFound(_)) => ErrorCode::NotFound,
            EngineError::Ingestion(IngestionError::PermissionDenied(_)) => {
                ErrorCode::PermissionDenied
            }
            EngineError::Ingestion(IngestionError::CapacityExceeded) => {
                ErrorCode::CapacityExceeded
            }

            EngineError::Extraction(ExtractionError::CapacityExceeded) => {
                ErrorCode::CapacityExceeded
            }
            EngineError::Extraction(ExtractionError::JobNotFound(_)) => ErrorCode::NotFound,
            EngineError::Extraction(ExtractionError::Timeout(_)) => ErrorCode::Timeout,
            EngineError::Extraction(ExtractionError::Cancelled(_)) => ErrorCode::Cancelled,

            EngineError::Retrieval(RetrievalError::Timeout) => ErrorCode::Timeout,
            EngineError::Retrieval(_) => ErrorCode::Internal,

            EngineError::Agent(AgentError::RegistryCapacityExceeded)
            | EngineError::Agent(AgentError::SessionCapacityExceeded)
            | EngineError::Agent(AgentError::PoolCapacityExceeded)
            | EngineError::Agent(AgentError::MemberCapacityExceeded)
            | EngineError::Agent(AgentError::SharedCapacityExceeded) => {
                ErrorCode::CapacityExceeded
            }
            EngineError::Agent(AgentError::PoolNotFound(_))
            | EngineError::Agent(AgentError::NotRegistered) => ErrorCode::NotFound,
            EngineError::Agent(AgentError::MissingCapability(_))
            | EngineError::Agent(AgentError::InsufficientPoolPermission(_))
            | EngineError::Agent(AgentError::ScopeViolation) => ErrorCode::PermissionDenied,
            EngineError::Agent(AgentError::IntegrityViolation(_)) => ErrorCode::Internal,

            EngineError::Handoff(HandoffError::CapacityExceeded)
            | EngineError::Handoff(HandoffError::PendingCapacityExceeded) => {
                ErrorCode::CapacityExceeded
            }
            EngineError::Handoff(HandoffError::IllegalTransition { .. })
            | EngineError::Handoff(HandoffError::WrongActor) => {
                ErrorCode::IllegalHandoffTransition
            }
            EngineError::Handoff(HandoffError::NotFound(_)) => ErrorCode::NotFound,

            EngineError::Llm(LlmError::RateLimited { .. }) => ErrorCode::CapacityExceeded,
            EngineError::Llm(LlmError::InvalidApiKey { .. }) => ErrorCode::PermissionDenied,
            EngineError::Llm(LlmError::DimensionMismatch { .. }) => ErrorCode::InvalidInput,
            EngineError::Llm(_) => ErrorCode::Internal,

            EngineError::Config(_) => ErrorCode::InvalidInput,
            EngineError::InvalidInput(_) => ErrorCode::InvalidInput,
            EngineError::PermissionDenied => ErrorCode::PermissionDenied,
            EngineError::NotFound => ErrorCode::NotFound,
            EngineError::Internal(_) => ErrorCode::Internal,
        }
    }
}

/// Result type alias for memory engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
