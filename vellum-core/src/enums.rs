//! Enum types for memory engine entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CORE ENUMS
// ============================================================================

/// The typed kind of a memory's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum MemoryType {
    Preference,
    Fact,
    Decision,
}

impl MemoryType {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            MemoryType::Preference => "preference",
            MemoryType::Fact => "fact",
            MemoryType::Decision => "decision",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, MemoryTypeParseError> {
        match s.to_lowercase().as_str() {
            "preference" => Ok(MemoryType::Preference),
            "fact" => Ok(MemoryType::Fact),
            "decision" => Ok(MemoryType::Decision),
            _ => Err(MemoryTypeParseError(s.to_string())),
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for MemoryType {
    type Err = MemoryTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryTypeParseError(pub String);

impl fmt::Display for MemoryTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid memory type: {}", self.0)
    }
}

impl std::error::Error for MemoryTypeParseError {}

/// Visibility scope, forming a total order used for read/share filtering.
///
/// `agent_private < user < project < team < global`. Derived `Ord` follows
/// declaration order, which is why the variants must stay in this sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Scope {
    AgentPrivate,
    User,
    Project,
    Team,
    Global,
}

impl Scope {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Scope::AgentPrivate => "agent_private",
            Scope::User => "user",
            Scope::Project => "project",
            Scope::Team => "team",
            Scope::Global => "global",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, ScopeParseError> {
        match s.to_lowercase().as_str() {
            "agent_private" => Ok(Scope::AgentPrivate),
            "user" => Ok(Scope::User),
            "project" => Ok(Scope::Project),
            "team" => Ok(Scope::Team),
            "global" => Ok(Scope::Global),
            _ => Err(ScopeParseError(s.to_string())),
        }
    }

    /// Whether an actor at `self` may read content shared at `other`.
    pub fn can_read(&self, other: Scope) -> bool {
        other <= *self
    }

    pub fn broaden(&self) -> Option<Scope> {
        match self {
            Scope::AgentPrivate => Some(Scope::User),
            Scope::User => Some(Scope::Project),
            Scope::Project => Some(Scope::Team),
            Scope::Team => Some(Scope::Global),
            Scope::Global => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for Scope {
    type Err = ScopeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeParseError(pub String);

impl fmt::Display for ScopeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid scope: {}", self.0)
    }
}

impl std::error::Error for ScopeParseError {}

/// Validity state of a memory: live or soft-invalidated with a reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Validity {
    Live,
    Invalidated { reason: String },
}

impl Validity {
    pub fn is_live(&self) -> bool {
        matches!(self, Validity::Live)
    }
}

/// Ingestion verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Tier {
    /// Auto-approved, stored immediately.
    Tier1,
    /// Flagged for human review.
    Tier2,
    /// Blocked, no state change.
    Tier3,
}

/// Confidence label attached to an evidence object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLabel {
    High,
    Medium,
    Low,
}

/// Classification of hedging language detected in ingested content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HedgeClass {
    /// No hedging language detected.
    None,
    /// Technical qualification ("may", "typically"): downgrade, don't block.
    Review,
    /// Personal speculation ("I think", "I guess"): block outright.
    Block,
}

/// Kind of event recorded in a memory's provenance history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceEventKind {
    Create,
    Update,
    Invalidate,
    Retrieval,
}

/// Kind of event recorded in the audit logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    AgentAuth,
    PoolOperation,
    Handoff,
    CrossAgentRead,
    PermissionDenied,
    MemoryWrite,
    MemoryInvalidate,
    ReviewDecision,
}

/// Outcome of an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Denied,
    Error,
}

/// Status of an agent in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum AgentStatus {
    #[default]
    Idle,
    Active,
    Blocked,
    Offline,
}

impl AgentStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Active => "active",
            AgentStatus::Blocked => "blocked",
            AgentStatus::Offline => "offline",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, AgentStatusParseError> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(AgentStatus::Idle),
            "active" => Ok(AgentStatus::Active),
            "blocked" => Ok(AgentStatus::Blocked),
            "offline" => Ok(AgentStatus::Offline),
            _ => Err(AgentStatusParseError(s.to_string())),
        }
    }

    pub fn can_accept_work(&self) -> bool {
        matches!(self, AgentStatus::Idle | AgentStatus::Active)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for AgentStatus {
    type Err = AgentStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStatusParseError(pub String);

impl fmt::Display for AgentStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid agent status: {}", self.0)
    }
}

impl std::error::Error for AgentStatusParseError {}

/// Kind of agent runtime, recorded on the agent identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    ClaudeCode,
    GptAgent,
    CustomPipeline,
    Human,
}

/// Capability an agent may hold. Gates sensitive operations as defense in
/// depth alongside owner/scope checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    MemoryRead,
    MemoryWrite,
    MemoryDelete,
    KbSearch,
    DecisionRead,
    IncidentRead,
    HandoffInitiate,
    HandoffReceive,
}

/// Permission level a member holds within a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum PoolPermission {
    Read,
    Write,
    Admin,
}

/// State of a handoff between two agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum HandoffStatus {
    Pending,
    Accepted,
    Completed,
    Rejected,
    Expired,
}

impl HandoffStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HandoffStatus::Completed | HandoffStatus::Rejected | HandoffStatus::Expired
        )
    }
}

impl fmt::Display for HandoffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HandoffStatus::Pending => "pending",
            HandoffStatus::Accepted => "accepted",
            HandoffStatus::Completed => "completed",
            HandoffStatus::Rejected => "rejected",
            HandoffStatus::Expired => "expired",
        };
        write!(f, "{}", s)
    }
}

/// Named blocks of the assembled context prompt, in priority rank order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum ContextBlockKind {
    System,
    Project,
    Task,
    History,
    Knowledge,
}

/// Lowercases and trims a token for case-insensitive comparisons (hedge
/// matching, tokenization, enum parsing inputs).
pub fn normalize_token(s: &str) -> String {
    s.trim().to_lowercase()
}
