/// Database models for agent-trail.
///
/// These structs map directly to PostgreSQL tables and are used
/// for both reading and writing via sqlx.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Anchor lifecycle status of an execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "execution_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Completed,
    Failed,
}

/// A recorded agent execution and its PoA commitment.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub org_id: Uuid,
    /// Run identifier assigned by the automation engine.
    pub run_id: Option<String>,
    /// What the agent was asked to do.
    pub goal: String,
    /// URL the agent ended on (the URL the hash commits to).
    pub target_url: String,
    /// Engine completion timestamp, kept verbatim: the exact string
    /// re-enters the hash during verification.
    pub poa_timestamp: Option<String>,
    /// Structured result payload from the engine.
    pub result_json: Option<Value>,
    /// SHA-256 commitment over the canonical payload (lowercase hex).
    pub poa_hash: String,
    /// Anchoring transaction hash, set once the node accepts it.
    pub tx_hash: Option<String>,
    pub status: ExecutionStatus,
    /// Failure detail; non-null whenever status is failed.
    pub anchor_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An organization using the API.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Org {
    pub id: Uuid,
    pub name: String,
    /// "active" orgs may call the API; anything else is rejected.
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// An API key issued to an organization.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrgApiKey {
    pub id: Uuid,
    pub org_id: Uuid,
    /// SHA-256 hex of the raw key. The raw key is never stored.
    pub key_hash: String,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}
