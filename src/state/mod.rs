/// Persistence layer for agent-trail.
///
/// Manages PostgreSQL connections and provides typed access to:
/// - Execution records and their anchor lifecycle
/// - Organizations and their API keys
///
/// All reads and writes go through the `RecordStore` trait so the worker,
/// verifier, and HTTP handlers can run against the in-memory
/// implementation in tests.
pub mod memory;
pub mod models;
pub mod repository;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Result, TrailError};
use models::{ExecutionRecord, Org, OrgApiKey};

pub use memory::MemoryStore;

/// Fields for a new execution record. Status always starts as pending.
#[derive(Debug, Clone)]
pub struct NewExecution {
    pub org_id: Uuid,
    pub run_id: Option<String>,
    pub goal: String,
    pub target_url: String,
    /// Engine-reported completion timestamp, stored verbatim.
    pub poa_timestamp: String,
    pub result_json: Option<Value>,
    pub poa_hash: String,
}

/// Typed access to execution records and org credentials.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_execution(&self, new: NewExecution) -> Result<ExecutionRecord>;

    async fn get_execution(&self, id: Uuid) -> Result<Option<ExecutionRecord>>;

    async fn list_executions(&self, org_id: Uuid, limit: i64) -> Result<Vec<ExecutionRecord>>;

    /// All records still pending, oldest first. Used for startup recovery.
    async fn list_pending(&self) -> Result<Vec<ExecutionRecord>>;

    /// Record that an anchor transaction was accepted by the node.
    /// Clears any previous failure and returns the record to pending.
    async fn set_submitted(&self, id: Uuid, tx_hash: &str) -> Result<()>;

    /// Record a confirmed anchor.
    async fn set_completed(&self, id: Uuid, tx_hash: &str) -> Result<()>;

    /// Record an anchor failure. A failed record always carries the error.
    async fn set_failed(&self, id: Uuid, error: &str) -> Result<()>;

    async fn find_api_key(&self, key_hash: &str) -> Result<Option<OrgApiKey>>;

    async fn get_org(&self, org_id: Uuid) -> Result<Option<Org>>;
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| TrailError::Database(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Run pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| TrailError::Database(format!("Migration failed: {e}")))
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
