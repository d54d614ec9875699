/// In-memory implementation of `RecordStore` for tests.
///
/// Mirrors the update semantics of the PostgreSQL implementation,
/// including the lifecycle rules: submission clears a previous failure,
/// and a failed record always carries its error.
use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::*;
use super::{NewExecution, RecordStore};
use crate::error::Result;

use async_trait::async_trait;

#[derive(Default)]
pub struct MemoryStore {
    executions: RwLock<HashMap<Uuid, ExecutionRecord>>,
    api_keys: RwLock<HashMap<String, OrgApiKey>>,
    orgs: RwLock<HashMap<Uuid, Org>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an org with the given status ("active" to allow API calls).
    pub async fn seed_org(&self, name: &str, status: &str) -> Uuid {
        let org = Org {
            id: Uuid::now_v7(),
            name: name.to_string(),
            status: status.to_string(),
            created_at: Utc::now(),
        };
        let id = org.id;
        self.orgs.write().await.insert(id, org);
        id
    }

    /// Register an API key hash for an org.
    pub async fn seed_key(&self, org_id: Uuid, key_hash: &str, revoked: bool) {
        let key = OrgApiKey {
            id: Uuid::now_v7(),
            org_id,
            key_hash: key_hash.to_string(),
            revoked,
            created_at: Utc::now(),
        };
        self.api_keys.write().await.insert(key.key_hash.clone(), key);
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_execution(&self, new: NewExecution) -> Result<ExecutionRecord> {
        let now = Utc::now();
        let record = ExecutionRecord {
            id: Uuid::now_v7(),
            org_id: new.org_id,
            run_id: new.run_id,
            goal: new.goal,
            target_url: new.target_url,
            poa_timestamp: Some(new.poa_timestamp),
            result_json: new.result_json,
            poa_hash: new.poa_hash,
            tx_hash: None,
            status: ExecutionStatus::Pending,
            anchor_error: None,
            created_at: now,
            updated_at: now,
        };
        self.executions
            .write()
            .await
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_execution(&self, id: Uuid) -> Result<Option<ExecutionRecord>> {
        Ok(self.executions.read().await.get(&id).cloned())
    }

    async fn list_executions(&self, org_id: Uuid, limit: i64) -> Result<Vec<ExecutionRecord>> {
        let mut records: Vec<ExecutionRecord> = self
            .executions
            .read()
            .await
            .values()
            .filter(|r| r.org_id == org_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit as usize);
        Ok(records)
    }

    async fn list_pending(&self) -> Result<Vec<ExecutionRecord>> {
        let mut records: Vec<ExecutionRecord> = self
            .executions
            .read()
            .await
            .values()
            .filter(|r| r.status == ExecutionStatus::Pending)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn set_submitted(&self, id: Uuid, tx_hash: &str) -> Result<()> {
        if let Some(record) = self.executions.write().await.get_mut(&id) {
            record.tx_hash = Some(tx_hash.to_string());
            record.status = ExecutionStatus::Pending;
            record.anchor_error = None;
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_completed(&self, id: Uuid, tx_hash: &str) -> Result<()> {
        if let Some(record) = self.executions.write().await.get_mut(&id) {
            record.tx_hash = Some(tx_hash.to_string());
            record.status = ExecutionStatus::Completed;
            record.anchor_error = None;
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_failed(&self, id: Uuid, error: &str) -> Result<()> {
        if let Some(record) = self.executions.write().await.get_mut(&id) {
            record.status = ExecutionStatus::Failed;
            record.anchor_error = Some(error.to_string());
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn find_api_key(&self, key_hash: &str) -> Result<Option<OrgApiKey>> {
        Ok(self.api_keys.read().await.get(key_hash).cloned())
    }

    async fn get_org(&self, org_id: Uuid) -> Result<Option<Org>> {
        Ok(self.orgs.read().await.get(&org_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_execution(org_id: Uuid) -> NewExecution {
        NewExecution {
            org_id,
            run_id: Some("run-1".to_string()),
            goal: "g".to_string(),
            target_url: "https://example.com".to_string(),
            poa_timestamp: "2024-01-01T00:00:00Z".to_string(),
            result_json: Some(json!({"k": "v"})),
            poa_hash: "abc".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_starts_pending_without_tx() {
        let store = MemoryStore::new();
        let record = store.insert_execution(new_execution(Uuid::now_v7())).await.unwrap();

        assert_eq!(record.status, ExecutionStatus::Pending);
        assert!(record.tx_hash.is_none());
        assert!(record.anchor_error.is_none());
    }

    #[tokio::test]
    async fn test_submission_after_failure_clears_error_and_returns_to_pending() {
        let store = MemoryStore::new();
        let record = store.insert_execution(new_execution(Uuid::now_v7())).await.unwrap();

        store.set_failed(record.id, "gas too low").await.unwrap();
        let failed = store.get_execution(record.id).await.unwrap().unwrap();
        assert_eq!(failed.status, ExecutionStatus::Failed);
        assert_eq!(failed.anchor_error.as_deref(), Some("gas too low"));

        store.set_submitted(record.id, "0x01").await.unwrap();
        let retried = store.get_execution(record.id).await.unwrap().unwrap();
        assert_eq!(retried.status, ExecutionStatus::Pending);
        assert!(retried.anchor_error.is_none());
        assert_eq!(retried.tx_hash.as_deref(), Some("0x01"));
    }

    #[tokio::test]
    async fn test_failed_record_keeps_tx_hash_from_submission() {
        let store = MemoryStore::new();
        let record = store.insert_execution(new_execution(Uuid::now_v7())).await.unwrap();

        store.set_submitted(record.id, "0x02").await.unwrap();
        store.set_failed(record.id, "confirmation timed out").await.unwrap();

        let failed = store.get_execution(record.id).await.unwrap().unwrap();
        assert_eq!(failed.status, ExecutionStatus::Failed);
        assert_eq!(failed.tx_hash.as_deref(), Some("0x02"));
        assert!(failed.anchor_error.is_some());
    }

    #[tokio::test]
    async fn test_listing_is_scoped_by_org() {
        let store = MemoryStore::new();
        let org_a = Uuid::now_v7();
        let org_b = Uuid::now_v7();

        store.insert_execution(new_execution(org_a)).await.unwrap();
        store.insert_execution(new_execution(org_a)).await.unwrap();
        store.insert_execution(new_execution(org_b)).await.unwrap();

        assert_eq!(store.list_executions(org_a, 50).await.unwrap().len(), 2);
        assert_eq!(store.list_executions(org_b, 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_pending_excludes_terminal_records() {
        let store = MemoryStore::new();
        let org = Uuid::now_v7();

        let a = store.insert_execution(new_execution(org)).await.unwrap();
        let b = store.insert_execution(new_execution(org)).await.unwrap();
        let c = store.insert_execution(new_execution(org)).await.unwrap();

        store.set_completed(a.id, "0x0a").await.unwrap();
        store.set_failed(b.id, "boom").await.unwrap();

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, c.id);
    }
}
