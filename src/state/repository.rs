/// PostgreSQL implementation of `RecordStore`.
///
/// All queries use sqlx runtime-checked queries (not compile-time checked)
/// to avoid requiring a live database during development builds.
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::models::*;
use super::{Database, NewExecution, RecordStore};
use crate::error::{Result, TrailError};

fn db_err(e: sqlx::Error) -> TrailError {
    TrailError::Database(e.to_string())
}

#[async_trait]
impl RecordStore for Database {
    async fn insert_execution(&self, new: NewExecution) -> Result<ExecutionRecord> {
        let id = Uuid::now_v7();
        let now = Utc::now();

        let record = sqlx::query_as::<_, ExecutionRecord>(
            r#"
            INSERT INTO executions
            (id, org_id, run_id, goal, target_url, poa_timestamp, result_json, poa_hash, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', $9, $10)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(new.org_id)
        .bind(&new.run_id)
        .bind(&new.goal)
        .bind(&new.target_url)
        .bind(&new.poa_timestamp)
        .bind(&new.result_json)
        .bind(&new.poa_hash)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(db_err)?;

        Ok(record)
    }

    async fn get_execution(&self, id: Uuid) -> Result<Option<ExecutionRecord>> {
        sqlx::query_as::<_, ExecutionRecord>("SELECT * FROM executions WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err)
    }

    async fn list_executions(&self, org_id: Uuid, limit: i64) -> Result<Vec<ExecutionRecord>> {
        sqlx::query_as::<_, ExecutionRecord>(
            "SELECT * FROM executions WHERE org_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(org_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(db_err)
    }

    async fn list_pending(&self) -> Result<Vec<ExecutionRecord>> {
        sqlx::query_as::<_, ExecutionRecord>(
            "SELECT * FROM executions WHERE status = 'pending' ORDER BY created_at",
        )
        .fetch_all(self.pool())
        .await
        .map_err(db_err)
    }

    async fn set_submitted(&self, id: Uuid, tx_hash: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE executions
            SET tx_hash = $2, status = 'pending', anchor_error = NULL, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(tx_hash)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn set_completed(&self, id: Uuid, tx_hash: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE executions
            SET tx_hash = $2, status = 'completed', anchor_error = NULL, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(tx_hash)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn set_failed(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE executions
            SET status = 'failed', anchor_error = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn find_api_key(&self, key_hash: &str) -> Result<Option<OrgApiKey>> {
        sqlx::query_as::<_, OrgApiKey>("SELECT * FROM org_api_keys WHERE key_hash = $1")
            .bind(key_hash)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err)
    }

    async fn get_org(&self, org_id: Uuid) -> Result<Option<Org>> {
        sqlx::query_as::<_, Org>("SELECT * FROM orgs WHERE id = $1")
            .bind(org_id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err)
    }
}
