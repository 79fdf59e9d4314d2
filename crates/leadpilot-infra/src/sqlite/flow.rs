//! SQLite flow-state implementation.
//!
//! Implements `FlowState` from `leadpilot-core`: one row per completed step
//! per item, keyed `(item_id, step)`. Inserts are idempotent upserts.

use std::collections::HashSet;

use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use leadpilot_core::store::FlowState;
use leadpilot_types::error::RepositoryError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `FlowState`.
pub struct SqliteFlowState {
    pool: DatabasePool,
}

impl SqliteFlowState {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl FlowState for SqliteFlowState {
    async fn completed_steps(&self, item_id: &Uuid) -> Result<HashSet<String>, RepositoryError> {
        let rows = sqlx::query("SELECT step FROM flow_steps WHERE item_id = ?")
            .bind(item_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("step")
                    .map_err(|e| RepositoryError::Query(e.to_string()))
            })
            .collect()
    }

    async fn record_completed(&self, item_id: &Uuid, step: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO flow_steps (item_id, step, completed_at) VALUES (?, ?, ?) \
             ON CONFLICT (item_id, step) DO NOTHING",
        )
        .bind(item_id.to_string())
        .bind(step)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }

    async fn clear(&self, item_id: &Uuid) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM flow_steps WHERE item_id = ?")
            .bind(item_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn state() -> (SqliteFlowState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("t.db").display());
        let pool = DatabasePool::new(&url).await.unwrap();
        (SqliteFlowState::new(pool), dir)
    }

    #[tokio::test]
    async fn record_read_clear() {
        let (state, _dir) = state().await;
        let item_id = Uuid::now_v7();

        assert!(state.completed_steps(&item_id).await.unwrap().is_empty());

        state.record_completed(&item_id, "login").await.unwrap();
        state.record_completed(&item_id, "login").await.unwrap();
        state.record_completed(&item_id, "fill_form").await.unwrap();

        let steps = state.completed_steps(&item_id).await.unwrap();
        assert_eq!(steps.len(), 2);
        assert!(steps.contains("login"));
        assert!(steps.contains("fill_form"));

        state.clear(&item_id).await.unwrap();
        assert!(state.completed_steps(&item_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn items_are_isolated() {
        let (state, _dir) = state().await;
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        state.record_completed(&a, "login").await.unwrap();

        assert!(state.completed_steps(&b).await.unwrap().is_empty());
    }
}
