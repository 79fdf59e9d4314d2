//! SQLite run store implementation.
//!
//! Implements `RunStore` from `leadpilot-core` using sqlx with split
//! read/write pools. Status transitions are guarded in SQL: the UPDATE's
//! WHERE clause names the legal predecessor statuses, so an illegal
//! transition touches zero rows and surfaces as a conflict.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use leadpilot_core::store::RunStore;
use leadpilot_types::error::RepositoryError;
use leadpilot_types::run::{Run, RunItem, RunItemStatus, RunStatus};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `RunStore`.
pub struct SqliteRunStore {
    pool: DatabasePool,
}

impl SqliteRunStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct RunRow {
    id: String,
    status: String,
    created_at: String,
    completed_at: Option<String>,
}

impl RunRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    fn into_run(self) -> Result<Run, RepositoryError> {
        Ok(Run {
            id: parse_uuid(&self.id)?,
            status: parse_status::<RunStatus>(&self.status)?,
            created_at: parse_datetime(&self.created_at)?,
            completed_at: self.completed_at.as_deref().map(parse_datetime).transpose()?,
        })
    }
}

struct ItemRow {
    id: String,
    run_id: String,
    product_key: String,
    lead_id: String,
    status: String,
    artifacts_dir: Option<String>,
    created_at: String,
    completed_at: Option<String>,
    error: Option<String>,
}

impl ItemRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            run_id: row.try_get("run_id")?,
            product_key: row.try_get("product_key")?,
            lead_id: row.try_get("lead_id")?,
            status: row.try_get("status")?,
            artifacts_dir: row.try_get("artifacts_dir")?,
            created_at: row.try_get("created_at")?,
            completed_at: row.try_get("completed_at")?,
            error: row.try_get("error")?,
        })
    }

    fn into_item(self) -> Result<RunItem, RepositoryError> {
        Ok(RunItem {
            id: parse_uuid(&self.id)?,
            run_id: parse_uuid(&self.run_id)?,
            product_key: self.product_key,
            lead_id: parse_uuid(&self.lead_id)?,
            status: parse_status::<RunItemStatus>(&self.status)?,
            artifacts_dir: self.artifacts_dir,
            created_at: parse_datetime(&self.created_at)?,
            completed_at: self.completed_at.as_deref().map(parse_datetime).transpose()?,
            error: self.error,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid uuid: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Statuses are serialized as their serde snake_case names; reuse that
/// mapping instead of a parallel hand-written one.
fn status_str<S: serde::Serialize>(status: &S) -> String {
    serde_json::to_value(status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn parse_status<S: serde::de::DeserializeOwned>(s: &str) -> Result<S, RepositoryError> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|e| RepositoryError::Query(format!("invalid status '{s}': {e}")))
}

/// Predecessor statuses that may legally move to `next`.
fn legal_predecessors(next: RunItemStatus) -> &'static [&'static str] {
    match next {
        RunItemStatus::Running => &["queued"],
        RunItemStatus::Cancelled => &["queued"],
        RunItemStatus::Done | RunItemStatus::Failed => &["running"],
        RunItemStatus::Queued => &[],
    }
}

// ---------------------------------------------------------------------------
// RunStore implementation
// ---------------------------------------------------------------------------

impl RunStore for SqliteRunStore {
    async fn create_run(&self, run: &Run, items: &[RunItem]) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query("INSERT INTO runs (id, status, created_at, completed_at) VALUES (?, ?, ?, ?)")
            .bind(run.id.to_string())
            .bind(status_str(&run.status))
            .bind(run.created_at.to_rfc3339())
            .bind(run.completed_at.map(|dt| dt.to_rfc3339()))
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        for item in items {
            sqlx::query(
                "INSERT INTO run_items \
                 (id, run_id, product_key, lead_id, status, artifacts_dir, created_at, completed_at, error) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(item.id.to_string())
            .bind(item.run_id.to_string())
            .bind(&item.product_key)
            .bind(item.lead_id.to_string())
            .bind(status_str(&item.status))
            .bind(&item.artifacts_dir)
            .bind(item.created_at.to_rfc3339())
            .bind(item.completed_at.map(|dt| dt.to_rfc3339()))
            .bind(&item.error)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))
    }

    async fn run(&self, run_id: &Uuid) -> Result<Option<Run>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM runs WHERE id = ?")
            .bind(run_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.map(|row| {
            RunRow::from_row(&row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?
                .into_run()
        })
        .transpose()
    }

    async fn list_runs(&self, limit: u32) -> Result<Vec<Run>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM runs ORDER BY created_at DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                RunRow::from_row(row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_run()
            })
            .collect()
    }

    async fn items(&self, run_id: &Uuid) -> Result<Vec<RunItem>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM run_items WHERE run_id = ? ORDER BY created_at, id")
            .bind(run_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                ItemRow::from_row(row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_item()
            })
            .collect()
    }

    async fn transition_item(
        &self,
        item_id: &Uuid,
        next: RunItemStatus,
        error: Option<String>,
    ) -> Result<(), RepositoryError> {
        let predecessors = legal_predecessors(next);
        if predecessors.is_empty() {
            return Err(RepositoryError::Conflict(format!(
                "no legal transition into status '{next}'"
            )));
        }

        // Single-row guard: the WHERE clause only matches legal predecessors.
        let placeholders = vec!["?"; predecessors.len()].join(", ");
        let completed_at = next.is_terminal().then(|| Utc::now().to_rfc3339());
        let sql = format!(
            "UPDATE run_items SET status = ?, completed_at = COALESCE(?, completed_at), \
             error = COALESCE(?, error) WHERE id = ? AND status IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql)
            .bind(status_str(&next))
            .bind(completed_at)
            .bind(if next == RunItemStatus::Failed { error } else { None })
            .bind(item_id.to_string());
        for status in predecessors {
            query = query.bind(*status);
        }

        let outcome = query
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if outcome.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM run_items WHERE id = ?")
                .bind(item_id.to_string())
                .fetch_optional(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            return match exists {
                None => Err(RepositoryError::NotFound),
                Some(_) => Err(RepositoryError::Conflict(format!(
                    "illegal item transition into '{next}'"
                ))),
            };
        }
        Ok(())
    }

    async fn set_artifacts_dir(&self, item_id: &Uuid, dir: &str) -> Result<(), RepositoryError> {
        let outcome = sqlx::query("UPDATE run_items SET artifacts_dir = ? WHERE id = ?")
            .bind(dir)
            .bind(item_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if outcome.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn update_run_status(
        &self,
        run_id: &Uuid,
        status: RunStatus,
    ) -> Result<(), RepositoryError> {
        let terminal = matches!(
            status,
            RunStatus::Completed
                | RunStatus::PartiallyFailed
                | RunStatus::Failed
                | RunStatus::Cancelled
        );
        let completed_at = terminal.then(|| Utc::now().to_rfc3339());

        let outcome = sqlx::query(
            "UPDATE runs SET status = ?, completed_at = COALESCE(?, completed_at) WHERE id = ?",
        )
        .bind(status_str(&status))
        .bind(completed_at)
        .bind(run_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if outcome.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
