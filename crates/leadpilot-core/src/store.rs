//! Persistence seams for the engine.
//!
//! Three traits, all RPITIT (return position `impl Trait` in traits)
//! consistent with the other async seams in this crate:
//!
//! - [`RunStore`]: run and run-item lifecycle records. Status transitions go
//!   through [`RunStore::transition_item`], which enforces the legal
//!   `queued -> running -> {done|failed}` order (cancelled only from queued).
//! - [`CredentialsStore`]: per-platform login credentials.
//! - [`FlowState`]: which workflow steps an item already completed, so a
//!   retry attempt can skip past them.
//!
//! The SQLite implementations live in `leadpilot-infra`; tests use the
//! in-memory fakes from the `memory` submodule.

use std::collections::HashSet;
use std::future::Future;

use uuid::Uuid;

use leadpilot_types::credentials::PlatformCredentials;
use leadpilot_types::error::{CredentialsError, RepositoryError};
use leadpilot_types::run::{Run, RunItem, RunItemStatus, RunStatus};

// ---------------------------------------------------------------------------
// RunStore
// ---------------------------------------------------------------------------

/// Persistence interface for runs and their items.
pub trait RunStore: Send + Sync {
    /// Persist a new run together with its items (all `Queued`).
    fn create_run(
        &self,
        run: &Run,
        items: &[RunItem],
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Load a run by id. `None` if unknown.
    fn run(&self, run_id: &Uuid) -> impl Future<Output = Result<Option<Run>, RepositoryError>> + Send;

    /// Most recent runs, newest first.
    fn list_runs(
        &self,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Run>, RepositoryError>> + Send;

    /// All items of a run, in creation order.
    fn items(
        &self,
        run_id: &Uuid,
    ) -> impl Future<Output = Result<Vec<RunItem>, RepositoryError>> + Send;

    /// Move an item to `next`, enforcing legal transitions. Terminal statuses
    /// set `completed_at`; `Failed` records the final error message.
    ///
    /// Illegal transitions return [`RepositoryError::Conflict`] and leave the
    /// record untouched.
    fn transition_item(
        &self,
        item_id: &Uuid,
        next: RunItemStatus,
        error: Option<String>,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Record where an item's artifacts are written.
    fn set_artifacts_dir(
        &self,
        item_id: &Uuid,
        dir: &str,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Update the aggregate run status (and `completed_at` when terminal).
    fn update_run_status(
        &self,
        run_id: &Uuid,
        status: RunStatus,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

// ---------------------------------------------------------------------------
// CredentialsStore
// ---------------------------------------------------------------------------

/// Resolution of per-platform login credentials.
pub trait CredentialsStore: Send + Sync {
    /// Resolve credentials for a platform. Missing credentials are a fatal
    /// error for the item that needs them, not a retryable condition.
    fn credentials(
        &self,
        platform: &str,
    ) -> impl Future<Output = Result<PlatformCredentials, CredentialsError>> + Send;

    /// Store (upsert) credentials for a platform.
    fn store(
        &self,
        credentials: PlatformCredentials,
    ) -> impl Future<Output = Result<(), CredentialsError>> + Send;
}

// ---------------------------------------------------------------------------
// FlowState
// ---------------------------------------------------------------------------

/// Per-item record of completed workflow steps, consulted on retry so an
/// attempt resumes after the last step that succeeded.
pub trait FlowState: Send + Sync {
    /// Steps the item has already completed in earlier attempts.
    fn completed_steps(
        &self,
        item_id: &Uuid,
    ) -> impl Future<Output = Result<HashSet<String>, RepositoryError>> + Send;

    /// Mark a step as completed for the item. Idempotent.
    fn record_completed(
        &self,
        item_id: &Uuid,
        step: &str,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Drop all step records for the item (called once it reaches a terminal
    /// status).
    fn clear(&self, item_id: &Uuid) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

// ---------------------------------------------------------------------------
// In-memory fakes for engine tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use dashmap::DashMap;
    use std::sync::Mutex;

    /// In-memory `RunStore` mirroring the SQLite implementation's transition
    /// checks.
    #[derive(Default)]
    pub struct MemoryRunStore {
        runs: Mutex<Vec<Run>>,
        items: DashMap<Uuid, RunItem>,
    }

    impl MemoryRunStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn item(&self, item_id: &Uuid) -> Option<RunItem> {
            self.items.get(item_id).map(|entry| entry.clone())
        }
    }

    impl RunStore for MemoryRunStore {
        async fn create_run(&self, run: &Run, items: &[RunItem]) -> Result<(), RepositoryError> {
            self.runs.lock().unwrap().push(run.clone());
            for item in items {
                self.items.insert(item.id, item.clone());
            }
            Ok(())
        }

        async fn run(&self, run_id: &Uuid) -> Result<Option<Run>, RepositoryError> {
            Ok(self
                .runs
                .lock()
                .unwrap()
                .iter()
                .find(|r| &r.id == run_id)
                .cloned())
        }

        async fn list_runs(&self, limit: u32) -> Result<Vec<Run>, RepositoryError> {
            let runs = self.runs.lock().unwrap();
            let mut list: Vec<Run> = runs.clone();
            list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            list.truncate(limit as usize);
            Ok(list)
        }

        async fn items(&self, run_id: &Uuid) -> Result<Vec<RunItem>, RepositoryError> {
            let mut list: Vec<RunItem> = self
                .items
                .iter()
                .filter(|entry| &entry.run_id == run_id)
                .map(|entry| entry.clone())
                .collect();
            list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            Ok(list)
        }

        async fn transition_item(
            &self,
            item_id: &Uuid,
            next: RunItemStatus,
            error: Option<String>,
        ) -> Result<(), RepositoryError> {
            let mut entry = self.items.get_mut(item_id).ok_or(RepositoryError::NotFound)?;
            if !entry.status.can_transition_to(next) {
                return Err(RepositoryError::Conflict(format!(
                    "illegal item transition {} -> {}",
                    entry.status, next
                )));
            }
            entry.status = next;
            if next.is_terminal() {
                entry.completed_at = Some(chrono::Utc::now());
            }
            if next == RunItemStatus::Failed {
                entry.error = error;
            }
            Ok(())
        }

        async fn set_artifacts_dir(&self, item_id: &Uuid, dir: &str) -> Result<(), RepositoryError> {
            let mut entry = self.items.get_mut(item_id).ok_or(RepositoryError::NotFound)?;
            entry.artifacts_dir = Some(dir.to_string());
            Ok(())
        }

        async fn update_run_status(
            &self,
            run_id: &Uuid,
            status: RunStatus,
        ) -> Result<(), RepositoryError> {
            let mut runs = self.runs.lock().unwrap();
            let run = runs
                .iter_mut()
                .find(|r| &r.id == run_id)
                .ok_or(RepositoryError::NotFound)?;
            run.status = status;
            if matches!(
                status,
                RunStatus::Completed
                    | RunStatus::PartiallyFailed
                    | RunStatus::Failed
                    | RunStatus::Cancelled
            ) {
                run.completed_at = Some(chrono::Utc::now());
            }
            Ok(())
        }
    }

    /// In-memory `CredentialsStore`.
    #[derive(Default)]
    pub struct MemoryCredentialsStore {
        entries: DashMap<String, PlatformCredentials>,
    }

    impl MemoryCredentialsStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(platform: &str, login: &str, password: &str) -> Self {
            let store = Self::new();
            store.entries.insert(
                platform.to_string(),
                PlatformCredentials::new(platform, login, password),
            );
            store
        }
    }

    impl CredentialsStore for MemoryCredentialsStore {
        async fn credentials(&self, platform: &str) -> Result<PlatformCredentials, CredentialsError> {
            self.entries
                .get(platform)
                .map(|entry| entry.clone())
                .ok_or_else(|| CredentialsError::NotFound(platform.to_string()))
        }

        async fn store(&self, credentials: PlatformCredentials) -> Result<(), CredentialsError> {
            self.entries.insert(credentials.platform.clone(), credentials);
            Ok(())
        }
    }

    /// In-memory `FlowState`.
    #[derive(Default)]
    pub struct MemoryFlowState {
        steps: DashMap<Uuid, HashSet<String>>,
    }

    impl MemoryFlowState {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl FlowState for MemoryFlowState {
        async fn completed_steps(&self, item_id: &Uuid) -> Result<HashSet<String>, RepositoryError> {
            Ok(self
                .steps
                .get(item_id)
                .map(|entry| entry.clone())
                .unwrap_or_default())
        }

        async fn record_completed(&self, item_id: &Uuid, step: &str) -> Result<(), RepositoryError> {
            self.steps
                .entry(*item_id)
                .or_default()
                .insert(step.to_string());
            Ok(())
        }

        async fn clear(&self, item_id: &Uuid) -> Result<(), RepositoryError> {
            self.steps.remove(item_id);
            Ok(())
        }
    }
}
