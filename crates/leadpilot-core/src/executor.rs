//! Item executor: drives one queue item through a full execution attempt.
//!
//! The executor owns the per-item lifecycle around product code: status
//! transitions, credential resolution, artifact directory setup, session
//! acquisition, context assembly, and result persistence. No error escapes
//! [`ItemExecutor::execute`]; every failure mode is folded into an
//! [`ItemOutcome`] whose disposition tells the queue's retry wrapper whether
//! another attempt can help.
//!
//! Persistence is finalized exactly once per item: `result.json` and the
//! terminal status are written when the attempt succeeded, failed fatally,
//! or was the last permitted attempt. Intermediate failed attempts leave the
//! item `Running` so the retry wrapper can go again.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use leadpilot_types::error::{CredentialsError, RepositoryError};
use leadpilot_types::queue::QueueItem;
use leadpilot_types::result::ExecutionResult;
use leadpilot_types::run::RunItemStatus;

use crate::artifact::{ArtifactError, ArtifactStore};
use crate::context::ExecutionContext;
use crate::product::run_product;
use crate::registry::{ProductRegistry, RegistryError};
use crate::retry::Retryable;
use crate::session::{SessionError, SessionPool};
use crate::store::{CredentialsStore, FlowState, RunStore};

// ---------------------------------------------------------------------------
// Errors and outcome
// ---------------------------------------------------------------------------

/// Failures that abort an attempt before a structured result exists.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("unknown product '{0}'")]
    ProductNotFound(String),

    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("execution cancelled")]
    Cancelled,
}

impl From<RegistryError> for ExecError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::ProductNotFound(key) => Self::ProductNotFound(key),
        }
    }
}

impl Retryable for ExecError {
    fn is_retryable(&self) -> bool {
        match self {
            // Another attempt gets a fresh session; transient browser and
            // network trouble is the whole reason retries exist.
            Self::Session(SessionError::Unsupported(_)) => false,
            Self::Session(_) => true,
            // Nothing an immediate retry can fix.
            Self::ProductNotFound(_)
            | Self::Credentials(_)
            | Self::Artifact(_)
            | Self::Repository(_)
            | Self::Cancelled => false,
        }
    }
}

/// How the retry wrapper should treat an attempt's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Success,
    /// Failed, but a later attempt may succeed.
    RetryableFailure,
    /// Failed in a way retrying cannot fix.
    FatalFailure,
}

/// The outcome of one execution attempt. Always carries a structured result,
/// synthesized from the error when the attempt aborted early.
#[derive(Debug)]
pub struct ItemOutcome {
    pub result: ExecutionResult,
    pub disposition: Disposition,
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.disposition, Disposition::Success)
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Executes one queue item per call, generic over the persistence seams.
pub struct ItemExecutor<R, C, F> {
    registry: Arc<ProductRegistry>,
    sessions: Arc<SessionPool>,
    runs: Arc<R>,
    credentials: Arc<C>,
    flow: Arc<F>,
    artifacts_root: PathBuf,
}

impl<R, C, F> ItemExecutor<R, C, F>
where
    R: RunStore,
    C: CredentialsStore,
    F: FlowState,
{
    pub fn new(
        registry: Arc<ProductRegistry>,
        sessions: Arc<SessionPool>,
        runs: Arc<R>,
        credentials: Arc<C>,
        flow: Arc<F>,
        artifacts_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            sessions,
            runs,
            credentials,
            flow,
            artifacts_root: artifacts_root.into(),
        }
    }

    /// Run one attempt for `item` on worker `worker_id`.
    ///
    /// `attempt` is 1-based; `last_attempt` tells the executor whether a
    /// failure here must be finalized (terminal status, result.json) instead
    /// of left open for the retry wrapper.
    #[tracing::instrument(
        skip_all,
        fields(item_id = %item.id, product = item.product_key.as_str(), worker_id, attempt)
    )]
    pub async fn execute(
        &self,
        item: &QueueItem,
        worker_id: usize,
        attempt: u32,
        last_attempt: bool,
        cancel: &CancellationToken,
    ) -> ItemOutcome {
        let started = Instant::now();
        let mut artifacts: Option<Arc<ArtifactStore>> = None;

        let attempt_result = self
            .execute_attempt(item, worker_id, attempt, cancel, &mut artifacts)
            .await;

        let mut cancelled_before_start = false;
        let (result, disposition) = match attempt_result {
            Ok(result) if result.success => (result, Disposition::Success),
            Ok(result) => {
                // Once the token has fired, another attempt would only trip
                // the pre-start cancellation check after a pointless backoff.
                let disposition = if cancel.is_cancelled() {
                    Disposition::FatalFailure
                } else {
                    Disposition::RetryableFailure
                };
                (result, disposition)
            }
            Err(error) => {
                cancelled_before_start = matches!(error, ExecError::Cancelled) && attempt == 1;
                let disposition = if error.is_retryable() {
                    Disposition::RetryableFailure
                } else {
                    Disposition::FatalFailure
                };
                tracing::warn!(%error, ?disposition, "attempt aborted before a structured result");
                if let Some(store) = &artifacts {
                    if let Err(write_error) = store.write_error(&error.to_string()).await {
                        tracing::warn!(%write_error, "failed to write error.json");
                    }
                }
                let synthesized = ExecutionResult::failure(
                    error.to_string(),
                    Vec::new(),
                    started.elapsed().as_millis() as u64,
                );
                (synthesized, disposition)
            }
        };

        let finalize = !matches!(disposition, Disposition::RetryableFailure) || last_attempt;
        if finalize {
            self.finalize(item, &result, cancelled_before_start, artifacts.as_deref())
                .await;
        }

        ItemOutcome {
            result,
            disposition,
        }
    }

    /// One attempt proper. Fills `artifacts_slot` as soon as the store
    /// exists so the caller can persist error.json on the abort path.
    async fn execute_attempt(
        &self,
        item: &QueueItem,
        worker_id: usize,
        attempt: u32,
        cancel: &CancellationToken,
        artifacts_slot: &mut Option<Arc<ArtifactStore>>,
    ) -> Result<ExecutionResult, ExecError> {
        if cancel.is_cancelled() {
            return Err(ExecError::Cancelled);
        }

        // Mark running before any product code. Retry attempts keep the
        // status from attempt one.
        if attempt == 1 {
            self.runs
                .transition_item(&item.id, RunItemStatus::Running, None)
                .await?;
        }

        let product = self.registry.get(&item.product_key)?;
        let metadata = product.metadata();
        let credentials = self.credentials.credentials(&metadata.platform).await?;

        let dir = self
            .artifacts_root
            .join(item.run_id.to_string())
            .join(item.id.to_string());
        let store = Arc::new(ArtifactStore::init(&dir).await?);
        *artifacts_slot = Some(Arc::clone(&store));
        self.runs
            .set_artifacts_dir(&item.id, &dir.to_string_lossy())
            .await?;

        let completed_steps = self.flow.completed_steps(&item.id).await?;
        let lease = self.sessions.acquire(worker_id).await?;

        let ctx = ExecutionContext {
            item_id: item.id,
            run_id: item.run_id,
            lead: item.lead.clone(),
            credentials,
            lease,
            artifacts: store,
            transformer: product.transformer(),
            cancel: cancel.clone(),
            completed_steps,
            attempt,
        };

        let result = run_product(&product, &ctx).await;

        // Remember which steps finished so a retry can resume past them.
        for step in result.steps.iter().filter(|s| s.success) {
            if let Err(error) = self.flow.record_completed(&item.id, &step.step).await {
                tracing::warn!(%error, step = step.step.as_str(), "failed to record completed step");
            }
        }

        drop(ctx);
        self.sessions.release(worker_id).await;

        Ok(result)
    }

    /// Terminal bookkeeping: result.json, final status, flow-state cleanup.
    async fn finalize(
        &self,
        item: &QueueItem,
        result: &ExecutionResult,
        cancelled_before_start: bool,
        artifacts: Option<&ArtifactStore>,
    ) {
        if let Some(store) = artifacts {
            if let Err(error) = store.write_result(result).await {
                tracing::warn!(%error, "failed to write result.json");
            }
        }

        if cancelled_before_start {
            // Legal only from Queued; if the item already started in an
            // earlier attempt, fall through to a failed terminal status.
            if self
                .runs
                .transition_item(&item.id, RunItemStatus::Cancelled, None)
                .await
                .is_ok()
            {
                self.clear_flow(item).await;
                return;
            }
        }

        let (status, error) = if result.success {
            (RunItemStatus::Done, None)
        } else {
            (RunItemStatus::Failed, result.error.clone())
        };
        if let Err(transition_error) = self.runs.transition_item(&item.id, status, error).await {
            tracing::warn!(%transition_error, %status, "failed to finalize item status");
        }

        self.clear_flow(item).await;
    }

    async fn clear_flow(&self, item: &QueueItem) {
        if let Err(error) = self.flow.clear(&item.id).await {
            tracing::warn!(%error, "failed to clear flow state");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
