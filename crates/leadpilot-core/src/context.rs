//! Per-execution context handed to products and steps.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use leadpilot_types::credentials::PlatformCredentials;
use leadpilot_types::lead::Lead;

use crate::artifact::ArtifactStore;
use crate::session::{BrowserPage, SessionLease};
use crate::transform::Transformer;

/// Everything a product needs for one execution: the lead snapshot, resolved
/// credentials, the worker's browser session lease, the artifact store, the
/// optional transformer, a cancellation token, and the set of step names
/// already completed in a previous attempt of this item (resume support).
///
/// The context is assembled by the item executor and lives for exactly one
/// product execution. Products hold no state beyond it.
pub struct ExecutionContext {
    /// RunItem / QueueItem id.
    pub item_id: Uuid,
    pub run_id: Uuid,
    pub lead: Lead,
    pub credentials: PlatformCredentials,
    pub lease: SessionLease,
    pub artifacts: Arc<ArtifactStore>,
    /// The product's transformer, when it declares one.
    pub transformer: Option<Arc<dyn Transformer>>,
    /// Cancellation signal for the whole run; steps check it between
    /// operations so a cancelled run aborts promptly.
    pub cancel: CancellationToken,
    /// Step names completed in an earlier attempt of this item.
    pub completed_steps: HashSet<String>,
    /// 1-based attempt index.
    pub attempt: u32,
}

impl ExecutionContext {
    /// The page opened for this execution.
    pub fn page(&self) -> &Arc<dyn BrowserPage> {
        &self.lease.page
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether a step already completed in a previous attempt and can be
    /// skipped on resume.
    pub fn already_completed(&self, step_name: &str) -> bool {
        self.completed_steps.contains(step_name)
    }
}
