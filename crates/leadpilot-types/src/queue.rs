//! Queue item and engine statistics types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lead::Lead;

/// A unit of queued work: one product key paired with one lead snapshot.
///
/// Immutable once enqueued; identity is `id` (the RunItem id). The engine
/// tracks the attempt counter externally so the item itself can stay frozen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    /// Same UUID as the persisted RunItem.
    pub id: Uuid,
    pub run_id: Uuid,
    /// Registry key of the product to execute.
    pub product_key: String,
    pub lead_id: Uuid,
    /// Denormalized lead snapshot frozen at enqueue time.
    pub lead: Lead,
    /// Maximum retry count for this item (attempts = max_retries + 1).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    2
}

/// Snapshot of worker slot occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub total: usize,
    pub busy: usize,
    pub idle: usize,
}

/// Snapshot of queue progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Items ever enqueued in this drain cycle.
    pub total: usize,
    /// Items still waiting in the queue.
    pub pending: usize,
    /// Items currently being executed.
    pub running: usize,
    /// Items that finished successfully.
    pub completed: usize,
    /// Items that exhausted retries or failed fatally.
    pub failed: usize,
    /// Worker slot occupancy.
    pub workers: WorkerStats,
}
