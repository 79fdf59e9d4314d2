//! Run and RunItem execution tracking types.
//!
//! A `Run` is a batch of `RunItem`s submitted together. Each RunItem pairs one
//! product (workflow) with one lead and is the persisted unit of work the
//! engine drives through `queued -> running -> {done|failed}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Status of an individual run item.
///
/// Legal transitions: `Queued -> Running -> {Done | Failed}`. `Cancelled` may
/// only be entered from `Queued`, before any product code has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunItemStatus {
    Queued,
    Running,
    Done,
    Failed,
    Cancelled,
}

impl RunItemStatus {
    /// Whether this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: RunItemStatus) -> bool {
        use RunItemStatus::*;
        matches!(
            (self, next),
            (Queued, Running) | (Queued, Cancelled) | (Running, Done) | (Running, Failed)
        )
    }
}

impl std::fmt::Display for RunItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Aggregate status of a run, derived from its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    PartiallyFailed,
    Failed,
    Cancelled,
}

// ---------------------------------------------------------------------------
// Run / RunItem
// ---------------------------------------------------------------------------

/// A batch of run items submitted together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// UUIDv7 assigned on creation.
    pub id: Uuid,
    /// Aggregate status, derived from the items (see [`derive_run_status`]).
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// The persisted unit of work pairing one product with one lead inside a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunItem {
    /// UUIDv7 assigned on creation. Identity of the queue item as well.
    pub id: Uuid,
    pub run_id: Uuid,
    /// Registry key of the product to execute.
    pub product_key: String,
    pub lead_id: Uuid,
    pub status: RunItemStatus,
    /// Directory where result.json / error.json / screenshots are written.
    /// Unique per item; created before any write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts_dir: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Error message of the final failed attempt, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Derive the aggregate run status from its item statuses.
pub fn derive_run_status(items: &[RunItemStatus]) -> RunStatus {
    use RunItemStatus::*;

    if items.is_empty() {
        return RunStatus::Pending;
    }
    if items.iter().any(|s| matches!(s, Running)) {
        return RunStatus::Running;
    }
    if items.iter().any(|s| matches!(s, Queued)) {
        // Some items still waiting, none running yet
        return RunStatus::Pending;
    }
    let failed = items.iter().filter(|s| matches!(s, Failed)).count();
    let done = items.iter().filter(|s| matches!(s, Done)).count();
    let cancelled = items.iter().filter(|s| matches!(s, Cancelled)).count();

    if cancelled == items.len() {
        RunStatus::Cancelled
    } else if failed == 0 {
        RunStatus::Completed
    } else if done > 0 {
        RunStatus::PartiallyFailed
    } else {
        RunStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions() {
        use RunItemStatus::*;
        assert!(Queued.can_transition_to(Running));
        assert!(Queued.can_transition_to(Cancelled));
        assert!(Running.can_transition_to(Done));
        assert!(Running.can_transition_to(Failed));

        assert!(!Running.can_transition_to(Cancelled));
        assert!(!Done.can_transition_to(Failed));
        assert!(!Cancelled.can_transition_to(Running));
    }

    #[test]
    fn terminal_statuses() {
        assert!(RunItemStatus::Done.is_terminal());
        assert!(RunItemStatus::Failed.is_terminal());
        assert!(RunItemStatus::Cancelled.is_terminal());
        assert!(!RunItemStatus::Queued.is_terminal());
        assert!(!RunItemStatus::Running.is_terminal());
    }

    #[test]
    fn derive_status_mixed_outcomes() {
        use RunItemStatus::*;
        assert_eq!(derive_run_status(&[]), RunStatus::Pending);
        assert_eq!(derive_run_status(&[Done, Done]), RunStatus::Completed);
        assert_eq!(derive_run_status(&[Done, Failed]), RunStatus::PartiallyFailed);
        assert_eq!(derive_run_status(&[Failed, Failed]), RunStatus::Failed);
        assert_eq!(derive_run_status(&[Done, Running]), RunStatus::Running);
        assert_eq!(derive_run_status(&[Queued, Done]), RunStatus::Pending);
        assert_eq!(derive_run_status(&[Cancelled, Cancelled]), RunStatus::Cancelled);
    }

    #[test]
    fn status_serde_snake_case() {
        let json = serde_json::to_string(&RunItemStatus::Queued).unwrap();
        assert_eq!(json, "\"queued\"");
        let back: RunItemStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(back, RunItemStatus::Failed);
    }
}
