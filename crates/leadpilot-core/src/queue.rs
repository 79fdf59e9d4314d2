//! Queue manager and worker pool.
//!
//! Items wait in a `Mutex<VecDeque>`; [`QueueManager::process_all`] spawns
//! one consumer loop per worker in a `JoinSet`. Each loop pops under the
//! mutex, so no item is ever seen by two workers, and runs the item through
//! the retry wrapper. The returned map holds exactly one entry per enqueued
//! item: even an item that exhausts every attempt lands in the map with its
//! final failed result.
//!
//! Cancellation is a real interrupt: the manager's `CancellationToken` is
//! threaded down through the executor into the product's execution context.
//! Items still queued when the token fires are popped, marked cancelled by
//! the executor's pre-start check, and recorded in the result map like any
//! other outcome.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use dashmap::DashMap;

use leadpilot_types::queue::{QueueItem, QueueStats, WorkerStats};
use leadpilot_types::result::ExecutionResult;

use crate::executor::{Disposition, ItemExecutor, ItemOutcome};
use crate::retry::{RetryPolicy, Retryable};
use crate::store::{CredentialsStore, FlowState, RunStore};

/// A failed attempt flowing through the retry wrapper. Carries the
/// structured result so the final attempt's failure is never dropped.
struct FailedAttempt {
    result: ExecutionResult,
    fatal: bool,
}

impl std::fmt::Display for FailedAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.result.error {
            Some(error) => write!(f, "{error}"),
            None => write!(f, "attempt failed"),
        }
    }
}

impl Retryable for FailedAttempt {
    fn is_retryable(&self) -> bool {
        !self.fatal
    }
}

/// FIFO queue plus a fixed-size worker pool draining it.
pub struct QueueManager<R, C, F> {
    queue: Mutex<VecDeque<QueueItem>>,
    executor: Arc<ItemExecutor<R, C, F>>,
    retry: RetryPolicy,
    cancel: CancellationToken,
    results: DashMap<Uuid, ExecutionResult>,
    busy: Vec<AtomicBool>,
    total: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl<R, C, F> QueueManager<R, C, F>
where
    R: RunStore + Send + Sync + 'static,
    C: CredentialsStore + Send + Sync + 'static,
    F: FlowState + Send + Sync + 'static,
{
    pub fn new(executor: Arc<ItemExecutor<R, C, F>>, workers: usize, retry: RetryPolicy) -> Self {
        let workers = workers.max(1);
        Self {
            queue: Mutex::new(VecDeque::new()),
            executor,
            retry,
            cancel: CancellationToken::new(),
            results: DashMap::new(),
            busy: (0..workers).map(|_| AtomicBool::new(false)).collect(),
            total: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Append items FIFO. Safe to call while workers are draining. An item
    /// id already waiting in the queue is skipped, so re-enqueueing a batch
    /// does not execute its items twice.
    pub fn enqueue(&self, items: impl IntoIterator<Item = QueueItem>) {
        let mut queue = self.queue.lock().unwrap();
        let mut pending: HashSet<Uuid> = queue.iter().map(|item| item.id).collect();
        let mut added = 0;
        for item in items {
            if pending.insert(item.id) {
                queue.push_back(item);
                added += 1;
            } else {
                tracing::debug!(item_id = %item.id, "skipping duplicate enqueue");
            }
        }
        self.total.fetch_add(added, Ordering::SeqCst);
        tracing::debug!(enqueued = added, pending = queue.len(), "items enqueued");
    }

    /// Token observed by every execution context built for this manager.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Interrupt the drain: running items see the token through their
    /// context, queued items are finalized as cancelled.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drain the queue with one consumer loop per worker.
    ///
    /// Returns one result per enqueued item once every worker loop has
    /// finished.
    pub async fn process_all(self: &Arc<Self>) -> HashMap<Uuid, ExecutionResult> {
        let workers = self.busy.len();
        tracing::info!(workers, pending = self.pending(), "draining queue");

        let mut set = JoinSet::new();
        for worker_id in 0..workers {
            let manager = Arc::clone(self);
            set.spawn(async move { manager.worker_loop(worker_id).await });
        }
        while let Some(joined) = set.join_next().await {
            if let Err(error) = joined {
                tracing::error!(%error, "worker loop task failed");
            }
        }

        let mut map = HashMap::with_capacity(self.results.len());
        for entry in self.results.iter() {
            map.insert(*entry.key(), entry.value().clone());
        }
        // Reset for the next drain cycle; stats are per-drain, not lifetime.
        self.results.clear();
        self.total.store(0, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
        map
    }

    async fn worker_loop(&self, worker_id: usize) {
        loop {
            let item = self.queue.lock().unwrap().pop_front();
            let Some(item) = item else { break };

            self.busy[worker_id].store(true, Ordering::SeqCst);
            let result = self.run_with_retry(&item, worker_id).await;
            if result.success {
                self.completed.fetch_add(1, Ordering::SeqCst);
            } else {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
            self.results.insert(item.id, result);
            self.busy[worker_id].store(false, Ordering::SeqCst);
        }
        tracing::debug!(worker_id, "worker loop drained");
    }

    /// Run one item through attempts `1..=max_retries + 1` with backoff.
    async fn run_with_retry(&self, item: &QueueItem, worker_id: usize) -> ExecutionResult {
        let max_attempts = item.max_retries.saturating_add(1);
        let policy = RetryPolicy {
            max_attempts,
            ..self.retry.clone()
        };

        let outcome = policy
            .run(|attempt| self.execute_once(item, worker_id, attempt, attempt >= max_attempts))
            .await;

        match outcome {
            Ok(result) => result,
            Err(failed) => failed.result,
        }
    }

    async fn execute_once(
        &self,
        item: &QueueItem,
        worker_id: usize,
        attempt: u32,
        last_attempt: bool,
    ) -> Result<ExecutionResult, FailedAttempt> {
        let ItemOutcome {
            result,
            disposition,
        } = self
            .executor
            .execute(item, worker_id, attempt, last_attempt, &self.cancel)
            .await;

        match disposition {
            Disposition::Success => Ok(result),
            Disposition::RetryableFailure => Err(FailedAttempt {
                result,
                fatal: false,
            }),
            Disposition::FatalFailure => Err(FailedAttempt {
                result,
                fatal: true,
            }),
        }
    }

    fn pending(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn worker_stats(&self) -> WorkerStats {
        let busy = self
            .busy
            .iter()
            .filter(|flag| flag.load(Ordering::SeqCst))
            .count();
        WorkerStats {
            total: self.busy.len(),
            busy,
            idle: self.busy.len() - busy,
        }
    }

    pub fn stats(&self) -> QueueStats {
        let workers = self.worker_stats();
        QueueStats {
            total: self.total.load(Ordering::SeqCst),
            pending: self.pending(),
            running: workers.busy,
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            workers,
        }
    }
}
