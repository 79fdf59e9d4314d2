//! Step contract and the timing harness around it.
//!
//! A step is a named, optionally-skippable unit of browser work. Steps never
//! propagate errors past the harness: [`run_step`] converts any failure into
//! a structured failed [`StepResult`] with the elapsed time attached, and
//! [`run_steps`] composes a sequence where a required step's failure aborts
//! the product while an optional step's failure becomes a warning.

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use serde_json::{Value, json};

use leadpilot_types::result::StepResult;

use crate::context::ExecutionContext;
use crate::session::SessionError;
use crate::transform::TransformError;

/// Boxed future returned by step implementations.
pub type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<Value>, StepError>> + Send + 'a>>;

// ---------------------------------------------------------------------------
// StepError
// ---------------------------------------------------------------------------

/// Errors a step can surface to the harness. None of these escape past
/// [`run_step`].
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("step failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("step cancelled")]
    Cancelled,
}

// ---------------------------------------------------------------------------
// Step trait
// ---------------------------------------------------------------------------

/// A named unit of work inside a product execution.
pub trait Step: Send + Sync {
    /// Step name, unique within the product. Used for resume bookkeeping and
    /// the persisted step trail.
    fn name(&self) -> &str;

    /// Whether the enclosing product survives this step's failure. Optional
    /// step failures become warnings on an otherwise-successful result.
    fn optional(&self) -> bool {
        false
    }

    fn execute<'a>(&'a self, ctx: &'a ExecutionContext) -> StepFuture<'a>;
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Run one step under the timing harness.
///
/// Records duration, honors cancellation, skips steps already completed in a
/// previous attempt, and converts errors into failed step results instead of
/// propagating.
pub async fn run_step(step: &dyn Step, ctx: &ExecutionContext) -> StepResult {
    let name = step.name().to_string();

    if ctx.already_completed(&name) {
        tracing::debug!(step = name.as_str(), "skipping step completed in earlier attempt");
        return StepResult::ok(name, Some(json!({ "resumed": true })), 0);
    }

    if ctx.is_cancelled() {
        return StepResult::failed(name, "cancelled before step started", 0);
    }

    let started = Instant::now();
    let outcome = step.execute(ctx).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(data) => {
            tracing::debug!(step = name.as_str(), elapsed_ms, "step completed");
            StepResult::ok(name, data, elapsed_ms)
        }
        Err(error) => {
            tracing::warn!(step = name.as_str(), elapsed_ms, %error, "step failed");
            StepResult::failed(name, error.to_string(), elapsed_ms)
        }
    }
}

/// Outcome of running a step sequence.
pub struct StepRunOutcome {
    /// Ordered results of every step that ran (including the failing one).
    pub results: Vec<StepResult>,
    /// Name of the required step whose failure aborted the sequence, if any.
    pub failed_required: Option<String>,
    /// Warnings accumulated from failed optional steps.
    pub warnings: Vec<String>,
}

impl StepRunOutcome {
    pub fn succeeded(&self) -> bool {
        self.failed_required.is_none()
    }
}

/// Run steps sequentially. A required step's failure stops the sequence;
/// optional failures are recorded as warnings and execution continues.
pub async fn run_steps(steps: &[Box<dyn Step>], ctx: &ExecutionContext) -> StepRunOutcome {
    let mut results = Vec::with_capacity(steps.len());
    let mut warnings = Vec::new();
    let mut failed_required = None;

    for step in steps {
        let result = run_step(step.as_ref(), ctx).await;
        let failed = !result.success;
        let name = result.step.clone();
        let error = result.error.clone();
        results.push(result);

        if failed {
            if step.optional() {
                warnings.push(format!(
                    "optional step '{name}' failed: {}",
                    error.unwrap_or_default()
                ));
            } else {
                failed_required = Some(name);
                break;
            }
        }
    }

    StepRunOutcome {
        results,
        failed_required,
        warnings,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
