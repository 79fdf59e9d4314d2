//! Execution result types.
//!
//! An `ExecutionResult` is the single structured outcome of running one
//! product against one lead: overall success, the extracted quote (if any),
//! the ordered step trail, total duration, and warnings for partial success.
//! It is what gets persisted as `result.json` in the item's artifact
//! directory and what `process_all` hands back to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Quote
// ---------------------------------------------------------------------------

/// The output extracted by a successful product execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Premium amount as quoted by the platform.
    pub premium: f64,
    /// ISO currency code (e.g. "EUR").
    pub currency: String,
    /// Platform-assigned reference / offer number, when one is issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Any additional platform-specific fields worth keeping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

// ---------------------------------------------------------------------------
// StepResult
// ---------------------------------------------------------------------------

/// Outcome of a single step inside a product execution.
///
/// Steps never throw past their timing harness; a failed step is represented
/// here, not propagated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Step name as declared by the step itself.
    pub step: String,
    pub success: bool,
    /// Step payload (navigation outcome, extracted fragment, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl StepResult {
    /// A successful step result.
    pub fn ok(step: impl Into<String>, data: Option<Value>, duration_ms: u64) -> Self {
        Self {
            step: step.into(),
            success: true,
            data,
            error: None,
            duration_ms,
        }
    }

    /// A failed step result carrying the error message.
    pub fn failed(step: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            step: step.into(),
            success: false,
            data: None,
            error: Some(error.into()),
            duration_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutionResult
// ---------------------------------------------------------------------------

/// Structured outcome of one product execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    /// Extracted quote on success (a successful run may still yield none,
    /// e.g. when the platform declines to offer).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<Quote>,
    /// Ordered trail of executed steps.
    pub steps: Vec<StepResult>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Non-fatal issues (optional steps that failed, transformer notes).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionResult {
    /// A successful result with the given step trail.
    pub fn success(quote: Option<Quote>, steps: Vec<StepResult>, duration_ms: u64) -> Self {
        Self {
            success: true,
            quote,
            steps,
            duration_ms,
            error: None,
            warnings: Vec::new(),
            finished_at: Utc::now(),
        }
    }

    /// A failed result with the given step trail and error.
    pub fn failure(
        error: impl Into<String>,
        steps: Vec<StepResult>,
        duration_ms: u64,
    ) -> Self {
        Self {
            success: false,
            quote: None,
            steps,
            duration_ms,
            error: Some(error.into()),
            warnings: Vec::new(),
            finished_at: Utc::now(),
        }
    }

    /// Attach warnings, returning self (builder style).
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn result_roundtrips_through_json() {
        let result = ExecutionResult::success(
            Some(Quote {
                premium: 42.50,
                currency: "EUR".to_string(),
                reference: Some("Q-1001".to_string()),
                details: None,
            }),
            vec![
                StepResult::ok("navigate", None, 120),
                StepResult::ok("extract-quote", Some(json!({"premium": 42.5})), 310),
            ],
            430,
        )
        .with_warnings(vec!["screenshot skipped".to_string()]);

        let json = serde_json::to_string_pretty(&result).unwrap();
        let back: ExecutionResult = serde_json::from_str(&json).unwrap();
        assert!(back.success);
        assert_eq!(back.steps.len(), 2);
        assert_eq!(back.quote.as_ref().unwrap().premium, 42.50);
        assert_eq!(back.warnings, result.warnings);
    }

    #[test]
    fn failure_carries_error_and_trail() {
        let result = ExecutionResult::failure(
            "login rejected",
            vec![StepResult::failed("login", "login rejected", 95)],
            95,
        );
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("login rejected"));
        assert!(result.quote.is_none());
    }
}
