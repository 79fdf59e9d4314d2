//! Transformer contract: pure lead-to-form mapping.
//!
//! A transformer converts the denormalized lead snapshot into the form
//! payload one target platform expects. It must be deterministic and free of
//! I/O -- the same lead always yields the same form -- so persisted artifacts
//! can be reproduced from their inputs.

use leadpilot_types::form::TransformOutput;
use leadpilot_types::lead::Lead;

/// Errors from lead-to-form transformation.
///
/// These surface as a structured failed result; they are never thrown across
/// the product boundary.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("lead is missing required field '{0}'")]
    MissingField(String),

    #[error("lead field '{field}' is invalid: {reason}")]
    InvalidField { field: String, reason: String },
}

/// Pure mapping from a lead snapshot to platform form data.
pub trait Transformer: Send + Sync {
    /// Transform the lead. Non-fatal issues (defaulted fields, lossy
    /// conversions) go into the output's warnings instead of failing.
    fn transform(&self, lead: &Lead) -> Result<TransformOutput, TransformError>;
}

/// Helper for transformers: require a field, mapping absence to
/// [`TransformError::MissingField`].
pub fn require<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, TransformError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| TransformError::MissingField(field.to_string()))
}
