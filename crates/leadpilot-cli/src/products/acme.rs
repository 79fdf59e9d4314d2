//! Reference product: liability quotes on the Acme Insure demo portal.
//!
//! Workflow: navigate -> login -> fill_form -> submit -> extract_quote, plus
//! an optional screenshot step (the HTTP driver declines it, which shows up
//! as a warning rather than a failure). The portal base URL comes from
//! `LEADPILOT_ACME_URL` so the product can be pointed at a local stub.

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;

use leadpilot_core::context::ExecutionContext;
use leadpilot_core::product::{Product, ProductError};
use leadpilot_core::step::{Step, StepError, StepFuture, run_steps};
use leadpilot_core::transform::{TransformError, Transformer, require};
use leadpilot_types::form::{FormData, TransformOutput};
use leadpilot_types::lead::Lead;
use leadpilot_types::product::ProductMetadata;
use leadpilot_types::result::{ExecutionResult, Quote};

const DEFAULT_BASE_URL: &str = "https://portal.acme-insure.test";

fn base_url() -> String {
    std::env::var("LEADPILOT_ACME_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

// ---------------------------------------------------------------------------
// Transformer
// ---------------------------------------------------------------------------

/// Maps a lead snapshot onto the Acme quote form fields.
pub struct AcmeTransformer;

impl Transformer for AcmeTransformer {
    fn transform(&self, lead: &Lead) -> Result<TransformOutput, TransformError> {
        let mut form = FormData::new();
        form.set("vorname", require(Some(lead.first_name.as_str()), "first_name")?);
        form.set("nachname", require(Some(lead.last_name.as_str()), "last_name")?);
        form.set(
            "geburtsdatum",
            require(lead.date_of_birth.as_deref(), "date_of_birth")?,
        );

        let mut output = TransformOutput::new(form);
        match lead.postal_code.as_deref() {
            Some(plz) => output.form.set("plz", plz),
            None => output.warn("postal_code missing, portal will ask for it"),
        }
        if let Some(email) = lead.email.as_deref() {
            output.form.set("email", email);
        }
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

struct Navigate {
    base: String,
}

impl Step for Navigate {
    fn name(&self) -> &str {
        "navigate"
    }

    fn execute<'a>(&'a self, ctx: &'a ExecutionContext) -> StepFuture<'a> {
        Box::pin(async move {
            ctx.page().goto(&format!("{}/quote", self.base)).await?;
            Ok(Some(json!({ "url": ctx.page().current_url() })))
        })
    }
}

struct Login;

impl Step for Login {
    fn name(&self) -> &str {
        "login"
    }

    fn execute<'a>(&'a self, ctx: &'a ExecutionContext) -> StepFuture<'a> {
        Box::pin(async move {
            let mut form = FormData::new();
            form.set("username", &ctx.credentials.login);
            form.set("password", ctx.credentials.password());
            ctx.page().fill(&form).await?;
            ctx.page().submit("/login").await?;
            Ok(None)
        })
    }
}

struct FillForm;

impl Step for FillForm {
    fn name(&self) -> &str {
        "fill_form"
    }

    fn execute<'a>(&'a self, ctx: &'a ExecutionContext) -> StepFuture<'a> {
        Box::pin(async move {
            let transformer = ctx
                .transformer
                .as_ref()
                .ok_or_else(|| StepError::Failed("product declared no transformer".to_string()))?;
            let output = transformer.transform(&ctx.lead)?;
            ctx.page().fill(&output.form).await?;
            Ok(Some(json!({
                "fields": output.form.len(),
                "warnings": output.warnings,
            })))
        })
    }
}

struct Submit;

impl Step for Submit {
    fn name(&self) -> &str {
        "submit"
    }

    fn execute<'a>(&'a self, ctx: &'a ExecutionContext) -> StepFuture<'a> {
        Box::pin(async move {
            ctx.page().submit("/quote").await?;
            Ok(None)
        })
    }
}

struct ExtractQuote;

impl Step for ExtractQuote {
    fn name(&self) -> &str {
        "extract_quote"
    }

    fn execute<'a>(&'a self, ctx: &'a ExecutionContext) -> StepFuture<'a> {
        Box::pin(async move {
            let content = ctx.page().content().await?;
            let quote = parse_quote(&content)
                .ok_or_else(|| StepError::Failed("no quote found in portal response".to_string()))?;
            Ok(Some(serde_json::to_value(&quote).map_err(|e| {
                StepError::Failed(format!("quote serialization: {e}"))
            })?))
        })
    }
}

struct Screenshot;

impl Step for Screenshot {
    fn name(&self) -> &str {
        "screenshot"
    }

    fn optional(&self) -> bool {
        true
    }

    fn execute<'a>(&'a self, ctx: &'a ExecutionContext) -> StepFuture<'a> {
        Box::pin(async move {
            let bytes = ctx.page().screenshot().await?;
            ctx.artifacts
                .write_screenshot("final.png", &bytes)
                .await
                .map_err(|e| StepError::Failed(e.to_string()))?;
            Ok(Some(json!({ "file": "screenshots/final.png" })))
        })
    }
}

/// Pull `premium: <amount> <currency> [reference: <ref>]` out of the portal's
/// confirmation page.
fn parse_quote(content: &str) -> Option<Quote> {
    let mut tokens = content.split_whitespace().peekable();
    let mut premium = None;
    let mut currency = None;
    let mut reference = None;

    while let Some(token) = tokens.next() {
        match token {
            "premium:" => {
                premium = tokens.next().and_then(|t| t.parse::<f64>().ok());
                currency = tokens
                    .peek()
                    .filter(|t| t.chars().all(|c| c.is_ascii_uppercase()))
                    .map(|t| t.to_string());
                if currency.is_some() {
                    tokens.next();
                }
            }
            "reference:" => {
                reference = tokens.next().map(str::to_string);
            }
            _ => {}
        }
    }

    Some(Quote {
        premium: premium?,
        currency: currency.unwrap_or_else(|| "EUR".to_string()),
        reference,
        details: None,
    })
}

// ---------------------------------------------------------------------------
// Product
// ---------------------------------------------------------------------------

/// Liability-insurance quote workflow on the Acme Insure portal.
pub struct AcmeLiability {
    base: String,
}

impl AcmeLiability {
    pub fn new() -> Self {
        Self { base: base_url() }
    }
}

impl Default for AcmeLiability {
    fn default() -> Self {
        Self::new()
    }
}

impl Product for AcmeLiability {
    fn metadata(&self) -> ProductMetadata {
        ProductMetadata {
            key: "acme-insure/liability".to_string(),
            name: "Acme Insure Liability".to_string(),
            platform: "acme-insure".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: Some("Private liability quotes on the Acme Insure portal".to_string()),
        }
    }

    fn transformer(&self) -> Option<Arc<dyn Transformer>> {
        Some(Arc::new(AcmeTransformer))
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<ExecutionResult, ProductError> {
        let started = Instant::now();
        let steps: Vec<Box<dyn Step>> = vec![
            Box::new(Navigate {
                base: self.base.clone(),
            }),
            Box::new(Login),
            Box::new(FillForm),
            Box::new(Submit),
            Box::new(ExtractQuote),
            Box::new(Screenshot),
        ];

        let outcome = run_steps(&steps, ctx).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if let Some(failed) = outcome.failed_required {
            let error = outcome
                .results
                .iter()
                .find(|r| r.step == failed)
                .and_then(|r| r.error.clone())
                .unwrap_or_else(|| format!("step '{failed}' failed"));
            return Ok(
                ExecutionResult::failure(error, outcome.results, elapsed_ms)
                    .with_warnings(outcome.warnings),
            );
        }

        let quote = outcome
            .results
            .iter()
            .find(|r| r.step == "extract_quote")
            .and_then(|r| r.data.clone())
            .and_then(|data| serde_json::from_value(data).ok());

        Ok(
            ExecutionResult::success(quote, outcome.results, elapsed_ms)
                .with_warnings(outcome.warnings),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lead() -> Lead {
        Lead {
            id: uuid::Uuid::now_v7(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: Some("ada@example.com".to_string()),
            phone: None,
            date_of_birth: Some("1990-12-10".to_string()),
            postal_code: None,
            city: None,
            street: None,
            extra: HashMap::new(),
            captured_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn transformer_maps_fields_and_warns_on_missing_plz() {
        let output = AcmeTransformer.transform(&lead()).unwrap();
        assert_eq!(output.form.get("vorname"), Some("Ada"));
        assert_eq!(output.form.get("nachname"), Some("Lovelace"));
        assert_eq!(output.form.get("geburtsdatum"), Some("1990-12-10"));
        assert_eq!(output.form.get("email"), Some("ada@example.com"));
        assert!(output.form.get("plz").is_none());
        assert_eq!(output.warnings.len(), 1);
    }

    #[test]
    fn transformer_requires_date_of_birth() {
        let mut lead = lead();
        lead.date_of_birth = None;
        let err = AcmeTransformer.transform(&lead).unwrap_err();
        assert!(matches!(err, TransformError::MissingField(_)));
    }

    #[test]
    fn quote_parsing() {
        let quote = parse_quote("Thank you! premium: 124.50 EUR reference: Q-2024-0042").unwrap();
        assert_eq!(quote.premium, 124.50);
        assert_eq!(quote.currency, "EUR");
        assert_eq!(quote.reference.as_deref(), Some("Q-2024-0042"));

        assert!(parse_quote("no numbers here").is_none());
    }
}
