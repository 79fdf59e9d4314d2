//! Product contract: the pluggable implementation of one workflow.
//!
//! `Product` uses RPITIT (return-position `impl Trait` in traits) like the
//! rest of the engine's seams, so it cannot be a trait object directly. The
//! `ProductDyn` mirror trait with boxed futures plus the [`BoxProduct`]
//! wrapper provide dynamic dispatch for the registry:
//! 1. define an object-safe `ProductDyn` trait with boxed futures,
//! 2. blanket-impl `ProductDyn` for all `T: Product`,
//! 3. `BoxProduct` wraps `Box<dyn ProductDyn>` and delegates.
//!
//! [`run_product`] is the lifecycle wrapper: it invokes the optional hooks
//! and converts any error -- or panic -- inside product code into a failed
//! [`ExecutionResult`] with an empty step list. Nothing thrown by a product
//! crosses this boundary.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;

use leadpilot_types::product::ProductMetadata;
use leadpilot_types::result::ExecutionResult;

use crate::context::ExecutionContext;
use crate::transform::{TransformError, Transformer};

// ---------------------------------------------------------------------------
// ProductError
// ---------------------------------------------------------------------------

/// Errors a product can surface to the lifecycle wrapper.
#[derive(Debug, thiserror::Error)]
pub enum ProductError {
    #[error("product execution failed: {0}")]
    Execution(String),

    /// The transformer rejected the lead data. Surfaced as a structured
    /// failed result, never rethrown.
    #[error("lead validation failed: {0}")]
    Validation(#[from] TransformError),

    #[error("required step '{0}' failed")]
    StepFailed(String),

    #[error("execution cancelled")]
    Cancelled,
}

// ---------------------------------------------------------------------------
// Lifecycle hooks
// ---------------------------------------------------------------------------

/// Boxed future for hook callbacks.
pub type HookFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type BeforeHook =
    Box<dyn for<'a> Fn(&'a ExecutionContext) -> HookFuture<'a, Result<(), ProductError>> + Send + Sync>;
type AfterHook =
    Box<dyn for<'a> Fn(&'a ExecutionContext, &'a ExecutionResult) -> HookFuture<'a, ()> + Send + Sync>;
type ErrorHook =
    Box<dyn for<'a> Fn(&'a ExecutionContext, &'a ProductError) -> HookFuture<'a, ()> + Send + Sync>;

/// Optional lifecycle callbacks around a product execution.
///
/// `before` may veto the execution by returning an error; `after` and
/// `on_error` are best-effort observers.
#[derive(Default)]
pub struct ProductHooks {
    pub before: Option<BeforeHook>,
    pub after: Option<AfterHook>,
    pub on_error: Option<ErrorHook>,
}

// ---------------------------------------------------------------------------
// Product trait + dyn mirror
// ---------------------------------------------------------------------------

/// The pluggable implementation of one workflow (one platform x one
/// offering). Products hold no state beyond what the context passes in: the
/// registry builds a fresh instance per execution.
pub trait Product: Send + Sync {
    /// Static metadata (key, platform, version).
    fn metadata(&self) -> ProductMetadata;

    /// The product's lead transformer, when it declares one. The executor
    /// places it into the execution context.
    fn transformer(&self) -> Option<Arc<dyn Transformer>> {
        None
    }

    /// Lifecycle hooks invoked by [`run_product`].
    fn hooks(&self) -> ProductHooks {
        ProductHooks::default()
    }

    /// Execute the workflow against the context's lead and session.
    fn execute(
        &self,
        ctx: &ExecutionContext,
    ) -> impl Future<Output = Result<ExecutionResult, ProductError>> + Send;
}

/// Object-safe version of [`Product`] with boxed futures.
///
/// This trait exists solely to enable dynamic dispatch (`dyn ProductDyn`).
/// A blanket implementation is provided for all types implementing `Product`.
pub trait ProductDyn: Send + Sync {
    fn metadata(&self) -> ProductMetadata;

    fn transformer(&self) -> Option<Arc<dyn Transformer>>;

    fn hooks(&self) -> ProductHooks;

    fn execute_boxed<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<ExecutionResult, ProductError>> + Send + 'a>>;
}

/// Blanket implementation: any `Product` automatically implements `ProductDyn`.
impl<T: Product> ProductDyn for T {
    fn metadata(&self) -> ProductMetadata {
        Product::metadata(self)
    }

    fn transformer(&self) -> Option<Arc<dyn Transformer>> {
        Product::transformer(self)
    }

    fn hooks(&self) -> ProductHooks {
        Product::hooks(self)
    }

    fn execute_boxed<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<ExecutionResult, ProductError>> + Send + 'a>> {
        Box::pin(self.execute(ctx))
    }
}

/// Type-erased product for registry storage and per-execution dispatch.
pub struct BoxProduct {
    inner: Box<dyn ProductDyn>,
}

impl std::fmt::Debug for BoxProduct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxProduct")
            .field("key", &self.inner.metadata().key)
            .finish()
    }
}

impl BoxProduct {
    /// Wrap a concrete `Product` in a type-erased box.
    pub fn new<T: Product + 'static>(product: T) -> Self {
        Self {
            inner: Box::new(product),
        }
    }

    pub fn metadata(&self) -> ProductMetadata {
        self.inner.metadata()
    }

    pub fn transformer(&self) -> Option<Arc<dyn Transformer>> {
        self.inner.transformer()
    }

    pub fn hooks(&self) -> ProductHooks {
        self.inner.hooks()
    }

    pub async fn execute(&self, ctx: &ExecutionContext) -> Result<ExecutionResult, ProductError> {
        self.inner.execute_boxed(ctx).await
    }
}

// ---------------------------------------------------------------------------
// Lifecycle wrapper
// ---------------------------------------------------------------------------

/// Run a product through its lifecycle hooks, converting every failure mode
/// into a structured failed result with an empty step list.
pub async fn run_product(product: &BoxProduct, ctx: &ExecutionContext) -> ExecutionResult {
    let hooks = product.hooks();
    let started = Instant::now();

    if let Some(before) = &hooks.before {
        if let Err(error) = before(ctx).await {
            tracing::warn!(%error, "product pre-execution hook rejected the run");
            if let Some(on_error) = &hooks.on_error {
                on_error(ctx, &error).await;
            }
            return ExecutionResult::failure(
                error.to_string(),
                Vec::new(),
                started.elapsed().as_millis() as u64,
            );
        }
    }

    let outcome = std::panic::AssertUnwindSafe(product.execute(ctx))
        .catch_unwind()
        .await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(Ok(result)) => {
            if let Some(after) = &hooks.after {
                after(ctx, &result).await;
            }
            result
        }
        Ok(Err(error)) => {
            tracing::warn!(%error, elapsed_ms, "product execution failed");
            if let Some(on_error) = &hooks.on_error {
                on_error(ctx, &error).await;
            }
            ExecutionResult::failure(error.to_string(), Vec::new(), elapsed_ms)
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(panic = message.as_str(), elapsed_ms, "product panicked");
            ExecutionResult::failure(
                format!("product panicked: {message}"),
                Vec::new(),
                elapsed_ms,
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactStore;
    use crate::session::SessionPool;
    use crate::session::fake::FakeDriver;
    use leadpilot_types::config::SessionConfig;
    use leadpilot_types::credentials::PlatformCredentials;
    use leadpilot_types::lead::Lead;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    fn metadata() -> ProductMetadata {
        ProductMetadata {
            key: "test/product".to_string(),
            name: "Test Product".to_string(),
            platform: "test".to_string(),
            version: "0.1.0".to_string(),
            description: None,
        }
    }

    async fn test_context() -> ExecutionContext {
        let (driver, _) = FakeDriver::new();
        let pool = SessionPool::new(driver, SessionConfig::default());
        let lease = pool.acquire(0).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactStore::init(dir.path().join("item")).await.unwrap();
        std::mem::forget(dir);

        ExecutionContext {
            item_id: Uuid::now_v7(),
            run_id: Uuid::now_v7(),
            lead: Lead {
                id: Uuid::now_v7(),
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: None,
                phone: None,
                date_of_birth: None,
                postal_code: None,
                city: None,
                street: None,
                extra: HashMap::new(),
                captured_at: chrono::Utc::now(),
            },
            credentials: PlatformCredentials::new("test", "user", "pass"),
            lease,
            artifacts: Arc::new(artifacts),
            transformer: None,
            cancel: CancellationToken::new(),
            completed_steps: HashSet::new(),
            attempt: 1,
        }
    }

    struct FailingProduct;

    impl Product for FailingProduct {
        fn metadata(&self) -> ProductMetadata {
            metadata()
        }

        async fn execute(&self, _ctx: &ExecutionContext) -> Result<ExecutionResult, ProductError> {
            Err(ProductError::Execution("portal unreachable".to_string()))
        }
    }

    struct PanickingProduct;

    impl Product for PanickingProduct {
        fn metadata(&self) -> ProductMetadata {
            metadata()
        }

        async fn execute(&self, _ctx: &ExecutionContext) -> Result<ExecutionResult, ProductError> {
            panic!("selector table corrupted");
        }
    }

    struct HookedProduct {
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Product for HookedProduct {
        fn metadata(&self) -> ProductMetadata {
            metadata()
        }

        fn hooks(&self) -> ProductHooks {
            let before_log = Arc::clone(&self.log);
            let after_log = Arc::clone(&self.log);
            ProductHooks {
                before: Some(Box::new(move |_ctx| {
                    let log = Arc::clone(&before_log);
                    Box::pin(async move {
                        log.lock().unwrap().push("before");
                        Ok(())
                    })
                })),
                after: Some(Box::new(move |_ctx, _result| {
                    let log = Arc::clone(&after_log);
                    Box::pin(async move {
                        log.lock().unwrap().push("after");
                    })
                })),
                on_error: None,
            }
        }

        async fn execute(&self, _ctx: &ExecutionContext) -> Result<ExecutionResult, ProductError> {
            self.log.lock().unwrap().push("execute");
            Ok(ExecutionResult::success(None, Vec::new(), 1))
        }
    }

    #[tokio::test]
    async fn product_error_becomes_failed_result_with_empty_steps() {
        let ctx = test_context().await;
        let product = BoxProduct::new(FailingProduct);
        let result = run_product(&product, &ctx).await;
        assert!(!result.success);
        assert!(result.steps.is_empty());
        assert!(result.error.as_deref().unwrap().contains("portal unreachable"));
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let ctx = test_context().await;
        let product = BoxProduct::new(PanickingProduct);
        let result = run_product(&product, &ctx).await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("selector table corrupted"));
    }

    #[tokio::test]
    async fn hooks_run_in_order() {
        let ctx = test_context().await;
        let log = Arc::new(Mutex::new(Vec::new()));
        let product = BoxProduct::new(HookedProduct {
            log: Arc::clone(&log),
        });
        let result = run_product(&product, &ctx).await;
        assert!(result.success);
        assert_eq!(*log.lock().unwrap(), vec!["before", "execute", "after"]);
    }
}
