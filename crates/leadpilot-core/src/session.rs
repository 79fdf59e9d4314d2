//! Browser driver seam and the per-worker session pool.
//!
//! The engine never talks to a concrete browser directly. It goes through the
//! dyn-safe driver traits below (boxed-future methods, so implementations can
//! live in the infra layer or in test fakes), and the [`SessionPool`] owns the
//! resource lifecycle:
//!
//! - one shared browser handle, launched lazily on first acquire;
//! - at most one isolated session per worker slot, so no two leads ever share
//!   cookies or login state;
//! - `release` evicts a single worker's session, `shutdown` tears everything
//!   down and resets the pool to its uninitialized state.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use leadpilot_types::config::SessionConfig;

/// Boxed future alias used by the dyn driver traits.
pub type DriverFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

/// Errors from browser driver operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The browser process could not be launched.
    #[error("browser launch failed: {0}")]
    LaunchFailed(String),

    /// A session could not be created or closed.
    #[error("session error: {0}")]
    SessionFailed(String),

    /// A page operation failed.
    #[error("operation '{op}' failed: {message}")]
    Operation { op: String, message: String },

    /// A page operation exceeded the configured timeout.
    #[error("operation '{op}' timed out after {timeout_secs}s")]
    OperationTimeout { op: String, timeout_secs: u64 },

    /// The driver does not support this operation (e.g. screenshots on an
    /// HTTP-level driver).
    #[error("operation '{0}' not supported by this driver")]
    Unsupported(String),
}

// ---------------------------------------------------------------------------
// Driver traits
// ---------------------------------------------------------------------------

/// An open page (tab) inside a browser session.
pub trait BrowserPage: Send + Sync {
    /// Navigate to a URL.
    fn goto<'a>(&'a self, url: &'a str) -> DriverFuture<'a, Result<(), SessionError>>;

    /// Stage form field values on the current page.
    fn fill<'a>(
        &'a self,
        form: &'a leadpilot_types::form::FormData,
    ) -> DriverFuture<'a, Result<(), SessionError>>;

    /// Submit the staged form to the given action target.
    fn submit<'a>(&'a self, action: &'a str) -> DriverFuture<'a, Result<(), SessionError>>;

    /// Current page content (HTML or body text, driver-dependent).
    fn content(&self) -> DriverFuture<'_, Result<String, SessionError>>;

    /// URL of the current page.
    fn current_url(&self) -> String;

    /// Capture a screenshot of the current page.
    fn screenshot(&self) -> DriverFuture<'_, Result<Vec<u8>, SessionError>>;
}

/// One isolated browser session (cookie/login state container).
pub trait BrowserSession: Send + Sync {
    /// Open a new page (tab) in this session.
    fn open_page(&self) -> DriverFuture<'_, Result<Arc<dyn BrowserPage>, SessionError>>;

    /// Close the session and discard its state.
    fn close(&self) -> DriverFuture<'_, Result<(), SessionError>>;
}

/// A running browser process.
pub trait BrowserHandle: Send + Sync {
    /// Create a new isolated session with the given parameters.
    fn new_session<'a>(
        &'a self,
        config: &'a SessionConfig,
    ) -> DriverFuture<'a, Result<Arc<dyn BrowserSession>, SessionError>>;

    /// Close the browser process.
    fn close(&self) -> DriverFuture<'_, Result<(), SessionError>>;
}

/// Launches browser processes. The entry point implemented by infra drivers
/// and test fakes.
pub trait BrowserDriver: Send + Sync {
    fn launch(&self) -> DriverFuture<'_, Result<Arc<dyn BrowserHandle>, SessionError>>;
}

// ---------------------------------------------------------------------------
// SessionPool
// ---------------------------------------------------------------------------

/// A worker's lease on its pooled session, with a freshly opened page.
///
/// Returned from [`SessionPool::acquire`] so callers hold an owned handle and
/// never re-index the pool's internal map.
#[derive(Clone)]
pub struct SessionLease {
    pub worker_id: usize,
    pub session: Arc<dyn BrowserSession>,
    pub page: Arc<dyn BrowserPage>,
}

/// Pools one shared browser process and one isolated session per worker slot.
pub struct SessionPool {
    driver: Arc<dyn BrowserDriver>,
    config: SessionConfig,
    /// Lazily launched shared browser. `None` until first acquire and again
    /// after shutdown.
    browser: tokio::sync::Mutex<Option<Arc<dyn BrowserHandle>>>,
    /// Worker slot -> its isolated session. 1:1 by construction.
    sessions: DashMap<usize, Arc<dyn BrowserSession>>,
}

impl SessionPool {
    pub fn new(driver: Arc<dyn BrowserDriver>, config: SessionConfig) -> Self {
        Self {
            driver,
            config,
            browser: tokio::sync::Mutex::new(None),
            sessions: DashMap::new(),
        }
    }

    /// Number of currently pooled sessions.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Get (creating if absent) the session for `worker_id` and open a new
    /// page in it. Repeated acquires for the same worker return the same
    /// underlying session.
    pub async fn acquire(&self, worker_id: usize) -> Result<SessionLease, SessionError> {
        let browser = self.ensure_browser().await?;

        let session = match self.sessions.get(&worker_id) {
            Some(existing) => Arc::clone(&existing),
            None => {
                let session = browser.new_session(&self.config).await?;
                tracing::debug!(worker_id, "created isolated session for worker slot");
                self.sessions.insert(worker_id, Arc::clone(&session));
                session
            }
        };

        let page = session.open_page().await?;
        Ok(SessionLease {
            worker_id,
            session,
            page,
        })
    }

    /// Close and evict exactly this worker's session. The shared browser
    /// process stays up. No-op when the worker holds no session.
    pub async fn release(&self, worker_id: usize) {
        if let Some((_, session)) = self.sessions.remove(&worker_id) {
            if let Err(error) = session.close().await {
                tracing::warn!(worker_id, %error, "failed to close session on release");
            }
            tracing::debug!(worker_id, "released worker session");
        }
    }

    /// Close every session, then the browser process, and reset to the
    /// uninitialized state. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        let worker_ids: Vec<usize> = self.sessions.iter().map(|e| *e.key()).collect();
        for worker_id in worker_ids {
            self.release(worker_id).await;
        }

        let mut browser = self.browser.lock().await;
        if let Some(handle) = browser.take() {
            if let Err(error) = handle.close().await {
                tracing::warn!(%error, "failed to close browser on shutdown");
            }
            tracing::info!("browser shut down, session pool reset");
        }
    }

    async fn ensure_browser(&self) -> Result<Arc<dyn BrowserHandle>, SessionError> {
        let mut browser = self.browser.lock().await;
        if let Some(handle) = browser.as_ref() {
            return Ok(Arc::clone(handle));
        }
        let handle = self.driver.launch().await?;
        tracing::info!("launched shared browser process");
        *browser = Some(Arc::clone(&handle));
        Ok(handle)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory driver fake shared by the engine's unit tests.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    pub struct FakeCounters {
        pub launches: AtomicUsize,
        pub sessions_created: AtomicUsize,
        pub sessions_closed: AtomicUsize,
        pub browsers_closed: AtomicUsize,
    }

    pub struct FakeDriver {
        pub counters: Arc<FakeCounters>,
    }

    impl FakeDriver {
        pub fn new() -> (Arc<Self>, Arc<FakeCounters>) {
            let counters = Arc::new(FakeCounters::default());
            (
                Arc::new(Self {
                    counters: Arc::clone(&counters),
                }),
                counters,
            )
        }
    }

    impl BrowserDriver for FakeDriver {
        fn launch(&self) -> DriverFuture<'_, Result<Arc<dyn BrowserHandle>, SessionError>> {
            let counters = Arc::clone(&self.counters);
            Box::pin(async move {
                counters.launches.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(FakeBrowser { counters }) as Arc<dyn BrowserHandle>)
            })
        }
    }

    pub struct FakeBrowser {
        counters: Arc<FakeCounters>,
    }

    impl BrowserHandle for FakeBrowser {
        fn new_session<'a>(
            &'a self,
            _config: &'a SessionConfig,
        ) -> DriverFuture<'a, Result<Arc<dyn BrowserSession>, SessionError>> {
            let counters = Arc::clone(&self.counters);
            Box::pin(async move {
                counters.sessions_created.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(FakeSession { counters }) as Arc<dyn BrowserSession>)
            })
        }

        fn close(&self) -> DriverFuture<'_, Result<(), SessionError>> {
            let counters = Arc::clone(&self.counters);
            Box::pin(async move {
                counters.browsers_closed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    pub struct FakeSession {
        counters: Arc<FakeCounters>,
    }

    impl BrowserSession for FakeSession {
        fn open_page(&self) -> DriverFuture<'_, Result<Arc<dyn BrowserPage>, SessionError>> {
            Box::pin(async { Ok(Arc::new(FakePage::default()) as Arc<dyn BrowserPage>) })
        }

        fn close(&self) -> DriverFuture<'_, Result<(), SessionError>> {
            let counters = Arc::clone(&self.counters);
            Box::pin(async move {
                counters.sessions_closed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    #[derive(Default)]
    pub struct FakePage {
        pub url: std::sync::Mutex<String>,
        pub filled: std::sync::Mutex<Option<leadpilot_types::form::FormData>>,
        pub body: std::sync::Mutex<String>,
    }

    impl BrowserPage for FakePage {
        fn goto<'a>(&'a self, url: &'a str) -> DriverFuture<'a, Result<(), SessionError>> {
            Box::pin(async move {
                *self.url.lock().unwrap() = url.to_string();
                Ok(())
            })
        }

        fn fill<'a>(
            &'a self,
            form: &'a leadpilot_types::form::FormData,
        ) -> DriverFuture<'a, Result<(), SessionError>> {
            Box::pin(async move {
                *self.filled.lock().unwrap() = Some(form.clone());
                Ok(())
            })
        }

        fn submit<'a>(&'a self, action: &'a str) -> DriverFuture<'a, Result<(), SessionError>> {
            Box::pin(async move {
                *self.url.lock().unwrap() = action.to_string();
                *self.body.lock().unwrap() =
                    "premium: 99.00 EUR reference: Q-TEST".to_string();
                Ok(())
            })
        }

        fn content(&self) -> DriverFuture<'_, Result<String, SessionError>> {
            Box::pin(async { Ok(self.body.lock().unwrap().clone()) })
        }

        fn current_url(&self) -> String {
            self.url.lock().unwrap().clone()
        }

        fn screenshot(&self) -> DriverFuture<'_, Result<Vec<u8>, SessionError>> {
            Box::pin(async { Err(SessionError::Unsupported("screenshot".to_string())) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeDriver;
    use super::*;
    use std::sync::atomic::Ordering;

    fn pool() -> (SessionPool, Arc<fake::FakeCounters>) {
        let (driver, counters) = FakeDriver::new();
        (
            SessionPool::new(driver, SessionConfig::default()),
            counters,
        )
    }

    #[tokio::test]
    async fn browser_launches_lazily_and_once() {
        let (pool, counters) = pool();
        assert_eq!(counters.launches.load(Ordering::SeqCst), 0);

        pool.acquire(0).await.unwrap();
        pool.acquire(1).await.unwrap();
        assert_eq!(counters.launches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn same_worker_gets_same_session() {
        let (pool, counters) = pool();
        let first = pool.acquire(7).await.unwrap();
        let second = pool.acquire(7).await.unwrap();
        assert!(Arc::ptr_eq(&first.session, &second.session));
        assert_eq!(counters.sessions_created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_workers_get_isolated_sessions() {
        let (pool, counters) = pool();
        let a = pool.acquire(0).await.unwrap();
        let b = pool.acquire(1).await.unwrap();
        assert!(!Arc::ptr_eq(&a.session, &b.session));
        assert_eq!(counters.sessions_created.load(Ordering::SeqCst), 2);
        assert_eq!(pool.active_sessions(), 2);
    }

    #[tokio::test]
    async fn release_evicts_only_that_worker() {
        let (pool, counters) = pool();
        pool.acquire(0).await.unwrap();
        pool.acquire(1).await.unwrap();

        pool.release(0).await;
        assert_eq!(pool.active_sessions(), 1);
        assert_eq!(counters.sessions_closed.load(Ordering::SeqCst), 1);
        // browser stays up
        assert_eq!(counters.browsers_closed.load(Ordering::SeqCst), 0);

        // releasing again is a no-op
        pool.release(0).await;
        assert_eq!(counters.sessions_closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn released_worker_gets_fresh_session() {
        let (pool, counters) = pool();
        let first = pool.acquire(3).await.unwrap();
        pool.release(3).await;
        let second = pool.acquire(3).await.unwrap();
        assert!(!Arc::ptr_eq(&first.session, &second.session));
        assert_eq!(counters.sessions_created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn shutdown_twice_does_not_fail() {
        let (pool, counters) = pool();
        pool.acquire(0).await.unwrap();
        pool.acquire(1).await.unwrap();

        pool.shutdown().await;
        assert_eq!(pool.active_sessions(), 0);
        assert_eq!(counters.sessions_closed.load(Ordering::SeqCst), 2);
        assert_eq!(counters.browsers_closed.load(Ordering::SeqCst), 1);

        // second shutdown is a no-op
        pool.shutdown().await;
        assert_eq!(counters.browsers_closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn acquire_after_shutdown_relaunches() {
        let (pool, counters) = pool();
        pool.acquire(0).await.unwrap();
        pool.shutdown().await;

        pool.acquire(0).await.unwrap();
        assert_eq!(counters.launches.load(Ordering::SeqCst), 2);
        assert_eq!(pool.active_sessions(), 1);
    }
}
