//! HTTP-level browser driver.
//!
//! Drives form workflows over plain HTTP instead of a real browser: each
//! session is a `reqwest::Client` with its own cookie jar, a page holds the
//! current URL, staged form fields, and the last response body. Good enough
//! for portals whose flows are plain form POSTs; anything needing JavaScript
//! gets a different driver behind the same traits.
//!
//! Screenshots are reported as [`SessionError::Unsupported`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use leadpilot_core::session::{
    BrowserDriver, BrowserHandle, BrowserPage, BrowserSession, DriverFuture, SessionError,
};
use leadpilot_types::config::SessionConfig;
use leadpilot_types::form::FormData;

const USER_AGENT: &str = concat!("leadpilot/", env!("CARGO_PKG_VERSION"));

fn operation(op: &str, message: impl ToString) -> SessionError {
    SessionError::Operation {
        op: op.to_string(),
        message: message.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

struct PageState {
    url: String,
    staged: FormData,
    body: String,
}

struct HttpPage {
    client: reqwest::Client,
    timeout: Duration,
    state: Mutex<PageState>,
}

impl HttpPage {
    fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            state: Mutex::new(PageState {
                url: "about:blank".to_string(),
                staged: FormData::new(),
                body: String::new(),
            }),
        }
    }

    /// Resolve `action` against the current URL, so relative form targets
    /// work the way they do in a browser.
    fn resolve(&self, action: &str) -> Result<reqwest::Url, SessionError> {
        let current = self.state.lock().unwrap().url.clone();
        match reqwest::Url::parse(action) {
            Ok(url) => Ok(url),
            Err(_) => reqwest::Url::parse(&current)
                .and_then(|base| base.join(action))
                .map_err(|e| operation("submit", format!("cannot resolve '{action}': {e}"))),
        }
    }

    async fn send(
        &self,
        op: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<(String, String), SessionError> {
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| SessionError::OperationTimeout {
                op: op.to_string(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| operation(op, e))?;

        let final_url = response.url().to_string();
        let status = response.status();
        let body = response.text().await.map_err(|e| operation(op, e))?;
        if status.is_client_error() || status.is_server_error() {
            return Err(operation(op, format!("{final_url} answered {status}")));
        }
        Ok((final_url, body))
    }
}

impl BrowserPage for HttpPage {
    fn goto<'a>(&'a self, url: &'a str) -> DriverFuture<'a, Result<(), SessionError>> {
        Box::pin(async move {
            let (final_url, body) = self.send("goto", self.client.get(url)).await?;
            let mut state = self.state.lock().unwrap();
            state.url = final_url;
            state.body = body;
            state.staged = FormData::new();
            Ok(())
        })
    }

    fn fill<'a>(&'a self, form: &'a FormData) -> DriverFuture<'a, Result<(), SessionError>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            for (field, value) in form.iter() {
                state.staged.set(field, value);
            }
            Ok(())
        })
    }

    fn submit<'a>(&'a self, action: &'a str) -> DriverFuture<'a, Result<(), SessionError>> {
        Box::pin(async move {
            let target = self.resolve(action)?;
            let staged = self.state.lock().unwrap().staged.clone();
            let request = self.client.post(target).form(&staged);
            let (final_url, body) = self.send("submit", request).await?;
            let mut state = self.state.lock().unwrap();
            state.url = final_url;
            state.body = body;
            state.staged = FormData::new();
            Ok(())
        })
    }

    fn content(&self) -> DriverFuture<'_, Result<String, SessionError>> {
        Box::pin(async move { Ok(self.state.lock().unwrap().body.clone()) })
    }

    fn current_url(&self) -> String {
        self.state.lock().unwrap().url.clone()
    }

    fn screenshot(&self) -> DriverFuture<'_, Result<Vec<u8>, SessionError>> {
        Box::pin(async move { Err(SessionError::Unsupported("screenshot".to_string())) })
    }
}

// ---------------------------------------------------------------------------
// Session / handle / driver
// ---------------------------------------------------------------------------

struct HttpSession {
    client: reqwest::Client,
    timeout: Duration,
}

impl BrowserSession for HttpSession {
    fn open_page(&self) -> DriverFuture<'_, Result<Arc<dyn BrowserPage>, SessionError>> {
        Box::pin(async move {
            Ok(Arc::new(HttpPage::new(self.client.clone(), self.timeout)) as Arc<dyn BrowserPage>)
        })
    }

    fn close(&self) -> DriverFuture<'_, Result<(), SessionError>> {
        // Dropping the client drops its cookie jar; nothing to tear down.
        Box::pin(async move { Ok(()) })
    }
}

struct HttpHandle;

impl BrowserHandle for HttpHandle {
    fn new_session<'a>(
        &'a self,
        config: &'a SessionConfig,
    ) -> DriverFuture<'a, Result<Arc<dyn BrowserSession>, SessionError>> {
        Box::pin(async move {
            // Fresh cookie jar per session keeps login state isolated.
            let client = reqwest::Client::builder()
                .cookie_store(true)
                .user_agent(USER_AGENT)
                .redirect(reqwest::redirect::Policy::limited(10))
                .build()
                .map_err(|e| SessionError::SessionFailed(e.to_string()))?;
            Ok(Arc::new(HttpSession {
                client,
                timeout: Duration::from_secs(config.op_timeout_secs),
            }) as Arc<dyn BrowserSession>)
        })
    }

    fn close(&self) -> DriverFuture<'_, Result<(), SessionError>> {
        Box::pin(async move { Ok(()) })
    }
}

/// Driver entry point; plug into `SessionPool::new`.
pub struct HttpBrowserDriver;

impl HttpBrowserDriver {
    pub fn arc() -> Arc<dyn BrowserDriver> {
        Arc::new(Self)
    }
}

impl BrowserDriver for HttpBrowserDriver {
    fn launch(&self) -> DriverFuture<'_, Result<Arc<dyn BrowserHandle>, SessionError>> {
        Box::pin(async move { Ok(Arc::new(HttpHandle) as Arc<dyn BrowserHandle>) })
    }
}
