//! Application state wiring the engine together.
//!
//! `AppState` holds the concrete store instances and the product registry.
//! The engine types are generic over the store traits; AppState pins them to
//! the SQLite implementations from `leadpilot-infra`.

use std::path::PathBuf;
use std::sync::Arc;

use leadpilot_core::executor::ItemExecutor;
use leadpilot_core::queue::QueueManager;
use leadpilot_core::registry::ProductRegistry;
use leadpilot_core::retry::RetryPolicy;
use leadpilot_core::session::SessionPool;
use leadpilot_infra::browser::HttpBrowserDriver;
use leadpilot_infra::config::load_engine_config;
use leadpilot_infra::sqlite::credentials::SqliteCredentialsStore;
use leadpilot_infra::sqlite::flow::SqliteFlowState;
use leadpilot_infra::sqlite::pool::{DatabasePool, default_data_dir};
use leadpilot_infra::sqlite::run::SqliteRunStore;
use leadpilot_types::config::EngineConfig;

use crate::products;

/// Queue manager pinned to the SQLite store implementations.
pub type ConcreteQueueManager =
    QueueManager<SqliteRunStore, SqliteCredentialsStore, SqliteFlowState>;

/// Shared application state holding stores, registry, and config.
pub struct AppState {
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
    pub runs: Arc<SqliteRunStore>,
    pub credentials: Arc<SqliteCredentialsStore>,
    pub flow: Arc<SqliteFlowState>,
    pub registry: Arc<ProductRegistry>,
    pub config: EngineConfig,
}

impl AppState {
    /// Initialize the application state: connect to the database, load
    /// config, register built-in products.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = PathBuf::from(default_data_dir());
        tokio::fs::create_dir_all(&data_dir).await?;

        let db_url = format!(
            "sqlite://{}?mode=rwc",
            data_dir.join("leadpilot.db").display()
        );
        let db_pool = DatabasePool::new(&db_url).await?;

        let config = load_engine_config(&data_dir).await;

        let registry = Arc::new(ProductRegistry::new());
        products::register_builtin(&registry);

        Ok(Self {
            runs: Arc::new(SqliteRunStore::new(db_pool.clone())),
            credentials: Arc::new(SqliteCredentialsStore::new(db_pool.clone())),
            flow: Arc::new(SqliteFlowState::new(db_pool.clone())),
            registry,
            config,
            data_dir,
            db_pool,
        })
    }

    /// Directory where run artifacts are written.
    pub fn artifacts_root(&self) -> PathBuf {
        self.data_dir.join("artifacts")
    }

    /// Build a queue manager over a fresh session pool.
    pub fn queue_manager(&self, workers: usize) -> Arc<ConcreteQueueManager> {
        let sessions = Arc::new(SessionPool::new(
            HttpBrowserDriver::arc(),
            self.config.session.clone(),
        ));
        let executor = Arc::new(ItemExecutor::new(
            Arc::clone(&self.registry),
            sessions,
            Arc::clone(&self.runs),
            Arc::clone(&self.credentials),
            Arc::clone(&self.flow),
            self.artifacts_root(),
        ));
        let retry = RetryPolicy::from_config(&self.config.retry);
        Arc::new(QueueManager::new(executor, workers, retry))
    }
}
