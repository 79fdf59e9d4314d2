//! SQLite connection pools, split by access pattern.
//!
//! SQLite serializes writers, so the run store keeps one single-connection
//! pool for INSERT/UPDATE traffic and a wider pool for SELECTs. WAL journal
//! mode lets the status queries run while a worker is persisting results.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// Reader/writer pool pair for the run database.
///
/// `reader` fans out up to 8 connections for concurrent queries; `writer` is
/// a single connection so write traffic is serialized at the pool boundary
/// instead of colliding on SQLite's lock.
#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Open both pools and run pending migrations on the writer.
    ///
    /// WAL mode, foreign key enforcement, and a 5 second busy timeout apply
    /// to both sides.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let base_opts = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(5))
            .create_if_missing(true);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(base_opts.clone())
            .await?;

        // Migrate before the readers open so they never see a partial schema.
        sqlx::migrate!("../../migrations").run(&writer).await?;

        let read_opts = base_opts.read_only(true);

        let reader = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(read_opts)
            .await?;

        Ok(Self { reader, writer })
    }
}

/// Returns the default database URL based on `LEADPILOT_DATA_DIR` env var,
/// falling back to `~/.leadpilot/leadpilot.db`.
pub fn default_database_url() -> String {
    format!("sqlite://{}/leadpilot.db", default_data_dir())
}

/// Resolve the data directory: `LEADPILOT_DATA_DIR`, else `~/.leadpilot`.
pub fn default_data_dir() -> String {
    std::env::var("LEADPILOT_DATA_DIR").unwrap_or_else(|_| {
        let home = dirs::home_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ".".to_string());
        format!("{home}/.leadpilot")
    })
}
