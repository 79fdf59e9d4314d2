//! SQLite credentials store with environment-variable fallback.
//!
//! Implements `CredentialsStore` from `leadpilot-core`. Resolution order:
//! 1. `LEADPILOT_CRED_<PLATFORM>_LOGIN` / `LEADPILOT_CRED_<PLATFORM>_PASSWORD`
//!    environment variables (platform uppercased, `-` mapped to `_`);
//! 2. the `platform_credentials` table.
//!
//! The environment path keeps secrets out of the database entirely for
//! CI-style deployments.

use chrono::Utc;
use sqlx::Row;

use leadpilot_core::store::CredentialsStore;
use leadpilot_types::credentials::PlatformCredentials;
use leadpilot_types::error::CredentialsError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `CredentialsStore`.
pub struct SqliteCredentialsStore {
    pool: DatabasePool,
}

impl SqliteCredentialsStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn env_var_name(platform: &str, suffix: &str) -> String {
        let normalized: String = platform
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("LEADPILOT_CRED_{normalized}_{suffix}")
    }

    fn from_env(platform: &str) -> Option<PlatformCredentials> {
        let login = std::env::var(Self::env_var_name(platform, "LOGIN")).ok()?;
        let password = std::env::var(Self::env_var_name(platform, "PASSWORD")).ok()?;
        tracing::debug!(platform, "resolved credentials from environment");
        Some(PlatformCredentials::new(platform, login, password))
    }
}

impl CredentialsStore for SqliteCredentialsStore {
    async fn credentials(&self, platform: &str) -> Result<PlatformCredentials, CredentialsError> {
        if let Some(credentials) = Self::from_env(platform) {
            return Ok(credentials);
        }

        let row = sqlx::query("SELECT login, password FROM platform_credentials WHERE platform = ?")
            .bind(platform)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| CredentialsError::StoreUnavailable(e.to_string()))?;

        let row = row.ok_or_else(|| CredentialsError::NotFound(platform.to_string()))?;
        let login: String = row
            .try_get("login")
            .map_err(|e| CredentialsError::Invalid(platform.to_string(), e.to_string()))?;
        let password: String = row
            .try_get("password")
            .map_err(|e| CredentialsError::Invalid(platform.to_string(), e.to_string()))?;

        Ok(PlatformCredentials::new(platform, login, password))
    }

    async fn store(&self, credentials: PlatformCredentials) -> Result<(), CredentialsError> {
        sqlx::query(
            "INSERT INTO platform_credentials (platform, login, password, updated_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT (platform) DO UPDATE SET \
             login = excluded.login, password = excluded.password, updated_at = excluded.updated_at",
        )
        .bind(&credentials.platform)
        .bind(&credentials.login)
        .bind(credentials.password())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| CredentialsError::StoreUnavailable(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (SqliteCredentialsStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("t.db").display());
        let pool = DatabasePool::new(&url).await.unwrap();
        (SqliteCredentialsStore::new(pool), dir)
    }

    #[tokio::test]
    async fn upsert_and_resolve() {
        let (store, _dir) = store().await;
        store
            .store(PlatformCredentials::new("acme-insure", "user", "old"))
            .await
            .unwrap();
        store
            .store(PlatformCredentials::new("acme-insure", "user", "new"))
            .await
            .unwrap();

        let creds = store.credentials("acme-insure").await.unwrap();
        assert_eq!(creds.login, "user");
        assert_eq!(creds.password(), "new");
    }

    #[tokio::test]
    async fn missing_platform_fails() {
        let (store, _dir) = store().await;
        let err = store.credentials("nobody").await.unwrap_err();
        assert!(matches!(err, CredentialsError::NotFound(_)));
    }

    #[tokio::test]
    async fn environment_overrides_database() {
        let (store, _dir) = store().await;
        store
            .store(PlatformCredentials::new("env-platform", "db-user", "db-pass"))
            .await
            .unwrap();

        // NOTE: process-global env mutation; the platform name is unique to
        // this test to avoid interference under parallel test execution.
        unsafe {
            std::env::set_var("LEADPILOT_CRED_ENV_PLATFORM_LOGIN", "env-user");
            std::env::set_var("LEADPILOT_CRED_ENV_PLATFORM_PASSWORD", "env-pass");
        }
        let creds = store.credentials("env-platform").await.unwrap();
        unsafe {
            std::env::remove_var("LEADPILOT_CRED_ENV_PLATFORM_LOGIN");
            std::env::remove_var("LEADPILOT_CRED_ENV_PLATFORM_PASSWORD");
        }

        assert_eq!(creds.login, "env-user");
        assert_eq!(creds.password(), "env-pass");
    }

    #[test]
    fn env_var_name_normalization() {
        assert_eq!(
            SqliteCredentialsStore::env_var_name("acme-insure", "LOGIN"),
            "LEADPILOT_CRED_ACME_INSURE_LOGIN"
        );
    }
}
