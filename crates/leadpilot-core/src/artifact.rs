//! Per-item artifact capture.
//!
//! Every run item gets its own directory, created before any write. The
//! engine guarantees `result.json` is written exactly once on completion
//! (success or failure) and writes `error.json` when execution aborts before
//! a structured result exists. Screenshots land under `screenshots/`.

use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use leadpilot_types::result::ExecutionResult;

/// Errors from artifact persistence.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// File-backed store for one run item's artifacts.
#[derive(Debug)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub const RESULT_FILE: &'static str = "result.json";
    pub const ERROR_FILE: &'static str = "error.json";

    /// Create the item's artifact directory (and parents) and return a store
    /// rooted there.
    pub async fn init(dir: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Root directory of this item's artifacts.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist the structured execution result as `result.json`.
    pub async fn write_result(&self, result: &ExecutionResult) -> Result<(), ArtifactError> {
        self.write_json(Self::RESULT_FILE, &serde_json::to_value(result)?)
            .await
    }

    /// Read `result.json` back.
    pub async fn read_result(&self) -> Result<ExecutionResult, ArtifactError> {
        let bytes = tokio::fs::read(self.dir.join(Self::RESULT_FILE)).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Persist an abort error as `error.json`, for failures that happened
    /// before a structured result could be produced.
    pub async fn write_error(&self, error: &str) -> Result<(), ArtifactError> {
        self.write_json(
            Self::ERROR_FILE,
            &json!({
                "error": error,
                "at": chrono::Utc::now().to_rfc3339(),
            }),
        )
        .await
    }

    /// Write an arbitrary JSON artifact under the item directory.
    pub async fn write_json(&self, name: &str, value: &Value) -> Result<(), ArtifactError> {
        let path = self.dir.join(name);
        let pretty = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&path, pretty).await?;
        tracing::debug!(path = %path.display(), "wrote artifact");
        Ok(())
    }

    /// Write a screenshot under `screenshots/`.
    pub async fn write_screenshot(&self, name: &str, bytes: &[u8]) -> Result<(), ArtifactError> {
        let shots = self.dir.join("screenshots");
        tokio::fs::create_dir_all(&shots).await?;
        tokio::fs::write(shots.join(name), bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadpilot_types::result::{Quote, StepResult};

    #[tokio::test]
    async fn init_creates_nested_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("runs").join("r1").join("item1");
        let store = ArtifactStore::init(&dir).await.unwrap();
        assert!(store.dir().is_dir());
    }

    #[tokio::test]
    async fn result_roundtrip_is_deep_equal() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::init(tmp.path().join("item")).await.unwrap();

        let result = ExecutionResult::success(
            Some(Quote {
                premium: 123.45,
                currency: "EUR".to_string(),
                reference: Some("Q-9".to_string()),
                details: None,
            }),
            vec![StepResult::ok("navigate", None, 10)],
            10,
        );

        store.write_result(&result).await.unwrap();
        let back = store.read_result().await.unwrap();

        assert_eq!(
            serde_json::to_value(&back).unwrap(),
            serde_json::to_value(&result).unwrap()
        );
    }

    #[tokio::test]
    async fn error_artifact_is_written() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::init(tmp.path().join("item")).await.unwrap();

        store.write_error("product not registered").await.unwrap();

        let raw = tokio::fs::read_to_string(store.dir().join(ArtifactStore::ERROR_FILE))
            .await
            .unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["error"], "product not registered");
        assert!(value["at"].is_string());
    }

    #[tokio::test]
    async fn screenshots_land_in_subdirectory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::init(tmp.path().join("item")).await.unwrap();
        store.write_screenshot("final.png", b"png-bytes").await.unwrap();
        let bytes = tokio::fs::read(store.dir().join("screenshots").join("final.png"))
            .await
            .unwrap();
        assert_eq!(bytes, b"png-bytes");
    }
}
