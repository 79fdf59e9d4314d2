use thiserror::Error;

/// Errors from repository operations (used by trait definitions in leadpilot-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from credential resolution.
///
/// Missing or invalid credentials are fatal for the affected item: retrying
/// cannot help, an operator has to fix the stored credentials first.
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("no credentials stored for platform '{0}'")]
    NotFound(String),

    #[error("credentials for platform '{0}' are invalid: {1}")]
    Invalid(String, String),

    #[error("credentials store unavailable: {0}")]
    StoreUnavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_error_display() {
        let err = CredentialsError::NotFound("acme-insure".to_string());
        assert_eq!(
            err.to_string(),
            "no credentials stored for platform 'acme-insure'"
        );
    }

    #[test]
    fn repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert!(err.to_string().contains("syntax error"));
    }
}
