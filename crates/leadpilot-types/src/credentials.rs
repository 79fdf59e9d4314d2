//! Platform credential types.
//!
//! Credentials are decrypted by the store at the boundary where the executor
//! consumes them and are never written back by the engine. The password is
//! wrapped in [`secrecy::SecretString`] so it cannot leak through Debug
//! output or accidental serialization.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

/// Login credentials for one target platform.
#[derive(Clone)]
pub struct PlatformCredentials {
    /// Platform identifier (e.g. "acme-insure").
    pub platform: String,
    pub login: String,
    password: SecretString,
}

impl PlatformCredentials {
    pub fn new(
        platform: impl Into<String>,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            login: login.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Expose the password for consumption at the login boundary.
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl fmt::Debug for PlatformCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformCredentials")
            .field("platform", &self.platform)
            .field("login", &self.login)
            .field("password", &"[redacted]")
            .finish()
    }
}
