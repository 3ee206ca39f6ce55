//! Configuration for the client and the `bearerctl` binary.

use std::time::Duration;

/// Server used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Keyring service our token lives under by default.
pub const DEFAULT_KEYRING_SERVICE: &str = "bearerctl";

/// Timeout applied to every authenticated request.
pub const AUTHENTICATED_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable overriding the base URL for the binary.
pub const BASE_URL_ENV: &str = "BEARERCTL_BASE_URL";

/// Environment variable overriding the keyring service for the binary.
pub const KEYRING_SERVICE_ENV: &str = "BEARERCTL_KEYRING_SERVICE";

/// What the client is bound to once initialized.
///
/// The base URL is stored as given. Whether it actually parses is only
/// discovered when a request is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

/// Settings for the command line tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub keyring_service: String,
}

impl Settings {
    /// Load settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());

        Self {
            base_url: non_empty(BASE_URL_ENV).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            keyring_service: non_empty(KEYRING_SERVICE_ENV)
                .unwrap_or_else(|| DEFAULT_KEYRING_SERVICE.to_string()),
        }
    }

    /// The client configuration these settings describe.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.base_url.clone())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
