//! Credential lookup.
//!
//! Backends read their API keys and base-URL overrides through a
//! [`CredentialSource`] at construction time. The process environment is the
//! production source; [`StaticCredentials`] serves tests and embedders.

use std::collections::HashMap;

use thiserror::Error;

/// Errors raised while building a backend, before any network traffic.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A credential the selected provider requires is absent or empty.
    #[error("{key} not found in environment variables")]
    MissingCredential {
        key: &'static str,
        provider: &'static str,
    },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Read-only view of process-wide configuration values.
pub trait CredentialSource: Send + Sync {
    /// Look up a raw value. Empty strings are returned as-is.
    fn get(&self, key: &str) -> Option<String>;

    /// Look up a non-empty value; `None` if absent or empty.
    fn get_non_empty(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.is_empty())
    }

    /// Look up a required credential for `provider`.
    fn require(&self, key: &'static str, provider: &'static str) -> Result<String, ConfigError> {
        self.get_non_empty(key)
            .ok_or(ConfigError::MissingCredential { key, provider })
    }
}

/// Credentials from the process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Credentials from an in-memory map.
#[derive(Clone, Debug, Default)]
pub struct StaticCredentials {
    values: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StaticCredentials {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl CredentialSource for StaticCredentials {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_present() {
        let creds = StaticCredentials::new().with("ANTHROPIC_API_KEY", "sk-ant-1");
        assert_eq!(
            creds.require("ANTHROPIC_API_KEY", "Anthropic").unwrap(),
            "sk-ant-1"
        );
    }

    #[test]
    fn test_require_missing_names_key() {
        let creds = StaticCredentials::new();
        let err = creds.require("GOOGLE_API_KEY", "Google").unwrap_err();
        assert_eq!(err.to_string(), "GOOGLE_API_KEY not found in environment variables");
        assert!(matches!(
            err,
            ConfigError::MissingCredential { key: "GOOGLE_API_KEY", provider: "Google" }
        ));
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let creds: StaticCredentials = [("ZAI_API_KEY", "")].into_iter().collect();
        assert!(creds.get("ZAI_API_KEY").is_some());
        assert!(creds.get_non_empty("ZAI_API_KEY").is_none());
        assert!(creds.require("ZAI_API_KEY", "Z.AI").is_err());
    }

    #[test]
    fn test_env_credentials_reads_process_env() {
        let key = "SWITCHBOARD_TEST_CREDENTIAL_PROBE";
        std::env::set_var(key, "value");
        assert_eq!(EnvCredentials.get(key).as_deref(), Some("value"));
        std::env::remove_var(key);
        assert!(EnvCredentials.get(key).is_none());
    }
}
