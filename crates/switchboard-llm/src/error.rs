//! Errors surfaced by [`LlmClient`](crate::LlmClient).

use switchboard_core::config::ConfigError;
use switchboard_providers::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    /// The backend could not be constructed (missing credential, HTTP client
    /// setup). Raised before any request is sent and never retried.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Every attempt failed; holds the final attempt's error.
    #[error("backend invocation failed: {0}")]
    Backend(#[from] ProviderError),

    /// A structured value could not be converted to the caller's type.
    #[error("structured result does not fit the requested type: {0}")]
    Decode(#[from] serde_json::Error),

    /// [`InvocationResult::into_structured`](crate::InvocationResult::into_structured)
    /// was called on a result of another kind.
    #[error("expected a structured result, got {0}")]
    NotStructured(&'static str),
}
