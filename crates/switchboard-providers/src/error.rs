//! Errors raised by backends once a request is under way.

use thiserror::Error;

/// A failed backend call or stream.
///
/// The retry layer treats every variant the same way; the split exists so
/// callers can tell what went wrong once retries are exhausted.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure (timeout, DNS, connection refused).
    #[error("network error: {0}")]
    Network(String),

    /// The API answered with a non-success status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be understood.
    #[error("parse error: {0}")]
    Parse(String),

    /// A structured-output answer did not satisfy the requested schema.
    #[error("schema validation failed: {0}")]
    Validation(String),

    /// The backend reported an error in the middle of a stream.
    #[error("stream error: {0}")]
    Stream(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::Parse(e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

/// Turn a non-success HTTP response into a [`ProviderError::Api`].
pub(crate) async fn api_error(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error body".to_string());
    ProviderError::Api { status, message }
}
