//! Streaming controller: text fragments as the backend produces them.
//!
//! Retries happen at the connection level. If opening the stream or reading
//! from it fails, the whole stream is reopened after the usual backoff and
//! starts again from the first fragment. Fragments already delivered before
//! the failure are delivered again; consumers that care must reset on their
//! own. Once the backend signals the end of the stream, nothing is retried.

use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use switchboard_providers::{ClientOptions, ProviderError};
use tracing::{debug, warn};

use crate::dispatcher::LlmClient;
use crate::error::LlmError;

/// Text fragments of a streamed answer.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Per-call options for [`LlmClient::stream`]. Streaming is plain text only,
/// so there is no schema or tool field.
#[derive(Clone, Debug, Default)]
pub struct StreamOptions {
    pub model: Option<String>,
    /// Replaces the default system prompt. An empty string counts as unset.
    pub system_prompt: Option<String>,
    pub max_prompt_tokens: Option<usize>,
}

impl StreamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_prompt_tokens(mut self, budget: usize) -> Self {
        self.max_prompt_tokens = Some(budget);
        self
    }
}

/// Outcome of one pass over a backend stream.
enum Pass {
    Finished,
    Failed(ProviderError),
}

impl LlmClient {
    /// Stream the answer to `prompt` as text fragments.
    ///
    /// Chunks without text are skipped. The stream is lazy: nothing is sent
    /// until it is first polled. The backend itself is built eagerly, so a
    /// missing credential is reported here as [`LlmError::Config`].
    ///
    /// After the final attempt fails, the stream yields one
    /// [`LlmError::Backend`] and ends.
    pub fn stream(&self, prompt: &str, options: &StreamOptions) -> Result<TextStream, LlmError> {
        let prepared = self.prepare(
            prompt,
            options.model.as_deref(),
            options.system_prompt.as_deref(),
            options.max_prompt_tokens,
        );
        let backend = self.registry.create(&prepared.model, ClientOptions::streaming())?;
        let request = prepared.request();
        let policy = self.retry;

        Ok(Box::pin(async_stream::stream! {
            let mut attempt = 0;
            loop {
                debug!(
                    provider = backend.display_name(),
                    model = backend.model(),
                    attempt = attempt + 1,
                    "Opening LLM stream"
                );

                let pass = match backend.stream(&request).await {
                    Ok(mut chunks) => {
                        let mut outcome = Pass::Finished;
                        while let Some(item) = chunks.next().await {
                            match item {
                                Ok(chunk) => {
                                    if let Some(text) = chunk.text_content() {
                                        yield Ok(text.to_string());
                                    }
                                }
                                Err(e) => {
                                    outcome = Pass::Failed(e);
                                    break;
                                }
                            }
                        }
                        outcome
                    }
                    Err(e) => Pass::Failed(e),
                };

                let err = match pass {
                    Pass::Finished => break,
                    Pass::Failed(e) => e,
                };

                if policy.is_last(attempt) {
                    yield Err(LlmError::Backend(err));
                    break;
                }

                let delay = policy.delay_for(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_attempts = policy.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Stream failed, reconnecting"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }))
    }
}
