//! Backend for OpenAI-compatible `/chat/completions` APIs.
//!
//! Serves OpenAI itself, Google's OpenAI-compatible endpoint, Z.AI and local
//! Ollama servers. Structured output is requested with `response_format`
//! (`json_schema`) and the returned text is validated locally.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use switchboard_core::config::ConfigError;
use switchboard_core::types::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, LlmResponse, OutputSchema,
    ResponseFormat, StreamChunk,
};
use tracing::{debug, error};

use crate::error::{api_error, ProviderError};
use crate::registry::{ProviderSpec, ResolvedEndpoint};
use crate::sse;
use crate::structured;
use crate::traits::{ChatBackend, ChatRequest, ChunkStream, ClientOptions};

/// Whole-request timeout for non-streaming calls.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
/// Connection timeout for streaming calls, which have no overall deadline.
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client for a backend.
pub(crate) fn build_client(options: ClientOptions) -> Result<reqwest::Client, ConfigError> {
    let builder = reqwest::Client::builder();
    let builder = if options.streaming {
        builder.connect_timeout(CONNECT_TIMEOUT)
    } else {
        builder.timeout(REQUEST_TIMEOUT)
    };
    builder
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

// ─────────────────────────────────────────────
// HttpProvider
// ─────────────────────────────────────────────

/// A backend talking to one model on an OpenAI-compatible API.
pub struct HttpProvider {
    client: reqwest::Client,
    /// API base URL (e.g. `"https://api.openai.com/v1"`).
    api_base: String,
    /// Bearer token. Keyless local servers have none.
    api_key: Option<String>,
    /// Model name as sent on the wire.
    model: String,
    spec: &'static ProviderSpec,
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("provider", &self.spec.display_name)
            .finish()
    }
}

impl HttpProvider {
    pub fn new(
        spec: &'static ProviderSpec,
        endpoint: ResolvedEndpoint,
        model: &str,
        options: ClientOptions,
    ) -> Result<Self, ConfigError> {
        Ok(HttpProvider {
            client: build_client(options)?,
            api_base: endpoint.api_base,
            api_key: endpoint.api_key,
            model: model.to_string(),
            spec,
        })
    }

    /// Full URL of the chat endpoint.
    fn completions_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{}{}", base, self.spec.chat_path)
    }

    fn build_body(
        &self,
        request: &ChatRequest,
        response_format: Option<ResponseFormat>,
        stream: bool,
    ) -> ChatCompletionRequest {
        let tools = request.tools.clone().filter(|t| !t.is_empty());
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: request.messages.clone(),
            tool_choice: tools.as_ref().map(|_| "auto".to_string()),
            tools,
            response_format,
            max_tokens: None,
            temperature: None,
            stream,
        }
    }

    async fn send(&self, body: &ChatCompletionRequest) -> Result<reqwest::Response, ProviderError> {
        let mut builder = self.client.post(self.completions_url()).json(body);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            error!(provider = self.spec.display_name, error = %e, "HTTP request failed");
            ProviderError::from(e)
        })?;

        if !response.status().is_success() {
            let err = api_error(response).await;
            error!(provider = self.spec.display_name, error = %err, "API error");
            return Err(err);
        }
        Ok(response)
    }

    async fn chat(&self, body: &ChatCompletionRequest) -> Result<LlmResponse, ProviderError> {
        debug!(
            provider = self.spec.display_name,
            model = %self.model,
            messages = body.messages.len(),
            tools = body.tools.as_ref().map_or(0, |t| t.len()),
            structured = body.response_format.is_some(),
            "Calling LLM"
        );

        let response = self.send(body).await?;
        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        let llm_resp = parsed
            .into_llm_response()
            .ok_or_else(|| ProviderError::Parse("response contained no choices".to_string()))?;

        debug!(
            provider = self.spec.display_name,
            has_content = llm_resp.content.is_some(),
            tool_calls = llm_resp.tool_calls.len(),
            finish_reason = llm_resp.finish_reason.as_deref().unwrap_or("?"),
            "LLM response received"
        );
        Ok(llm_resp)
    }
}

/// Reported when the body ends before the end-of-stream marker.
pub(crate) const STREAM_CLOSED: &str = "connection closed before stream completed";

/// Decode one `data:` payload of an OpenAI-compatible stream.
/// `None` marks the `[DONE]` sentinel.
fn decode_chunk(data: &str) -> Result<Option<StreamChunk>, ProviderError> {
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(None);
    }
    let mut chunk: ChatCompletionChunk = serde_json::from_str(data)
        .map_err(|e| ProviderError::Parse(format!("invalid stream chunk: {e}")))?;
    if let Some(err) = chunk.error.take() {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| err.to_string());
        return Err(ProviderError::Stream(message));
    }
    Ok(Some(chunk.into()))
}

#[async_trait]
impl ChatBackend for HttpProvider {
    fn display_name(&self) -> &str {
        self.spec.display_name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest) -> Result<LlmResponse, ProviderError> {
        let body = self.build_body(request, None, false);
        self.chat(&body).await
    }

    async fn complete_structured(
        &self,
        request: &ChatRequest,
        schema: &OutputSchema,
    ) -> Result<Value, ProviderError> {
        let body = self.build_body(request, Some(ResponseFormat::from(schema)), false);
        let response = self.chat(&body).await?;
        let text = response.content.unwrap_or_default();
        structured::parse_and_validate(&text, schema)
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, ProviderError> {
        let body = self.build_body(request, None, true);
        debug!(
            provider = self.spec.display_name,
            model = %self.model,
            "Opening stream"
        );
        let response = self.send(&body).await?;
        let mut events = sse::events(response);

        Ok(Box::pin(async_stream::try_stream! {
            let mut done = false;
            while let Some(event) = events.next().await {
                let event = event?;
                match decode_chunk(&event.data)? {
                    Some(chunk) => yield chunk,
                    None => {
                        done = true;
                        break;
                    }
                }
            }
            if !done {
                Err::<(), _>(ProviderError::Stream(STREAM_CLOSED.to_string()))?;
            }
        }))
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
