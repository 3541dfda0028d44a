//! Backend capability trait: every chat provider implements this.
//!
//! A backend is built for one model by a [`BackendFactory`](crate::registry::BackendFactory)
//! and thrown away after the call; nothing here is pooled or cached.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use switchboard_core::types::{LlmResponse, Message, OutputSchema, StreamChunk, ToolDefinition};

use crate::error::ProviderError;

/// Lazily produced chunks of a streamed response.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ProviderError>> + Send>>;

/// Options fixed when a backend is constructed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClientOptions {
    /// The backend will be used for streaming. Streaming clients get no
    /// whole-request timeout.
    pub streaming: bool,
}

impl ClientOptions {
    pub fn streaming() -> Self {
        Self { streaming: true }
    }
}

/// The messages (and optionally tools) for one backend call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    /// Tools the model may ask to invoke.
    pub tools: Option<Vec<ToolDefinition>>,
}

impl ChatRequest {
    /// A system message followed by one user message.
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt), Message::user(user_prompt)],
            tools: None,
        }
    }

    /// Bind tools to the request.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// The system prompt, if the request has one.
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages.iter().find_map(|m| match m {
            Message::System { content } => Some(content.as_str()),
            _ => None,
        })
    }
}

/// A chat backend serving one model.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Display name for logging (e.g. `"Anthropic"`).
    fn display_name(&self) -> &str;

    /// Model name as sent on the wire.
    fn model(&self) -> &str;

    /// Whether tools can be bound to requests.
    fn supports_tools(&self) -> bool {
        true
    }

    /// Send one chat completion request.
    async fn complete(&self, request: &ChatRequest) -> Result<LlmResponse, ProviderError>;

    /// Send a request constrained to `schema` and return the validated value.
    async fn complete_structured(
        &self,
        request: &ChatRequest,
        schema: &OutputSchema,
    ) -> Result<serde_json::Value, ProviderError>;

    /// Open a streamed completion. Errors opening the stream are returned
    /// here; errors while reading it arrive as stream items.
    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, ProviderError>;
}
