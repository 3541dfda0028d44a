//! Backend for the Anthropic Messages API.
//!
//! Converts the shared chat types to Anthropic's request format at the edge:
//! system messages move to the top-level `system` field and tool definitions
//! become `input_schema` tools. Structured output is obtained by forcing a
//! single synthetic tool whose input schema is the requested schema.
//!
//! Streaming follows the Messages SSE protocol: text arrives in
//! `content_block_delta` events, `message_stop` ends the stream and an
//! `error` event fails it. `ping` and bookkeeping events are skipped.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use switchboard_core::config::ConfigError;
use switchboard_core::types::{
    LlmResponse, Message, OutputSchema, StreamChunk, ToolCall, ToolDefinition, UsageInfo,
};
use tracing::{debug, error, warn};

use crate::error::{api_error, ProviderError};
use crate::http_provider::{build_client, STREAM_CLOSED};
use crate::registry::{ProviderSpec, ResolvedEndpoint};
use crate::sse::{self, SseEvent};
use crate::structured;
use crate::traits::{ChatBackend, ChatRequest, ChunkStream, ClientOptions};

/// Value of the `anthropic-version` header.
pub const API_VERSION: &str = "2023-06-01";
/// `max_tokens` is mandatory on this API.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

// ─────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize, PartialEq)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize, PartialEq)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}

impl From<&ToolDefinition> for AnthropicTool {
    fn from(def: &ToolDefinition) -> Self {
        AnthropicTool {
            name: def.function.name.clone(),
            description: def.function.description.clone(),
            input_schema: def.function.parameters.clone(),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ToolChoice {
    Auto,
    Tool { name: String },
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl From<AnthropicUsage> for UsageInfo {
    fn from(usage: AnthropicUsage) -> Self {
        UsageInfo {
            prompt_tokens: usage.input_tokens,
            completion_tokens: usage.output_tokens,
            total_tokens: usage.input_tokens + usage.output_tokens,
        }
    }
}

impl From<MessagesResponse> for LlmResponse {
    fn from(resp: MessagesResponse) -> Self {
        let mut text: Option<String> = None;
        let mut tool_calls = Vec::new();

        for block in resp.content {
            match block {
                ResponseBlock::Text { text: t } => text.get_or_insert_with(String::new).push_str(&t),
                ResponseBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall::new(id, name, input.to_string()));
                }
                ResponseBlock::Other => {}
            }
        }

        LlmResponse {
            content: text,
            tool_calls,
            finish_reason: resp.stop_reason,
            usage: resp.usage.map(UsageInfo::from),
        }
    }
}

// Streaming payloads, selected by the SSE `event:` name.

#[derive(Debug, Deserialize)]
struct ContentBlockDelta {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    delta: MessageDeltaBody,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaBody {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamErrorPayload {
    error: StreamErrorBody,
}

#[derive(Debug, Deserialize)]
struct StreamErrorBody {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

// ─────────────────────────────────────────────
// Message conversion
// ─────────────────────────────────────────────

/// Split chat messages into Anthropic's `system` string and message list.
fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<AnthropicMessage>) {
    let mut system_parts: Vec<&str> = Vec::new();
    let mut converted = Vec::with_capacity(messages.len());

    for message in messages {
        match message {
            Message::System { content } => system_parts.push(content),
            Message::User { content } => converted.push(AnthropicMessage {
                role: "user",
                content: content.clone(),
            }),
        }
    }

    let system = (!system_parts.is_empty()).then(|| system_parts.join("\n\n"));
    (system, converted)
}

// ─────────────────────────────────────────────
// AnthropicProvider
// ─────────────────────────────────────────────

/// A backend talking to one Claude model.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    spec: &'static ProviderSpec,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(
        spec: &'static ProviderSpec,
        endpoint: ResolvedEndpoint,
        model: &str,
        options: ClientOptions,
    ) -> Result<Self, ConfigError> {
        Ok(AnthropicProvider {
            client: build_client(options)?,
            api_base: endpoint.api_base,
            api_key: endpoint.api_key.unwrap_or_default(),
            model: model.to_string(),
            spec,
        })
    }

    fn messages_url(&self) -> String {
        format!("{}{}", self.api_base.trim_end_matches('/'), self.spec.chat_path)
    }

    fn build_body(&self, request: &ChatRequest, stream: bool) -> MessagesRequest {
        let (system, messages) = convert_messages(&request.messages);
        let tools: Vec<AnthropicTool> = request
            .tools
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(AnthropicTool::from)
            .collect();
        let tool_choice = (!tools.is_empty()).then_some(ToolChoice::Auto);

        MessagesRequest {
            model: self.model.clone(),
            max_tokens: DEFAULT_MAX_TOKENS,
            messages,
            system,
            tools,
            tool_choice,
            stream,
        }
    }

    async fn send(&self, body: &MessagesRequest) -> Result<reqwest::Response, ProviderError> {
        debug!(
            provider = self.spec.display_name,
            model = %self.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            stream = body.stream,
            "Calling LLM"
        );

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| {
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

    async fn messages(&self, body: &MessagesRequest) -> Result<MessagesResponse, ProviderError> {
        let response = self.send(body).await?;
        response
            .json::<MessagesResponse>()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

/// Turn one SSE event into a chunk. `Ok(None)` ends the stream; events that
/// carry nothing for the consumer become empty chunks.
fn decode_event(event: &SseEvent) -> Result<Option<StreamChunk>, ProviderError> {
    let parse_err = |e: serde_json::Error| ProviderError::Parse(format!("invalid stream event: {e}"));

    match event.event.as_deref() {
        Some("content_block_delta") => {
            let payload: ContentBlockDelta = serde_json::from_str(&event.data).map_err(parse_err)?;
            Ok(Some(match payload.delta {
                Delta::TextDelta { text } => StreamChunk::text(text),
                Delta::Other => StreamChunk::default(),
            }))
        }
        Some("message_delta") => {
            let payload: MessageDelta = serde_json::from_str(&event.data).map_err(parse_err)?;
            Ok(Some(StreamChunk {
                content: None,
                finish_reason: payload.delta.stop_reason,
            }))
        }
        Some("message_stop") => Ok(None),
        Some("error") => {
            let message = match serde_json::from_str::<StreamErrorPayload>(&event.data) {
                Ok(payload) => format!("{}: {}", payload.error.error_type, payload.error.message),
                Err(_) => event.data.clone(),
            };
            Err(ProviderError::Stream(message))
        }
        _ => Ok(Some(StreamChunk::default())),
    }
}

#[async_trait]
impl ChatBackend for AnthropicProvider {
    fn display_name(&self) -> &str {
        self.spec.display_name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest) -> Result<LlmResponse, ProviderError> {
        let body = self.build_body(request, false);
        let llm_resp = LlmResponse::from(self.messages(&body).await?);
        debug!(
            provider = self.spec.display_name,
            has_content = llm_resp.content.is_some(),
            tool_calls = llm_resp.tool_calls.len(),
            finish_reason = llm_resp.finish_reason.as_deref().unwrap_or("?"),
            "LLM response received"
        );
        Ok(llm_resp)
    }

    async fn complete_structured(
        &self,
        request: &ChatRequest,
        schema: &OutputSchema,
    ) -> Result<Value, ProviderError> {
        let mut body = self.build_body(request, false);
        body.tools = vec![AnthropicTool {
            name: schema.name.clone(),
            description: format!("Respond with a {} object.", schema.name),
            input_schema: schema.schema.clone(),
        }];
        body.tool_choice = Some(ToolChoice::Tool {
            name: schema.name.clone(),
        });

        let response = self.messages(&body).await?;
        let input = response
            .content
            .into_iter()
            .find_map(|block| match block {
                ResponseBlock::ToolUse { name, input, .. } if name == schema.name => Some(input),
                _ => None,
            })
            .ok_or_else(|| {
                warn!(schema = %schema.name, "Structured response missing tool_use block");
                ProviderError::Validation(format!("no '{}' tool_use block in response", schema.name))
            })?;

        structured::validate(input, schema)
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, ProviderError> {
        let body = self.build_body(request, true);
        let response = self.send(&body).await?;
        let mut events = sse::events(response);

        Ok(Box::pin(async_stream::try_stream! {
            let mut stopped = false;
            while let Some(event) = events.next().await {
                let event = event?;
                match decode_event(&event)? {
                    Some(chunk) => yield chunk,
                    None => {
                        stopped = true;
                        break;
                    }
                }
            }
            if !stopped {
                Err::<(), _>(ProviderError::Stream(STREAM_CLOSED.to_string()))?;
            }
        }))
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ANTHROPIC;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(api_base: &str, options: ClientOptions) -> AnthropicProvider {
        AnthropicProvider::new(
            &ANTHROPIC,
            ResolvedEndpoint {
                api_key: Some("sk-ant-test".to_string()),
                api_base: api_base.to_string(),
            },
            "claude-sonnet-4-5",
            options,
        )
        .unwrap()
    }

    fn event(name: &str, data: Value) -> String {
        format!("event: {name}\ndata: {data}\n\n")
    }

    // ── Conversion ──

    #[test]
    fn test_convert_messages_moves_system() {
        let (system, messages) =
            convert_messages(&[Message::system("Be brief."), Message::user("Hi")]);
        assert_eq!(system.as_deref(), Some("Be brief."));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[0].content, "Hi");
    }

    #[test]
    fn test_response_conversion_joins_text_and_tools() {
        let resp: MessagesResponse = serde_json::from_value(json!({
            "content": [
                { "type": "thinking", "thinking": "hmm" },
                { "type": "text", "text": "Checking. " },
                { "type": "tool_use", "id": "tu_9", "name": "odds", "input": { "match": 7 } }
            ],
            "stop_reason": "tool_use",
            "usage": { "input_tokens": 12, "output_tokens": 3 }
        }))
        .unwrap();

        let llm = LlmResponse::from(resp);
        assert_eq!(llm.content.as_deref(), Some("Checking. "));
        assert_eq!(llm.tool_calls[0].name(), "odds");
        assert_eq!(llm.tool_calls[0].function.arguments, r#"{"match":7}"#);
        assert_eq!(llm.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_decode_event_error() {
        let err = decode_event(&SseEvent {
            event: Some("error".to_string()),
            data: json!({"type": "error", "error": {"type": "overloaded_error", "message": "busy"}})
                .to_string(),
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "stream error: overloaded_error: busy");
    }

    #[test]
    fn test_decode_event_ping_is_empty() {
        let chunk = decode_event(&SseEvent {
            event: Some("ping".to_string()),
            data: "{}".to_string(),
        })
        .unwrap()
        .unwrap();
        assert!(chunk.text_content().is_none());
    }

    // ── Mock server ──

    #[tokio::test]
    async fn test_complete_sends_headers_and_system() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "sk-ant-test"))
            .and(header("anthropic-version", API_VERSION))
            .and(body_partial_json(json!({
                "model": "claude-sonnet-4-5",
                "system": "Be brief.",
                "max_tokens": DEFAULT_MAX_TOKENS,
                "messages": [{ "role": "user", "content": "Hi" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{ "type": "text", "text": "Hello." }],
                "stop_reason": "end_turn",
                "usage": { "input_tokens": 5, "output_tokens": 2 }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let resp = provider(&mock_server.uri(), ClientOptions::default())
            .complete(&ChatRequest::new("Be brief.", "Hi"))
            .await
            .unwrap();
        assert_eq!(resp.content.as_deref(), Some("Hello."));
        assert_eq!(resp.finish_reason.as_deref(), Some("end_turn"));
    }

    #[tokio::test]
    async fn test_complete_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
            .mount(&mock_server)
            .await;

        let err = provider(&mock_server.uri(), ClientOptions::default())
            .complete(&ChatRequest::new("sys", "Hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_complete_structured_forces_tool() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(body_partial_json(json!({
                "tool_choice": { "type": "tool", "name": "verdict" },
                "tools": [{ "name": "verdict" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{
                    "type": "tool_use",
                    "id": "tu_1",
                    "name": "verdict",
                    "input": { "winner": "away" }
                }],
                "stop_reason": "tool_use"
            })))
            .mount(&mock_server)
            .await;

        let schema = OutputSchema::new(
            "verdict",
            json!({
                "type": "object",
                "properties": { "winner": { "type": "string" } },
                "required": ["winner"]
            }),
        );
        let value = provider(&mock_server.uri(), ClientOptions::default())
            .complete_structured(&ChatRequest::new("sys", "Who wins?"), &schema)
            .await
            .unwrap();
        assert_eq!(value, json!({ "winner": "away" }));
    }

    #[tokio::test]
    async fn test_complete_structured_without_tool_use() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{ "type": "text", "text": "I think away." }],
                "stop_reason": "end_turn"
            })))
            .mount(&mock_server)
            .await;

        let schema = OutputSchema::new("verdict", json!({ "type": "object" }));
        let err = provider(&mock_server.uri(), ClientOptions::default())
            .complete_structured(&ChatRequest::new("sys", "Who wins?"), &schema)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_stream_text_deltas() {
        let mock_server = MockServer::start().await;

        let body = [
            event("message_start", json!({"type": "message_start", "message": {"id": "m1"}})),
            event("ping", json!({"type": "ping"})),
            event(
                "content_block_delta",
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Good "}}),
            ),
            event(
                "content_block_delta",
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "evening"}}),
            ),
            event(
                "message_delta",
                json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 2}}),
            ),
            event("message_stop", json!({"type": "message_stop"})),
        ]
        .concat();

        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(body_partial_json(json!({ "stream": true })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&mock_server)
            .await;

        let stream = provider(&mock_server.uri(), ClientOptions::streaming())
            .stream(&ChatRequest::new("sys", "Greet me"))
            .await
            .unwrap();
        let chunks: Vec<StreamChunk> = stream.map(|c| c.unwrap()).collect().await;

        let text: String = chunks.iter().filter_map(|c| c.text_content()).collect();
        assert_eq!(text, "Good evening");
        assert!(chunks
            .iter()
            .any(|c| c.finish_reason.as_deref() == Some("end_turn")));
    }

    #[tokio::test]
    async fn test_stream_error_event_fails_stream() {
        let mock_server = MockServer::start().await;

        let body = [
            event(
                "content_block_delta",
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Par"}}),
            ),
            event(
                "error",
                json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
            ),
        ]
        .concat();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;

        let stream = provider(&mock_server.uri(), ClientOptions::streaming())
            .stream(&ChatRequest::new("sys", "hi"))
            .await
            .unwrap();
        let items: Vec<_> = stream.collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().text_content(), Some("Par"));
        assert!(matches!(items[1], Err(ProviderError::Stream(_))));
    }

    #[tokio::test]
    async fn test_stream_without_message_stop_fails() {
        let mock_server = MockServer::start().await;

        let body = event(
            "content_block_delta",
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Half"}}),
        );

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;

        let stream = provider(&mock_server.uri(), ClientOptions::streaming())
            .stream(&ChatRequest::new("sys", "hi"))
            .await
            .unwrap();
        let items: Vec<_> = stream.collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().text_content(), Some("Half"));
        assert!(matches!(&items[1], Err(ProviderError::Stream(m)) if m == STREAM_CLOSED));
    }
}
