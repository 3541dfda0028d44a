//! Invocation dispatcher: one prompt in, one typed result out.
//!
//! For each call the dispatcher:
//! 1. picks the system prompt (per-call override, configured default, built-in persona),
//! 2. trims the user prompt to what is left of the token budget,
//! 3. builds a fresh backend for the model through the [`ProviderRegistry`],
//! 4. runs the call under the retry policy and tags the result.
//!
//! Building the backend happens before the retry loop, so a missing
//! credential fails immediately without any network traffic.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use switchboard_core::config::{Config, DEFAULT_MAX_PROMPT_TOKENS, DEFAULT_MODEL};
use switchboard_core::retry::{with_retry, RetryPolicy};
use switchboard_core::tokens::{estimate_tokens, trim_to_budget};
use switchboard_core::types::{LlmResponse, OutputSchema};
use switchboard_providers::{ChatBackend, ChatRequest, ClientOptions, ProviderError, ProviderRegistry};
use tracing::debug;

use crate::error::LlmError;
use crate::prompts::DEFAULT_SYSTEM_PROMPT;
use crate::tools::ToolSet;

// ─────────────────────────────────────────────
// Options and results
// ─────────────────────────────────────────────

/// Per-call options for [`LlmClient::invoke`]. Unset fields fall back to the
/// client's defaults.
#[derive(Clone, Debug, Default)]
pub struct InvokeOptions {
    pub model: Option<String>,
    /// Replaces the default system prompt. An empty string counts as unset.
    pub system_prompt: Option<String>,
    /// Constrain the answer to this schema. Takes priority over `tools`.
    pub output_schema: Option<OutputSchema>,
    /// Tools the model may ask to invoke.
    pub tools: Option<ToolSet>,
    /// Budget shared by the system prompt and the user prompt.
    pub max_prompt_tokens: Option<usize>,
}

impl InvokeOptions {
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

    pub fn output_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn tools(mut self, tools: ToolSet) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn max_prompt_tokens(mut self, budget: usize) -> Self {
        self.max_prompt_tokens = Some(budget);
        self
    }
}

/// What an invocation produced. The variant follows from the options given,
/// not from what the model happened to answer.
#[derive(Clone, Debug, PartialEq)]
pub enum InvocationResult {
    /// Neither schema nor tools were supplied: the answer's text.
    PlainText(String),
    /// A schema was supplied: the validated value.
    StructuredObject(Value),
    /// Tools were supplied: the full assistant message, tool calls included.
    ToolCallMessage(LlmResponse),
}

impl InvocationResult {
    /// Short name of the variant, for messages and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            InvocationResult::PlainText(_) => "plain text",
            InvocationResult::StructuredObject(_) => "structured object",
            InvocationResult::ToolCallMessage(_) => "tool call message",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            InvocationResult::PlainText(text) => Some(text),
            _ => None,
        }
    }

    /// Deserialize a structured result into `T`.
    pub fn into_structured<T: DeserializeOwned>(self) -> Result<T, LlmError> {
        match self {
            InvocationResult::StructuredObject(value) => Ok(serde_json::from_value(value)?),
            other => Err(LlmError::NotStructured(other.kind())),
        }
    }
}

// ─────────────────────────────────────────────
// Prepared prompt
// ─────────────────────────────────────────────

/// Model, system prompt and trimmed user prompt for one call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PreparedPrompt {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
}

impl PreparedPrompt {
    pub fn request(&self) -> ChatRequest {
        ChatRequest::new(self.system_prompt.clone(), self.user_prompt.clone())
    }
}

/// How the call is made, fixed before the retry loop.
enum CallMode<'a> {
    Plain,
    Structured(&'a OutputSchema),
    Tools,
}

// ─────────────────────────────────────────────
// LlmClient
// ─────────────────────────────────────────────

/// Entry point for one-shot and streamed invocations.
///
/// Cheap to clone; the registry is shared.
#[derive(Clone, Debug)]
pub struct LlmClient {
    pub(crate) registry: Arc<ProviderRegistry>,
    pub(crate) retry: RetryPolicy,
    default_model: String,
    default_max_prompt_tokens: usize,
    default_system_prompt: Option<String>,
}

impl LlmClient {
    /// A client with the built-in defaults.
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            retry: RetryPolicy::default(),
            default_model: DEFAULT_MODEL.to_string(),
            default_max_prompt_tokens: DEFAULT_MAX_PROMPT_TOKENS,
            default_system_prompt: None,
        }
    }

    /// A client whose defaults and retry policy come from `config`.
    pub fn from_config(config: &Config, registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            retry: config.retry.policy(),
            default_model: config.defaults.model.clone(),
            default_max_prompt_tokens: config.defaults.max_prompt_tokens,
            default_system_prompt: config
                .defaults
                .system_prompt
                .clone()
                .filter(|p| !p.is_empty()),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Resolve model and system prompt, then trim the user prompt so both fit
    /// the budget.
    pub(crate) fn prepare(
        &self,
        prompt: &str,
        model: Option<&str>,
        system_prompt: Option<&str>,
        max_prompt_tokens: Option<usize>,
    ) -> PreparedPrompt {
        let system_prompt = system_prompt
            .filter(|p| !p.is_empty())
            .or(self.default_system_prompt.as_deref())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);
        let budget = max_prompt_tokens
            .unwrap_or(self.default_max_prompt_tokens)
            .saturating_sub(estimate_tokens(system_prompt));
        let user_prompt = trim_to_budget(prompt, budget);

        if user_prompt.len() < prompt.len() {
            debug!(
                original_tokens = estimate_tokens(prompt),
                budget = budget,
                trimmed_tokens = estimate_tokens(&user_prompt),
                "Trimmed prompt to budget"
            );
        }

        PreparedPrompt {
            model: model.unwrap_or(&self.default_model).to_string(),
            system_prompt: system_prompt.to_string(),
            user_prompt,
        }
    }

    /// Send `prompt` to a model and return the tagged result.
    ///
    /// With an output schema the answer is constrained to it and validated.
    /// Otherwise, with tools, the tools are bound (when the backend supports
    /// it) and the whole assistant message is returned. Otherwise the answer
    /// text is returned.
    ///
    /// # Errors
    ///
    /// [`LlmError::Config`] if the backend cannot be built; nothing is sent.
    /// [`LlmError::Backend`] with the last error once all attempts failed.
    pub async fn invoke(
        &self,
        prompt: &str,
        options: &InvokeOptions,
    ) -> Result<InvocationResult, LlmError> {
        let prepared = self.prepare(
            prompt,
            options.model.as_deref(),
            options.system_prompt.as_deref(),
            options.max_prompt_tokens,
        );
        let backend = self.registry.create(&prepared.model, ClientOptions::default())?;

        let mut request = prepared.request();
        let mode = match (&options.output_schema, &options.tools) {
            (Some(schema), _) => CallMode::Structured(schema),
            (None, Some(tools)) => {
                if !tools.is_empty() && backend.supports_tools() {
                    request = request.with_tools(tools.definitions());
                }
                CallMode::Tools
            }
            (None, None) => CallMode::Plain,
        };

        debug!(
            provider = backend.display_name(),
            model = backend.model(),
            structured = options.output_schema.is_some(),
            tools = request.tools.as_ref().map_or(0, |t| t.len()),
            "Invoking LLM"
        );

        let result = with_retry(&self.retry, || call(backend.as_ref(), &request, &mode)).await?;
        Ok(result)
    }
}

async fn call(
    backend: &dyn ChatBackend,
    request: &ChatRequest,
    mode: &CallMode<'_>,
) -> Result<InvocationResult, ProviderError> {
    match mode {
        CallMode::Structured(schema) => backend
            .complete_structured(request, schema)
            .await
            .map(InvocationResult::StructuredObject),
        CallMode::Tools => backend
            .complete(request)
            .await
            .map(InvocationResult::ToolCallMessage),
        CallMode::Plain => {
            let response = backend.complete(request).await?;
            Ok(InvocationResult::PlainText(response.content.unwrap_or_default()))
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use switchboard_core::config::StaticCredentials;

    fn client() -> LlmClient {
        LlmClient::new(Arc::new(ProviderRegistry::builtin(Arc::new(
            StaticCredentials::new(),
        ))))
    }

    #[test]
    fn test_prepare_uses_default_persona() {
        let prepared = client().prepare("Who wins?", None, None, None);
        assert_eq!(prepared.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(prepared.model, DEFAULT_MODEL);
        assert_eq!(prepared.user_prompt, "Who wins?");
    }

    #[test]
    fn test_prepare_empty_override_falls_back() {
        let prepared = client().prepare("hi", Some("glm-4.7"), Some(""), None);
        assert_eq!(prepared.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(prepared.model, "glm-4.7");
    }

    #[test]
    fn test_prepare_config_system_prompt() {
        let mut config = Config::default();
        config.defaults.system_prompt = Some("Answer in French.".to_string());
        config.defaults.model = "claude-sonnet-4-5".to_string();
        let client = LlmClient::from_config(&config, client().registry);

        let prepared = client.prepare("hi", None, None, None);
        assert_eq!(prepared.system_prompt, "Answer in French.");
        assert_eq!(prepared.model, "claude-sonnet-4-5");

        let prepared = client.prepare("hi", None, Some("Be terse."), None);
        assert_eq!(prepared.system_prompt, "Be terse.");
    }

    #[test]
    fn test_prepare_trims_to_remaining_budget() {
        // "sys!" is one token, leaving three for the user prompt
        let prompt = "first line is long\nsecond\nlast";
        let prepared = client().prepare(prompt, None, Some("sys!"), Some(4));
        assert_eq!(prepared.user_prompt, "second\nlast");
    }

    #[test]
    fn test_prepare_system_prompt_exceeds_budget() {
        let prepared = client().prepare("anything at all", None, Some("a long system prompt"), Some(2));
        assert_eq!(prepared.user_prompt, "");
    }

    #[test]
    fn test_into_structured() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Pick {
            market: String,
        }

        let result = InvocationResult::StructuredObject(json!({ "market": "BTTS" }));
        let pick: Pick = result.into_structured().unwrap();
        assert_eq!(pick.market, "BTTS");

        let err = InvocationResult::PlainText("x".to_string())
            .into_structured::<Pick>()
            .unwrap_err();
        assert!(matches!(err, LlmError::NotStructured("plain text")));
    }

    #[test]
    fn test_as_text() {
        assert_eq!(InvocationResult::PlainText("hi".into()).as_text(), Some("hi"));
        assert_eq!(InvocationResult::StructuredObject(json!(1)).as_text(), None);
    }

    #[tokio::test]
    async fn test_invoke_missing_credential_fails_fast() {
        let err = client()
            .invoke("hi", &InvokeOptions::new().model("claude-sonnet-4-5"))
            .await
            .unwrap_err();
        match err {
            LlmError::Config(e) => {
                assert_eq!(e.to_string(), "ANTHROPIC_API_KEY not found in environment variables")
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }
}
