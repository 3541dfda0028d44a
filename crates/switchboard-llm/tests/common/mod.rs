//! Scripted backend for driving the dispatcher and streaming controller
//! without a network.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use serde_json::Value;
use switchboard_core::config::{ConfigError, CredentialSource, StaticCredentials};
use switchboard_core::retry::RetryPolicy;
use switchboard_core::types::{LlmResponse, OutputSchema, StreamChunk};
use switchboard_llm::LlmClient;
use switchboard_providers::{
    BackendFactory, ChatBackend, ChatRequest, ChunkStream, ClientOptions, ProviderError,
    ProviderRegistry,
};

/// Which backend method was called.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Called {
    Complete,
    Structured,
    Stream,
}

/// One scripted stream: either opening fails, or these items are delivered.
pub enum StreamScript {
    OpenFails(ProviderError),
    Items(Vec<Result<StreamChunk, ProviderError>>),
}

#[derive(Default)]
pub struct Script {
    pub complete: VecDeque<Result<LlmResponse, ProviderError>>,
    pub structured: VecDeque<Result<Value, ProviderError>>,
    pub streams: VecDeque<StreamScript>,
    pub calls: Vec<Called>,
    pub requests: Vec<ChatRequest>,
    pub created: Vec<(String, ClientOptions)>,
    pub no_tool_support: bool,
}

/// Factory handing out backends that share one [`Script`].
#[derive(Clone, Default)]
pub struct ScriptedFactory {
    pub script: Arc<Mutex<Script>>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_complete(&self, result: Result<LlmResponse, ProviderError>) -> &Self {
        self.script.lock().unwrap().complete.push_back(result);
        self
    }

    pub fn push_structured(&self, result: Result<Value, ProviderError>) -> &Self {
        self.script.lock().unwrap().structured.push_back(result);
        self
    }

    pub fn push_stream(&self, script: StreamScript) -> &Self {
        self.script.lock().unwrap().streams.push_back(script);
        self
    }

    pub fn without_tool_support(&self) -> &Self {
        self.script.lock().unwrap().no_tool_support = true;
        self
    }

    pub fn calls(&self) -> Vec<Called> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.script.lock().unwrap().requests.clone()
    }

    pub fn created(&self) -> Vec<(String, ClientOptions)> {
        self.script.lock().unwrap().created.clone()
    }
}

impl BackendFactory for ScriptedFactory {
    fn name(&self) -> &str {
        "scripted"
    }

    fn create(
        &self,
        model: &str,
        options: ClientOptions,
        _credentials: &dyn CredentialSource,
    ) -> Result<Box<dyn ChatBackend>, ConfigError> {
        self.script
            .lock()
            .unwrap()
            .created
            .push((model.to_string(), options));
        Ok(Box::new(ScriptedBackend {
            model: model.to_string(),
            script: self.script.clone(),
        }))
    }
}

struct ScriptedBackend {
    model: String,
    script: Arc<Mutex<Script>>,
}

fn exhausted() -> ProviderError {
    ProviderError::Network("script exhausted".to_string())
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn display_name(&self) -> &str {
        "Scripted"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn supports_tools(&self) -> bool {
        !self.script.lock().unwrap().no_tool_support
    }

    async fn complete(&self, request: &ChatRequest) -> Result<LlmResponse, ProviderError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Called::Complete);
        script.requests.push(request.clone());
        script.complete.pop_front().unwrap_or_else(|| Err(exhausted()))
    }

    async fn complete_structured(
        &self,
        request: &ChatRequest,
        _schema: &OutputSchema,
    ) -> Result<Value, ProviderError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Called::Structured);
        script.requests.push(request.clone());
        script.structured.pop_front().unwrap_or_else(|| Err(exhausted()))
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, ProviderError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Called::Stream);
        script.requests.push(request.clone());
        match script.streams.pop_front() {
            Some(StreamScript::Items(items)) => Ok(Box::pin(stream::iter(items))),
            Some(StreamScript::OpenFails(e)) => Err(e),
            None => Err(exhausted()),
        }
    }
}

/// Retry policy with the default attempt count and a tiny delay.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1))
}

/// A client routing every model to `factory`.
pub fn client_with(factory: &ScriptedFactory) -> LlmClient {
    let registry = ProviderRegistry::new(
        Arc::new(factory.clone()),
        Arc::new(StaticCredentials::new()),
    );
    LlmClient::new(Arc::new(registry)).with_retry_policy(fast_retry())
}

pub fn api_error(status: u16, message: &str) -> ProviderError {
    ProviderError::Api {
        status,
        message: message.to_string(),
    }
}
