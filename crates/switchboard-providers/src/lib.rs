//! LLM backends and the registry that routes model names to them.
//!
//! # Architecture
//!
//! - [`traits::ChatBackend`]: capability trait every backend implements
//! - [`registry`]: provider specs, routing tables and [`ProviderRegistry`]
//! - [`http_provider::HttpProvider`]: OpenAI-compatible HTTP client
//! - [`anthropic::AnthropicProvider`]: Anthropic Messages API client
//! - [`structured`]: JSON Schema validation of structured answers

pub mod anthropic;
pub mod error;
pub mod http_provider;
pub mod registry;
mod sse;
pub mod structured;
pub mod traits;

pub use anthropic::AnthropicProvider;
pub use error::ProviderError;
pub use http_provider::HttpProvider;
pub use registry::{
    find_by_model, BackendFactory, ProviderRegistry, ProviderSpec, SpecFactory, PROVIDERS,
};
pub use traits::{ChatBackend, ChatRequest, ChunkStream, ClientOptions};
