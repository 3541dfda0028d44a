//! LLM invocation core for Switchboard.
//!
//! - [`LlmClient::invoke`]: one-shot call returning plain text, a validated
//!   structured object, or the assistant message with tool calls
//! - [`LlmClient::stream`]: text fragments with connection-level retry
//! - [`tools`]: tool descriptors bound to an invocation
//!
//! ```no_run
//! use std::sync::Arc;
//! use switchboard_llm::{InvokeOptions, LlmClient};
//! use switchboard_providers::ProviderRegistry;
//!
//! # async fn run() -> Result<(), switchboard_llm::LlmError> {
//! let client = LlmClient::new(Arc::new(ProviderRegistry::from_env()));
//! let answer = client
//!     .invoke("Who tops the table?", &InvokeOptions::new().model("claude-sonnet-4-5"))
//!     .await?;
//! println!("{:?}", answer.as_text());
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod error;
pub mod prompts;
pub mod streaming;
pub mod tools;

pub use dispatcher::{InvocationResult, InvokeOptions, LlmClient};
pub use error::LlmError;
pub use prompts::DEFAULT_SYSTEM_PROMPT;
pub use streaming::{StreamOptions, TextStream};
pub use tools::{format_tool_result, Tool, ToolSet};
