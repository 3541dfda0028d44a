//! Core building blocks for Switchboard.
//!
//! - [`types`]: chat wire types shared by every backend (messages, tool calls, chunks)
//! - [`config`]: settings file, env overrides and credential lookup
//! - [`tokens`]: token estimation and prompt trimming against a budget
//! - [`retry`]: bounded exponential-backoff retry for async operations

pub mod config;
pub mod retry;
pub mod tokens;
pub mod types;
pub mod utils;

pub use config::{ConfigError, CredentialSource, EnvCredentials, StaticCredentials};
pub use retry::{with_retry, RetryPolicy};
pub use tokens::{estimate_tokens, trim_to_budget};
