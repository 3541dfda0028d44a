//! Configuration schema.
//!
//! Hierarchy: `Config` → `InvocationDefaults`, `RetryConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! API keys are deliberately absent: they are read from the process
//! environment through a [`CredentialSource`](super::CredentialSource).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::{RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};

/// Model used when the caller does not name one.
pub const DEFAULT_MODEL: &str = "gpt-5.2";

/// Prompt budget (system + user) used when the caller does not set one.
pub const DEFAULT_MAX_PROMPT_TOKENS: usize = 6000;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration: loaded from `~/.switchboard/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub defaults: InvocationDefaults,
    pub retry: RetryConfig,
}

// ─────────────────────────────────────────────
// Invocation defaults
// ─────────────────────────────────────────────

/// Defaults applied to every invocation that does not override them.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvocationDefaults {
    /// Default model identifier.
    pub model: String,
    /// Token budget shared by the system prompt and the user prompt.
    pub max_prompt_tokens: usize,
    /// Replacement for the built-in persona, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for InvocationDefaults {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_prompt_tokens: DEFAULT_MAX_PROMPT_TOKENS,
            system_prompt: None,
        }
    }
}

// ─────────────────────────────────────────────
// Retry
// ─────────────────────────────────────────────

/// Retry settings for backend calls and stream connections.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    /// Total attempts, initial call included.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds. Doubles per retry.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }
}
