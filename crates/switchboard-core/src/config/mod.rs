//! Configuration system: settings file, env var overrides, and credentials.
//!
//! # Usage
//! ```no_run
//! use switchboard_core::config;
//!
//! let cfg = config::load_config(None);
//! println!("Model: {}", cfg.defaults.model);
//! ```

pub mod credentials;
pub mod loader;
pub mod schema;

// Re-export key types
pub use credentials::{ConfigError, CredentialSource, EnvCredentials, StaticCredentials};
pub use loader::{get_config_path, load_config};
pub use schema::{
    Config, InvocationDefaults, RetryConfig, DEFAULT_MAX_PROMPT_TOKENS, DEFAULT_MODEL,
};
