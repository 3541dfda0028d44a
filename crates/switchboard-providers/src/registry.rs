//! Provider registry: maps a model identifier to the backend that serves it.
//!
//! Resolution order:
//! 1. exact match against a small set of special-cased model names,
//! 2. prefix match against an ordered table (first match wins),
//! 3. the default provider.
//!
//! Each [`ProviderSpec`] describes how to reach one provider: credential
//! key, base-URL override key, default endpoint and wire format. A
//! [`BackendFactory`] turns a model name into a fresh [`ChatBackend`],
//! resolving credentials at that moment and failing before any network call
//! if one is missing. Nothing is cached between calls.

use std::sync::Arc;

use switchboard_core::config::{ConfigError, CredentialSource, EnvCredentials};
use tracing::debug;

use crate::anthropic::AnthropicProvider;
use crate::http_provider::HttpProvider;
use crate::traits::{ChatBackend, ClientOptions};

// ─────────────────────────────────────────────
// ProviderSpec: static metadata for one provider
// ─────────────────────────────────────────────

/// Request/response format spoken by a provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireFormat {
    /// OpenAI `/chat/completions` with Bearer auth.
    OpenAiCompatible,
    /// Anthropic Messages API.
    Anthropic,
}

/// Static specification describing one LLM provider.
#[derive(Clone, Debug)]
pub struct ProviderSpec {
    /// Internal name (e.g. `"anthropic"`).
    pub name: &'static str,
    /// Human-readable name for logs and errors.
    pub display_name: &'static str,
    /// Environment key holding the API key. `None` for keyless local servers.
    pub env_key: Option<&'static str>,
    /// Environment key that overrides the API base URL.
    pub base_url_env_key: Option<&'static str>,
    /// API base URL used when no override is configured.
    pub default_api_base: &'static str,
    /// Path of the chat endpoint, appended to the base URL.
    pub chat_path: &'static str,
    /// Routing prefix removed from the model name before it goes on the wire.
    pub strip_model_prefix: Option<&'static str>,
    pub wire: WireFormat,
}

impl ProviderSpec {
    /// Model name as the provider expects it.
    pub fn resolve_model_name<'a>(&self, model: &'a str) -> &'a str {
        self.strip_model_prefix
            .and_then(|prefix| model.strip_prefix(prefix))
            .unwrap_or(model)
    }

    /// Whether the provider's credential is present in `credentials`.
    /// Keyless providers are always configured.
    pub fn is_configured(&self, credentials: &dyn CredentialSource) -> bool {
        self.env_key
            .map_or(true, |key| credentials.get_non_empty(key).is_some())
    }
}

pub static ZAI: ProviderSpec = ProviderSpec {
    name: "zai",
    display_name: "Z.AI",
    env_key: Some("ZAI_API_KEY"),
    base_url_env_key: Some("ZAI_BASE_URL"),
    default_api_base: "https://api.z.ai/api/paas/v4",
    chat_path: "/chat/completions",
    strip_model_prefix: None,
    wire: WireFormat::OpenAiCompatible,
};

pub static ANTHROPIC: ProviderSpec = ProviderSpec {
    name: "anthropic",
    display_name: "Anthropic",
    env_key: Some("ANTHROPIC_API_KEY"),
    base_url_env_key: Some("ANTHROPIC_BASE_URL"),
    default_api_base: "https://api.anthropic.com/v1",
    chat_path: "/messages",
    strip_model_prefix: None,
    wire: WireFormat::Anthropic,
};

pub static GEMINI: ProviderSpec = ProviderSpec {
    name: "gemini",
    display_name: "Google",
    env_key: Some("GOOGLE_API_KEY"),
    base_url_env_key: Some("GOOGLE_BASE_URL"),
    default_api_base: "https://generativelanguage.googleapis.com/v1beta/openai",
    chat_path: "/chat/completions",
    strip_model_prefix: None,
    wire: WireFormat::OpenAiCompatible,
};

pub static OLLAMA: ProviderSpec = ProviderSpec {
    name: "ollama",
    display_name: "Ollama",
    env_key: None,
    base_url_env_key: Some("OLLAMA_BASE_URL"),
    default_api_base: "http://localhost:11434",
    chat_path: "/v1/chat/completions",
    strip_model_prefix: Some("ollama:"),
    wire: WireFormat::OpenAiCompatible,
};

pub static OPENAI: ProviderSpec = ProviderSpec {
    name: "openai",
    display_name: "OpenAI",
    env_key: Some("OPENAI_API_KEY"),
    base_url_env_key: Some("OPENAI_BASE_URL"),
    default_api_base: "https://api.openai.com/v1",
    chat_path: "/chat/completions",
    strip_model_prefix: None,
    wire: WireFormat::OpenAiCompatible,
};

/// Every built-in provider.
pub static PROVIDERS: &[&ProviderSpec] = &[&ZAI, &ANTHROPIC, &GEMINI, &OLLAMA, &OPENAI];

/// Model names routed to a provider by exact match, checked before prefixes.
pub static EXACT_ROUTES: &[(&str, &ProviderSpec)] = &[("glm-4.7", &ZAI)];

/// Prefix routes in priority order.
pub static PREFIX_ROUTES: &[(&str, &ProviderSpec)] = &[
    ("claude-", &ANTHROPIC),
    ("gemini-", &GEMINI),
    ("ollama:", &OLLAMA),
];

/// Provider for models that match no route.
pub static DEFAULT_PROVIDER: &ProviderSpec = &OPENAI;

// ─────────────────────────────────────────────
// Matching functions
// ─────────────────────────────────────────────

/// Resolve a model identifier against the built-in routing tables.
///
/// Matching is case-sensitive.
pub fn find_by_model(model: &str) -> &'static ProviderSpec {
    if let Some((_, spec)) = EXACT_ROUTES.iter().find(|(name, _)| *name == model) {
        return *spec;
    }
    PREFIX_ROUTES
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
        .map(|(_, spec)| *spec)
        .unwrap_or(DEFAULT_PROVIDER)
}

// ─────────────────────────────────────────────
// Factories
// ─────────────────────────────────────────────

/// Builds a backend for one model.
pub trait BackendFactory: Send + Sync {
    /// Provider name, for logs and routing listings.
    fn name(&self) -> &str;

    /// Construct a backend, resolving credentials from `credentials`.
    ///
    /// Must fail with [`ConfigError::MissingCredential`] before any network
    /// activity when a required credential is absent.
    fn create(
        &self,
        model: &str,
        options: ClientOptions,
        credentials: &dyn CredentialSource,
    ) -> Result<Box<dyn ChatBackend>, ConfigError>;
}

/// Connection details resolved from a spec and the credential source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub api_key: Option<String>,
    pub api_base: String,
}

impl ResolvedEndpoint {
    pub fn resolve(
        spec: &ProviderSpec,
        credentials: &dyn CredentialSource,
    ) -> Result<Self, ConfigError> {
        let api_key = spec
            .env_key
            .map(|key| credentials.require(key, spec.display_name))
            .transpose()?;
        let api_base = spec
            .base_url_env_key
            .and_then(|key| credentials.get_non_empty(key))
            .unwrap_or_else(|| spec.default_api_base.to_string());
        Ok(Self { api_key, api_base })
    }
}

/// Factory for a built-in [`ProviderSpec`].
#[derive(Clone, Copy, Debug)]
pub struct SpecFactory(pub &'static ProviderSpec);

impl BackendFactory for SpecFactory {
    fn name(&self) -> &str {
        self.0.name
    }

    fn create(
        &self,
        model: &str,
        options: ClientOptions,
        credentials: &dyn CredentialSource,
    ) -> Result<Box<dyn ChatBackend>, ConfigError> {
        let spec = self.0;
        let endpoint = ResolvedEndpoint::resolve(spec, credentials)?;
        let model = spec.resolve_model_name(model);

        debug!(
            provider = spec.display_name,
            model = model,
            api_base = %endpoint.api_base,
            streaming = options.streaming,
            "Creating LLM backend"
        );

        Ok(match spec.wire {
            WireFormat::OpenAiCompatible => {
                Box::new(HttpProvider::new(spec, endpoint, model, options)?)
            }
            WireFormat::Anthropic => {
                Box::new(AnthropicProvider::new(spec, endpoint, model, options)?)
            }
        })
    }
}

// ─────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────

/// Routing table from model identifiers to backend factories.
///
/// [`ProviderRegistry::builtin`] mirrors the static tables above; more
/// providers can be added with [`register_exact`](Self::register_exact) and
/// [`register_prefix`](Self::register_prefix).
pub struct ProviderRegistry {
    exact: Vec<(String, Arc<dyn BackendFactory>)>,
    prefixes: Vec<(String, Arc<dyn BackendFactory>)>,
    default: Arc<dyn BackendFactory>,
    credentials: Arc<dyn CredentialSource>,
}

impl ProviderRegistry {
    /// An empty routing table that sends everything to `default`.
    pub fn new(default: Arc<dyn BackendFactory>, credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            exact: Vec::new(),
            prefixes: Vec::new(),
            default,
            credentials,
        }
    }

    /// The built-in providers, reading credentials from `credentials`.
    pub fn builtin(credentials: Arc<dyn CredentialSource>) -> Self {
        let mut registry = Self::new(Arc::new(SpecFactory(DEFAULT_PROVIDER)), credentials);
        for (model, spec) in EXACT_ROUTES {
            registry.register_exact(*model, Arc::new(SpecFactory(*spec)));
        }
        for (prefix, spec) in PREFIX_ROUTES {
            registry.register_prefix(*prefix, Arc::new(SpecFactory(*spec)));
        }
        registry
    }

    /// The built-in providers, reading credentials from the process environment.
    pub fn from_env() -> Self {
        Self::builtin(Arc::new(EnvCredentials))
    }

    /// Route one exact model name to `factory`.
    pub fn register_exact(
        &mut self,
        model: impl Into<String>,
        factory: Arc<dyn BackendFactory>,
    ) -> &mut Self {
        self.exact.push((model.into(), factory));
        self
    }

    /// Route every model starting with `prefix` to `factory`. Earlier
    /// registrations take priority.
    pub fn register_prefix(
        &mut self,
        prefix: impl Into<String>,
        factory: Arc<dyn BackendFactory>,
    ) -> &mut Self {
        self.prefixes.push((prefix.into(), factory));
        self
    }

    /// Pick the factory for `model`.
    pub fn select(&self, model: &str) -> &Arc<dyn BackendFactory> {
        self.exact
            .iter()
            .find(|(name, _)| name == model)
            .or_else(|| {
                self.prefixes
                    .iter()
                    .find(|(prefix, _)| model.starts_with(prefix.as_str()))
            })
            .map(|(_, factory)| factory)
            .unwrap_or(&self.default)
    }

    /// Build a fresh backend for `model`.
    pub fn create(
        &self,
        model: &str,
        options: ClientOptions,
    ) -> Result<Box<dyn ChatBackend>, ConfigError> {
        self.select(model)
            .create(model, options, self.credentials.as_ref())
    }

    /// The credential source backends are built from.
    pub fn credentials(&self) -> &dyn CredentialSource {
        self.credentials.as_ref()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let exact: Vec<_> = self.exact.iter().map(|(m, fac)| (m, fac.name())).collect();
        let prefixes: Vec<_> = self.prefixes.iter().map(|(p, fac)| (p, fac.name())).collect();
        f.debug_struct("ProviderRegistry")
            .field("exact", &exact)
            .field("prefixes", &prefixes)
            .field("default", &self.default.name())
            .finish()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
