//! Config loader: reads `~/.switchboard/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.switchboard/config.json`
//! 3. Environment variables `SWITCHBOARD_<SECTION>__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    apply_env_overrides(load_config_from_path(&config_path))
}

/// Load config from a specific file path, without env overrides.
fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return Config::default();
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return Config::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            Config::default()
        }
    }
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `SWITCHBOARD_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `SWITCHBOARD_DEFAULTS__MODEL` → `defaults.model`
/// - `SWITCHBOARD_DEFAULTS__MAX_PROMPT_TOKENS` → `defaults.max_prompt_tokens`
/// - `SWITCHBOARD_DEFAULTS__SYSTEM_PROMPT` → `defaults.system_prompt`
/// - `SWITCHBOARD_RETRY__MAX_ATTEMPTS` → `retry.max_attempts`
/// - `SWITCHBOARD_RETRY__BASE_DELAY_MS` → `retry.base_delay_ms`
fn apply_env_overrides(config: Config) -> Config {
    apply_overrides(config, |key| std::env::var(key).ok())
}

fn apply_overrides(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
    if let Some(val) = lookup("SWITCHBOARD_DEFAULTS__MODEL") {
        config.defaults.model = val;
    }
    if let Some(n) = numeric_override(&lookup, "SWITCHBOARD_DEFAULTS__MAX_PROMPT_TOKENS") {
        config.defaults.max_prompt_tokens = n;
    }
    if let Some(val) = lookup("SWITCHBOARD_DEFAULTS__SYSTEM_PROMPT") {
        config.defaults.system_prompt = Some(val);
    }
    if let Some(n) = numeric_override(&lookup, "SWITCHBOARD_RETRY__MAX_ATTEMPTS") {
        config.retry.max_attempts = n;
    }
    if let Some(ms) = numeric_override(&lookup, "SWITCHBOARD_RETRY__BASE_DELAY_MS") {
        config.retry.base_delay_ms = ms;
    }

    config
}

/// Parse a numeric override. Unparseable values are logged and ignored.
fn numeric_override<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let val = lookup(key)?;
    match val.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!(key, value = %val, "Ignoring invalid numeric override");
            None
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp_json(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_load_missing_file() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.json"));
        assert_eq!(config.defaults.model, "gpt-5.2");
        assert_eq!(config.defaults.max_prompt_tokens, 6000);
    }

    #[test]
    fn test_load_valid_json() {
        let file = write_temp_json(
            r#"{
            "defaults": { "model": "gemini-2.5-pro", "maxPromptTokens": 2048 },
            "retry": { "maxAttempts": 5 }
        }"#,
        );

        let config = load_config_from_path(file.path());
        assert_eq!(config.defaults.model, "gemini-2.5-pro");
        assert_eq!(config.defaults.max_prompt_tokens, 2048);
        assert_eq!(config.retry.max_attempts, 5);
        // Default preserved
        assert_eq!(config.retry.base_delay_ms, 500);
    }

    #[test]
    fn test_load_invalid_json_returns_defaults() {
        let file = write_temp_json("not valid json {{{");
        let config = load_config_from_path(file.path());
        assert_eq!(config.defaults.max_prompt_tokens, 6000);
    }

    #[test]
    fn test_load_config_applies_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "defaults": { "model": "ollama:llama3.1", "systemPrompt": "Be brief." } }"#,
        )
        .unwrap();

        let config = load_config_from_path(&path);
        assert_eq!(config.defaults.model, "ollama:llama3.1");
        assert_eq!(config.defaults.system_prompt.as_deref(), Some("Be brief."));
    }

    #[test]
    fn test_env_overrides() {
        let config = apply_overrides(
            Config::default(),
            env(&[
                ("SWITCHBOARD_DEFAULTS__MODEL", "claude-sonnet-4-5"),
                ("SWITCHBOARD_DEFAULTS__MAX_PROMPT_TOKENS", "1200"),
                ("SWITCHBOARD_RETRY__MAX_ATTEMPTS", "1"),
                ("SWITCHBOARD_RETRY__BASE_DELAY_MS", "50"),
            ]),
        );
        assert_eq!(config.defaults.model, "claude-sonnet-4-5");
        assert_eq!(config.defaults.max_prompt_tokens, 1200);
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.retry.base_delay_ms, 50);
    }

    #[test]
    fn test_env_override_invalid_number_ignored() {
        let config = apply_overrides(
            Config::default(),
            env(&[
                ("SWITCHBOARD_DEFAULTS__MAX_PROMPT_TOKENS", "lots"),
                ("SWITCHBOARD_RETRY__MAX_ATTEMPTS", "-1"),
                ("SWITCHBOARD_RETRY__BASE_DELAY_MS", "fast"),
            ]),
        );
        assert_eq!(config.defaults.max_prompt_tokens, 6000);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 500);
    }

    #[test]
    fn test_numeric_override() {
        let lookup = env(&[("A", " 42 "), ("B", "4x2")]);
        assert_eq!(numeric_override::<u32>(&lookup, "A"), Some(42));
        assert_eq!(numeric_override::<u32>(&lookup, "B"), None);
        assert_eq!(numeric_override::<u32>(&lookup, "C"), None);
    }
}
