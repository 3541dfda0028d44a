//! Shared CLI helpers: prompt input, schema loading, response printing.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use switchboard_core::types::OutputSchema;
use switchboard_core::utils::expand_home;

/// The prompt argument, or stdin when it is `-`.
pub fn read_prompt(arg: &str) -> Result<String> {
    if arg != "-" {
        return Ok(arg.to_string());
    }
    let mut prompt = String::new();
    std::io::stdin()
        .read_to_string(&mut prompt)
        .context("failed to read prompt from stdin")?;
    Ok(prompt)
}

/// Load a JSON Schema file. The schema is named after the file stem.
pub fn load_schema(path: &Path) -> Result<OutputSchema> {
    let path = expand_home(&path.to_string_lossy());
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read schema: {}", path.display()))?;
    let schema: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("schema is not valid JSON: {}", path.display()))?;

    let name = path
        .file_stem()
        .map(|s| schema_name(&s.to_string_lossy()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "response".to_string());
    Ok(OutputSchema::new(name, schema))
}

/// Keep only the characters backends accept in a schema name.
fn schema_name(stem: &str) -> String {
    stem.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Print a response to stdout.
pub fn print_response(response: &str) {
    println!();
    if response.is_empty() {
        println!("{}", "(no response)".dimmed());
    } else {
        println!("{response}");
    }
    println!();
}

/// Print a "thinking" placeholder while waiting.
pub fn print_thinking() {
    eprint!("{}", "⠿ thinking...".dimmed());
}

/// Clear the "thinking" placeholder.
pub fn clear_thinking() {
    eprint!("\r{}\r", " ".repeat(40));
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_prompt_literal() {
        assert_eq!(read_prompt("Who wins tonight?").unwrap(), "Who wins tonight?");
    }

    #[test]
    fn load_schema_named_after_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("match verdict.json");
        std::fs::write(&path, r#"{"type": "object", "required": ["winner"]}"#).unwrap();

        let schema = load_schema(&path).unwrap();
        assert_eq!(schema.name, "match_verdict");
        assert_eq!(schema.schema["required"][0], "winner");
    }

    #[test]
    fn load_schema_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = load_schema(&path).unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn load_schema_missing_file() {
        assert!(load_schema(Path::new("/nonexistent/schema.json")).is_err());
    }
}
