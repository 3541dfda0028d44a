//! Validation of structured-output answers against their schema.

use serde_json::Value;
use switchboard_core::types::OutputSchema;

use crate::error::ProviderError;

/// Parse a text answer as JSON and validate it.
pub fn parse_and_validate(text: &str, schema: &OutputSchema) -> Result<Value, ProviderError> {
    let value: Value = serde_json::from_str(text.trim()).map_err(|e| {
        ProviderError::Validation(format!("response for '{}' is not JSON: {e}", schema.name))
    })?;
    validate(value, schema)
}

/// Validate a JSON value against `schema`, returning it unchanged on success.
pub fn validate(value: Value, schema: &OutputSchema) -> Result<Value, ProviderError> {
    let validator = jsonschema::validator_for(&schema.schema).map_err(|e| {
        ProviderError::Validation(format!("invalid schema '{}': {e}", schema.name))
    })?;
    if let Err(err) = validator.validate(&value) {
        return Err(ProviderError::Validation(format!(
            "response does not match '{}': {err}",
            schema.name
        )));
    }
    Ok(value)
}
