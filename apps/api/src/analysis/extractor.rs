//! Structured Extractor: turns raw model text into a JSON document.
//!
//! Strict parse first. On failure, exactly one bounded repair (strip
//! markdown code fences, slice from the first `{` to the last `}`) and one
//! re-parse. No second repair and no partial-field salvage: anything still
//! unusable is reported so the fallback synthesizer takes over.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ExtractionError {
    #[error("model output is not valid JSON: {0}")]
    Unparseable(String),

    #[error("model output parsed to {0}, expected a JSON object")]
    NotAnObject(&'static str),
}

/// Parses model text into a JSON object, attempting one bounded repair.
pub fn extract_document(text: &str) -> Result<Map<String, Value>, ExtractionError> {
    match parse_object(text) {
        Ok(document) => Ok(document),
        Err(_) => parse_object(&repair_text(text)),
    }
}

fn parse_object(text: &str) -> Result<Map<String, Value>, ExtractionError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ExtractionError::Unparseable(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ExtractionError::NotAnObject(json_type_name(&other))),
    }
}

/// The single repair pass: drop code fences, then keep only the span from
/// the first `{` through the last `}`.
fn repair_text(text: &str) -> String {
    let stripped = strip_code_fences(text);
    match (stripped.find('{'), stripped.rfind('}')) {
        (Some(start), Some(end)) if start < end => stripped[start..=end].to_string(),
        _ => stripped.to_string(),
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
