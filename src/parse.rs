//! Parsing of raw model output into a [`Diagnosis`].
//!
//! The model is asked for bare JSON but is not a schema-conformant producer,
//! so parsing happens in two stages: syntax (is it JSON at all) and shape
//! (are the four fields present and correctly typed).

use crate::error::ParseError;
use crate::models::Diagnosis;
use serde_json::{Map, Value};

/// Parse raw model text, tolerating a surrounding fenced code block.
pub fn parse_diagnosis(raw: &str) -> Result<Diagnosis, ParseError> {
    let cleaned = strip_code_fence(raw);
    let value: Value =
        serde_json::from_str(cleaned).map_err(|e| ParseError::Malformed(e.to_string()))?;
    validate_shape(&value)
}

/// Remove a leading fence marker (with or without a `json` tag) and a trailing one.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}

/// Check the deserialized value carries all four fields with usable types.
///
/// Confidence only has to be numeric; its range is not checked.
pub fn validate_shape(value: &Value) -> Result<Diagnosis, ParseError> {
    let fields = value
        .as_object()
        .ok_or_else(|| ParseError::InvalidShape("expected a JSON object".to_string()))?;

    let confidence = match fields.get("confidence") {
        Some(Value::Number(n)) => n.clone(),
        Some(other) => {
            return Err(ParseError::InvalidShape(format!(
                "confidence must be numeric, got {}",
                other
            )))
        }
        None => {
            return Err(ParseError::InvalidShape(
                "missing field 'confidence'".to_string(),
            ))
        }
    };

    Ok(Diagnosis {
        disease: required_text(fields, "disease")?,
        confidence,
        description: required_text(fields, "description")?,
        advice: required_text(fields, "advice")?,
    })
}

fn required_text(fields: &Map<String, Value>, name: &str) -> Result<String, ParseError> {
    match fields.get(name) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(ParseError::InvalidShape(format!(
            "field '{}' is empty",
            name
        ))),
        Some(other) => Err(ParseError::InvalidShape(format!(
            "field '{}' must be a string, got {}",
            name, other
        ))),
        None => Err(ParseError::InvalidShape(format!("missing field '{}'", name))),
    }
}
