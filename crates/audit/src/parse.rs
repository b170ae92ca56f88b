//! Extraction of the JSON payload from free-form oracle text, plus lenient
//! field readers for the shapes oracles actually return.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

/// Errors from reading oracle output.
#[derive(Debug, Error)]
pub enum OracleOutputError {
    #[error("No JSON object found in oracle output")]
    NoJson,

    #[error("Invalid JSON in oracle output: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// The JSON payload of an oracle answer.
///
/// A fenced ```` ```json ```` block wins; otherwise the span from the first
/// `{` to the last `}`.
pub fn extract_json(text: &str) -> Result<&str, OracleOutputError> {
    if let Some(start) = text.find("```json") {
        let body = &text[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            return Ok(body[..end].trim());
        }
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&text[start..=end]),
        _ => Err(OracleOutputError::NoJson),
    }
}

/// Parse the JSON payload of an oracle answer into `T`.
pub fn parse_oracle_json<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, OracleOutputError> {
    let payload = extract_json(text)?;
    Ok(serde_json::from_str(payload)?)
}

pub(crate) const UNKNOWN: &str = "Unknown";

pub(crate) fn unknown() -> String {
    UNKNOWN.to_string()
}

fn value_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Array(items) => {
            let parts: Vec<String> = items.into_iter().filter_map(value_text).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        other => Some(other.to_string()),
    }
}

/// Any scalar or list as text; null and blank become `"Unknown"`.
pub(crate) fn text_or_unknown<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(value_text(Value::deserialize(d)?).unwrap_or_else(unknown))
}

/// Any scalar or list as text; null and blank become `""`.
pub(crate) fn text_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(value_text(Value::deserialize(d)?).unwrap_or_default())
}

/// Booleans, `"true"`/`"yes"` strings and non-zero numbers are true.
pub(crate) fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => b,
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "y"),
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    })
}

/// Numbers or numeric strings (a trailing `%` is allowed); anything else is 0.
pub(crate) fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

pub(crate) fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

/// Class numbers from a list of numbers or strings, or a single
/// comma-separated string. Entries that are not class numbers are dropped.
pub(crate) fn lenient_classes<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u16>, D::Error> {
    fn class_of(value: &Value) -> Vec<u16> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .and_then(|v| u16::try_from(v).ok())
                .into_iter()
                .collect(),
            Value::String(s) => s
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter_map(|t| t.trim().parse().ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    let mut classes: Vec<u16> = match Value::deserialize(d)? {
        Value::Array(items) => items.iter().flat_map(class_of).collect(),
        other => class_of(&other),
    };
    classes.retain(|c| (clearmark_model::MIN_NICE_CLASS..=clearmark_model::MAX_NICE_CLASS).contains(c));
    classes.sort_unstable();
    classes.dedup();
    Ok(classes)
}
