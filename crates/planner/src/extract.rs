//! Pull a JSON object out of free-form model output.

use serde_json::Value;

use crate::error::PlannerError;

/// Parse the JSON object in `raw`.
///
/// Tries, in order: the whole text with any surrounding code fence removed,
/// then the widest `{ ... }` span inside it.
pub fn extract_json_payload(raw: &str) -> Result<Value, PlannerError> {
    let text = strip_code_fence(raw.trim());

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        if value.is_object() {
            return Ok(value);
        }
    }

    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(PlannerError::NoJson);
    };
    if end < start {
        return Err(PlannerError::NoJson);
    }

    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(value) if value.is_object() => Ok(value),
        _ => Err(PlannerError::NoJson),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
