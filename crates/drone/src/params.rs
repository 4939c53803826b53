//! Numeric coercion of loosely typed command parameters.
//!
//! Planners emit numbers as JSON numbers or as numeric strings; both are
//! accepted. Everything else is an error for the action that needed it.

use dronevox_core::Params;
use serde_json::Value;

use crate::error::DroneError;

/// Read a required numeric parameter.
pub fn required_number(action: &str, params: &Params, name: &str) -> Result<f64, DroneError> {
    match params.get(name) {
        Some(value) => coerce(action, name, value),
        None => Err(DroneError::MissingParam {
            action: action.to_string(),
            param: name.to_string(),
        }),
    }
}

/// Read an optional numeric parameter, falling back to `default` when absent.
///
/// A present-but-`null` value is not "absent" and fails coercion.
pub fn optional_number(
    action: &str,
    params: &Params,
    name: &str,
    default: f64,
) -> Result<f64, DroneError> {
    match params.get(name) {
        Some(value) => coerce(action, name, value),
        None => Ok(default),
    }
}

fn coerce(action: &str, name: &str, value: &Value) -> Result<f64, DroneError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| DroneError::NotANumber {
        action: action.to_string(),
        param: name.to_string(),
        value: display_value(value),
    })
}

/// Render a parameter value for a progress line (strings without quotes).
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a whole parameter map the way progress lines show it.
pub fn display_params(params: &Params) -> String {
    Value::Object(params.clone()).to_string()
}
