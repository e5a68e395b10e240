//! Argument coercion helpers.
//!
//! MCP deserializes tool arguments as an untyped map; each handler field
//! lands here as an `Option<serde_json::Value>` regardless of the type the
//! caller actually sent, so a wrong-typed argument never fails typed
//! deserialization up front. Optional arguments are coerced to their
//! expected shape with a silent fallback to a default; required arguments
//! that are missing or unusable become an `InvalidArgument` error.

use serde_json::Value;

use crate::error::CodemapError;

/// Coerce an optional argument to a string, accepting a JSON string,
/// number, or boolean in their natural textual form. Anything else
/// (missing, object, array, null) falls back to `default`.
pub fn coerce_string(value: &Option<Value>, default: &str) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => default.to_string(),
    }
}

/// Same as [`coerce_string`], but returns `None` instead of a default when
/// the argument is absent or unusable.
pub fn coerce_opt_string(value: &Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    }
}

/// A required string argument: missing or coercion-unusable is an
/// `InvalidArgument` tool error naming the argument.
pub fn require_string(value: &Option<Value>, arg_name: &str) -> Result<String, CodemapError> {
    coerce_opt_string(value)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CodemapError::InvalidArgument(format!("missing required argument `{arg_name}`")))
}

/// Coerce an optional argument to a bool, accepting a JSON bool directly or
/// a string `"true"`/`"false"` (case-insensitive). Anything else falls back
/// to `default`.
pub fn coerce_bool(value: &Option<Value>, default: bool) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" => true,
            "false" => false,
            _ => default,
        },
        Some(Value::Number(n)) => n.as_i64().map(|i| i != 0).unwrap_or(default),
        _ => default,
    }
}

/// Coerce an optional argument to a `u32`, accepting a JSON number or a
/// numeric string. Anything else (including a negative number) falls back
/// to `default`.
pub fn coerce_u32(value: &Option<Value>, default: u32) -> u32 {
    match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()).unwrap_or(default),
        Some(Value::String(s)) => s.parse::<u32>().unwrap_or(default),
        _ => default,
    }
}
