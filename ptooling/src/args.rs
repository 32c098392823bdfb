//! JSON argument parsing helpers for function and trait-based tools.
//!
//! ```rust
//! use ptooling::{parse_json_object, required_string, take_task_description};
//!
//! let args = parse_json_object(r#"{"query":"rust"}"#).expect("object should parse");
//! let query = required_string(&args, "query").expect("query should be present");
//! assert_eq!(query, "rust");
//!
//! let (cleaned, description) =
//!     take_task_description(r#"{"task_description":"Searching docs","query":"rust"}"#);
//! assert_eq!(cleaned, r#"{"query":"rust"}"#);
//! assert_eq!(description.as_deref(), Some("Searching docs"));
//! ```

use serde_json::{Map, Value};

use crate::ToolError;

pub const TASK_DESCRIPTION_KEY: &str = "task_description";

pub fn parse_json_value(args_json: &str) -> Result<Value, ToolError> {
    serde_json::from_str(args_json)
        .map_err(|err| ToolError::invalid_arguments(format!("invalid JSON arguments: {err}")))
}

pub fn parse_json_object(args_json: &str) -> Result<Map<String, Value>, ToolError> {
    match parse_json_value(args_json)? {
        Value::Object(map) => Ok(map),
        _ => Err(ToolError::invalid_arguments("expected JSON object arguments")),
    }
}

pub fn required_string(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| ToolError::invalid_arguments(format!("missing required string: '{key}'")))
}

pub fn optional_string(args: &Map<String, Value>, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(ToString::to_string)
}

/// Removes the model-supplied `task_description` from tool arguments.
///
/// Arguments that are not a JSON object are returned unchanged.
pub fn take_task_description(args_json: &str) -> (String, Option<String>) {
    let Ok(Value::Object(mut map)) = serde_json::from_str::<Value>(args_json) else {
        return (args_json.to_string(), None);
    };

    let Some(description) = map.remove(TASK_DESCRIPTION_KEY) else {
        return (args_json.to_string(), None);
    };

    let description = match description {
        Value::String(text) => text,
        other => other.to_string(),
    };
    let cleaned = Value::Object(map).to_string();
    (cleaned, Some(description))
}
