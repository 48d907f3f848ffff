use serde::Serialize;
use serde_json::Value;

use crate::protocol::{ToolArguments, ToolError};

pub fn required_str<'a>(args: &'a ToolArguments, name: &str) -> Result<&'a str, ToolError> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::invalid_arguments(format!("missing string argument '{name}'")))
}

pub fn required_i64(args: &ToolArguments, name: &str) -> Result<i64, ToolError> {
    args.get(name)
        .and_then(Value::as_i64)
        .ok_or_else(|| ToolError::invalid_arguments(format!("missing integer argument '{name}'")))
}

pub fn bool_or(args: &ToolArguments, name: &str, default: bool) -> bool {
    args.get(name).and_then(Value::as_bool).unwrap_or(default)
}

pub fn to_payload<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    Ok(serde_json::to_value(value)?)
}
