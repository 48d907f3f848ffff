//! JSON-RPC 2.0 bridge for `tools/list` and `tools/call`.
//!
//! Tool failures are successful JSON-RPC responses whose `result` carries the
//! failure envelope; JSON-RPC errors are reserved for malformed messages.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tabular_mcp::dispatch::Dispatcher;
use tabular_mcp::protocol::{ToolArguments, ToolRequest};
use tracing::debug;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Option<ToolArguments>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Handles one JSON-RPC message.
#[must_use]
pub fn handle(dispatcher: &Dispatcher, body: &[u8]) -> JsonRpcResponse {
    let message: Value = match serde_json::from_slice(body) {
        Ok(message) => message,
        Err(err) => {
            return JsonRpcResponse::error(Value::Null, PARSE_ERROR, format!("parse error: {err}"));
        }
    };
    let id = message.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = match serde_json::from_value(message) {
        Ok(request) => request,
        Err(err) => {
            return JsonRpcResponse::error(id, INVALID_REQUEST, format!("invalid request: {err}"));
        }
    };
    debug!(method = %request.method, "json-rpc request");

    match request.method.as_str() {
        "tools/list" => {
            let tools: Vec<Value> = dispatcher
                .registry()
                .list_all()
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "inputSchema": tool.input_schema(),
                    })
                })
                .collect();
            JsonRpcResponse::result(request.id, json!({ "tools": tools }))
        }
        "tools/call" => {
            let params: CallParams = match serde_json::from_value(request.params) {
                Ok(params) => params,
                Err(err) => {
                    return JsonRpcResponse::error(
                        request.id,
                        INVALID_PARAMS,
                        format!("invalid params: {err}"),
                    );
                }
            };
            let outcome = dispatcher.dispatch(&ToolRequest::new(
                params.name,
                params.arguments.unwrap_or_default(),
            ));
            match serde_json::to_value(outcome) {
                Ok(result) => JsonRpcResponse::result(request.id, result),
                Err(err) => JsonRpcResponse::error(request.id, INTERNAL_ERROR, err.to_string()),
            }
        }
        other => {
            JsonRpcResponse::error(request.id, METHOD_NOT_FOUND, format!("unknown method: {other}"))
        }
    }
}
