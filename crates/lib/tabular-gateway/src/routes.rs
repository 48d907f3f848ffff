use axum::http::StatusCode;
use serde_json::{Value, json};
use tabular_mcp::dispatch::Dispatcher;
use tabular_mcp::protocol::{ErrorKind, ToolRequest, ToolResult};
use tracing::warn;

use crate::jsonrpc;

pub const SERVICE_NAME: &str = "tabular-mcp";

/// Status and JSON body produced by a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

impl Reply {
    #[must_use]
    pub const fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    #[must_use]
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    /// Envelope for a failure that escaped the dispatcher.
    #[must_use]
    pub fn internal_error() -> Self {
        Self::envelope(&ToolResult::failure(ErrorKind::InternalError, "internal error"))
    }

    fn envelope(result: &ToolResult) -> Self {
        match serde_json::to_value(result) {
            Ok(body) => Self::ok(body),
            Err(err) => Self::error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        }
    }
}

/// Transport-independent routes over a dispatcher.
#[derive(Clone)]
pub struct Gateway {
    dispatcher: Dispatcher,
}

impl Gateway {
    #[must_use]
    pub const fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Liveness answer; never touches the dispatcher.
    #[must_use]
    pub fn health() -> Reply {
        Reply::ok(json!({
            "status": "healthy",
            "service": SERVICE_NAME,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }))
    }

    #[must_use]
    pub fn tools(&self) -> Reply {
        Reply::ok(json!({ "tools": self.dispatcher.registry().catalog() }))
    }

    /// Decodes a protocol request and dispatches it.
    ///
    /// A body that is not a protocol request is rejected with 400 before
    /// dispatch; any dispatched request answers 200 with its envelope.
    #[must_use]
    pub fn invoke(&self, body: &[u8]) -> Reply {
        let request: ToolRequest = match serde_json::from_slice(body) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "malformed invoke body");
                return Reply::error(StatusCode::BAD_REQUEST, format!("invalid request body: {err}"));
            }
        };
        Reply::envelope(&self.dispatcher.dispatch(&request))
    }

    /// Handles a JSON-RPC message; protocol errors stay inside the body.
    #[must_use]
    pub fn mcp(&self, body: &[u8]) -> Reply {
        match serde_json::to_value(jsonrpc::handle(&self.dispatcher, body)) {
            Ok(body) => Reply::ok(body),
            Err(err) => Reply::error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        }
    }
}
