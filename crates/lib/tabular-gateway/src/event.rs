//! Platform invocation events.
//!
//! An event carries one HTTP request in the API-gateway v2 shape; the response
//! is returned as a status code, headers, and a string body.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::routes::{Gateway, Reply};

/// Inbound platform event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayEvent {
    #[serde(default)]
    pub raw_path: String,
    #[serde(default)]
    pub request_context: EventContext,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl GatewayEvent {
    /// Builds an event for `method` and `path` with an optional text body.
    #[must_use]
    pub fn new(method: &str, path: &str, body: Option<String>) -> Self {
        Self {
            raw_path: path.to_string(),
            request_context: EventContext {
                http: HttpContext {
                    method: method.to_string(),
                },
                request_id: None,
            },
            body,
            ..Self::default()
        }
    }

    fn method(&self) -> String {
        self.request_context.http.method.to_ascii_uppercase()
    }

    fn path(&self) -> &str {
        let trimmed = self.raw_path.trim_end_matches('/');
        if trimmed.is_empty() { "/" } else { trimmed }
    }

    fn body_bytes(&self) -> Result<Vec<u8>, String> {
        let Some(body) = self.body.as_deref() else {
            return Ok(Vec::new());
        };
        if self.is_base64_encoded {
            STANDARD
                .decode(body)
                .map_err(|err| format!("invalid base64 body: {err}"))
        } else {
            Ok(body.as_bytes().to_vec())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventContext {
    #[serde(default)]
    pub http: HttpContext,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpContext {
    #[serde(default)]
    pub method: String,
}

/// Platform response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl GatewayResponse {
    fn from_reply(reply: &Reply, request_id: &str) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers.insert("x-request-id".to_string(), request_id.to_string());
        Self {
            status_code: reply.status.as_u16(),
            headers,
            body: reply.body.to_string(),
            is_base64_encoded: false,
        }
    }
}

impl Gateway {
    /// Translates one platform event into a platform response.
    ///
    /// Liveness checks never reach the dispatcher. Anything that escapes
    /// routing is answered with an `InternalError` envelope, so the platform
    /// always receives a well-formed response.
    #[must_use]
    pub fn handle_invocation(&self, event: &GatewayEvent) -> GatewayResponse {
        let request_id = event
            .request_context
            .request_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let reply = guarded(|| self.route(event));
        info!(
            request_id = %request_id,
            method = %event.method(),
            path = event.path(),
            status = reply.status.as_u16(),
            "handled invocation"
        );
        GatewayResponse::from_reply(&reply, &request_id)
    }

    fn route(&self, event: &GatewayEvent) -> Reply {
        let method = event.method();
        let allowed = match event.path() {
            "/health" | "/tools" => "GET",
            "/invoke" | "/mcp" => "POST",
            other => return Reply::error(StatusCode::NOT_FOUND, format!("no route for {other}")),
        };
        if method != allowed {
            return Reply::error(
                StatusCode::METHOD_NOT_ALLOWED,
                format!("{method} is not allowed on {}", event.path()),
            );
        }

        match event.path() {
            "/health" => Self::health(),
            "/tools" => self.tools(),
            path => match event.body_bytes() {
                Ok(body) if path == "/invoke" => self.invoke(&body),
                Ok(body) => self.mcp(&body),
                Err(message) => Reply::error(StatusCode::BAD_REQUEST, message),
            },
        }
    }
}

/// Runs `route`, converting a panic into an `InternalError` reply.
pub(crate) fn guarded(route: impl FnOnce() -> Reply) -> Reply {
    panic::catch_unwind(AssertUnwindSafe(route)).unwrap_or_else(|_| {
        error!("invocation panicked outside the dispatcher");
        Reply::internal_error()
    })
}
