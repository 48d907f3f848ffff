//! Stdio MCP front for a remote gateway.
//!
//! [`GatewayProxy`] serves the MCP handshake locally and forwards
//! `tools/list` and `tools/call` as JSON-RPC to a gateway's `/mcp` route.
//! Tool failures come back as envelopes and pass through untouched.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::redirect::Policy;
use rmcp::model::{
    CallToolRequestParams,
    CallToolResult,
    JsonObject,
    ListToolsResult,
    PaginatedRequestParams,
    ServerCapabilities,
    ServerInfo,
    Tool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData, RoleServer, ServerHandler};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, info};

use crate::call_tool_result;
use crate::protocol::{ErrorKind, ToolArguments, ToolResult};

const DEFAULT_PROXY_TIMEOUT: Duration = Duration::from_secs(30);
const PREVIEW_CHARS: usize = 200;

/// Where the proxy forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayProxyConfig {
    /// Full URL of the gateway's JSON-RPC route, e.g. `https://host/mcp`.
    pub endpoint: String,
    pub timeout: Duration,
}

impl GatewayProxyConfig {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: DEFAULT_PROXY_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Failure talking to the remote gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// The request never produced a response.
    Transport(String),
    /// The gateway answered with a non-success HTTP status.
    Status { status: u16, body: String },
    /// The response is not the JSON-RPC shape expected.
    Protocol(String),
    /// The gateway answered with a JSON-RPC error.
    Remote { code: i64, message: String },
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "gateway unreachable: {message}"),
            Self::Status { status, body } => write!(f, "gateway returned http {status}: {body}"),
            Self::Protocol(message) => write!(f, "invalid gateway response: {message}"),
            Self::Remote { code, message } => write!(f, "gateway error {code}: {message}"),
        }
    }
}

impl std::error::Error for ProxyError {}

impl ProxyError {
    /// Envelope kind reported to the MCP client.
    #[must_use]
    pub const fn error_kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::TransientError,
            Self::Status { status, .. } if *status >= 500 => ErrorKind::TransientError,
            _ => ErrorKind::InternalError,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RemoteTool {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "inputSchema", default)]
    input_schema: JsonObject,
}

#[derive(Debug, Deserialize)]
struct RemoteCatalog {
    tools: Vec<RemoteTool>,
}

/// MCP server whose tools live behind a remote gateway.
#[derive(Clone)]
pub struct GatewayProxy {
    client: Client,
    endpoint: String,
    next_id: Arc<AtomicU64>,
}

impl GatewayProxy {
    /// Builds the HTTP client; redirects are not followed.
    ///
    /// # Errors
    /// Returns `Transport` when the client cannot be constructed.
    pub fn new(config: &GatewayProxyConfig) -> Result<Self, ProxyError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|err| ProxyError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, ProxyError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        debug!(method, id, "forwarding json-rpc request");

        let response = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .body(payload.to_string())
            .send()
            .await
            .map_err(|err| ProxyError::Transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| ProxyError::Transport(err.to_string()))?;
        if !status.is_success() {
            let preview: String =
                String::from_utf8_lossy(&body).chars().take(PREVIEW_CHARS).collect();
            return Err(ProxyError::Status {
                status: status.as_u16(),
                body: preview.trim().to_string(),
            });
        }

        let response: RpcResponse = serde_json::from_slice(&body)
            .map_err(|err| ProxyError::Protocol(format!("invalid json-rpc response: {err}")))?;
        if let Some(error) = response.error {
            return Err(ProxyError::Remote {
                code: error.code,
                message: error.message,
            });
        }
        response
            .result
            .ok_or_else(|| ProxyError::Protocol("response has neither result nor error".to_string()))
    }

    /// Fetches the gateway's tool catalog.
    ///
    /// # Errors
    /// Returns any transport, status, or protocol failure.
    pub async fn remote_tools(&self) -> Result<Vec<Tool>, ProxyError> {
        let result = self.rpc("tools/list", json!({})).await?;
        let catalog: RemoteCatalog = serde_json::from_value(result)
            .map_err(|err| ProxyError::Protocol(format!("invalid tool catalog: {err}")))?;
        info!(tools = catalog.tools.len(), "retrieved remote tool catalog");
        Ok(catalog
            .tools
            .into_iter()
            .map(|tool| Tool::new(tool.name, tool.description, Arc::new(tool.input_schema)))
            .collect())
    }

    /// Invokes a tool on the gateway and returns its envelope.
    ///
    /// # Errors
    /// Returns any transport, status, or protocol failure. Tool failures are
    /// envelopes, not errors.
    pub async fn call_remote(
        &self,
        name: &str,
        arguments: ToolArguments,
    ) -> Result<ToolResult, ProxyError> {
        let result = self
            .rpc("tools/call", json!({"name": name, "arguments": arguments}))
            .await?;
        serde_json::from_value(result)
            .map_err(|err| ProxyError::Protocol(format!("invalid tool envelope: {err}")))
    }
}

impl ServerHandler for GatewayProxy {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(format!("Forwards tabular tools to {}.", self.endpoint)),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, ErrorData>> + Send + '_ {
        async move {
            match self.remote_tools().await {
                Ok(tools) => Ok(ListToolsResult::with_all_items(tools)),
                Err(err) => {
                    error!(error = %err, "listing remote tools failed");
                    Err(ErrorData::internal_error(err.to_string(), None))
                }
            }
        }
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, ErrorData>> + Send + '_ {
        async move {
            let name = request.name.into_owned();
            let result = match self
                .call_remote(&name, request.arguments.unwrap_or_default())
                .await
            {
                Ok(result) => result,
                Err(err) => {
                    error!(tool = %name, error = %err, "remote tool call failed");
                    ToolResult::failure(err.error_kind(), err.to_string())
                }
            };
            call_tool_result(&result)
        }
    }
}
