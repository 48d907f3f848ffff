//! Tool-dispatch pipeline and MCP server for tabular-mcp.
//!
//! The [`registry`] holds the tool catalog, the [`dispatch`] module validates
//! and runs requests, and [`TabularMcp`] exposes the same catalog over rmcp.
//! [`proxy::GatewayProxy`] fronts a remote gateway instead of a local one.

mod helpers;
pub mod dispatch;
pub mod protocol;
pub mod proxy;
pub mod registry;
pub mod server;
pub mod tools;

use std::future::Future;
use std::sync::Arc;

use rmcp::model::{
    CallToolRequestParams,
    CallToolResult,
    Content,
    ListToolsResult,
    PaginatedRequestParams,
    ServerCapabilities,
    ServerInfo,
    Tool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData, RoleServer, ServerHandler};

use crate::dispatch::Dispatcher;
use crate::protocol::{ToolRequest, ToolResult};
use crate::registry::ToolDescriptor;

const SERVER_INSTRUCTIONS: &str = r"tabular-mcp provides read-only tools for inspecting CSV data.

Tools:
- `analyze_csv(path)` summarizes a local file: `row_count`, `columns`, `sample_rows`, `truncated`.
- `analyze_s3_csv(bucket, key)` does the same for an S3 object.
- `validate_csv_structure(path, expected_columns, strict_mode?)` reports width mismatches and ragged rows.
- `search_csv_content(path, search_term, case_sensitive?)` returns rows containing a term.

Every result is an envelope: `{status: ok, result}` or `{status: error, error_kind, message}`.
Cells are numbers only when unambiguously numeric; everything else is text.";

/// MCP server backed by the tool dispatcher.
#[derive(Clone)]
pub struct TabularMcp {
    dispatcher: Dispatcher,
}

impl TabularMcp {
    #[must_use]
    pub const fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

impl ServerHandler for TabularMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
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
        let tools = self
            .dispatcher
            .registry()
            .list_all()
            .iter()
            .map(mcp_tool)
            .collect();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, ErrorData>> + Send + '_ {
        async move {
            let request = ToolRequest::new(
                request.name.into_owned(),
                request.arguments.unwrap_or_default(),
            );
            let result = self.dispatcher.dispatch_blocking(request).await;
            call_tool_result(&result)
        }
    }
}

fn mcp_tool(descriptor: &ToolDescriptor) -> Tool {
    Tool::new(
        descriptor.name.clone(),
        descriptor.description.clone(),
        Arc::new(descriptor.input_schema()),
    )
}

/// Wraps an envelope as tool output; failures set `isError`.
fn call_tool_result(result: &ToolResult) -> Result<CallToolResult, ErrorData> {
    let content = vec![Content::json(result)?];
    Ok(if result.is_success() {
        CallToolResult::success(content)
    } else {
        CallToolResult::error(content)
    })
}
