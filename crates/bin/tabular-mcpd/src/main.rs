//! Daemon entry point for the tabular MCP server.
//!
//! Loads configuration from the command line and environment, builds the tool
//! registry, and serves it over stdio MCP, streamable HTTP MCP, and the HTTP
//! gateway. With `--event-file` it handles a single platform event and exits.
//! With `--proxy-url` it serves stdio MCP backed by a remote gateway instead.

mod config;
mod sources;

use std::error::Error;
use std::io::Read;
use std::sync::Arc;

use tabular_gateway::{Gateway, GatewayEvent, GatewayServer, GatewayServerConfig};
use tabular_mcp::dispatch::Dispatcher;
use tabular_mcp::registry::ToolRegistry;
use tabular_mcp::proxy::GatewayProxyConfig;
use tabular_mcp::server::{
    McpHttpServerConfig,
    serve_stdio,
    serve_stdio_proxy,
    serve_streamable_http,
};
use tokio::task::JoinSet;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{EventInput, TabularConfig};
use crate::sources::build_control_plane;

type BoxError = Box<dyn Error + Send + Sync>;

const DEFAULT_LOG_FILTER: &str = "tabular=info";

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = TabularConfig::from_args()?;
    init_tracing(config.log_json);

    if let Some(url) = &config.proxy_url {
        let proxy = GatewayProxyConfig::new(url.clone()).with_timeout(config.invocation_timeout);
        return serve_stdio_proxy(proxy).await;
    }

    let registry = ToolRegistry::discover()?;
    info!(tools = registry.len(), "tool registry ready");
    let dispatcher = Dispatcher::new(Arc::new(registry), build_control_plane(&config));

    if let Some(input) = config.event_input.clone() {
        return handle_event(Gateway::new(dispatcher), input).await;
    }
    serve(dispatcher, &config).await
}

/// Logs go to stderr so the stdio transport owns stdout.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn handle_event(gateway: Gateway, input: EventInput) -> Result<(), BoxError> {
    let raw = match input {
        EventInput::Stdin => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            raw
        }
        EventInput::File(path) => std::fs::read_to_string(path)?,
    };
    let event: GatewayEvent = serde_json::from_str(&raw)?;
    let response = tokio::task::spawn_blocking(move || gateway.handle_invocation(&event)).await?;
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

/// Runs every enabled server until one of them stops or a shutdown signal
/// arrives.
async fn serve(dispatcher: Dispatcher, config: &TabularConfig) -> Result<(), BoxError> {
    let mut servers: JoinSet<Result<(), BoxError>> = JoinSet::new();
    if config.enable_stdio {
        servers.spawn(serve_stdio(dispatcher.clone()));
    }
    if config.mcp_serve {
        servers.spawn(serve_streamable_http(
            dispatcher.clone(),
            McpHttpServerConfig::new(config.mcp_http_addr),
        ));
    }
    if config.gateway_serve {
        let gateway_config = GatewayServerConfig::new(config.gateway_addr)
            .with_max_body_bytes(config.max_body_bytes)
            .with_invocation_timeout(config.invocation_timeout);
        servers.spawn(GatewayServer::new(Gateway::new(dispatcher), gateway_config).serve());
    }

    let outcome = tokio::select! {
        finished = servers.join_next() => match finished {
            Some(joined) => joined?,
            None => Ok(()),
        },
        signal = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            signal.map_err(Into::into)
        }
    };
    servers.abort_all();
    outcome
}
