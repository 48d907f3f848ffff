//! Native HTTP server exposing the gateway routes.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tracing::{error, info, warn};

use crate::routes::{Gateway, Reply};

/// Default bind address for the HTTP gateway.
pub const DEFAULT_GATEWAY_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 4030));

/// Configuration for the HTTP gateway.
#[derive(Debug, Clone)]
pub struct GatewayServerConfig {
    pub addr: SocketAddr,
    pub max_body_bytes: usize,
    /// Ceiling on one invocation; the caller gets 504 past it.
    pub invocation_timeout: Duration,
}

impl GatewayServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            max_body_bytes: 1024 * 1024,
            invocation_timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub const fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    #[must_use]
    pub const fn with_invocation_timeout(mut self, invocation_timeout: Duration) -> Self {
        self.invocation_timeout = invocation_timeout;
        self
    }
}

impl Default for GatewayServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_GATEWAY_ADDR)
    }
}

/// HTTP gateway server wrapper.
pub struct GatewayServer {
    config: GatewayServerConfig,
    gateway: Gateway,
}

impl GatewayServer {
    #[must_use]
    pub const fn new(gateway: Gateway, config: GatewayServerConfig) -> Self {
        Self { config, gateway }
    }

    /// Runs the HTTP server until shutdown.
    ///
    /// # Errors
    /// Returns any listener or server error.
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.config.addr;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let app = build_router(self.gateway, &self.config);

        info!("tabular-gateway listening on {addr}");
        axum::serve(listener, app).await?;
        Ok(())
    }
}

#[derive(Clone)]
struct AppState {
    gateway: Gateway,
    invocation_timeout: Duration,
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Builds the gateway router.
#[must_use]
pub fn build_router(gateway: Gateway, config: &GatewayServerConfig) -> Router {
    let state = AppState {
        gateway,
        invocation_timeout: config.invocation_timeout,
    };
    Router::new()
        .route("/health", get(health))
        .route("/tools", get(tools))
        .route("/invoke", post(invoke))
        .route("/mcp", post(mcp))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .with_state(state)
}

async fn health() -> Reply {
    Gateway::health()
}

async fn tools(State(state): State<AppState>) -> Reply {
    state.gateway.tools()
}

async fn invoke(State(state): State<AppState>, body: Bytes) -> Response {
    run_blocking(&state, move |gateway| gateway.invoke(&body)).await
}

async fn mcp(State(state): State<AppState>, body: Bytes) -> Response {
    run_blocking(&state, move |gateway| gateway.mcp(&body)).await
}

/// Runs a route on the blocking pool under the invocation timeout.
async fn run_blocking<F>(state: &AppState, route: F) -> Response
where
    F: FnOnce(&Gateway) -> Reply + Send + 'static,
{
    let gateway = state.gateway.clone();
    let task = tokio::task::spawn_blocking(move || route(&gateway));
    match tokio::time::timeout(state.invocation_timeout, task).await {
        Ok(Ok(reply)) => reply.into_response(),
        Ok(Err(err)) => {
            error!(error = %err, "invocation task failed");
            Reply::internal_error().into_response()
        }
        Err(_) => {
            warn!(
                timeout_ms = u64::try_from(state.invocation_timeout.as_millis()).unwrap_or(u64::MAX),
                "invocation timed out"
            );
            Reply::error(StatusCode::GATEWAY_TIMEOUT, "invocation timed out").into_response()
        }
    }
}
