//! Transport adapter for tabular-mcp.
//!
//! Translates platform invocation events and native HTTP requests into
//! protocol requests, and protocol results back into transport responses.
//! Tool-level failures always travel inside a 200 response body; non-200
//! statuses are reserved for requests that never reach the dispatcher.

pub mod event;
pub mod jsonrpc;
pub mod routes;
pub mod server;

pub use event::{GatewayEvent, GatewayResponse};
pub use routes::{Gateway, Reply};
pub use server::{GatewayServer, GatewayServerConfig, build_router};
