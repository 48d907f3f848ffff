use std::fs;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::Router;
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tabular_core::control::TabularControlPlane;
use tabular_core::reader::ReaderOptions;
use tabular_core::source::{DataSources, LocalSource, LocalSourceConfig};
use tabular_gateway::jsonrpc::{METHOD_NOT_FOUND, PARSE_ERROR};
use tabular_gateway::{Gateway, GatewayEvent, GatewayServerConfig, build_router};
use tabular_mcp::dispatch::Dispatcher;
use tabular_mcp::registry::{ToolDescriptor, ToolRegistry};
use tower::ServiceExt;

fn gateway_with(registry: ToolRegistry) -> Gateway {
    let control = TabularControlPlane::new(
        DataSources::new(LocalSource::new(LocalSourceConfig::default())),
        ReaderOptions::default(),
    );
    Gateway::new(Dispatcher::new(Arc::new(registry), control))
}

fn gateway() -> Gateway {
    gateway_with(ToolRegistry::discover().expect("built-in tools are unique"))
}

fn slow_tools() -> Vec<ToolDescriptor> {
    vec![ToolDescriptor::new("slow_tool", "Sleeps before answering.", |_, _| {
        std::thread::sleep(Duration::from_millis(500));
        Ok(json!({}))
    })]
}

fn invoke_event(body: &Value) -> GatewayEvent {
    GatewayEvent::new("POST", "/invoke", Some(body.to_string()))
}

fn body_json(body: &str) -> Value {
    serde_json::from_str(body).expect("response body is JSON")
}

async fn send(method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
    send_to(build_router(gateway(), &GatewayServerConfig::default()), method, uri, body).await
}

async fn send_to(router: Router, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[test]
fn health_event_answers_without_dispatch() {
    let response = gateway().handle_invocation(&GatewayEvent::new("GET", "/health", None));
    assert_eq!(response.status_code, 200);
    let body = body_json(&response.body);
    assert_eq!(body["status"], json!("healthy"));
    assert_eq!(body["service"], json!("tabular-mcp"));
    assert!(body["timestamp"].is_string());
}

#[test]
fn unknown_tool_is_a_200_failure_envelope() {
    let response = gateway().handle_invocation(&invoke_event(&json!({
        "tool_name": "delete_everything",
        "arguments": {}
    })));
    assert_eq!(response.status_code, 200);
    assert_eq!(response.headers["content-type"], "application/json");
    let body = body_json(&response.body);
    assert_eq!(body["status"], json!("error"));
    assert_eq!(body["error_kind"], json!("UnknownTool"));
}

#[test]
fn invoke_event_analyzes_a_local_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("orders.csv");
    fs::write(&path, "id,amount\n1,2\n3,4\n").expect("write fixture");

    let response = gateway().handle_invocation(&invoke_event(&json!({
        "tool_name": "analyze_csv",
        "arguments": {"path": path.display().to_string()}
    })));
    let body = body_json(&response.body);
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["result"]["row_count"], json!(2));
    assert_eq!(body["result"]["sample_rows"][1], json!({"id": 3, "amount": 4}));
}

#[test]
fn malformed_transport_requests_never_reach_the_dispatcher() {
    let gateway = gateway();

    let response = gateway.handle_invocation(&GatewayEvent::new("POST", "/invoke", Some("{".into())));
    assert_eq!(response.status_code, 400);

    let mut encoded = GatewayEvent::new("POST", "/invoke", Some("not base64!".into()));
    encoded.is_base64_encoded = true;
    assert_eq!(gateway.handle_invocation(&encoded).status_code, 400);

    let response = gateway.handle_invocation(&GatewayEvent::new("GET", "/invoke", None));
    assert_eq!(response.status_code, 405);

    let response = gateway.handle_invocation(&GatewayEvent::new("GET", "/admin", None));
    assert_eq!(response.status_code, 404);
}

#[test]
fn request_ids_are_echoed() {
    let mut event = GatewayEvent::new("GET", "/health", None);
    event.request_context.request_id = Some("req-42".to_string());
    let response = gateway().handle_invocation(&event);
    assert_eq!(response.headers["x-request-id"], "req-42");
}

#[test]
fn json_rpc_lists_and_calls_tools() {
    let gateway = gateway();
    let list = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list", "params": {}});
    let response =
        gateway.handle_invocation(&GatewayEvent::new("POST", "/mcp", Some(list.to_string())));
    let body = body_json(&response.body);
    assert_eq!(body["id"], json!(1));
    let names: Vec<&str> = body["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|tool| tool["name"].as_str())
        .collect();
    assert!(names.contains(&"analyze_csv"));
    assert!(names.contains(&"analyze_s3_csv"));

    let call = json!({
        "jsonrpc": "2.0",
        "id": "call-1",
        "method": "tools/call",
        "params": {"name": "analyze_csv", "arguments": {}}
    });
    let response =
        gateway.handle_invocation(&GatewayEvent::new("POST", "/mcp", Some(call.to_string())));
    let body = body_json(&response.body);
    assert_eq!(body["result"]["error_kind"], json!("InvalidArguments"));
}

#[test]
fn json_rpc_protocol_errors_use_standard_codes() {
    let gateway = gateway();
    let response =
        gateway.handle_invocation(&GatewayEvent::new("POST", "/mcp", Some("{oops".into())));
    assert_eq!(response.status_code, 200);
    assert_eq!(body_json(&response.body)["error"]["code"], json!(PARSE_ERROR));

    let unknown = json!({"jsonrpc": "2.0", "id": 7, "method": "resources/list"});
    let response =
        gateway.handle_invocation(&GatewayEvent::new("POST", "/mcp", Some(unknown.to_string())));
    let body = body_json(&response.body);
    assert_eq!(body["id"], json!(7));
    assert_eq!(body["error"]["code"], json!(METHOD_NOT_FOUND));
}

#[tokio::test]
async fn http_health_and_catalog() {
    let (status, body) = send(Method::GET, "/health", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("healthy"));

    let (status, body) = send(Method::GET, "/tools", "").await;
    assert_eq!(status, StatusCode::OK);
    let analyze = body["tools"]
        .as_array()
        .unwrap()
        .iter()
        .find(|tool| tool["name"] == json!("analyze_csv"))
        .cloned()
        .unwrap();
    assert_eq!(
        analyze["parameters"],
        json!([{"name": "path", "type": "string", "required": true}])
    );
}

#[tokio::test]
async fn http_invoke_keeps_failures_inside_200() {
    let request = json!({"tool_name": "delete_everything", "arguments": {}}).to_string();
    let (status, body) = send(Method::POST, "/invoke", &request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error_kind"], json!("UnknownTool"));

    let (status, _) = send(Method::POST, "/invoke", "[1, 2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_rejects_unknown_routes_and_methods() {
    let (status, _) = send(Method::GET, "/nope", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(Method::GET, "/invoke", "").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn http_invocations_past_the_deadline_time_out() {
    let registry = ToolRegistry::from_modules(&[("slow", slow_tools)]).expect("unique tools");
    let config =
        GatewayServerConfig::default().with_invocation_timeout(Duration::from_millis(10));
    let router = build_router(gateway_with(registry), &config);

    let request = json!({"tool_name": "slow_tool", "arguments": {}}).to_string();
    let (status, body) = send_to(router, Method::POST, "/invoke", &request).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"], json!("invocation timed out"));
}

#[tokio::test]
async fn http_bodies_over_the_limit_are_rejected() {
    let config = GatewayServerConfig::default().with_max_body_bytes(16);
    let request = json!({"tool_name": "analyze_csv", "arguments": {"path": "/data/orders.csv"}});
    let request = request.to_string();
    assert!(request.len() > 16);

    let (status, _) =
        send_to(build_router(gateway(), &config), Method::POST, "/invoke", &request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let (status, _) = send_to(build_router(gateway(), &config), Method::POST, "/mcp", &request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
