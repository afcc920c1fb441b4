//! HTTP-level tests for the gateway router
//!
//! These spin up the real router (all front-ends, CORS and session plumbing
//! included) on an ephemeral port, backed by an in-process stub upstream, and
//! drive it with plain HTTP, SSE, and WebSocket clients.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use futures::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use mcp_plugin_gateway::catalog::{CatalogFetcher, ToolCache, ToolInvoker};
use mcp_plugin_gateway::config::Config;
use mcp_plugin_gateway::gateway::{AppState, McpGateway, SessionRegistry, create_router};

const CREDENTIAL: &str = "http-test-credential";

struct StubState {
    catalog_calls: AtomicUsize,
}

fn catalog_json() -> Value {
    json!({
        "plugins": [{
            "plugin": {
                "name_for_model": "weather",
                "description_for_model": "Weather data access",
                "interface": {
                    "paths": {
                        "/forecast": {
                            "get": {
                                "operationId": "get_forecast",
                                "summary": "Get the forecast for a city",
                                "parameters": [{
                                    "name": "city",
                                    "in": "query",
                                    "required": true,
                                    "schema": {"type": "string"}
                                }]
                            }
                        },
                        "/alerts": {
                            "post": {
                                "operationId": "create_alert",
                                "summary": "Create a weather alert",
                                "requestBody": {
                                    "content": {
                                        "application/json": {
                                            "schema": {
                                                "properties": {
                                                    "city": {"type": "string"},
                                                    "level": {"type": "integer"}
                                                },
                                                "required": ["city"]
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }]
    })
}

async fn catalog_handler(State(state): State<Arc<StubState>>) -> Json<Value> {
    state.catalog_calls.fetch_add(1, Ordering::SeqCst);
    Json(catalog_json())
}

async fn api_handler() -> &'static str {
    "sunny with light winds"
}

/// Serve the stub upstream and the gateway, returning the gateway's base URL
async fn spawn_gateway() -> (String, Arc<StubState>) {
    let stub = Arc::new(StubState {
        catalog_calls: AtomicUsize::new(0),
    });

    let upstream_app = Router::new()
        .route("/plugins/list", post(catalog_handler))
        .route("/forecast", get(api_handler))
        .route("/alerts", post(api_handler))
        .with_state(Arc::clone(&stub));
    let upstream_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = upstream_listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(upstream_listener, upstream_app).await.unwrap();
    });

    let mut config = Config::default();
    config.upstream.base_url = format!("http://{upstream_addr}");
    config.upstream.catalog_path = "/plugins/list".to_string();
    config.upstream.fetch_timeout = Duration::from_secs(5);
    config.upstream.call_timeout = Duration::from_secs(5);
    config.streaming.heartbeat_interval = Duration::from_millis(100);

    let fetcher = Arc::new(
        CatalogFetcher::new(&config.upstream, ToolCache::new(config.cache.ttl)).unwrap(),
    );
    let invoker = Arc::new(ToolInvoker::new(&config.upstream, Arc::clone(&fetcher)).unwrap());
    let gateway = Arc::new(McpGateway::new(
        fetcher,
        invoker,
        Arc::new(SessionRegistry::new()),
    ));

    let state = Arc::new(AppState {
        gateway,
        config: Arc::new(config),
    });
    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), stub)
}

fn rpc_body(id: u64, method: &str, params: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params})
}

#[tokio::test]
async fn initialize_mints_and_echoes_session_header() {
    let (base, _stub) = spawn_gateway().await;
    let client = Client::new();

    let response = client
        .post(format!("{base}/mcp"))
        .json(&rpc_body(1, "initialize", json!({})))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let minted = response
        .headers()
        .get("mcp-session-id")
        .expect("session header minted")
        .to_str()
        .unwrap()
        .to_string();
    assert!(!minted.is_empty());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"]["protocolVersion"], "2024-11-05");

    // a supplied session id is echoed back unchanged
    let response = client
        .post(format!("{base}/mcp"))
        .header("mcp-session-id", "my-session")
        .json(&rpc_body(2, "initialize", json!({})))
        .send()
        .await
        .unwrap();
    assert_eq!(
        response.headers().get("mcp-session-id").unwrap(),
        "my-session"
    );
}

#[tokio::test]
async fn tools_list_accepts_bearer_and_query_credentials() {
    let (base, stub) = spawn_gateway().await;
    let client = Client::new();

    let response = client
        .post(format!("{base}/mcp"))
        .header("authorization", format!("Bearer {CREDENTIAL}"))
        .json(&rpc_body(1, "tools/list", json!({})))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"]["tools"].as_array().unwrap().len(), 2);

    let response = client
        .post(format!("{base}/mcp?token={CREDENTIAL}"))
        .json(&rpc_body(2, "tools/list", json!({})))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"]["tools"].as_array().unwrap().len(), 2);

    // both listings were served from one catalog fetch
    assert_eq!(stub.catalog_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn tools_list_without_credential_is_rpc_auth_error() {
    let (base, _stub) = spawn_gateway().await;

    let body: Value = Client::new()
        .post(format!("{base}/mcp"))
        .json(&rpc_body(1, "tools/list", json!({})))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["error"]["code"], -32002);
}

#[tokio::test]
async fn notification_is_accepted_with_no_result() {
    let (base, _stub) = spawn_gateway().await;

    let response = Client::new()
        .post(format!("{base}/mcp"))
        .json(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 202);
}

#[tokio::test]
async fn malformed_json_is_http_400_parse_error() {
    let (base, _stub) = spawn_gateway().await;

    let response = Client::new()
        .post(format!("{base}/mcp"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32700);
}

#[tokio::test]
async fn batch_over_http_returns_ordered_array() {
    let (base, _stub) = spawn_gateway().await;

    let batch = json!([
        rpc_body(1, "initialize", json!({})),
        {"jsonrpc": "2.0", "method": "notifications/initialized"},
        rpc_body(2, "no/such/method", json!({})),
    ]);

    let body: Value = Client::new()
        .post(format!("{base}/messages"))
        .json(&batch)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let responses = body.as_array().unwrap();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[1]["id"], 2);
    assert_eq!(responses[1]["error"]["code"], -32601);
}

#[tokio::test]
async fn tools_call_round_trips_through_upstream() {
    let (base, _stub) = spawn_gateway().await;
    let client = Client::new();

    // warm the catalog first, as an MCP client would via tools/list
    let _ = client
        .post(format!("{base}/mcp"))
        .header("token", CREDENTIAL)
        .json(&rpc_body(1, "tools/list", json!({})))
        .send()
        .await
        .unwrap();

    let body: Value = client
        .post(format!("{base}/mcp"))
        .header("token", CREDENTIAL)
        .json(&rpc_body(
            2,
            "tools/call",
            json!({"name": "get_forecast", "arguments": {"city": "Taipei"}}),
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["result"]["content"][0]["type"], "text");
    assert_eq!(body["result"]["content"][0]["text"], "sunny with light winds");
}

#[tokio::test]
async fn get_mcp_returns_capabilities_payload() {
    let (base, _stub) = spawn_gateway().await;

    let body: Value = Client::new()
        .get(format!("{base}/mcp"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["result"]["server_info"]["name"], "mcp-plugin-gateway");
    assert!(body["result"]["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn health_and_root_report_cache_statistics() {
    let (base, _stub) = spawn_gateway().await;
    let client = Client::new();

    let health: Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["cache"]["cached_credentials"], 0);

    let root: Value = client
        .get(format!("{base}/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(root["message"], "MCP Plugin Gateway");
    assert!(root["endpoints"]["mcp"].is_string());
}

#[tokio::test]
async fn tools_endpoint_requires_credential() {
    let (base, _stub) = spawn_gateway().await;
    let client = Client::new();

    let response = client.get(format!("{base}/tools")).send().await.unwrap();
    assert_eq!(response.status(), 401);

    let listing: Value = client
        .get(format!("{base}/tools"))
        .header("token", CREDENTIAL)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let tools = listing.as_array().unwrap();
    assert_eq!(tools.len(), 2);
    assert!(tools.iter().any(|t| t["name"] == "get_forecast"));
    assert!(tools.iter().all(|t| t["method"].is_string()));
}

#[tokio::test]
async fn rest_call_endpoint_invokes_tool() {
    let (base, _stub) = spawn_gateway().await;

    let body: Value = Client::new()
        .post(format!("{base}/call"))
        .header("token", CREDENTIAL)
        .json(&json!({"name": "create_alert", "arguments": {"city": "Taipei", "level": 3}}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["success"], true);
    assert_eq!(body["content"], "sunny with light winds");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn sse_requires_credential() {
    let (base, _stub) = spawn_gateway().await;

    let response = Client::new().get(format!("{base}/sse")).send().await.unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn sse_stream_opens_with_initial_notification() {
    let (base, _stub) = spawn_gateway().await;

    let mut response = Client::new()
        .get(format!("{base}/sse"))
        .header("token", CREDENTIAL)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(
        response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );
    let session_id = response.headers().get("mcp-session-id");
    assert!(session_id.is_some());

    let first = response.chunk().await.unwrap().expect("initial event");
    let text = String::from_utf8_lossy(&first);
    assert!(text.contains("notifications/initialized"));
    assert!(text.contains("connected"));
}

#[tokio::test]
async fn websocket_round_trips_json_rpc() {
    let (base, _stub) = spawn_gateway().await;
    let ws_url = format!(
        "{}/ws/test-client?token={CREDENTIAL}",
        base.replace("http://", "ws://")
    );

    let (mut socket, _) = connect_async(&ws_url).await.unwrap();

    let welcome = socket.next().await.unwrap().unwrap();
    let welcome = welcome.into_text().unwrap();
    assert!(welcome.contains("notifications/initialized"));

    socket
        .send(WsMessage::Text(
            rpc_body(1, "initialize", json!({})).to_string().into(),
        ))
        .await
        .unwrap();
    let reply = socket.next().await.unwrap().unwrap().into_text().unwrap();
    let reply: Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(reply["result"]["protocolVersion"], "2024-11-05");

    socket
        .send(WsMessage::Text(
            rpc_body(2, "tools/list", json!({})).to_string().into(),
        ))
        .await
        .unwrap();
    let reply = socket.next().await.unwrap().unwrap().into_text().unwrap();
    let reply: Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(reply["result"]["tools"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn websocket_rejects_missing_credential() {
    let (base, _stub) = spawn_gateway().await;
    let ws_url = format!("{}/ws/test-client", base.replace("http://", "ws://"));

    assert!(connect_async(&ws_url).await.is_err());
}
