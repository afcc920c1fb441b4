//! HTTP router and handlers

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, RawQuery, State, ws::WebSocketUpgrade},
    http::{HeaderMap, HeaderValue, StatusCode, header::HeaderName},
    response::{IntoResponse, Response, sse::Sse},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

use super::auth::{extract_credential, extract_session_id, require_credential, validate_origin};
use super::rpc::{McpGateway, RpcReply};
use super::session::SessionRegistry;
use super::{sse, ws};
use crate::config::Config;
use crate::error::rpc_codes;
use crate::protocol::JsonRpcResponse;

/// Shared application state
pub struct AppState {
    /// The shared MCP dispatcher
    pub gateway: Arc<McpGateway>,
    /// Gateway configuration
    pub config: Arc<Config>,
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static("mcp-session-id")]);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/mcp", post(rpc_post_handler).get(mcp_get_handler))
        .route("/messages", post(rpc_post_handler))
        .route("/messages/", post(rpc_post_handler))
        .route("/sse", get(sse_handler))
        .route("/ws/{client_id}", get(ws_handler))
        .route("/tools", get(tools_handler))
        .route("/call", post(call_handler))
        .layer(CatchPanicLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /mcp and POST /messages - JSON-RPC requests (single or batch)
async fn rpc_post_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    if !validate_origin(&headers, &state.config.security) {
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::to_value(JsonRpcResponse::error(
                None,
                rpc_codes::SERVER_ERROR_START,
                "Origin not allowed",
            ))
            .unwrap_or_default()),
        )
            .into_response();
    }

    let session_id = extract_session_id(&headers)
        .unwrap_or_else(SessionRegistry::mint_session_id);
    let credential = extract_credential(&headers, query.as_deref());

    let reply = state
        .gateway
        .handle_body(&body, credential.as_deref(), &session_id)
        .await;

    let mut response = match reply {
        RpcReply::Single(rpc_response) => {
            let status = http_status_for(&rpc_response);
            (
                status,
                Json(serde_json::to_value(&rpc_response).unwrap_or_default()),
            )
                .into_response()
        }
        RpcReply::Batch(responses) => (
            StatusCode::OK,
            Json(serde_json::to_value(&responses).unwrap_or_default()),
        )
            .into_response(),
        RpcReply::Empty => (StatusCode::ACCEPTED, Json(json!({}))).into_response(),
    };

    set_session_header(&mut response, &session_id);
    response
}

/// GET /mcp - static capabilities payload
async fn mcp_get_handler(State(_state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let session_id = extract_session_id(&headers)
        .unwrap_or_else(SessionRegistry::mint_session_id);
    let mut response = Json(McpGateway::capabilities_payload()).into_response();
    set_session_header(&mut response, &session_id);
    response
}

/// GET /sse - SSE stream with heartbeats
async fn sse_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    if !state.config.streaming.enabled {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(json!({"detail": "Streaming is disabled"})),
        )
            .into_response();
    }

    if !validate_origin(&headers, &state.config.security) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"detail": "Origin not allowed"})),
        )
            .into_response();
    }

    let credential = extract_credential(&headers, query.as_deref());
    let credential = match require_credential(credential.as_deref()) {
        Ok(credential) => credential.to_string(),
        Err(message) => {
            return (StatusCode::UNAUTHORIZED, Json(json!({"detail": message})))
                .into_response();
        }
    };

    let registry = Arc::clone(state.gateway.sessions());
    let session_id = extract_session_id(&headers)
        .unwrap_or_else(SessionRegistry::mint_session_id);
    let connection_id = format!("sse-{}", Uuid::new_v4());

    registry.touch(&session_id, Some(&credential));
    registry.register_connection(&connection_id, "sse", Some(&session_id));
    info!(connection_id = %connection_id, session_id = %session_id, "SSE client connected");

    let stream = sse::event_stream(
        registry,
        session_id.clone(),
        connection_id,
        state.config.streaming.heartbeat_interval,
    );

    let mut response = Sse::new(stream).into_response();
    set_session_header(&mut response, &session_id);
    response.headers_mut().insert(
        "x-accel-buffering",
        HeaderValue::from_static("no"),
    );
    response
}

/// GET /ws/{client_id} - WebSocket message endpoint
async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    upgrade: WebSocketUpgrade,
) -> Response {
    if !state.config.streaming.enabled {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(json!({"detail": "Streaming is disabled"})),
        )
            .into_response();
    }

    if !validate_origin(&headers, &state.config.security) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"detail": "Origin not allowed"})),
        )
            .into_response();
    }

    let credential = extract_credential(&headers, query.as_deref());
    let credential = match require_credential(credential.as_deref()) {
        Ok(credential) => credential.to_string(),
        Err(message) => {
            return (StatusCode::UNAUTHORIZED, Json(json!({"detail": message})))
                .into_response();
        }
    };

    let gateway = Arc::clone(&state.gateway);
    upgrade
        .on_upgrade(move |socket| ws::serve_connection(socket, gateway, client_id, credential))
}

/// GET / - server info
async fn root_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let cache = state.gateway.fetcher().cache();
    Json(json!({
        "message": "MCP Plugin Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "protocol": "MCP Streamable HTTP",
        "endpoints": {
            "mcp": "POST /mcp (JSON-RPC 2.0), GET /mcp (capabilities)",
            "messages": "POST /messages (JSON-RPC 2.0)",
            "sse": "GET /sse (event stream)",
            "websocket": "GET /ws/{client_id}",
            "tools": "GET /tools (requires credential)",
            "call": "POST /call (requires credential)",
            "health": "GET /health",
            "status": "GET /status",
        },
        "statistics": {
            "cached_credentials": cache.len(),
            "cached_tools": cache.tool_count(),
            "connections": state.gateway.sessions().connection_count(),
        },
    }))
}

/// GET /health - health check
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let cache = state.gateway.fetcher().cache();
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "server": "mcp-plugin-gateway",
        "connections": state.gateway.sessions().connection_count(),
        "sessions": state.gateway.sessions().session_count(),
        "cache": {
            "cached_credentials": cache.len(),
            "cached_tools": cache.tool_count(),
        },
    }))
}

/// GET /status - session and connection detail
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mut snapshot = state.gateway.sessions().snapshot();
    snapshot["cache"] = json!({
        "cached_credentials": state.gateway.fetcher().cache().len(),
        "cached_tools": state.gateway.fetcher().cache().tool_count(),
    });
    Json(snapshot)
}

/// GET /tools - human-readable tool listing
async fn tools_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let credential = extract_credential(&headers, query.as_deref());
    let credential = match require_credential(credential.as_deref()) {
        Ok(credential) => credential.to_string(),
        Err(message) => {
            return (StatusCode::UNAUTHORIZED, Json(json!({"detail": message})))
                .into_response();
        }
    };

    let tools = state.gateway.fetcher().fetch_tools(&credential).await;
    let listing: Vec<Value> = tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "schema": tool.input_schema,
                "method": tool.meta.method,
                "path": tool.meta.path,
            })
        })
        .collect();

    Json(listing).into_response()
}

/// REST-style tool call body
#[derive(Debug, Deserialize)]
struct RestCallRequest {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// POST /call - REST-style tool invocation
async fn call_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    Json(request): Json<RestCallRequest>,
) -> Response {
    let credential = extract_credential(&headers, query.as_deref());
    let credential = match require_credential(credential.as_deref()) {
        Ok(credential) => credential.to_string(),
        Err(message) => {
            return (StatusCode::UNAUTHORIZED, Json(json!({"detail": message})))
                .into_response();
        }
    };

    // warm the cache so a cold gateway can still serve direct REST calls
    let _ = state.gateway.fetcher().fetch_tools(&credential).await;

    let outcome = state
        .gateway
        .invoker()
        .call_tool(&credential, &request.name, &request.arguments)
        .await;

    Json(json!({
        "success": outcome.success,
        "content": outcome.content,
        "error": outcome.error,
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response()
}

/// Map a JSON-RPC level error to the transport status code
fn http_status_for(response: &JsonRpcResponse) -> StatusCode {
    match response.error.as_ref().map(|e| e.code) {
        Some(rpc_codes::PARSE_ERROR | rpc_codes::INVALID_REQUEST) => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    }
}

fn set_session_header(response: &mut Response, session_id: &str) {
    if let Ok(value) = HeaderValue::from_str(session_id) {
        response.headers_mut().insert("mcp-session-id", value);
    }
}
