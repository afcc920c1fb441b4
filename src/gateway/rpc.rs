//! Shared JSON-RPC dispatch
//!
//! All three front-ends (Streamable HTTP, SSE message endpoint, WebSocket)
//! funnel their JSON-RPC traffic through [`McpGateway`]. Transport layers
//! only translate wire framing; the method semantics live here.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, warn};

use super::session::SessionRegistry;
use crate::catalog::{CatalogFetcher, ToolInvoker};
use crate::error::rpc_codes;
use crate::protocol::{
    Content, Info, InitializeResult, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION, RequestId,
    ServerCapabilities, ToolsCallParams, ToolsCallResult, ToolsListResult,
};

/// Reply produced by one inbound JSON-RPC payload
#[derive(Debug)]
pub enum RpcReply {
    /// One response object
    Single(JsonRpcResponse),
    /// Batch responses, in request order
    Batch(Vec<JsonRpcResponse>),
    /// Notification-only payload: nothing to send back
    Empty,
}

/// The shared MCP method dispatcher
pub struct McpGateway {
    fetcher: Arc<CatalogFetcher>,
    invoker: Arc<ToolInvoker>,
    sessions: Arc<SessionRegistry>,
}

impl McpGateway {
    /// Create a gateway over the shared fetcher and invoker
    pub fn new(
        fetcher: Arc<CatalogFetcher>,
        invoker: Arc<ToolInvoker>,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            fetcher,
            invoker,
            sessions,
        }
    }

    /// Server identity shown in initialize results and notifications
    #[must_use]
    pub fn server_info() -> Info {
        Info {
            name: "mcp-plugin-gateway".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Static payload for `GET /mcp`
    #[must_use]
    pub fn capabilities_payload() -> Value {
        json!({
            "jsonrpc": "2.0",
            "result": {
                "capabilities": ServerCapabilities::default(),
                "instructions": "Send JSON-RPC 2.0 requests via POST",
                "server_info": Self::server_info(),
            }
        })
    }

    /// The catalog fetcher (shared with auxiliary endpoints)
    pub fn fetcher(&self) -> &Arc<CatalogFetcher> {
        &self.fetcher
    }

    /// The tool invoker (shared with auxiliary endpoints)
    pub fn invoker(&self) -> &Arc<ToolInvoker> {
        &self.invoker
    }

    /// The session registry
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Handle a raw request body: single object or batch array.
    ///
    /// Batch items are processed independently and their responses returned
    /// in request order; a malformed item never aborts its siblings.
    pub async fn handle_body(
        &self,
        body: &[u8],
        credential: Option<&str>,
        session_id: &str,
    ) -> RpcReply {
        if body.is_empty() {
            return RpcReply::Single(JsonRpcResponse::error(
                None,
                rpc_codes::PARSE_ERROR,
                "Parse error: empty request body",
            ));
        }

        let parsed: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(e) => {
                return RpcReply::Single(JsonRpcResponse::error(
                    None,
                    rpc_codes::PARSE_ERROR,
                    format!("Parse error: {e}"),
                ));
            }
        };

        match parsed {
            Value::Array(items) => {
                if items.is_empty() {
                    return RpcReply::Single(JsonRpcResponse::error(
                        None,
                        rpc_codes::INVALID_REQUEST,
                        "Invalid Request: empty batch",
                    ));
                }
                let mut responses = Vec::with_capacity(items.len());
                for item in &items {
                    if let Some(response) =
                        self.handle_value(item, credential, session_id).await
                    {
                        responses.push(response);
                    }
                }
                if responses.is_empty() {
                    RpcReply::Empty
                } else {
                    RpcReply::Batch(responses)
                }
            }
            other => match self.handle_value(&other, credential, session_id).await {
                Some(response) => RpcReply::Single(response),
                None => RpcReply::Empty,
            },
        }
    }

    /// Handle one JSON value as a request; `None` means no response is due
    pub async fn handle_value(
        &self,
        raw: &Value,
        credential: Option<&str>,
        session_id: &str,
    ) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_value(raw.clone()) {
            Ok(request) => request,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    raw_id(raw),
                    rpc_codes::INVALID_REQUEST,
                    format!("Invalid Request: {e}"),
                ));
            }
        };
        self.handle_request(&request, credential, session_id).await
    }

    /// Handle one parsed request
    pub async fn handle_request(
        &self,
        request: &JsonRpcRequest,
        credential: Option<&str>,
        session_id: &str,
    ) -> Option<JsonRpcResponse> {
        self.sessions.touch(session_id, credential);

        let method = request.method.as_str();
        debug!(method = %method, session_id = %session_id, "Handling MCP request");

        if method.starts_with("notifications/") {
            debug!(notification = %method, "Acknowledged notification");
            return None;
        }

        // A request without an id is a notification form: no response is due
        let id = match &request.id {
            Some(id) => id.clone(),
            None => {
                debug!(method = %method, "Ignoring id-less request");
                return None;
            }
        };

        let params = request.params.clone().unwrap_or(Value::Null);

        let response = match method {
            "initialize" => self.handle_initialize(id, session_id),
            "tools/list" => self.handle_tools_list(id, credential).await,
            "tools/call" => self.handle_tools_call(id, &params, credential).await,
            _ => JsonRpcResponse::error(
                Some(id),
                rpc_codes::METHOD_NOT_FOUND,
                format!("Method not found: {method}"),
            ),
        };

        Some(response)
    }

    fn handle_initialize(&self, id: RequestId, session_id: &str) -> JsonRpcResponse {
        self.sessions.mark_initialized(session_id);

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities::default(),
            server_info: Self::server_info(),
            instructions: None,
        };

        JsonRpcResponse::success(id, to_value_or_empty(&result))
    }

    async fn handle_tools_list(
        &self,
        id: RequestId,
        credential: Option<&str>,
    ) -> JsonRpcResponse {
        let credential = match super::auth::require_credential(credential) {
            Ok(credential) => credential,
            Err(message) => {
                return JsonRpcResponse::error(Some(id), rpc_codes::AUTH_ERROR, message);
            }
        };

        let descriptors = self.fetcher.fetch_tools(credential).await;
        let result = ToolsListResult {
            tools: descriptors.iter().map(|d| d.to_tool()).collect(),
        };

        JsonRpcResponse::success(id, to_value_or_empty(&result))
    }

    async fn handle_tools_call(
        &self,
        id: RequestId,
        params: &Value,
        credential: Option<&str>,
    ) -> JsonRpcResponse {
        let credential = match super::auth::require_credential(credential) {
            Ok(credential) => credential,
            Err(message) => {
                return JsonRpcResponse::error(Some(id), rpc_codes::AUTH_ERROR, message);
            }
        };

        let params: ToolsCallParams = match serde_json::from_value(params.clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                return JsonRpcResponse::error(
                    Some(id),
                    rpc_codes::INVALID_PARAMS,
                    format!("Invalid params: {e}"),
                );
            }
        };

        let outcome = self
            .invoker
            .call_tool(credential, &params.name, &params.arguments)
            .await;

        if outcome.success {
            let result = ToolsCallResult {
                content: vec![Content::text(outcome.content)],
                is_error: false,
            };
            JsonRpcResponse::success(id, to_value_or_empty(&result))
        } else {
            let reason = outcome.error.unwrap_or_else(|| "unknown error".to_string());
            warn!(tool = %params.name, error = %reason, "Tool execution failed");
            JsonRpcResponse::error(
                Some(id),
                rpc_codes::INTERNAL_ERROR,
                format!("Tool execution failed: {reason}"),
            )
        }
    }
}

/// Best-effort id extraction from a malformed request object
fn raw_id(raw: &Value) -> Option<RequestId> {
    match raw.get("id") {
        Some(Value::String(s)) => Some(RequestId::String(s.clone())),
        Some(Value::Number(n)) => n.as_i64().map(RequestId::Number),
        _ => None,
    }
}

fn to_value_or_empty<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|_| json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ToolCache;
    use crate::config::UpstreamConfig;
    use std::time::Duration;

    fn gateway() -> McpGateway {
        // upstream points at a closed port: any accidental network call
        // fails fast instead of hanging
        let upstream = UpstreamConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            catalog_path: "/list".to_string(),
            fetch_timeout: Duration::from_millis(200),
            call_timeout: Duration::from_millis(200),
        };
        let fetcher = Arc::new(
            CatalogFetcher::new(&upstream, ToolCache::new(Duration::from_secs(60))).unwrap(),
        );
        let invoker = Arc::new(ToolInvoker::new(&upstream, Arc::clone(&fetcher)).unwrap());
        McpGateway::new(fetcher, invoker, Arc::new(SessionRegistry::new()))
    }

    #[tokio::test]
    async fn initialize_returns_protocol_version() {
        let gateway = gateway();
        let reply = gateway
            .handle_body(
                br#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
                None,
                "s1",
            )
            .await;

        let RpcReply::Single(response) = reply else {
            panic!("expected single response");
        };
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "mcp-plugin-gateway");
    }

    #[tokio::test]
    async fn tools_list_without_credential_is_auth_error() {
        let gateway = gateway();
        let reply = gateway
            .handle_body(
                br#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
                None,
                "s1",
            )
            .await;

        let RpcReply::Single(response) = reply else {
            panic!("expected single response");
        };
        assert_eq!(response.error.unwrap().code, rpc_codes::AUTH_ERROR);
    }

    #[tokio::test]
    async fn tools_call_requires_name_param() {
        let gateway = gateway();
        let reply = gateway
            .handle_body(
                br#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{}}"#,
                Some("valid-credential"),
                "s1",
            )
            .await;

        let RpcReply::Single(response) = reply else {
            panic!("expected single response");
        };
        assert_eq!(response.error.unwrap().code, rpc_codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn unknown_method_is_not_found() {
        let gateway = gateway();
        let reply = gateway
            .handle_body(
                br#"{"jsonrpc":"2.0","id":4,"method":"resources/list"}"#,
                None,
                "s1",
            )
            .await;

        let RpcReply::Single(response) = reply else {
            panic!("expected single response");
        };
        assert_eq!(response.error.unwrap().code, rpc_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_json_is_parse_error() {
        let gateway = gateway();
        let reply = gateway.handle_body(b"{not json", None, "s1").await;
        let RpcReply::Single(response) = reply else {
            panic!("expected single response");
        };
        assert_eq!(response.error.unwrap().code, rpc_codes::PARSE_ERROR);
    }

    #[tokio::test]
    async fn empty_body_is_parse_error() {
        let gateway = gateway();
        let reply = gateway.handle_body(b"", None, "s1").await;
        let RpcReply::Single(response) = reply else {
            panic!("expected single response");
        };
        assert_eq!(response.error.unwrap().code, rpc_codes::PARSE_ERROR);
    }

    #[tokio::test]
    async fn notification_produces_no_response() {
        let gateway = gateway();
        let reply = gateway
            .handle_body(
                br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
                None,
                "s1",
            )
            .await;
        assert!(matches!(reply, RpcReply::Empty));
    }

    #[tokio::test]
    async fn batch_preserves_order_and_skips_notifications() {
        let gateway = gateway();
        let body = br#"[
            {"jsonrpc":"2.0","id":1,"method":"initialize","params":{}},
            {"jsonrpc":"2.0","method":"notifications/initialized"},
            {"jsonrpc":"2.0","id":2,"method":"no/such/method"}
        ]"#;
        let reply = gateway.handle_body(body, None, "s1").await;

        let RpcReply::Batch(responses) = reply else {
            panic!("expected batch");
        };
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].id, Some(RequestId::Number(1)));
        assert_eq!(responses[1].id, Some(RequestId::Number(2)));
        assert_eq!(
            responses[1].error.as_ref().unwrap().code,
            rpc_codes::METHOD_NOT_FOUND
        );
    }

    #[tokio::test]
    async fn malformed_batch_item_does_not_abort_siblings() {
        let gateway = gateway();
        let body = br#"[
            {"jsonrpc":"2.0","id":1},
            {"jsonrpc":"2.0","id":2,"method":"initialize"}
        ]"#;
        let reply = gateway.handle_body(body, None, "s1").await;

        let RpcReply::Batch(responses) = reply else {
            panic!("expected batch");
        };
        assert_eq!(responses.len(), 2);
        assert_eq!(
            responses[0].error.as_ref().unwrap().code,
            rpc_codes::INVALID_REQUEST
        );
        assert_eq!(responses[0].id, Some(RequestId::Number(1)));
        assert!(responses[1].result.is_some());
    }

    #[tokio::test]
    async fn empty_batch_is_invalid_request() {
        let gateway = gateway();
        let reply = gateway.handle_body(b"[]", None, "s1").await;
        let RpcReply::Single(response) = reply else {
            panic!("expected single response");
        };
        assert_eq!(response.error.unwrap().code, rpc_codes::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn unknown_tool_call_fails_without_upstream() {
        let gateway = gateway();
        let reply = gateway
            .handle_body(
                br#"{"jsonrpc":"2.0","id":9,"method":"tools/call","params":{"name":"does_not_exist","arguments":{}}}"#,
                Some("valid-credential"),
                "s1",
            )
            .await;

        let RpcReply::Single(response) = reply else {
            panic!("expected single response");
        };
        let error = response.error.unwrap();
        assert_eq!(error.code, rpc_codes::INTERNAL_ERROR);
        assert!(error.message.contains("does_not_exist"));
    }
}
