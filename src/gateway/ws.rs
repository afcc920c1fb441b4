//! WebSocket front-end
//!
//! A thin bidirectional message endpoint for interactive clients: every text
//! frame is one JSON-RPC request (or batch) dispatched through the shared
//! [`McpGateway`], with the credential taken from the upgrade request.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use super::rpc::{McpGateway, RpcReply};
use super::session::SessionRegistry;
use crate::protocol::JsonRpcNotification;

/// Drive one accepted WebSocket connection until the client disconnects
pub async fn serve_connection(
    mut socket: WebSocket,
    gateway: Arc<McpGateway>,
    client_id: String,
    credential: String,
) {
    let registry = Arc::clone(gateway.sessions());
    let session_id = SessionRegistry::mint_session_id();
    let connection_id = format!("ws-{client_id}");

    registry.touch(&session_id, Some(&credential));
    registry.register_connection(&connection_id, "websocket", Some(&session_id));

    let welcome = JsonRpcNotification::new(
        "notifications/initialized",
        json!({
            "status": "connected",
            "session_id": session_id,
            "timestamp": Utc::now().to_rfc3339(),
            "serverInfo": McpGateway::server_info(),
        }),
    );
    if let Ok(text) = serde_json::to_string(&welcome) {
        if socket.send(Message::Text(text.into())).await.is_err() {
            registry.remove_connection(&connection_id);
            return;
        }
    }

    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                debug!(connection_id = %connection_id, error = %e, "WebSocket receive error");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                let reply = gateway
                    .handle_body(text.as_bytes(), Some(&credential), &session_id)
                    .await;

                let outgoing = match reply {
                    RpcReply::Single(response) => serde_json::to_string(&response).ok(),
                    RpcReply::Batch(responses) => serde_json::to_string(&responses).ok(),
                    RpcReply::Empty => None,
                };

                if let Some(text) = outgoing {
                    if let Err(e) = socket.send(Message::Text(text.into())).await {
                        warn!(connection_id = %connection_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
            }
            Message::Close(_) => {
                debug!(connection_id = %connection_id, "WebSocket close frame received");
                break;
            }
            // pings are answered by the protocol layer; binary frames ignored
            _ => {}
        }
    }

    registry.remove_connection(&connection_id);
    info!(connection_id = %connection_id, "WebSocket client disconnected");
}
