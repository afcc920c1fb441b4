//! SSE streaming front-end
//!
//! A connected client receives one initial `notifications/initialized` event
//! followed by periodic `notifications/ping` heartbeats until it disconnects.
//! Disconnection (or task cancellation) drops the stream, and the embedded
//! guard releases the connection's registry entries.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use axum::response::sse::Event;
use chrono::Utc;
use futures::Stream;
use serde_json::json;
use tracing::info;

use super::rpc::McpGateway;
use super::session::SessionRegistry;
use crate::protocol::JsonRpcNotification;

/// Removes registry state when the stream is dropped
struct ConnectionGuard {
    registry: Arc<SessionRegistry>,
    connection_id: String,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.remove_connection(&self.connection_id);
    }
}

/// Build the event stream for one SSE connection.
///
/// The caller has already validated origin and credential and registered the
/// connection under `connection_id`.
pub fn event_stream(
    registry: Arc<SessionRegistry>,
    session_id: String,
    connection_id: String,
    heartbeat_interval: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream! {
        let _guard = ConnectionGuard {
            registry,
            connection_id: connection_id.clone(),
        };

        let initial = JsonRpcNotification::new(
            "notifications/initialized",
            json!({
                "status": "connected",
                "session_id": session_id,
                "timestamp": Utc::now().to_rfc3339(),
                "serverInfo": McpGateway::server_info(),
            }),
        );
        yield Ok(notification_event(&initial));
        info!(connection_id = %connection_id, "SSE stream established");

        let mut count: u64 = 0;
        loop {
            tokio::time::sleep(heartbeat_interval).await;
            count += 1;
            let heartbeat = JsonRpcNotification::new(
                "notifications/ping",
                json!({
                    "type": "heartbeat",
                    "session_id": session_id,
                    "timestamp": Utc::now().to_rfc3339(),
                    "count": count,
                }),
            );
            yield Ok(notification_event(&heartbeat));
        }
    }
}

fn notification_event(notification: &JsonRpcNotification) -> Event {
    Event::default()
        .event("message")
        .data(serde_json::to_string(notification).unwrap_or_default())
}
