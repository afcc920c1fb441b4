//! Session and streaming-connection registry
//!
//! Presentation-layer bookkeeping: correlates `Mcp-Session-Id` values with
//! credentials and tracks live streaming connections. Not required for the
//! correctness of tool listing or calling.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{Value, json};
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::credential_preview;

/// One MCP session
#[derive(Debug, Clone)]
pub struct Session {
    /// Credential bound to the session (never logged in full)
    pub credential: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last request time
    pub last_access: DateTime<Utc>,
    /// Whether the client completed `initialize`
    pub initialized: bool,
}

/// One live streaming connection (SSE or WebSocket)
#[derive(Debug, Clone)]
pub struct Connection {
    /// Owning session, when the transport carries one
    pub session_id: Option<String>,
    /// Transport kind ("sse", "websocket")
    pub client_type: &'static str,
    /// Connect time
    pub connected_at: DateTime<Utc>,
}

/// Registry of sessions and live connections
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
    connections: DashMap<String, Connection>,
}

impl SessionRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh session id
    #[must_use]
    pub fn mint_session_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Create the session if absent and stamp its last access time
    pub fn touch(&self, session_id: &str, credential: Option<&str>) {
        let now = Utc::now();
        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                debug!(session_id = %session_id, "Created session");
                Session {
                    credential: None,
                    created_at: now,
                    last_access: now,
                    initialized: false,
                }
            });
        entry.last_access = now;
        if let Some(credential) = credential {
            entry.credential = Some(credential.to_string());
        }
    }

    /// Mark a session as initialized
    pub fn mark_initialized(&self, session_id: &str) {
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            session.initialized = true;
        }
    }

    /// Remove a session
    pub fn remove_session(&self, session_id: &str) {
        if self.sessions.remove(session_id).is_some() {
            debug!(session_id = %session_id, "Removed session");
        }
    }

    /// Register a streaming connection
    pub fn register_connection(
        &self,
        connection_id: &str,
        client_type: &'static str,
        session_id: Option<&str>,
    ) {
        self.connections.insert(
            connection_id.to_string(),
            Connection {
                session_id: session_id.map(String::from),
                client_type,
                connected_at: Utc::now(),
            },
        );
        info!(connection_id = %connection_id, client_type = %client_type, "Connection opened");
    }

    /// Remove a streaming connection and its session entry
    pub fn remove_connection(&self, connection_id: &str) {
        if let Some((_, connection)) = self.connections.remove(connection_id) {
            if let Some(session_id) = &connection.session_id {
                self.remove_session(session_id);
            }
            info!(connection_id = %connection_id, "Connection closed");
        }
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of live streaming connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Operator-facing snapshot for the status endpoint.
    /// Credentials appear as previews only.
    pub fn snapshot(&self) -> Value {
        let sessions: Vec<Value> = self
            .sessions
            .iter()
            .map(|entry| {
                let session = entry.value();
                json!({
                    "session_id": entry.key(),
                    "credential": session.credential.as_deref().map(credential_preview),
                    "created_at": session.created_at.to_rfc3339(),
                    "last_access": session.last_access.to_rfc3339(),
                    "initialized": session.initialized,
                })
            })
            .collect();

        let connections: Vec<Value> = self
            .connections
            .iter()
            .map(|entry| {
                let connection = entry.value();
                json!({
                    "connection_id": entry.key(),
                    "session_id": connection.session_id,
                    "client_type": connection.client_type,
                    "connected_at": connection.connected_at.to_rfc3339(),
                })
            })
            .collect();

        json!({"sessions": sessions, "connections": connections})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_creates_then_updates() {
        let registry = SessionRegistry::new();
        registry.touch("s1", None);
        assert_eq!(registry.session_count(), 1);

        registry.touch("s1", Some("credential-value"));
        assert_eq!(registry.session_count(), 1);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot["sessions"][0]["credential"], "credential...");
    }

    #[test]
    fn initialized_flag() {
        let registry = SessionRegistry::new();
        registry.touch("s1", None);
        registry.mark_initialized("s1");
        assert_eq!(registry.snapshot()["sessions"][0]["initialized"], true);
    }

    #[test]
    fn removing_connection_removes_linked_session() {
        let registry = SessionRegistry::new();
        registry.touch("s1", None);
        registry.register_connection("c1", "sse", Some("s1"));
        assert_eq!(registry.connection_count(), 1);

        registry.remove_connection("c1");
        assert_eq!(registry.connection_count(), 0);
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn connection_without_session() {
        let registry = SessionRegistry::new();
        registry.register_connection("c1", "websocket", None);
        registry.remove_connection("c1");
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn minted_ids_are_unique() {
        assert_ne!(
            SessionRegistry::mint_session_id(),
            SessionRegistry::mint_session_id()
        );
    }
}
