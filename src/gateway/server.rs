//! Gateway server

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use super::router::{AppState, create_router};
use super::rpc::McpGateway;
use super::session::SessionRegistry;
use crate::catalog::{CatalogFetcher, ToolCache, ToolInvoker};
use crate::config::Config;
use crate::{Error, Result};

/// The plugin gateway server
pub struct Gateway {
    config: Config,
}

impl Gateway {
    /// Create a gateway from configuration
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the gateway until shutdown
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        let cache = ToolCache::new(self.config.cache.ttl);
        let fetcher = Arc::new(CatalogFetcher::new(&self.config.upstream, cache)?);
        let invoker = Arc::new(ToolInvoker::new(
            &self.config.upstream,
            Arc::clone(&fetcher),
        )?);
        let sessions = Arc::new(SessionRegistry::new());
        let gateway = Arc::new(McpGateway::new(fetcher, invoker, sessions));

        let state = Arc::new(AppState {
            gateway,
            config: Arc::new(self.config.clone()),
        });
        let app = create_router(state);

        let listener = TcpListener::bind(addr).await?;

        info!("============================================================");
        info!("MCP PLUGIN GATEWAY v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================================");
        info!(host = %self.config.server.host, port = %self.config.server.port, "Listening");
        info!(upstream = %self.config.upstream.catalog_url(), "Plugin catalog");
        info!(ttl = ?self.config.cache.ttl, "Tool cache TTL");
        info!("Endpoints:");
        info!("  POST /mcp        (JSON-RPC 2.0: initialize, tools/list, tools/call)");
        info!("  POST /messages   (JSON-RPC 2.0 message endpoint)");
        if self.config.streaming.enabled {
            info!(
                "  GET  /sse        (event stream, heartbeat every {:?})",
                self.config.streaming.heartbeat_interval
            );
            info!("  GET  /ws/{{id}}    (WebSocket message endpoint)");
        }
        info!("  GET  /tools, POST /call, GET /health, GET /status");
        info!("Credential transport: token header, Authorization: Bearer, ?token=");
        info!("============================================================");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        info!("Gateway shutdown complete");
        Ok(())
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
