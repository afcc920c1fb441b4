//! MCP Plugin Gateway Library
//!
//! Exposes a remote HTTP plugin catalog as Model Context Protocol tools.
//!
//! # Features
//!
//! - **Dynamic tool synthesis**: plugin catalog operations become MCP tools
//!   with flattened JSON Schema input contracts
//! - **Per-credential caching**: tool lists cached with TTL and single-flight
//!   fetch coalescing
//! - **Multi-Transport**: Streamable HTTP (JSON-RPC 2.0), SSE, WebSocket
//! - **Graceful degradation**: upstream failures yield empty tool lists and
//!   structured call failures, never crashes

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod protocol;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
