//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// MCP Plugin Gateway - expose a remote plugin catalog as MCP tools
#[derive(Parser, Debug)]
#[command(name = "mcp-plugin-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "MCP_PLUGIN_GATEWAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "MCP_PLUGIN_GATEWAY_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "MCP_PLUGIN_GATEWAY_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "MCP_PLUGIN_GATEWAY_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "MCP_PLUGIN_GATEWAY_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the gateway server (default)
    Serve,

    /// Fetch and print the tool list for a credential
    Tools {
        /// Upstream credential
        #[arg(long, env = "MCP_PLUGIN_GATEWAY_TOKEN")]
        token: String,
    },
}
