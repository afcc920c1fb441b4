//! MCP Plugin Gateway - expose a remote HTTP plugin catalog as MCP tools

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use mcp_plugin_gateway::{
    catalog::{CatalogFetcher, ToolCache},
    cli::{Cli, Command},
    config::Config,
    gateway::Gateway,
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    match cli.command {
        Some(Command::Tools { ref token }) => {
            let token = token.clone();
            run_tools(&cli, &token).await
        }
        Some(Command::Serve) | None => run_server(cli).await,
    }
}

/// Load config with CLI overrides applied
fn load_config(cli: &Cli) -> Option<Config> {
    match Config::load(cli.config.as_deref()) {
        Ok(mut config) => {
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            if let Some(ref host) = cli.host {
                config.server.host.clone_from(host);
            }
            Some(config)
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            None
        }
    }
}

/// Fetch and print the tool list for a credential
async fn run_tools(cli: &Cli, token: &str) -> ExitCode {
    let Some(config) = load_config(cli) else {
        return ExitCode::FAILURE;
    };

    let cache = ToolCache::new(config.cache.ttl);
    let fetcher = match CatalogFetcher::new(&config.upstream, cache) {
        Ok(fetcher) => Arc::new(fetcher),
        Err(e) => {
            error!("Failed to create catalog fetcher: {e}");
            return ExitCode::FAILURE;
        }
    };

    let tools = fetcher.fetch_tools(token).await;
    if tools.is_empty() {
        println!("No tools available (invalid credential or upstream unavailable).");
        return ExitCode::SUCCESS;
    }

    println!("Found {} tool(s):\n", tools.len());
    for tool in &tools {
        println!("  {} - {}", tool.name, tool.description);
        println!("    {} {}{}", tool.meta.method, tool.meta.base_url, tool.meta.path);
    }

    ExitCode::SUCCESS
}

/// Run the gateway server
async fn run_server(cli: Cli) -> ExitCode {
    let Some(config) = load_config(&cli) else {
        return ExitCode::FAILURE;
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        upstream = %config.upstream.catalog_url(),
        "Starting MCP Plugin Gateway"
    );

    let gateway = Gateway::new(config);

    if let Err(e) = gateway.run().await {
        error!("Gateway error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
