//! Configuration management

use std::{path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before processing config.
    /// Loaded in order, later files override earlier.
    pub env_files: Vec<String>,
    /// Server configuration
    pub server: ServerConfig,
    /// Upstream plugin catalog configuration
    pub upstream: UpstreamConfig,
    /// Tool cache configuration
    pub cache: CacheConfig,
    /// Streaming (SSE/WebSocket) configuration
    pub streaming: StreamingConfig,
    /// Security configuration
    pub security: SecurityConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Upstream catalog service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the upstream API
    pub base_url: String,
    /// Path of the plugin catalog listing endpoint
    pub catalog_path: String,
    /// Timeout for catalog fetches
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,
    /// Timeout for tool invocations
    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://superiorapis-creator.cteam.com.tw".to_string(),
            catalog_path: "/manager/module/plugins/list_v3".to_string(),
            fetch_timeout: Duration::from_secs(30),
            call_timeout: Duration::from_secs(60),
        }
    }
}

impl UpstreamConfig {
    /// Full URL of the catalog listing endpoint
    #[must_use]
    pub fn catalog_url(&self) -> String {
        format!("{}{}", self.base_url, self.catalog_path)
    }
}

/// Tool cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL for cached tool lists; entries older than this are refetched
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Streaming configuration for the SSE and WebSocket front-ends
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Enable the streaming endpoints
    pub enabled: bool,
    /// Interval between heartbeat notifications on open streams
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Reject streaming connections whose Origin is not allowed.
    /// Off by default: mismatches are logged but allowed.
    pub enforce_origin: bool,
    /// Origin prefixes accepted without a warning
    pub allowed_origins: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enforce_origin: false,
            allowed_origins: vec![
                "http://localhost".to_string(),
                "http://127.0.0.1".to_string(),
            ],
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// A first extraction pass discovers `env_files`; those files are loaded
    /// into the process environment and the config is extracted again, so
    /// `MCP_PLUGIN_GATEWAY_*` values placed in an env file feed resolution.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist, cannot be parsed,
    /// or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let first_pass: Self = Self::extract(path)?;
        first_pass.load_env_files();

        let config: Self = Self::extract(path)?;
        config.validate()?;

        Ok(config)
    }

    /// Extract configuration from the YAML file and current environment
    fn extract(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Environment overrides: MCP_PLUGIN_GATEWAY_SERVER__PORT etc.
        figment = figment.merge(Env::prefixed("MCP_PLUGIN_GATEWAY_").split("__"));

        figment.extract().map_err(|e| Error::Config(e.to_string()))
    }

    /// Load environment files into the process environment.
    /// Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let path = Path::new(path_str);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => tracing::info!("Loaded env file: {path_str}"),
                    Err(e) => tracing::warn!("Failed to load env file {path_str}: {e}"),
                }
            } else {
                tracing::debug!("Env file not found (skipped): {path_str}");
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.upstream.base_url)
            .map_err(|e| Error::Config(format!("Invalid upstream base_url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "Upstream base_url must be http(s), got {}",
                url.scheme()
            )));
        }

        if self.server.port == 0 {
            return Err(Error::Config("server.port must be non-zero".to_string()));
        }

        if self.streaming.heartbeat_interval.is_zero() {
            return Err(Error::Config(
                "streaming.heartbeat_interval must be non-zero".to_string(),
            ));
        }

        if self.cache.ttl.is_zero() {
            return Err(Error::Config("cache.ttl must be non-zero".to_string()));
        }

        Ok(())
    }
}
