//! Catalog fetcher: credential-gated, cached, single-flight upstream fetch
//!
//! Upstream failures degrade to an empty tool list rather than erroring:
//! the gateway keeps answering `tools/list` even when the catalog service
//! is down. Failed fetches are never cached, so the next request retries.

use std::sync::Arc;

use dashmap::DashMap;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::cache::ToolCache;
use super::credential_preview;
use super::types::{CatalogResponse, ToolDescriptor, synthesize_tools};
use crate::config::UpstreamConfig;
use crate::{Error, Result};

/// Credentials shorter than this are rejected before any network call
pub const MIN_CREDENTIAL_LEN: usize = 10;

/// Fetches and caches the upstream plugin catalog per credential
pub struct CatalogFetcher {
    client: Client,
    base_url: String,
    catalog_url: String,
    cache: ToolCache,
    /// Per-credential single-flight guard: at most one upstream fetch in
    /// flight per credential; waiters re-check the cache under the lock
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CatalogFetcher {
    /// Create a fetcher for the configured upstream
    pub fn new(upstream: &UpstreamConfig, cache: ToolCache) -> Result<Self> {
        let client = Client::builder()
            .timeout(upstream.fetch_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: upstream.base_url.clone(),
            catalog_url: upstream.catalog_url(),
            cache,
            locks: DashMap::new(),
        })
    }

    /// Fetch the tool descriptor set for a credential.
    ///
    /// Returns the cached set when fresh; otherwise performs one upstream
    /// fetch (coalesced across concurrent callers). Invalid credentials and
    /// upstream failures yield an empty list.
    pub async fn fetch_tools(&self, credential: &str) -> Vec<ToolDescriptor> {
        if credential.is_empty() {
            warn!("Catalog request rejected: no credential supplied");
            return Vec::new();
        }
        if credential.len() < MIN_CREDENTIAL_LEN {
            warn!(length = credential.len(), "Catalog request rejected: credential too short");
            return Vec::new();
        }

        if let Some(tools) = self.cache.get(credential) {
            debug!(
                token = %credential_preview(credential),
                count = tools.len(),
                "Serving cached tool list"
            );
            return tools;
        }

        let lock = {
            let entry = self.locks.entry(credential.to_string()).or_default();
            Arc::clone(entry.value())
        };
        let _guard = lock.lock().await;

        // Another caller may have populated the cache while we waited
        if let Some(tools) = self.cache.get(credential) {
            return tools;
        }

        match self.fetch_from_upstream(credential).await {
            Ok(tools) => {
                info!(
                    token = %credential_preview(credential),
                    count = tools.len(),
                    "Synthesized tools from plugin catalog"
                );
                self.cache.put(credential, tools.clone());
                tools
            }
            Err(e) => {
                warn!(
                    token = %credential_preview(credential),
                    error = %e,
                    "Catalog fetch failed, serving no tools"
                );
                Vec::new()
            }
        }
    }

    /// Resolve one descriptor by name from the cache only.
    ///
    /// Tool calls never trigger a catalog fetch: an unknown tool must not
    /// cost a network round-trip.
    pub fn cached_tool(&self, credential: &str, name: &str) -> Option<ToolDescriptor> {
        self.cache
            .get(credential)?
            .into_iter()
            .find(|tool| tool.name == name)
    }

    /// Drop the cached set for a credential
    pub fn invalidate(&self, credential: &str) {
        self.cache.invalidate(credential);
    }

    /// The underlying cache (for health/status reporting)
    pub fn cache(&self) -> &ToolCache {
        &self.cache
    }

    async fn fetch_from_upstream(&self, credential: &str) -> Result<Vec<ToolDescriptor>> {
        debug!(
            token = %credential_preview(credential),
            url = %self.catalog_url,
            "Fetching plugin catalog"
        );

        let response = self
            .client
            .post(&self.catalog_url)
            .header("token", credential)
            .header(CONTENT_TYPE, "application/json")
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Catalog request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read catalog response: {e}")))?;

        if status != reqwest::StatusCode::OK {
            return Err(Error::Transport(format!(
                "Catalog endpoint returned {status}"
            )));
        }

        let catalog: CatalogResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Transport(format!("Catalog response was not valid JSON: {e}")))?;

        Ok(synthesize_tools(&self.base_url, &catalog))
    }
}
