//! Per-credential tool cache with TTL expiry
//!
//! One entry per credential; `put` always replaces the whole descriptor set.
//! Expired entries are treated as absent and evicted on read — no background
//! sweeper is needed. The clock is injected so expiry is testable.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use super::credential_preview;
use super::types::ToolDescriptor;

type Clock = Box<dyn Fn() -> Instant + Send + Sync>;

/// Credential-keyed cache of synthesized tool descriptors
pub struct ToolCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    clock: Clock,
}

struct CacheEntry {
    tools: Vec<ToolDescriptor>,
    fetched_at: Instant,
}

impl ToolCache {
    /// Create a cache with the given TTL, using the system clock
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Box::new(Instant::now))
    }

    /// Create a cache with an injected clock
    #[must_use]
    pub fn with_clock(ttl: Duration, clock: Clock) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    /// Get the cached descriptor set if present and not expired.
    ///
    /// Expired entries are evicted on the spot.
    pub fn get(&self, credential: &str) -> Option<Vec<ToolDescriptor>> {
        let entry = self.entries.get(credential)?;
        if (self.clock)().duration_since(entry.fetched_at) > self.ttl {
            drop(entry);
            self.entries.remove(credential);
            debug!(token = %credential_preview(credential), "Cache entry expired");
            return None;
        }
        Some(entry.tools.clone())
    }

    /// Replace the descriptor set for a credential
    pub fn put(&self, credential: &str, tools: Vec<ToolDescriptor>) {
        self.entries.insert(
            credential.to_string(),
            CacheEntry {
                tools,
                fetched_at: (self.clock)(),
            },
        );
    }

    /// Drop one credential's entry
    pub fn invalidate(&self, credential: &str) {
        self.entries.remove(credential);
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of cached credentials
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total descriptors across all cached credentials
    pub fn tool_count(&self) -> usize {
        self.entries.iter().map(|e| e.tools.len()).sum()
    }
}
