//! Plugin catalog handling: upstream fetch, tool synthesis, caching, invocation

pub mod cache;
pub mod fetcher;
pub mod invoker;
pub mod schema;
pub mod types;

pub use cache::ToolCache;
pub use fetcher::{CatalogFetcher, MIN_CREDENTIAL_LEN};
pub use invoker::{CallOutcome, ToolInvoker};
pub use types::{CatalogResponse, OperationSpec, ParameterSpec, ToolDescriptor, ToolMeta};

/// Render a credential as a short, log-safe preview.
///
/// Credentials are cache keys for upstream tool sets and must never appear
/// in full in logs or payloads.
#[must_use]
pub fn credential_preview(credential: &str) -> String {
    let head: String = credential.chars().take(10).collect();
    format!("{head}...")
}
