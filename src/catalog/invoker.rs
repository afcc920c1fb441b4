//! Tool invoker: argument routing and upstream dispatch
//!
//! Read verbs (GET/DELETE) route declared parameters into query, path, or
//! header positions from the original operation spec; write verbs send the
//! whole argument object as the JSON body. Transport faults never escape as
//! errors — every call produces a [`CallOutcome`].

use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use super::credential_preview;
use super::fetcher::CatalogFetcher;
use super::types::ToolMeta;
use crate::config::UpstreamConfig;
use crate::{Error, Result};

/// Normalized result of one tool invocation
#[derive(Debug, Clone, serde::Serialize)]
pub struct CallOutcome {
    /// Whether the upstream call returned HTTP 200
    pub success: bool,
    /// Raw upstream response body (passed through as text)
    pub content: String,
    /// Upstream HTTP status, when a response was received
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Failure category, when not successful
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CallOutcome {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: String::new(),
            status: None,
            error: Some(error.into()),
        }
    }
}

/// Dispatches tool calls against the upstream API
pub struct ToolInvoker {
    client: Client,
    fetcher: Arc<CatalogFetcher>,
}

impl ToolInvoker {
    /// Create an invoker sharing the fetcher's descriptor cache
    pub fn new(upstream: &UpstreamConfig, fetcher: Arc<CatalogFetcher>) -> Result<Self> {
        let client = Client::builder()
            .timeout(upstream.call_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, fetcher })
    }

    /// Invoke a tool by name with the given argument object.
    ///
    /// The descriptor is resolved from the cached set; an unknown tool fails
    /// without any network call.
    pub async fn call_tool(
        &self,
        credential: &str,
        tool_name: &str,
        arguments: &Value,
    ) -> CallOutcome {
        let Some(descriptor) = self.fetcher.cached_tool(credential, tool_name) else {
            warn!(tool = %tool_name, "Tool not found in cached catalog");
            return CallOutcome::failure(format!("Tool {tool_name} does not exist"));
        };

        let meta = &descriptor.meta;
        let routed = route_arguments(meta, arguments);

        let method = match meta.method.parse::<Method>() {
            Ok(m) => m,
            Err(_) => {
                return CallOutcome::failure(format!("Invalid HTTP method {}", meta.method));
            }
        };

        debug!(
            tool = %tool_name,
            method = %meta.method,
            url = %routed.url,
            token = %credential_preview(credential),
            "Dispatching tool call"
        );

        let mut request = self
            .client
            .request(method, &routed.url)
            .header("token", credential)
            .header(CONTENT_TYPE, "application/json");

        if !routed.query.is_empty() {
            request = request.query(&routed.query);
        }
        for (name, value) in &routed.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &routed.body {
            request = request.json(body);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                let content = match response.text().await {
                    Ok(text) => text,
                    Err(e) => {
                        return CallOutcome::failure(format!(
                            "Failed to read upstream response: {e}"
                        ));
                    }
                };
                debug!(tool = %tool_name, status = %status, "Upstream responded");
                CallOutcome {
                    success: status == StatusCode::OK,
                    error: (status != StatusCode::OK)
                        .then(|| format!("Upstream returned {status}")),
                    status: Some(status.as_u16()),
                    content,
                }
            }
            Err(e) if e.is_timeout() => {
                warn!(tool = %tool_name, "Tool call timed out");
                CallOutcome::failure("timeout")
            }
            Err(e) if e.is_connect() => {
                warn!(tool = %tool_name, error = %e, "Tool call connection error");
                CallOutcome::failure(format!("Connection error: {e}"))
            }
            Err(e) => {
                warn!(tool = %tool_name, error = %e, "Tool call failed");
                CallOutcome::failure(format!("Request failed: {e}"))
            }
        }
    }
}

/// Buckets produced by argument routing
#[derive(Debug)]
struct RoutedCall {
    url: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<Value>,
}

/// Route the argument object into URL, query, header, and body positions.
///
/// Unresolved `{placeholder}` segments stay in the URL; the upstream's
/// resulting error surfaces as an ordinary failed outcome.
fn route_arguments(meta: &ToolMeta, arguments: &Value) -> RoutedCall {
    let args = arguments.as_object().cloned().unwrap_or_default();

    let mut path = meta.path.clone();
    let mut query = Vec::new();
    let mut headers = Vec::new();
    let mut body = None;

    if matches!(meta.method.as_str(), "GET" | "DELETE") {
        for param in &meta.spec.parameters {
            let Some(value) = args.get(&param.name) else {
                continue;
            };
            let rendered = render_argument(value);
            match param.location() {
                "path" => {
                    path = path.replace(&format!("{{{}}}", param.name), &rendered);
                }
                "header" => headers.push((param.name.clone(), rendered)),
                _ => query.push((param.name.clone(), rendered)),
            }
        }

        // undeclared arguments: substitute a matching placeholder, else query
        for (name, value) in &args {
            if meta.spec.parameters.iter().any(|p| &p.name == name) {
                continue;
            }
            let rendered = render_argument(value);
            let placeholder = format!("{{{name}}}");
            if path.contains(&placeholder) {
                path = path.replace(&placeholder, &rendered);
            } else {
                query.push((name.clone(), rendered));
            }
        }
    } else {
        // write verbs: the whole argument object is the JSON body; path
        // placeholders are still substituted from matching arguments
        for (name, value) in &args {
            let placeholder = format!("{{{name}}}");
            if path.contains(&placeholder) {
                path = path.replace(&placeholder, &render_argument(value));
            }
        }
        body = Some(Value::Object(args));
    }

    RoutedCall {
        url: format!("{}{}", meta.base_url, path),
        query,
        headers,
        body,
    }
}

fn render_argument(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
