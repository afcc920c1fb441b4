//! Upstream catalog model and tool descriptor synthesis
//!
//! The upstream catalog endpoint returns a tree of plugins, each carrying an
//! OpenAPI-like `paths` map. Every surfaced (path, method) operation becomes
//! one MCP tool descriptor. Absent or malformed fields resolve to documented
//! defaults instead of failing the whole catalog.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::schema::flatten;
use crate::protocol::Tool;

/// HTTP methods surfaced as tools; everything else in the catalog is ignored.
const SURFACED_METHODS: [&str; 4] = ["get", "post", "put", "delete"];

/// Top-level catalog response
///
/// Plugin entries stay raw here and are parsed one by one, so a malformed
/// plugin cannot abort the rest of the catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogResponse {
    /// Raw plugin entries
    #[serde(default)]
    pub plugins: Vec<Value>,
}

/// One plugin wrapper in the catalog listing
#[derive(Debug, Clone, Deserialize)]
pub struct PluginEntry {
    /// The plugin payload
    #[serde(default)]
    pub plugin: Plugin,
}

/// Plugin metadata and interface
#[derive(Debug, Clone, Deserialize)]
pub struct Plugin {
    /// Model-facing plugin name
    #[serde(rename = "name_for_model", default = "default_plugin_name")]
    pub name: String,
    /// Model-facing plugin description
    #[serde(rename = "description_for_model", default)]
    pub description: String,
    /// OpenAPI-like interface
    #[serde(default)]
    pub interface: PluginInterface,
}

impl Default for Plugin {
    fn default() -> Self {
        Self {
            name: default_plugin_name(),
            description: String::new(),
            interface: PluginInterface::default(),
        }
    }
}

fn default_plugin_name() -> String {
    "unknown".to_string()
}

/// Plugin interface: path template → method → operation spec
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginInterface {
    /// Raw paths map; operation specs are parsed per entry so one malformed
    /// operation cannot poison its siblings
    #[serde(default)]
    pub paths: serde_json::Map<String, Value>,
}

/// One (path, method) operation spec
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationSpec {
    /// Operation identifier; when absent the tool name is synthesized from
    /// the method and plugin name
    #[serde(rename = "operationId", default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// Short summary used as the tool description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Declared query/path/header parameters
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterSpec>,
    /// Request body schema by content type
    #[serde(rename = "requestBody", default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBodySpec>,
}

/// A declared operation parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name
    pub name: String,
    /// Location: `query`, `path`, or `header` (defaults to `query`)
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Whether the parameter is required
    #[serde(default)]
    pub required: bool,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Schema fragment; a missing type defaults to string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

impl ParameterSpec {
    /// The parameter's routing location, defaulting to the query string
    #[must_use]
    pub fn location(&self) -> &str {
        self.location.as_deref().unwrap_or("query")
    }
}

/// Request body spec: content type → media type entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestBodySpec {
    /// Media type entries
    #[serde(default)]
    pub content: HashMap<String, MediaTypeSpec>,
}

/// Media type entry carrying a schema fragment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaTypeSpec {
    /// Schema fragment with `properties`/`required`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

/// The synthesized, cacheable unit exposed as one MCP tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    /// Tool name (operation id or fallback)
    pub name: String,
    /// Tool description
    pub description: String,
    /// Flattened input schema shown to MCP clients
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    /// Call-time metadata, never shown in tool listings
    #[serde(rename = "_meta")]
    pub meta: ToolMeta,
}

impl ToolDescriptor {
    /// The public `{name, description, inputSchema}` triple for listings
    #[must_use]
    pub fn to_tool(&self) -> Tool {
        Tool {
            name: self.name.clone(),
            description: Some(self.description.clone()),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// Dispatch metadata kept alongside each descriptor.
///
/// The flattened `inputSchema` alone cannot route a call: parameter
/// locations come from the original operation spec kept here.
#[derive(Debug, Clone, Serialize)]
pub struct ToolMeta {
    /// Upstream API base URL
    pub base_url: String,
    /// Path template with `{param}` placeholders
    pub path: String,
    /// HTTP method, uppercased
    pub method: String,
    /// Owning plugin name
    pub plugin_name: String,
    /// Original, un-flattened operation spec
    pub spec: OperationSpec,
}

/// Convert a parsed catalog into tool descriptors.
///
/// Operations outside GET/POST/PUT/DELETE are skipped, as is any operation
/// whose spec fails to parse. Name collisions across plugins are resolved
/// last-seen-wins and logged.
#[must_use]
pub fn synthesize_tools(base_url: &str, catalog: &CatalogResponse) -> Vec<ToolDescriptor> {
    let mut tools: Vec<ToolDescriptor> = Vec::new();
    let mut index_by_name: HashMap<String, usize> = HashMap::new();

    for raw_entry in &catalog.plugins {
        let entry: PluginEntry = match serde_json::from_value(raw_entry.clone()) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping malformed plugin entry");
                continue;
            }
        };
        let plugin = &entry.plugin;
        debug!(
            plugin = %plugin.name,
            paths = plugin.interface.paths.len(),
            "Processing plugin"
        );

        for (path, methods) in &plugin.interface.paths {
            let Some(methods) = methods.as_object() else {
                warn!(plugin = %plugin.name, path = %path, "Skipping non-object path entry");
                continue;
            };

            for (method, raw_spec) in methods {
                if !SURFACED_METHODS.contains(&method.to_lowercase().as_str()) {
                    continue;
                }

                let spec: OperationSpec = match serde_json::from_value(raw_spec.clone()) {
                    Ok(spec) => spec,
                    Err(e) => {
                        warn!(
                            plugin = %plugin.name,
                            path = %path,
                            method = %method,
                            error = %e,
                            "Skipping malformed operation"
                        );
                        continue;
                    }
                };

                let tool = synthesize_tool(base_url, plugin, path, method, spec);

                if let Some(&existing) = index_by_name.get(&tool.name) {
                    warn!(
                        tool = %tool.name,
                        previous_plugin = %tools[existing].meta.plugin_name,
                        plugin = %plugin.name,
                        "Tool name collision, keeping last-seen definition"
                    );
                    tools[existing] = tool;
                } else {
                    index_by_name.insert(tool.name.clone(), tools.len());
                    tools.push(tool);
                }
            }
        }
    }

    tools
}

/// Build one descriptor from an operation spec
fn synthesize_tool(
    base_url: &str,
    plugin: &Plugin,
    path: &str,
    method: &str,
    spec: OperationSpec,
) -> ToolDescriptor {
    let name = spec.operation_id.clone().unwrap_or_else(|| {
        format!("{}_{}", method.to_lowercase(), plugin.name.replace('-', "_"))
    });

    let description = spec
        .summary
        .clone()
        .unwrap_or_else(|| plugin.description.clone());

    let input_schema = build_input_schema(&spec);

    ToolDescriptor {
        name,
        description,
        input_schema,
        meta: ToolMeta {
            base_url: base_url.to_string(),
            path: path.to_string(),
            method: method.to_uppercase(),
            plugin_name: plugin.name.clone(),
            spec,
        },
    }
}

/// Merge requestBody properties and declared parameters into one object
/// schema, then flatten enum constraints.
fn build_input_schema(spec: &OperationSpec) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required: Vec<String> = Vec::new();

    if let Some(body) = &spec.request_body {
        for media in body.content.values() {
            let Some(schema) = &media.schema else { continue };
            if let Some(props) = schema.get("properties").and_then(Value::as_object) {
                for (name, prop) in props {
                    properties.insert(name.clone(), prop.clone());
                }
            }
            if let Some(fields) = schema.get("required").and_then(Value::as_array) {
                for field in fields.iter().filter_map(Value::as_str) {
                    if !required.iter().any(|r| r == field) {
                        required.push(field.to_string());
                    }
                }
            }
        }
    }

    for param in &spec.parameters {
        let param_type = param
            .schema
            .as_ref()
            .and_then(|s| s.get("type"))
            .and_then(Value::as_str)
            .unwrap_or("string");
        properties.insert(
            param.name.clone(),
            json!({
                "type": param_type,
                "description": param.description.clone().unwrap_or_default(),
            }),
        );
        if param.required && !required.iter().any(|r| r == &param.name) {
            required.push(param.name.clone());
        }
    }

    let mut schema = json!({"type": "object", "properties": properties});
    if !required.is_empty() {
        schema["required"] = json!(required);
    }

    flatten(&schema)
}
