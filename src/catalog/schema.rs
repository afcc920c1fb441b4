//! JSON Schema enum flattening
//!
//! Some MCP clients mishandle `enum` constraints in tool input schemas, so
//! the allowed values are folded into the `description` text instead and the
//! `enum` key is removed. The transformation is pure and idempotent.

use serde_json::Value;

/// Flatten every `enum` constraint in `schema` into description text.
///
/// Recurses through `properties` and `items`. Non-object input is returned
/// unchanged. The returned value is an independent copy; the input is never
/// mutated.
#[must_use]
pub fn flatten(schema: &Value) -> Value {
    let Some(obj) = schema.as_object() else {
        return schema.clone();
    };

    let mut out = obj.clone();

    if let Some(enum_value) = out.remove("enum") {
        let description = out
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default();
        out.insert(
            "description".to_string(),
            Value::String(describe_enum(description, &enum_value)),
        );
    }

    if let Some(Value::Object(properties)) = out.get_mut("properties") {
        for prop in properties.values_mut() {
            *prop = flatten(prop);
        }
    }

    if let Some(items) = out.get_mut("items") {
        *items = flatten(items);
    }

    Value::Object(out)
}

/// Append the enum values to an existing description.
///
/// A mapping renders as `key: value` pairs; a plain sequence as a
/// comma-joined list.
fn describe_enum(description: &str, enum_value: &Value) -> String {
    match enum_value {
        Value::Object(map) => {
            let joined = map
                .iter()
                .map(|(k, v)| format!("{k}: {}", render_scalar(v)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{description} | Enum: {joined}")
        }
        Value::Array(values) => {
            let joined = values
                .iter()
                .map(render_scalar)
                .collect::<Vec<_>>()
                .join(", ");
            format!("{description} | 選項: {joined}")
        }
        other => format!("{description} | 選項: {}", render_scalar(other)),
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
