//! Input schema extraction for tool argument types.
//!
//! The control plane does not dereference `$ref`s, so every nested type must
//! be inlined. Types that can only be described by reference (recursive
//! types) are rejected at registration time.

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde_json::Value;

use crate::error::{Result, SdkError};

/// Produce the JSON schema document advertised for a tool whose input is `T`.
///
/// The root must describe a record (an object with named fields); it is
/// marked `additionalProperties: false` so the orchestrator shapes payloads
/// strictly.
pub fn input_schema<T: JsonSchema>(tool: &str) -> Result<Value> {
    let settings = SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = true;
    });
    let root = settings.into_generator().into_root_schema_for::<T>();
    let mut doc = serde_json::to_value(&root.schema)?;

    if contains_ref(&doc) {
        return Err(SdkError::UnsupportedSchema {
            name: tool.to_string(),
            reason: format!(
                "input type `{}` needs a $ref to a shared definition; \
                 recursive input types are not supported",
                T::schema_name()
            ),
        });
    }

    let obj = doc
        .as_object_mut()
        .filter(|o| is_record(o))
        .ok_or_else(|| SdkError::InvalidTool {
            name: tool.to_string(),
            reason: format!(
                "input type `{}` must be a struct with named fields",
                T::schema_name()
            ),
        })?;
    obj.insert("additionalProperties".into(), Value::Bool(false));

    Ok(doc)
}

fn is_record(schema: &serde_json::Map<String, Value>) -> bool {
    let is_object = schema.get("type").and_then(Value::as_str) == Some("object");
    // Maps describe their values through an `additionalProperties` schema.
    let free_form = matches!(schema.get("additionalProperties"), Some(Value::Object(_)));
    is_object && !free_form
}

fn contains_ref(value: &Value) -> bool {
    match value {
        Value::Object(map) => map
            .iter()
            .any(|(k, v)| k == "$ref" || contains_ref(v)),
        Value::Array(items) => items.iter().any(contains_ref),
        _ => false,
    }
}
