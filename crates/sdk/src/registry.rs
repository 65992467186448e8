//! Tool registry: maps tool names to handlers and their advertised schema.

use std::collections::BTreeMap;
use std::sync::Arc;

use inf_protocol::{ToolDefinition, ToolReference};

use crate::error::{Result, SdkError};
use crate::tool::{Tool, ToolHandler};

/// A tool after validation, with its schema resolved.
#[derive(Clone)]
pub struct RegisteredTool {
    pub name: String,
    pub description: Option<String>,
    pub config: Option<serde_json::Value>,
    pub schema: serde_json::Value,
    pub handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Registry of tools, keyed by exact name.
///
/// Cloning is cheap; handlers are shared. Once a polling agent starts it
/// takes a snapshot and the registry is never mutated again.
#[derive(Clone, Default, Debug)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `tool`, extract its input schema and store it.
    ///
    /// Fails without touching the registry when the name is taken or
    /// malformed, the description is blank, or the input type is not a
    /// record the control plane can describe.
    pub fn register(&mut self, tool: Tool) -> Result<ToolReference> {
        let Tool {
            name,
            description,
            config,
            handler,
        } = tool;

        validate_name(&name)?;
        if self.tools.contains_key(&name) {
            return Err(SdkError::DuplicateName(name));
        }
        if matches!(description.as_deref(), Some(d) if d.trim().is_empty()) {
            return Err(SdkError::InvalidTool {
                name,
                reason: "description must not be empty".into(),
            });
        }
        let schema = handler.input_schema(&name)?;

        self.tools.insert(
            name.clone(),
            RegisteredTool {
                name: name.clone(),
                description,
                config,
                schema,
                handler,
            },
        );
        Ok(ToolReference::new(name))
    }

    /// All registered tool names (sorted).
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// The registration payload entries, schemas rendered as JSON text.
    pub fn definitions(&self) -> Result<Vec<ToolDefinition>> {
        self.tools
            .values()
            .map(|t| {
                Ok(ToolDefinition {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    schema: serde_json::to_string(&t.schema)?,
                    config: t.config.clone(),
                })
            })
            .collect()
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SdkError::InvalidTool {
            name: name.into(),
            reason: "name must not be empty".into(),
        });
    }
    if let Some(c) = name.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(SdkError::InvalidTool {
            name: name.into(),
            reason: format!("name may only contain ASCII letters, digits and '_', found {c:?}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::Outcome;
    use inf_protocol::ContextInput;
    use schemars::JsonSchema;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize, JsonSchema)]
    struct EchoInput {
        text: String,
    }

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Recursive {
        next: Option<Box<Recursive>>,
    }

    fn echo(name: &str) -> Tool {
        Tool::new(name, |input: EchoInput, _ctx: ContextInput| async move {
            Ok::<_, String>(Outcome::resolve(input.text))
        })
    }

    #[test]
    fn register_and_lookup() {
        let mut reg = ToolRegistry::new();
        let r = reg.register(echo("echo").description("Echo text")).unwrap();
        assert_eq!(r.function, "echo");
        assert!(r.service.is_none());

        let t = reg.get("echo").unwrap();
        assert_eq!(t.description.as_deref(), Some("Echo text"));
        assert_eq!(t.schema["additionalProperties"], json!(false));
        assert!(reg.get("missing").is_none());
    }

    #[test]
    fn names_are_case_sensitive() {
        let mut reg = ToolRegistry::new();
        reg.register(echo("Echo")).unwrap();
        assert!(reg.get("echo").is_none());
        assert!(reg.get("Echo").is_some());
    }

    #[test]
    fn tool_names_sorted() {
        let mut reg = ToolRegistry::new();
        reg.register(echo("zeta")).unwrap();
        reg.register(echo("alpha")).unwrap();
        assert_eq!(reg.tool_names(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn duplicate_keeps_first() {
        let mut reg = ToolRegistry::new();
        reg.register(echo("echo").description("first")).unwrap();
        let err = reg.register(echo("echo").description("second")).unwrap_err();
        assert!(matches!(err, SdkError::DuplicateName(ref n) if n == "echo"));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("echo").unwrap().description.as_deref(), Some("first"));
    }

    #[test]
    fn bad_names_rejected() {
        let mut reg = ToolRegistry::new();
        for name in ["", "has space", "dotted.name", "dash-name"] {
            let err = reg.register(echo(name)).unwrap_err();
            assert!(matches!(err, SdkError::InvalidTool { .. }), "{name}: {err}");
        }
        assert!(reg.is_empty());
    }

    #[test]
    fn blank_description_rejected() {
        let mut reg = ToolRegistry::new();
        let err = reg.register(echo("echo").description("  ")).unwrap_err();
        assert!(err.is_validation());
        assert!(reg.is_empty());
    }

    #[test]
    fn non_record_input_not_added() {
        let mut reg = ToolRegistry::new();
        let scalar = Tool::new("scalar", |n: i64, _ctx: ContextInput| async move {
            Ok::<_, String>(Outcome::resolve(n))
        });
        let err = reg.register(scalar).unwrap_err();
        assert!(matches!(err, SdkError::InvalidTool { .. }));

        let recursive = Tool::new("recursive", |_: Recursive, _ctx: ContextInput| async move {
            Ok::<_, String>(Outcome::resolve(()))
        });
        let err = reg.register(recursive).unwrap_err();
        assert!(matches!(err, SdkError::UnsupportedSchema { .. }));
        assert!(reg.is_empty());
    }

    #[test]
    fn definitions_render_schema_text() {
        let mut reg = ToolRegistry::new();
        reg.register(
            echo("echo")
                .description("Echo text")
                .config(json!({ "timeoutSeconds": 5 })),
        )
        .unwrap();

        let defs = reg.definitions().unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
        assert_eq!(defs[0].config, Some(json!({ "timeoutSeconds": 5 })));
        let schema: serde_json::Value = serde_json::from_str(&defs[0].schema).unwrap();
        assert_eq!(schema["properties"]["text"]["type"], json!("string"));
    }

    #[tokio::test]
    async fn handler_reachable_through_registry() {
        let mut reg = ToolRegistry::new();
        reg.register(echo("echo")).unwrap();
        let result = reg
            .get("echo")
            .unwrap()
            .handler
            .invoke(json!({ "text": "hi" }), ContextInput::default())
            .await;
        assert_eq!(result.result, json!("hi"));
    }
}
