//! Tool system for step execution.
//!
//! Tools are offered to the model while it works on a step. The engine never
//! calls them itself: it hands the registry to the model-interaction layer,
//! which runs a tool whenever the model asks for one and feeds the output
//! back into the conversation.

mod location;

pub use location::{GetLocation, GetWeather};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{FunctionDefinition, ToolDefinition};

/// Information about a tool for display purposes.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Trait for implementing tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does.
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> anyhow::Result<String>;
}

/// Registry of available tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry (no built-in tools).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in location and weather tools.
    pub fn with_defaults(location: impl Into<String>) -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(GetLocation::new(location)));
        registry.register(Arc::new(GetWeather::new()));
        tracing::debug!(tools = registry.len(), "tool registry ready");
        registry
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// List all available tools, sorted by name.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        let mut tools: Vec<ToolInfo> = self
            .tools
            .values()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Check if a tool exists by name.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get tool schemas in model-compatible format, sorted by name.
    pub fn get_tool_schemas(&self) -> Vec<ToolDefinition> {
        let mut schemas: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters_schema(),
                },
            })
            .collect();
        schemas.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        schemas
    }

    /// Execute a tool by name.
    pub async fn execute(&self, name: &str, args: Value) -> anyhow::Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;

        tool.execute(args).await
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the text argument"
        }

        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }

        async fn execute(&self, args: Value) -> anyhow::Result<String> {
            Ok(args["text"].as_str().unwrap_or_default().to_string())
        }
    }

    #[test]
    fn test_defaults_registered() {
        let registry = ToolRegistry::with_defaults("Vancouver, BC, Canada");
        assert!(registry.has_tool("get_location"));
        assert!(registry.has_tool("get_weather"));
        let names: Vec<_> = registry.list_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["get_location", "get_weather"]);
    }

    #[test]
    fn test_schemas_are_function_tools() {
        let registry = ToolRegistry::with_defaults("Vancouver");
        let schemas = registry.get_tool_schemas();
        assert_eq!(schemas.len(), 2);
        assert!(schemas.iter().all(|s| s.tool_type == "function"));
        assert_eq!(schemas[1].function.parameters["required"], json!(["location"]));
    }

    #[tokio::test]
    async fn test_execute_registered_tool() {
        let mut registry = ToolRegistry::empty();
        registry.register(Arc::new(Echo));
        let out = registry.execute("echo", json!({"text": "hi"})).await.unwrap();
        assert_eq!(out, "hi");
    }

    #[tokio::test]
    async fn test_execute_unknown_tool_fails() {
        let registry = ToolRegistry::empty();
        let err = registry.execute("nope", Value::Null).await.unwrap_err();
        assert!(err.to_string().contains("Unknown tool: nope"));
    }

    #[test]
    fn test_debug_lists_names() {
        let registry = ToolRegistry::with_defaults("x");
        assert_eq!(
            format!("{:?}", registry),
            r#"ToolRegistry { tools: ["get_location", "get_weather"] }"#
        );
    }
}
